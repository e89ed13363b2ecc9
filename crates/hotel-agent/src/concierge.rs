use std::sync::Arc;

use hotel_agent_core::{
    Agent, AgentBuilder, AgentEvent, FinalAnswerMode, SessionOutcome,
};
use hotel_agent_model::ModelProvider;
use hotel_agent_ollama_model::OllamaProvider;
use hotel_agent_openai_model::OpenAIProvider;

use crate::config::{Config, LlmConfig};
use crate::services::{
    ElasticsearchClient, Geocoder, GoogleGeocoder, SearchBackend,
};
use crate::tools::*;

const SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

const GEOCODE_STEP: &str = "2. If the user wants hotels near a specific place, \
call `geocode_location` with that place to get its coordinates.";

const NO_GEOCODE_STEP: &str =
    "2. Place names can't be resolved to coordinates, search by city or country instead.";

/// A [`Concierge`] builder.
pub struct ConciergeBuilder {
    agent_builder: AgentBuilder,
    search: Arc<dyn SearchBackend>,
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl ConciergeBuilder {
    /// Creates a builder with a model provider and a search backend.
    pub fn new<P: ModelProvider + 'static>(
        provider: P,
        search: Arc<dyn SearchBackend>,
    ) -> Self {
        Self {
            agent_builder: AgentBuilder::with_model_provider(provider),
            search,
            geocoder: None,
        }
    }

    /// Creates a builder wired to the services named in `config`.
    pub fn from_config(config: &Config) -> Self {
        let search = Arc::new(ElasticsearchClient::new(&config.search));
        let builder = match &config.llm {
            LlmConfig::Local(llm) => {
                info!("using local model {}", llm.model());
                Self::new(OllamaProvider::new(llm.clone()), search)
            }
            LlmConfig::Hosted(llm) => {
                info!("using hosted model {}", llm.model());
                Self::new(OpenAIProvider::new(llm.clone()), search)
            }
        };
        let builder = builder
            .with_max_rounds(config.max_rounds)
            .with_final_answer_mode(config.final_answer_mode);
        match &config.geocoding {
            Some(geocoding) => {
                builder.with_geocoder(Arc::new(GoogleGeocoder::new(geocoding)))
            }
            None => {
                warn!("no geocoding API key, `geocode_location` is disabled");
                builder
            }
        }
    }

    /// Enables the `geocode_location` tool.
    #[inline]
    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// Sets how many model requests one question may take.
    #[inline]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.agent_builder = self.agent_builder.with_max_rounds(max_rounds);
        self
    }

    /// Sets how the final answer is produced.
    #[inline]
    pub fn with_final_answer_mode(mut self, mode: FinalAnswerMode) -> Self {
        self.agent_builder = self.agent_builder.with_final_answer_mode(mode);
        self
    }

    /// Attaches a callback for session progress.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(&AgentEvent) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_event(on_event);
        self
    }

    /// Builds the concierge.
    pub fn build(self) -> Concierge {
        let geocode_step = match self.geocoder {
            Some(_) => GEOCODE_STEP,
            None => NO_GEOCODE_STEP,
        };
        let mut agent_builder = self
            .agent_builder
            .with_system_prompt(SYSTEM_PROMPT.replace("{{GEOCODE_STEP}}", geocode_step))
            .with_tool(ExtractParametersTool::new());
        if let Some(geocoder) = self.geocoder {
            agent_builder = agent_builder.with_tool(GeocodeLocationTool::new(geocoder));
        }
        let agent = agent_builder
            .with_tool(QueryElasticsearchTool::new(self.search))
            .build();

        Concierge { agent }
    }
}

/// The hotel search assistant.
///
/// Each question runs in its own session, so one concierge can serve
/// several questions at once.
pub struct Concierge {
    agent: Agent,
}

impl Concierge {
    /// Answers one question.
    #[inline]
    pub async fn ask(&self, question: &str) -> SessionOutcome {
        self.agent.ask(question).await
    }
}
