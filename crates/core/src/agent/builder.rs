use std::sync::Arc;

use hotel_agent_model::ModelProvider;

use super::{Agent, AgentEvent, EventFn, FinalAnswerMode};
use crate::model_client::ModelClient;
use crate::tool::{Executor as ToolExecutor, Tool};

/// The round limit used when none is configured.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) tool_executor: ToolExecutor,
    pub(crate) system_prompt: String,
    pub(crate) max_rounds: usize,
    pub(crate) final_answer_mode: FinalAnswerMode,
    pub(crate) on_event: Option<EventFn>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            tool_executor: ToolExecutor::new(),
            system_prompt: String::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            final_answer_mode: FinalAnswerMode::default(),
            on_event: None,
        }
    }

    /// Sets the system instructions that open every session.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Registers a tool. Tools are offered to the model in registration
    /// order.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tool_executor.register(tool);
        self
    }

    /// Sets how many model requests one session may make. Values below 1
    /// are raised to 1.
    #[inline]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Sets how the final answer is produced.
    #[inline]
    pub fn with_final_answer_mode(mut self, mode: FinalAnswerMode) -> Self {
        self.final_answer_mode = mode;
        self
    }

    /// Attaches a callback for session progress.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(&AgentEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(on_event));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
