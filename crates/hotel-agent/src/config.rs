//! Configuration read from the environment.
//!
//! A `.env` file in the working directory is loaded first, real
//! environment variables take precedence over it. Empty values count as
//! unset.

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;
use std::time::Duration;

use hotel_agent_core::FinalAnswerMode;
use hotel_agent_ollama_model::{OllamaConfig, OllamaConfigBuilder};
use hotel_agent_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

/// The default Google Geocoding endpoint.
pub const DEFAULT_GEOCODING_URL: &str =
    "https://maps.googleapis.com/maps/api/geocode/json";

/// An error in the configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing(&'static str),
    /// A variable is set to a value that can't be used.
    Invalid {
        /// The variable name.
        key: &'static str,
        /// The offending value.
        value: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => {
                write!(f, "missing required environment variable {key}")
            }
            ConfigError::Invalid { key, value } => {
                write!(f, "invalid value for {key}: {value:?}")
            }
        }
    }
}

impl StdError for ConfigError {}

/// The language model backend to use.
#[derive(Clone, Debug, PartialEq)]
pub enum LlmConfig {
    /// A local Ollama server.
    Local(OllamaConfig),
    /// A hosted OpenAI-compatible API.
    Hosted(OpenAIConfig),
}

/// Elasticsearch settings.
#[derive(Clone, PartialEq)]
pub struct SearchConfig {
    /// The base URL, e.g. `http://localhost:9200`.
    pub base_url: String,
    /// The hotel index.
    pub index: String,
    /// Basic auth user name.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// The stored search template to use instead of a built query.
    pub template_id: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("base_url", &self.base_url)
            .field("index", &self.index)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("template_id", &self.template_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SearchConfig {
    /// Reads the Elasticsearch settings from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    /// Reads the Elasticsearch settings through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let host = vars.get("ELASTICSEARCH_HOST");
        let port: u16 = vars.parse("ELASTICSEARCH_PORT")?.unwrap_or(9200);
        let base_url = match host {
            Some(host) if host.contains("://") => {
                format!("{}:{port}", host.trim_end_matches('/'))
            }
            Some(host) => format!("http://{host}:{port}"),
            None => format!("http://localhost:{port}"),
        };
        Ok(Self {
            base_url,
            index: vars.require("ES_INDEX")?,
            username: vars.get("ELASTICSEARCH_USERNAME"),
            password: vars.get("ELASTICSEARCH_PASSWORD"),
            template_id: vars.get("TEMPLATE_ID"),
            timeout: vars.secs("ES_TIMEOUT_SECS", 30)?,
        })
    }
}

/// Geocoding settings.
#[derive(Clone, PartialEq)]
pub struct GeocodingConfig {
    /// The geocoding endpoint.
    pub endpoint: String,
    /// The API key.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Debug for GeocodingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeocodingConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// The whole application configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// The language model backend.
    pub llm: LlmConfig,
    /// The hotel index.
    pub search: SearchConfig,
    /// Geocoding, when an API key is configured.
    pub geocoding: Option<GeocodingConfig>,
    /// How many model requests one question may take.
    pub max_rounds: usize,
    /// How the final answer is produced.
    pub final_answer_mode: FinalAnswerMode,
}

impl Config {
    /// Reads the configuration from `.env` and the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(env_lookup)
    }

    /// Reads the configuration through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let timeout = vars.secs("LLM_TIMEOUT_SECS", 60)?;
        let temperature: f32 = vars.parse("LLM_TEMPERATURE")?.unwrap_or(0.1);

        let backend = vars.get("LLM_BACKEND").map(|b| b.to_lowercase());
        let llm = match backend.as_deref() {
            None | Some("local") => {
                let mut builder =
                    OllamaConfigBuilder::with_model(vars.require("OLLAMA_MODEL")?)
                        .with_temperature(temperature)
                        .with_timeout(timeout);
                if let Some(base_url) = vars.get("OLLAMA_BASE_URL") {
                    builder = builder.with_base_url(base_url);
                }
                LlmConfig::Local(builder.build())
            }
            Some("hosted") => {
                let mut builder = OpenAIConfigBuilder::with_api_key(
                    vars.require("OPENROUTER_API_KEY")?,
                )
                .with_temperature(temperature)
                .with_timeout(timeout);
                if let Some(model) = vars.get("OPENROUTER_MODEL") {
                    builder = builder.with_model(model);
                }
                if let Some(base_url) = vars.get("OPENROUTER_API_BASE") {
                    builder = builder.with_base_url(base_url);
                }
                if let Some(site_url) = vars.get("OPENROUTER_SITE_URL") {
                    builder = builder.with_site_url(site_url);
                }
                LlmConfig::Hosted(builder.build())
            }
            Some(_) => {
                return Err(ConfigError::Invalid {
                    key: "LLM_BACKEND",
                    value: backend.clone().unwrap_or_default(),
                });
            }
        };

        let geocoding = vars.get("GMAPS_API_KEY").map(|api_key| GeocodingConfig {
            endpoint: vars
                .get("GEOCODING_URL")
                .unwrap_or_else(|| DEFAULT_GEOCODING_URL.to_owned()),
            api_key,
            timeout: Duration::from_secs(10),
        });

        let direct_results =
            vars.parse::<Flag>("HOTEL_AGENT_DIRECT_RESULTS")?.is_some_and(|f| f.0);
        Ok(Self {
            llm,
            search: SearchConfig::from_lookup(&lookup)?,
            geocoding,
            max_rounds: vars
                .parse("HOTEL_AGENT_MAX_ROUNDS")?
                .unwrap_or(hotel_agent_core::DEFAULT_MAX_ROUNDS),
            final_answer_mode: if direct_results {
                FinalAnswerMode::Direct
            } else {
                FinalAnswerMode::Model
            },
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| ConfigError::Invalid { key, value })
            })
            .transpose()
    }

    fn secs(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        Ok(Duration::from_secs(self.parse(key)?.unwrap_or(default)))
    }
}

struct Flag(bool);

impl FromStr for Flag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Flag(true)),
            "0" | "false" | "no" | "off" => Ok(Flag(false)),
            _ => Err(()),
        }
    }
}
