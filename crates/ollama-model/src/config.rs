use std::time::Duration;

/// Builder for [`OllamaConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct OllamaConfigBuilder {
    model: String,
    base_url: Option<String>,
    temperature: Option<f32>,
    timeout: Option<Duration>,
}

impl OllamaConfigBuilder {
    /// Creates a builder for the given locally installed model.
    #[inline]
    pub fn with_model<S: Into<String>>(model: S) -> Self {
        Self {
            model: model.into(),
            base_url: None,
            temperature: None,
            timeout: None,
        }
    }

    /// Sets the address of the inference server.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the sampling temperature.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the request timeout. Local models can be slow to load, so keep
    /// this generous.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OllamaConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| "http://localhost:11434".to_owned());
        OllamaConfig {
            model: self.model,
            base_url: base_url.trim_end_matches('/').to_owned(),
            temperature: self.temperature.unwrap_or(0.1),
            timeout: self.timeout.unwrap_or(Duration::from_secs(60)),
        }
    }
}

/// Configuration for the Ollama provider.
#[derive(Clone, Debug, PartialEq)]
pub struct OllamaConfig {
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) temperature: f32,
    pub(crate) timeout: Duration,
}

impl OllamaConfig {
    /// Returns the model identifier.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the server address without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
