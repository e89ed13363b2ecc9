//! A model provider for a local [Ollama](https://ollama.com) server.
//!
//! Requests go to `/api/chat` without streaming, and the single reply is
//! replayed as model response events.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use hotel_agent_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, ToolCallRequest,
};
use reqwest::Client;

pub use config::{OllamaConfig, OllamaConfigBuilder};
use proto::ChatResponse;

/// Error type for [`OllamaProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_decode() {
            ErrorKind::Protocol
        } else if let Some(status) = err.status() {
            ErrorKind::from_http_status(status.as_u16())
        } else {
            ErrorKind::Unavailable
        };
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Ollama model provider.
#[derive(Clone, Debug)]
pub struct OllamaProvider {
    client: Client,
    config: Arc<OllamaConfig>,
    // Ollama doesn't identify tool calls, ids are minted locally.
    next_call_id: Arc<AtomicU64>,
}

impl OllamaProvider {
    /// Creates a new `OllamaProvider` with the given configuration.
    pub fn new(config: OllamaConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("failed to build a http client with timeout: {err}");
                Client::new()
            });
        Self {
            client,
            config: Arc::new(config),
            next_call_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl ModelProvider for OllamaProvider {
    type Error = Error;
    type Response = OllamaResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let ollama_req = proto::create_request(req, &self.config);
        debug!(
            model = %self.config.model,
            messages = ollama_req.message_count(),
            "sending chat request"
        );
        let resp_fut = self
            .client
            .post(format!("{}/api/chat", self.config.base_url))
            .json(&ollama_req)
            .send();
        let next_call_id = Arc::clone(&self.next_call_id);

        async move {
            let resp = resp_fut.await.map_err(Error::from_reqwest)?;
            let status = resp.status();
            let body = resp.text().await.map_err(Error::from_reqwest)?;
            if !status.is_success() {
                return Err(Error::new(
                    format!("server responded {status}: {body}"),
                    ErrorKind::from_http_status(status.as_u16()),
                ));
            }
            trace!("got chat response: {body}");

            let chat_resp: ChatResponse = serde_json::from_str(&body)
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Protocol))?;
            OllamaResponse::from_chat_response(chat_resp, &next_call_id)
        }
    }
}

/// A complete Ollama reply, delivered as a sequence of events.
#[derive(Debug)]
pub struct OllamaResponse {
    events: VecDeque<ModelResponseEvent>,
}

impl OllamaResponse {
    fn from_chat_response(
        chat_resp: ChatResponse,
        next_call_id: &AtomicU64,
    ) -> Result<Self, Error> {
        if let Some(error) = chat_resp.error {
            return Err(Error::new(error, ErrorKind::Protocol));
        }
        let Some(message) = chat_resp.message else {
            return Err(Error::new("reply has no message", ErrorKind::Protocol));
        };

        let mut events = VecDeque::new();
        if !message.content.is_empty() {
            events.push_back(ModelResponseEvent::MessageDelta(message.content));
        }
        let has_tool_calls = !message.tool_calls.is_empty();
        for tool_call in message.tool_calls {
            let id = next_call_id.fetch_add(1, Ordering::Relaxed);
            events.push_back(ModelResponseEvent::ToolCall(ToolCallRequest {
                id: format!("ollama-call-{id}"),
                name: tool_call.function.name,
                arguments: proto::arguments_to_string(&tool_call.function.arguments),
            }));
        }
        // `done_reason` is "stop" even when tools were requested.
        let finish_reason = if has_tool_calls {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        };
        trace!(done_reason = ?chat_resp.done_reason, "chat response decoded");
        events.push_back(ModelResponseEvent::Completed(finish_reason));

        Ok(Self { events })
    }
}

impl ModelResponse for OllamaResponse {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.get_mut().events.pop_front()))
    }
}
