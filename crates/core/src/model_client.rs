use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use hotel_agent_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, ToolCallRequest,
};
use tracing::Instrument;

type SendRequestResult =
    Result<ModelClientResponse, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that erases its type and collects the
/// response events into one assistant turn.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since the agent doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err).await
                }
                .instrument(debug_span!("model request")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the complete response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug, Default)]
pub struct ModelClientResponse {
    /// The concatenated message text.
    pub content: String,
    /// Tool calls requested by the model, in order.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("model request failed: {err}");
            return Err(Box::new(err));
        }
    };

    let mut response = ModelClientResponse::default();
    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("model response failed: {err}");
                return Err(Box::new(err));
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                response.content.push_str(&msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                response.tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                response.finish_reason = Some(reason);
            }
        }
    }

    trace!(
        finish_reason = ?response.finish_reason,
        tool_calls = response.tool_calls.len(),
        "finished a request"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use hotel_agent_model::{ErrorKind, ModelMessage};
    use hotel_agent_test_model::{
        PresetEvent, PresetFailure, PresetResponse, TestModelProvider,
    };

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User("Hotels in Rome".to_owned())],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_turn(PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me ".to_owned()),
            PresetEvent::MessageDelta("check.".to_owned()),
            PresetEvent::tool_call("c1", "geocode_location", r#"{"location":"Rome"}"#),
        ]));

        let model_client = ModelClient::new(model_provider);

        // The scripted turn depends on the history only, so it repeats.
        for _ in 0..3 {
            let resp = model_client.send_request(request()).await.unwrap();
            assert_eq!(resp.content, "Let me check.");
            assert_eq!(resp.tool_calls.len(), 1);
            assert_eq!(resp.finish_reason, Some(ModelFinishReason::ToolCalls));
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_client = ModelClient::new(TestModelProvider::default());
        let err = model_client.send_request(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let mut model_provider = TestModelProvider::default();
        model_provider.add_assistant_turn(PresetResponse::with_failure(
            PresetFailure::Authentication,
        ));
        let model_client = ModelClient::new(model_provider);
        let err = model_client.send_request(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }
}
