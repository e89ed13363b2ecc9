use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use hotel_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    ToolCallRequest,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{ChatCompletionChunk, ToolCall};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    // Tool calls arrive in fragments keyed by `index`, they are only
    // emitted once the stream finishes and the arguments are complete.
    tool_calls: Vec<ToolCall>,
    finish_reason: Option<ModelFinishReason>,
    pending_events: VecDeque<ModelResponseEvent>,
    finished: bool,
}

impl PartialState {
    fn finish_stream(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let has_tool_calls = !self.tool_calls.is_empty();
        for (idx, tool_call) in self.tool_calls.drain(..).enumerate() {
            let id = tool_call.id.filter(|id| !id.is_empty()).unwrap_or_else(
                || {
                    let chunk_id = self.id.as_deref().unwrap_or("chunk");
                    format!("{chunk_id}_call_{idx}")
                },
            );
            let (name, arguments) = match tool_call.function {
                Some(function) => (
                    function.name.unwrap_or_default(),
                    function.arguments.unwrap_or_default(),
                ),
                None => Default::default(),
            };
            self.pending_events.push_back(ModelResponseEvent::ToolCall(
                ToolCallRequest {
                    id,
                    name,
                    arguments,
                },
            ));
        }

        let finish_reason = self.finish_reason.unwrap_or(if has_tool_calls {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        });
        self.pending_events
            .push_back(ModelResponseEvent::Completed(finish_reason));
    }

    fn merge_tool_call(&mut self, tool_call: ToolCall) {
        let Some(partial_tool_call) = self
            .tool_calls
            .iter_mut()
            .find(|t| t.index == tool_call.index)
        else {
            self.tool_calls.push(tool_call);
            return;
        };
        // Patch the partial tool call.
        if let Some(id) = tool_call.id {
            partial_tool_call.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = tool_call.r#type {
            partial_tool_call.r#type.get_or_insert_default().push_str(&ty);
        }
        if let Some(function) = tool_call.function {
            match partial_tool_call.function {
                Some(ref mut partial_func) => {
                    if let Some(name) = function.name {
                        partial_func.name.get_or_insert_default().push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial_func
                            .arguments
                            .get_or_insert_default()
                            .push_str(&arguments);
                    }
                }
                None => partial_tool_call.function = Some(function),
            }
        }
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            tool_calls: Default::default(),
            finish_reason: None,
            pending_events: Default::default(),
            finished: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    loop {
        if let Some(event) = partial_state.pending_events.pop_front() {
            return Ok((Some(event), partial_state));
        }
        if partial_state.finished {
            return Ok((None, partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                partial_state.finish_stream();
                continue;
            }
            Err(SseError::ChunksError(err)) => {
                return Err(Error::new(
                    format!("stream interrupted: {}", err.0),
                    ErrorKind::Unavailable,
                ));
            }
            Err(SseError::InvalidPayload) => {
                return Err(Error::new(
                    "invalid event stream payload",
                    ErrorKind::Protocol,
                ));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            partial_state.finish_stream();
            continue;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Protocol))?;
        if let Some(error) = chunk.error {
            // Errors raised after the stream has started come in-band.
            let kind = error
                .get("code")
                .and_then(|code| code.as_u64())
                .and_then(|code| u16::try_from(code).ok())
                .map(ErrorKind::from_http_status)
                .unwrap_or(ErrorKind::Unavailable);
            return Err(Error::new(format!("stream error: {error}"), kind));
        }
        if let Some(id) = chunk.id {
            if partial_state.id.get_or_insert_with(|| id.clone()) != &id {
                return Err(Error::new("chunk id mismatch", ErrorKind::Protocol));
            }
        }

        let Some(choice) = chunk.choices.pop() else {
            // Keep-alive or usage chunks.
            continue;
        };

        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            partial_state
                .pending_events
                .push_back(ModelResponseEvent::MessageDelta(content));
        }
        if let Some(tool_calls) = choice.delta.tool_calls {
            for tool_call in tool_calls {
                partial_state.merge_tool_call(tool_call);
            }
        }
        if let Some(finish_reason) = choice.finish_reason {
            partial_state.finish_reason = Some(if finish_reason == "tool_calls" {
                ModelFinishReason::ToolCalls
            } else {
                ModelFinishReason::Stop
            });
            partial_state.finish_stream();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::io::Chunks;

    async fn collect(
        chunks: Vec<Bytes>,
    ) -> Result<Vec<ModelResponseEvent>, Error> {
        let sse = Sse::new(Chunks::from_vec_deque(chunks.into()));
        let mut resp = pin!(OpenAIResponse::from_sse(sse));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?
        {
            events.push(event);
        }
        Ok(events)
    }

    #[tokio::test]
    async fn test_tool_call_events() {
        let events = collect(vec![Bytes::from_static(include_bytes!(
            "../fixtures/test_response.txt"
        ))])
        .await
        .unwrap();

        let tool_calls: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                ModelResponseEvent::ToolCall(req) => Some(req),
                _ => None,
            })
            .collect();
        assert_eq!(tool_calls.len(), 2);
        assert_eq!(tool_calls[0].id, "call_a");
        assert_eq!(tool_calls[0].name, "extract_hotel_search_parameters");
        assert_eq!(
            tool_calls[0].arguments,
            r#"{"query":"hotels near Belongil Beach","distance":""}"#
        );
        assert_eq!(tool_calls[1].id, "call_b");
        assert_eq!(tool_calls[1].name, "geocode_location");
        assert_eq!(tool_calls[1].arguments, r#"{"location":"Belongil Beach"}"#);

        assert_eq!(
            events.first(),
            Some(&ModelResponseEvent::MessageDelta("Let me search.".to_owned()))
        );
        assert_eq!(
            events.last(),
            Some(&ModelResponseEvent::Completed(ModelFinishReason::ToolCalls))
        );
    }

    #[tokio::test]
    async fn test_text_events() {
        let events = collect(vec![
            Bytes::from_static(
                b"data: {\"id\":\"c1\",\"choices\":[{\"delta\":{\"content\":\"Two \"}}]}\n\n",
            ),
            Bytes::from_static(
                b"data: {\"id\":\"c1\",\"choices\":[{\"delta\":{\"content\":\"hotels.\"},\"finish_reason\":\"stop\"}]}\n\n",
            ),
        ])
        .await
        .unwrap();
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Two ".to_owned()),
                ModelResponseEvent::MessageDelta("hotels.".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn test_in_band_error() {
        let err = collect(vec![Bytes::from_static(
            b"data: {\"error\":{\"code\":429,\"message\":\"slow down\"}}\n\n",
        )])
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimited);

        // 65965 would wrap to 429 as a u16.
        let err = collect(vec![Bytes::from_static(
            b"data: {\"error\":{\"code\":65965,\"message\":\"odd\"}}\n\n",
        )])
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unavailable);

        let err = collect(vec![Bytes::from_static(b"data: {not json\n\n")])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Protocol);
    }
}
