use hotel_agent_model::{
    AssistantMessage, ModelMessage, ModelRequest, ToolCallRequest,
};

use super::{Agent, AgentEvent, FinalAnswerMode, SessionError, SessionOutcome};
use crate::conversation::Conversation;
use crate::params::ParameterAccumulator;

/// Where a session is in its loop.
///
/// `FinalAnswer` and `Failed` are terminal.
#[derive(Debug)]
pub(super) enum Stage {
    AwaitingModel,
    ToolsRequested(Vec<ToolCallRequest>),
    FinalAnswer(String),
    Failed(SessionError),
}

/// The state owned by one session.
pub(super) struct Session {
    conversation: Conversation,
    params: ParameterAccumulator,
    rounds: usize,
}

impl Session {
    pub(super) fn new(system_prompt: &str, question: &str) -> Self {
        Self {
            conversation: Conversation::new(system_prompt, question),
            params: ParameterAccumulator::new(),
            rounds: 0,
        }
    }

    pub(super) fn finish(
        mut self,
        result: Result<String, SessionError>,
    ) -> SessionOutcome {
        let content = match &result {
            Ok(answer) => answer.clone(),
            Err(SessionError::EmptyQuestion) => {
                // Nothing was asked, so nothing is answered.
                return self.into_outcome(result);
            }
            Err(err) => err.user_message(),
        };
        self.conversation.push(ModelMessage::assistant_text(content));
        self.into_outcome(result)
    }

    fn into_outcome(
        self,
        result: Result<String, SessionError>,
    ) -> SessionOutcome {
        SessionOutcome {
            conversation: self.conversation,
            parameters: self.params.snapshot(),
            result,
        }
    }
}

impl Agent {
    pub(super) async fn request_model(&self, session: &mut Session) -> Stage {
        if session.rounds >= self.max_rounds {
            warn!("session stopped after {} rounds", session.rounds);
            return Stage::Failed(SessionError::TooManyRounds(session.rounds));
        }
        session.rounds += 1;
        self.emit(AgentEvent::ModelRequested {
            round: session.rounds,
        });

        let request = ModelRequest {
            messages: session.conversation.messages().to_vec(),
            tools: self.tool_executor.definitions(),
        };
        let resp = match self.model_client.send_request(request).await {
            Ok(resp) => resp,
            Err(err) => {
                error!(round = session.rounds, "model request failed: {err}");
                return Stage::Failed(SessionError::Backend {
                    kind: err.kind(),
                    message: format!("{err}"),
                });
            }
        };

        if !resp.tool_calls.is_empty() {
            debug!(
                round = session.rounds,
                tool_calls = resp.tool_calls.len(),
                "model requested tools"
            );
            let content = Some(resp.content).filter(|c| !c.trim().is_empty());
            session
                .conversation
                .push(ModelMessage::Assistant(AssistantMessage {
                    content,
                    tool_calls: resp.tool_calls.clone(),
                }));
            return Stage::ToolsRequested(resp.tool_calls);
        }

        if resp.content.trim().is_empty() {
            error!(
                round = session.rounds,
                finish_reason = ?resp.finish_reason,
                "model returned neither content nor tool calls"
            );
            return Stage::Failed(SessionError::EmptyReply);
        }
        Stage::FinalAnswer(resp.content)
    }

    pub(super) async fn run_tools(
        &self,
        session: &mut Session,
        calls: Vec<ToolCallRequest>,
    ) -> Stage {
        let mut display = None;
        for call in &calls {
            self.emit(AgentEvent::ToolCallStarted {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            });
            let dispatched =
                self.tool_executor.execute(call, &mut session.params).await;
            self.emit(AgentEvent::ToolCallFinished {
                name: call.name.clone(),
                succeeded: dispatched.succeeded,
            });
            if dispatched.display.is_some() {
                display = dispatched.display;
            }
            session.conversation.push(ModelMessage::Tool(dispatched.result));
        }

        match (self.final_answer_mode, display) {
            (FinalAnswerMode::Direct, Some(display)) => {
                Stage::FinalAnswer(display)
            }
            _ => Stage::AwaitingModel,
        }
    }
}
