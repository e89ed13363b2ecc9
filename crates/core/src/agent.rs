mod builder;
mod state;
#[cfg(test)]
mod tests;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use hotel_agent_model::ErrorKind;
use serde_json::{Map, Value};

use crate::conversation::Conversation;
use crate::model_client::ModelClient;
use crate::tool::Executor as ToolExecutor;
pub use builder::{AgentBuilder, DEFAULT_MAX_ROUNDS};
use state::{Session, Stage};

type EventFn = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

/// An agent that answers one question per session by letting the model
/// call tools until it produces a final answer.
///
/// The agent itself holds no per-session state. Every call to
/// [`Agent::ask`] owns a fresh conversation and parameter accumulator, so
/// sessions can run concurrently on one agent.
pub struct Agent {
    model_client: ModelClient,
    tool_executor: ToolExecutor,
    system_prompt: String,
    max_rounds: usize,
    final_answer_mode: FinalAnswerMode,
    on_event: Option<EventFn>,
}

/// How the final answer of a session is produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FinalAnswerMode {
    /// The model writes the answer from the tool results.
    #[default]
    Model,
    /// The session ends as soon as a tool returns a display rendering,
    /// which becomes the answer. No summarization round is spent.
    Direct,
}

/// Progress notifications emitted while a session runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEvent {
    /// A request is about to be sent to the model.
    ModelRequested {
        /// 1-based round number within the session.
        round: usize,
    },
    /// A tool call is about to be dispatched.
    ToolCallStarted {
        /// The requested tool name.
        name: String,
        /// The raw arguments.
        arguments: String,
    },
    /// A tool call has been answered.
    ToolCallFinished {
        /// The requested tool name.
        name: String,
        /// Whether the tool ran and succeeded.
        succeeded: bool,
    },
}

/// An error that ends a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// The question was empty.
    EmptyQuestion,
    /// The model backend failed.
    Backend {
        /// The kind of failure.
        kind: ErrorKind,
        /// The raw error text, for logs only.
        message: String,
    },
    /// The model returned neither text nor tool calls.
    EmptyReply,
    /// The model kept requesting tools past the round limit.
    TooManyRounds(usize),
}

impl SessionError {
    /// Returns the single line shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::EmptyQuestion => {
                "Error: Please ask a question about hotels.".to_owned()
            }
            SessionError::Backend { kind, .. } => match kind {
                ErrorKind::Unavailable => {
                    "Error: Could not connect to the language model backend."
                }
                ErrorKind::Protocol => {
                    "Error: The language model backend returned an unreadable response."
                }
                ErrorKind::Authentication => {
                    "Error: Authentication failed with the language model backend."
                }
                ErrorKind::RateLimited => {
                    "Error: Rate limit exceeded with the language model backend."
                }
            }
            .to_owned(),
            SessionError::EmptyReply => {
                "Error: The assistant returned neither an answer nor a tool request."
                    .to_owned()
            }
            SessionError::TooManyRounds(rounds) => format!(
                "Error: The assistant did not reach an answer after {rounds} rounds."
            ),
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Backend { kind, message } => {
                write!(f, "{kind}: {message}")
            }
            _ => f.write_str(&self.user_message()),
        }
    }
}

impl StdError for SessionError {}

/// The result of one session.
#[derive(Clone, Debug)]
pub struct SessionOutcome {
    /// Every message of the session. The last one is the assistant's final
    /// answer or the error line, unless the question was rejected.
    pub conversation: Conversation,
    /// The parameters accumulated by the tools.
    pub parameters: Map<String, Value>,
    /// The final answer, or the error that ended the session.
    pub result: Result<String, SessionError>,
}

impl SessionOutcome {
    /// Returns the text to show the user: the answer or the error line.
    pub fn reply(&self) -> String {
        match &self.result {
            Ok(answer) => answer.clone(),
            Err(err) => err.user_message(),
        }
    }
}

impl Agent {
    /// Runs one session for `question` to completion.
    pub async fn ask(&self, question: &str) -> SessionOutcome {
        let question = question.trim();
        let mut session = Session::new(&self.system_prompt, question);
        let mut stage = if question.is_empty() {
            Stage::Failed(SessionError::EmptyQuestion)
        } else {
            Stage::AwaitingModel
        };

        loop {
            stage = match stage {
                Stage::AwaitingModel => self.request_model(&mut session).await,
                Stage::ToolsRequested(calls) => {
                    self.run_tools(&mut session, calls).await
                }
                Stage::FinalAnswer(answer) => return session.finish(Ok(answer)),
                Stage::Failed(err) => return session.finish(Err(err)),
            };
        }
    }

    #[inline]
    fn emit(&self, event: AgentEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(&event);
        }
    }

    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            tool_executor,
            system_prompt,
            max_rounds,
            final_answer_mode,
            on_event,
        } = builder;
        Self {
            model_client,
            tool_executor,
            system_prompt,
            max_rounds,
            final_answer_mode,
            on_event,
        }
    }
}
