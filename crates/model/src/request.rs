use serde_json::Value;

use crate::response::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The complete, ordered conversation history.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
}

/// One turn of the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// A message produced by the model.
    Assistant(AssistantMessage),
    /// A tool call result.
    Tool(ToolCallResult),
}

impl ModelMessage {
    /// Creates an assistant message that only carries text.
    #[inline]
    pub fn assistant_text<S: Into<String>>(content: S) -> Self {
        ModelMessage::Assistant(AssistantMessage {
            content: Some(content.into()),
            tool_calls: vec![],
        })
    }
}

/// A message produced by the model.
///
/// `content` is absent when the turn is a pure tool request, and
/// `tool_calls` is empty when the model didn't request any tool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AssistantMessage {
    /// The text of the message.
    pub content: Option<String>,
    /// Tool calls requested in this turn, in the order the model listed
    /// them.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// The identifier of the tool call request this result answers.
    pub id: String,
    /// The name of the tool that was requested.
    pub name: String,
    /// The result of the tool call, usually a JSON document.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}
