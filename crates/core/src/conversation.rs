//! Conversation-related types.

use hotel_agent_model::{ModelMessage, ToolCallResult};

/// The ordered message history of one session.
///
/// Messages can only be appended, and only by the session that owns the
/// conversation.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ModelMessage>,
}

impl Conversation {
    /// Starts a conversation with the system instructions and the user's
    /// question.
    pub(crate) fn new(system_prompt: &str, question: &str) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ModelMessage::System(system_prompt.to_owned()));
        }
        messages.push(ModelMessage::User(question.to_owned()));
        Self { messages }
    }

    #[inline]
    pub(crate) fn push(&mut self, msg: ModelMessage) {
        self.messages.push(msg);
    }

    /// Returns all messages in the order they were produced.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the conversation has no messages.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the tool results in the conversation.
    pub fn tool_results(&self) -> impl Iterator<Item = &ToolCallResult> {
        self.messages.iter().filter_map(|msg| match msg {
            ModelMessage::Tool(result) => Some(result),
            _ => None,
        })
    }

    /// Returns the text of the last assistant message, if it has any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        let assistant = self.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::Assistant(assistant) => Some(assistant),
            _ => None,
        })?;
        assistant.content.as_deref()
    }
}
