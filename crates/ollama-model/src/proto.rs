use hotel_agent_model::{ModelMessage, ModelRequest, ModelTool};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OllamaConfig;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    // Ollama carries arguments as a JSON object instead of a string.
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Options {
    temperature: f32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    stream: bool,
    options: Options,
}

impl ChatRequest {
    #[inline]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub fn create_request(req: &ModelRequest, config: &OllamaConfig) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        stream: false,
        options: Options {
            temperature: config.temperature,
        },
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message {
            role: "system".to_owned(),
            content: content.clone(),
            ..Default::default()
        },
        ModelMessage::User(content) => Message {
            role: "user".to_owned(),
            content: content.clone(),
            ..Default::default()
        },
        ModelMessage::Assistant(assistant) => Message {
            role: "assistant".to_owned(),
            content: assistant.content.clone().unwrap_or_default(),
            tool_calls: assistant
                .tool_calls
                .iter()
                .map(|call| ToolCall {
                    function: FunctionCall {
                        name: call.name.clone(),
                        // Arguments that never parsed are echoed back as-is.
                        arguments: serde_json::from_str(&call.arguments)
                            .unwrap_or_else(|_| {
                                Value::String(call.arguments.clone())
                            }),
                    },
                })
                .collect(),
            tool_name: None,
        },
        ModelMessage::Tool(result) => Message {
            role: "tool".to_owned(),
            content: result.content.clone(),
            tool_calls: vec![],
            tool_name: Some(result.name.clone()),
        },
    }
}

fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// Serializes tool-call arguments into the string form the agent expects.
pub fn arguments_to_string(arguments: &Value) -> String {
    match arguments {
        // Some models double-encode the object.
        Value::String(raw) => raw.clone(),
        Value::Null => "{}".to_owned(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use hotel_agent_model::{AssistantMessage, ToolCallRequest, ToolCallResult};
    use serde_json::json;

    use super::*;
    use crate::OllamaConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System("You find hotels.".to_owned()),
                ModelMessage::User("Hotels in Byron Bay".to_owned()),
                ModelMessage::Assistant(AssistantMessage {
                    content: None,
                    tool_calls: vec![ToolCallRequest {
                        id: "ollama-call-1".to_owned(),
                        name: "geocode_location".to_owned(),
                        arguments: r#"{"location":"Byron Bay"}"#.to_owned(),
                    }],
                }),
                ModelMessage::Tool(ToolCallResult {
                    id: "ollama-call-1".to_owned(),
                    name: "geocode_location".to_owned(),
                    content: r#"{"latitude":-28.6}"#.to_owned(),
                }),
            ],
            tools: vec![],
        };
        let config = OllamaConfigBuilder::with_model("llama3.1").build();
        let value =
            serde_json::to_value(create_request(&request, &config)).unwrap();

        assert_eq!(value["model"], "llama3.1");
        assert_eq!(value["stream"], false);
        assert!(value.get("tools").is_none());
        assert_eq!(
            value["messages"][2],
            json!({
                "role": "assistant",
                "content": "",
                "tool_calls": [{
                    "function": {
                        "name": "geocode_location",
                        "arguments": { "location": "Byron Bay" }
                    }
                }]
            })
        );
        assert_eq!(
            value["messages"][3],
            json!({
                "role": "tool",
                "content": "{\"latitude\":-28.6}",
                "tool_name": "geocode_location"
            })
        );
    }

    #[test]
    fn test_arguments_to_string() {
        assert_eq!(
            arguments_to_string(&json!({ "query": "spa" })),
            r#"{"query":"spa"}"#
        );
        assert_eq!(arguments_to_string(&json!("{\"a\":1}")), "{\"a\":1}");
        assert_eq!(arguments_to_string(&Value::Null), "{}");
    }
}
