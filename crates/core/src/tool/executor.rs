use std::collections::HashMap;

use hotel_agent_model::{ModelTool, ToolCallRequest, ToolCallResult};
use serde_json::Value;
use tracing::Instrument;

use super::{AnyTool, Error, ErrorKind, Tool, ToolObject};
use crate::params::ParameterAccumulator;

/// The outcome of dispatching one tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatched {
    /// The tool message answering the call.
    pub result: ToolCallResult,
    /// Whether the tool ran and succeeded.
    pub succeeded: bool,
    /// A user-facing rendering produced by the tool, if any.
    pub display: Option<String>,
}

/// The dispatch table that routes tool call requests from the model to the
/// registered tools.
#[derive(Default)]
pub struct Executor {
    // Kept in registration order, which is the catalogue order.
    tools: Vec<Box<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

impl Executor {
    /// Creates an empty table.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. A later tool with the same name replaces the
    /// earlier one.
    pub fn register<T: Tool>(&mut self, tool: T) {
        self.insert(Box::new(AnyTool(tool)));
    }

    fn insert(&mut self, tool: Box<dyn ToolObject>) {
        let name = tool.name().to_owned();
        if let Some(&idx) = self.index.get(&name) {
            warn!("tool {name} registered twice, replacing");
            self.tools[idx] = tool;
        } else {
            self.index.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    /// Returns the tool catalogue sent to the model.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Returns `true` if a tool named `name` is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Runs a single tool call to completion.
    ///
    /// Every failure is turned into an error payload, so the returned result
    /// always answers `req`. On success the tool's updates are merged into
    /// `params`.
    pub async fn execute(
        &self,
        req: &ToolCallRequest,
        params: &mut ParameterAccumulator,
    ) -> Dispatched {
        let span = debug_span!("tool call", id = %req.id, name = %req.name);
        let outcome = self.run(req, params).instrument(span).await;

        let (content, succeeded, display) = match outcome {
            Ok(output) => {
                params.merge(output.updates);
                (output.payload.to_string(), true, output.display)
            }
            Err(err) => {
                warn!("tool call {} ({}) failed: {err}", req.id, req.name);
                (err.to_payload().to_string(), false, None)
            }
        };
        Dispatched {
            result: ToolCallResult {
                id: req.id.clone(),
                name: req.name.clone(),
                content,
            },
            succeeded,
            display,
        }
    }

    async fn run(
        &self,
        req: &ToolCallRequest,
        params: &ParameterAccumulator,
    ) -> super::ToolResult {
        let Some(&idx) = self.index.get(&req.name) else {
            return Err(Error::unknown_tool(&req.name));
        };
        let invalid = |reason: String| {
            Error::invalid_arguments()
                .with_reason(reason)
                .with_raw(req.arguments.as_str())
        };
        let arguments = match serde_json::from_str::<Value>(&req.arguments) {
            Ok(Value::Object(arguments)) => arguments,
            Ok(other) => {
                return Err(invalid(format!("expected an object, got {other}")));
            }
            Err(err) => return Err(invalid(format!("{err}"))),
        };
        trace!("executing with args: {arguments:?}");

        match self.tools[idx].execute(arguments, params.snapshot()).await {
            // Input that doesn't fit the tool's type is still an argument
            // error, report the text the model sent.
            Err(err) if err.kind() == ErrorKind::InvalidArguments => {
                Err(invalid(err.reason().into_owned()))
            }
            result => result,
        }
    }
}
