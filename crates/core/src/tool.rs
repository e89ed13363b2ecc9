//! Tool call supports.

mod error;
mod executor;
mod object;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use error::{Error, ErrorKind};
pub use executor::{Dispatched, Executor};
pub(crate) use object::{AnyTool, ToolObject};

/// The result of a tool call.
pub type ToolResult = Result<ToolOutput, Error>;

/// The successful output of a tool call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// The JSON document sent back to the model.
    pub payload: Value,
    /// Parameters to merge into the session's accumulator.
    pub updates: Map<String, Value>,
    /// A rendering of the payload suitable for showing to the user as-is.
    pub display: Option<String>,
}

impl ToolOutput {
    /// Creates an output with the given payload.
    #[inline]
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            updates: Map::new(),
            display: None,
        }
    }

    /// Sets the accumulator updates.
    #[inline]
    pub fn with_updates(mut self, updates: Map<String, Value>) -> Self {
        self.updates = updates;
        self
    }

    /// Sets the display text.
    #[inline]
    pub fn with_display<S: Into<String>>(mut self, display: S) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless. Everything a tool
/// learns during a session goes back through [`ToolOutput::updates`], and
/// the accumulated parameters are handed to [`Tool::execute`] as a
/// snapshot.
///
/// The tool can be context-aware: make the context (a collaborator client,
/// an endpoint) an immutable state of the tool, set during initialization,
/// and clone it into the returned future.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input and a snapshot of the
    /// parameters accumulated so far in the session.
    ///
    /// This method must return a future that is fully independent of `self`.
    fn execute(
        &self,
        input: Self::Input,
        params: Map<String, Value>,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}
