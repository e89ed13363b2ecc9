use std::pin::Pin;

use hotel_agent_model::ModelTool;
use serde_json::{Map, Value};

use super::{Error, Tool, ToolResult};

type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Object-safe counterpart of [`Tool`].
pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn definition(&self) -> ModelTool;

    fn execute(
        &self,
        arguments: Map<String, Value>,
        params: Map<String, Value>,
    ) -> BoxedToolFuture;
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    fn definition(&self) -> ModelTool {
        ModelTool {
            name: self.0.name().to_owned(),
            description: self.0.description().to_owned(),
            parameters: self.0.parameter_schema().clone(),
        }
    }

    fn execute(
        &self,
        arguments: Map<String, Value>,
        params: Map<String, Value>,
    ) -> BoxedToolFuture {
        let input: T::Input =
            match serde_json::from_value(Value::Object(arguments)) {
                Ok(input) => input,
                Err(err) => {
                    return Box::pin(std::future::ready(Err(
                        Error::invalid_arguments().with_reason(format!("{err}")),
                    )));
                }
            };
        Box::pin(self.0.execute(input, params))
    }
}
