//! The tools offered to the model.

mod extract;
mod geocode;
mod query;

use hotel_agent_core::tool::Error as ToolError;
use serde::Serialize;
use serde_json::{Map, Value};

pub use extract::{ExtractParameters, ExtractParametersTool};
pub use geocode::{GeocodeLocationTool, GeocodeParameters};
pub use query::{QueryElasticsearchTool, QueryParameters};

fn into_map<T: Serialize>(value: &T) -> Result<Map<String, Value>, ToolError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ToolError::execution_error()
            .with_reason(format!("expected an object, got {other}"))),
        Err(err) => Err(ToolError::execution_error().with_reason(err.to_string())),
    }
}
