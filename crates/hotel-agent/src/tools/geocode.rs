use std::sync::Arc;

use hotel_agent_core::tool::{Error as ToolError, Tool, ToolOutput, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::into_map;
use crate::services::{Geocoder, ServiceErrorKind};

/// Arguments of [`GeocodeLocationTool`].
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GeocodeParameters {
    #[schemars(
        description = "The place to locate: a landmark, neighbourhood or address."
    )]
    location: String,
}

/// Resolves a place name into coordinates and remembers them for the
/// search.
pub struct GeocodeLocationTool {
    geocoder: Arc<dyn Geocoder>,
    parameter_schema: Value,
}

impl GeocodeLocationTool {
    /// Creates a new geocode tool backed by `geocoder`.
    #[inline]
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        GeocodeLocationTool {
            geocoder,
            parameter_schema: schema_for!(GeocodeParameters).to_value(),
        }
    }
}

impl Tool for GeocodeLocationTool {
    type Input = GeocodeParameters;

    fn name(&self) -> &str {
        "geocode_location"
    }

    fn description(&self) -> &str {
        r#"
Converts a place name into latitude and longitude.
Call this when the user wants hotels near a specific place."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: GeocodeParameters,
        _params: Map<String, Value>,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let geocoder = Arc::clone(&self.geocoder);
        async move {
            let location = input.location.trim();
            if location.is_empty() {
                return Err(ToolError::invalid_arguments()
                    .with_reason("`location` must not be empty"));
            }

            let coordinates =
                geocoder.geocode(location).await.map_err(|err| {
                    warn!("geocoding {location:?} failed: {err}");
                    let tool_err = match err.kind() {
                        ServiceErrorKind::Unavailable => {
                            ToolError::collaborator_unavailable()
                        }
                        _ => ToolError::execution_error(),
                    };
                    tool_err.with_reason(err.message())
                })?;

            let found = into_map(&json!({
                "latitude": coordinates.latitude,
                "longitude": coordinates.longitude,
            }))?;
            Ok(ToolOutput::new(Value::Object(found.clone())).with_updates(found))
        }
    }
}
