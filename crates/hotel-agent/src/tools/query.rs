use std::sync::Arc;

use hotel_agent_core::tool::{Error as ToolError, Tool, ToolOutput, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde_json::{Map, Value};

use crate::format::SearchPayload;
use crate::services::{SearchBackend, SearchParams, ServiceErrorKind};

/// Arguments of [`QueryElasticsearchTool`].
///
/// Only used to describe the tool. Calls are read as a plain object so
/// that missing fields can be filled in from the accumulated parameters.
#[allow(dead_code)]
#[derive(JsonSchema)]
pub struct QueryParameters {
    #[schemars(description = "The search query.")]
    query: String,
    #[schemars(description = "Latitude of the place to search around.")]
    latitude: Option<f64>,
    #[schemars(description = "Longitude of the place to search around.")]
    longitude: Option<f64>,
    #[schemars(description = "Search radius, e.g. `5000m`.")]
    distance: Option<String>,
    #[schemars(description = "Minimum hotel rating.")]
    rating: Option<f64>,
    #[serde(rename = "countryName")]
    #[schemars(description = "Full country name.")]
    country_name: Option<String>,
    #[serde(rename = "countryCode")]
    #[schemars(description = "Two-letter ISO country code.")]
    country_code: Option<String>,
    #[schemars(description = "City name.")]
    city: Option<String>,
    #[schemars(description = "Attractions or amenities, comma separated.")]
    attraction: Option<String>,
}

/// Searches the hotel index with the accumulated parameters, overridden
/// by the call arguments.
pub struct QueryElasticsearchTool {
    backend: Arc<dyn SearchBackend>,
    parameter_schema: Value,
}

impl QueryElasticsearchTool {
    /// Creates a new query tool backed by `backend`.
    #[inline]
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        QueryElasticsearchTool {
            backend,
            parameter_schema: schema_for!(QueryParameters).to_value(),
        }
    }
}

impl Tool for QueryElasticsearchTool {
    type Input = Map<String, Value>;

    fn name(&self) -> &str {
        "query_elasticsearch"
    }

    fn description(&self) -> &str {
        r#"
Searches the hotel index and returns the top matches.
Parameters found by earlier tools are reused, anything given here overrides them."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: Map<String, Value>,
        params: Map<String, Value>,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let backend = Arc::clone(&self.backend);
        async move {
            let Some(query) = resolve_query(&input, &params) else {
                return Err(ToolError::missing_parameter("query"));
            };

            let mut merged = params;
            merged.extend(input.into_iter().filter(|(_, value)| !value.is_null()));
            merged.insert("query".to_owned(), Value::String(query));
            let Some(search) = SearchParams::from_map(&merged) else {
                return Err(ToolError::missing_parameter("query"));
            };

            let results = backend.search(&search).await.map_err(|err| {
                warn!("search failed: {err}");
                let tool_err = match err.kind() {
                    ServiceErrorKind::Unavailable => {
                        ToolError::collaborator_unavailable()
                    }
                    _ => ToolError::execution_error(),
                };
                tool_err.with_reason(format!("Error querying Elasticsearch: {err}"))
            })?;

            let payload = SearchPayload::from_results(&results);
            Ok(ToolOutput::new(payload.to_value()).with_display(payload.render()))
        }
    }
}

// The first non-blank `query`, call arguments first.
fn resolve_query(
    args: &Map<String, Value>,
    params: &Map<String, Value>,
) -> Option<String> {
    [args, params]
        .into_iter()
        .filter_map(|map| map.get("query").and_then(Value::as_str))
        .map(str::trim)
        .find(|query| !query.is_empty())
        .map(str::to_owned)
}
