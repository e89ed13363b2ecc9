use hotel_agent_core::tool::{Tool, ToolOutput, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::into_map;
use crate::services::elasticsearch::DEFAULT_DISTANCE;

/// Arguments of [`ExtractParametersTool`].
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExtractParameters {
    #[schemars(description = "The user's request rephrased as a search query.")]
    query: String,
    #[serde(
        default,
        deserialize_with = "keep_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(
        with = "Option<String>",
        description = "Attractions or amenities the user asked for, comma separated."
    )]
    attraction: Option<Value>,
    #[serde(
        default,
        deserialize_with = "keep_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(
        with = "Option<String>",
        description = "Search radius around the location, e.g. `2km` or `500m`. Leave empty if not mentioned."
    )]
    distance: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(
        description = "A landmark, neighbourhood or address the hotel should be near."
    )]
    location: Option<String>,
    #[serde(
        default,
        rename = "countryName",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(description = "Full country name, e.g. `Australia`.")]
    country_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "City name.")]
    city: Option<String>,
    #[serde(
        default,
        rename = "countryCode",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(description = "Two-letter ISO country code, e.g. `AU`.")]
    country_code: Option<String>,
    #[serde(default, rename = "State", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "State or region.")]
    state: Option<String>,
    #[serde(
        default,
        deserialize_with = "keep_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(
        with = "Option<f64>",
        description = "Minimum hotel rating, from 1 to 5."
    )]
    rating: Option<Value>,
    #[serde(flatten)]
    #[schemars(skip)]
    extra: Map<String, Value>,
}

// A present `null` is kept as `Some(Value::Null)` so it is passed back as
// given, only absent fields are `None`.
fn keep_null<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl ExtractParameters {
    fn apply_defaults(&mut self) {
        if matches!(&self.distance, Some(Value::String(distance)) if distance.trim().is_empty())
        {
            self.distance = Some(Value::String(DEFAULT_DISTANCE.to_owned()));
        }
    }
}

/// Restructures the user's question into search parameters.
///
/// Nothing is looked up, the arguments come back as given (with the empty
/// distance defaulted) and are remembered for the later search.
pub struct ExtractParametersTool {
    parameter_schema: Value,
}

impl ExtractParametersTool {
    /// Creates a new extract tool.
    #[inline]
    pub fn new() -> Self {
        ExtractParametersTool {
            parameter_schema: schema_for!(ExtractParameters).to_value(),
        }
    }
}

impl Default for ExtractParametersTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ExtractParametersTool {
    type Input = ExtractParameters;

    fn name(&self) -> &str {
        "extract_hotel_search_parameters"
    }

    fn description(&self) -> &str {
        r#"
Extracts structured hotel search parameters from the user's question.
Call this first. Only fill in fields the user actually mentioned."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        mut input: ExtractParameters,
        _params: Map<String, Value>,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            input.apply_defaults();
            let params = into_map(&input)?;
            Ok(ToolOutput::new(Value::Object(params.clone())).with_updates(params))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn run(args: Value) -> ToolOutput {
        let input = serde_json::from_value(args).unwrap();
        ExtractParametersTool::new()
            .execute(input, Map::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_distance_is_defaulted() {
        let output = run(json!({ "query": "hotels near Belongil Beach", "distance": "" })).await;
        assert_eq!(
            output.payload,
            json!({ "query": "hotels near Belongil Beach", "distance": "5000m" })
        );
        assert_eq!(Value::Object(output.updates), output.payload);
    }

    #[tokio::test]
    async fn test_pass_through() {
        let args = json!({
            "query": "pet friendly",
            "distance": "2km",
            "countryName": "Spain",
            "State": "Andalusia",
            "rating": "4",
            "attraction": ["pool"],
            "stars": 3
        });
        let output = run(args.clone()).await;
        assert_eq!(output.payload, args);
        assert_eq!(output.display, None);
    }

    #[tokio::test]
    async fn test_nulls_are_passed_through() {
        let args = json!({
            "query": "quiet hotels",
            "distance": null,
            "attraction": null,
            "rating": null
        });
        let output = run(args.clone()).await;
        assert_eq!(output.payload, args);
    }

    #[test]
    fn test_schema() {
        let tool = ExtractParametersTool::new();
        let schema = tool.parameter_schema();
        assert_eq!(schema["required"], json!(["query"]));
        let properties = schema["properties"].as_object().unwrap();
        for key in ["countryName", "countryCode", "State", "distance", "rating"] {
            assert!(properties.contains_key(key), "missing {key}");
        }
        assert!(!properties.contains_key("extra"));
    }
}
