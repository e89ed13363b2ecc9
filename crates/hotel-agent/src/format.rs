//! Turns search results into what the model and the user see.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::services::SearchResults;

/// The number of hits handed back to the model.
pub const MAX_RESULTS: usize = 5;

/// The message of the "no results" payload.
pub const NO_RESULTS_MESSAGE: &str = "No hotels found matching your criteria.";

/// The tool result of a search.
///
/// Both variants carry a `status` field, so they can't be mistaken for an
/// error payload, which has an `error` field instead.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchPayload {
    /// At least one hotel matched.
    Found {
        /// The number of matches reported by the index.
        total: u64,
        /// The best matches, at most [`MAX_RESULTS`].
        results: Vec<Map<String, Value>>,
    },
    /// Nothing matched.
    NoResults {
        /// Always [`NO_RESULTS_MESSAGE`].
        message: &'static str,
    },
}

impl SearchPayload {
    /// Keeps the best [`MAX_RESULTS`] hits, with single-element arrays
    /// unwrapped to their element.
    pub fn from_results(results: &SearchResults) -> Self {
        if results.hits.is_empty() {
            return SearchPayload::NoResults {
                message: NO_RESULTS_MESSAGE,
            };
        }
        SearchPayload::Found {
            total: results.total,
            results: results
                .hits
                .iter()
                .take(MAX_RESULTS)
                .map(flatten_hit)
                .collect(),
        }
    }

    /// Returns the JSON document sent to the model.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self)
            .unwrap_or_else(|err| json!({ "error": err.to_string() }))
    }

    /// Renders a plain-text summary for the user.
    pub fn render(&self) -> String {
        let (total, results) = match self {
            SearchPayload::Found { total, results } => (*total, results),
            SearchPayload::NoResults { message } => return (*message).to_owned(),
        };

        let noun = if total == 1 { "hotel" } else { "hotels" };
        let mut summary = if total > results.len() as u64 {
            format!("Found {total} {noun}, showing the top {}:", results.len())
        } else {
            format!("Found {total} {noun}:")
        };
        for (idx, hit) in results.iter().enumerate() {
            summary.push_str(&format!("\n{}. {}", idx + 1, describe_hit(hit)));
        }
        summary
    }
}

fn flatten_hit(hit: &Map<String, Value>) -> Map<String, Value> {
    hit.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Array(items) if items.len() == 1 => items[0].clone(),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn describe_hit(hit: &Map<String, Value>) -> String {
    let name = field_text(hit, "HotelName")
        .unwrap_or_else(|| "Unnamed hotel".to_owned());
    let place: Vec<_> = ["cityName", "countryName"]
        .into_iter()
        .filter_map(|key| field_text(hit, key))
        .collect();

    let mut line = name;
    if !place.is_empty() {
        line.push_str(&format!(" - {}", place.join(", ")));
    }
    if let Some(rating) = field_text(hit, "HotelRating") {
        line.push_str(&format!(" - rating {rating}"));
    }
    line
}

fn field_text(hit: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match hit.get(key)? {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    Some(text).filter(|text| !text.is_empty())
}
