//! The Elasticsearch client used for hotel searches and bulk loading.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, header};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{ServiceError, ServiceErrorKind};
use crate::config::SearchConfig;

/// The mustache source of the stored search template.
///
/// It renders the same query as [`SearchParams::to_query`] from the
/// parameters produced by [`SearchParams::to_template_params`].
pub const SEARCH_TEMPLATE: &str = include_str!("../search_template.mustache");

/// Fields returned for every hit.
pub const RESULT_FIELDS: [&str; 6] = [
    "HotelName",
    "HotelRating",
    "countryName",
    "cityName",
    "countryCode",
    "Attractions",
];

/// The radius used when coordinates are known but no distance was given.
pub const DEFAULT_DISTANCE: &str = "5000m";

const SEMANTIC_FIELD: &str = "semantic_description_elser";

/// A document store that can run hotel searches.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Runs a search.
    async fn search(
        &self,
        params: &SearchParams,
    ) -> Result<SearchResults, ServiceError>;
}

/// A geographic radius filter.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoFilter {
    /// Latitude of the center.
    pub latitude: f64,
    /// Longitude of the center.
    pub longitude: f64,
    /// The radius, in Elasticsearch distance units (e.g. `5000m`).
    pub distance: String,
}

/// Consolidated search criteria.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchParams {
    /// The free-text query, matched semantically.
    pub query: String,
    /// Restricts hits to a radius, when coordinates are known.
    pub geo: Option<GeoFilter>,
    /// Minimum hotel rating.
    pub rating: Option<f64>,
    /// Exact country name.
    pub country_name: Option<String>,
    /// Exact country code.
    pub country_code: Option<String>,
    /// City name.
    pub city: Option<String>,
    /// Attractions or amenities. Hotels mentioning one rank higher, the
    /// others are still returned.
    pub attractions: Vec<String>,
}

impl SearchParams {
    /// Reads the criteria from loosely typed tool parameters.
    ///
    /// Returns `None` when there is no usable `query`. Numbers given as
    /// strings are accepted, and `attraction` may be a list or a comma
    /// separated string.
    pub fn from_map(map: &Map<String, Value>) -> Option<Self> {
        let query = map.get("query").and_then(as_text)?;
        let latitude = map.get("latitude").and_then(as_number);
        let longitude = map.get("longitude").and_then(as_number);
        let geo = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoFilter {
                latitude,
                longitude,
                distance: map
                    .get("distance")
                    .and_then(as_text)
                    .unwrap_or_else(|| DEFAULT_DISTANCE.to_owned()),
            }),
            _ => None,
        };
        Some(Self {
            query,
            geo,
            rating: map.get("rating").and_then(as_number),
            country_name: map.get("countryName").and_then(as_text),
            country_code: map.get("countryCode").and_then(as_text),
            city: map.get("city").and_then(as_text),
            attractions: map.get("attraction").map(as_list).unwrap_or_default(),
        })
    }

    /// Builds a retriever query body.
    ///
    /// Hard criteria go into the filter. Attractions are optional clauses
    /// of the scored query, so they only rank matching hotels higher.
    pub fn to_query(&self) -> Value {
        let mut must = vec![];
        if let Some(geo) = &self.geo {
            must.push(json!({
                "geo_distance": {
                    "distance": geo.distance,
                    "location": { "lat": geo.latitude, "lon": geo.longitude }
                }
            }));
        }
        if let Some(rating) = self.rating {
            must.push(json!({ "range": { "HotelRating": { "gte": rating } } }));
        }
        if let Some(country_name) = &self.country_name {
            must.push(json!({ "term": { "countryName": country_name } }));
        }
        if let Some(country_code) = &self.country_code {
            must.push(json!({ "term": { "countryCode": country_code } }));
        }
        if let Some(city) = &self.city {
            must.push(json!({ "match": { "cityName": city } }));
        }
        let should: Vec<_> = self
            .attractions
            .iter()
            .map(|attraction| {
                json!({
                    "wildcard": {
                        "Attractions": {
                            "value": format!("*{attraction}*"),
                            "case_insensitive": true
                        }
                    }
                })
            })
            .collect();

        json!({
            "_source": false,
            "fields": RESULT_FIELDS,
            "retriever": {
                "standard": {
                    "query": {
                        "bool": {
                            "must": [{
                                "semantic": {
                                    "field": SEMANTIC_FIELD,
                                    "query": self.query
                                }
                            }],
                            "should": should
                        }
                    },
                    "filter": {
                        "bool": { "must": must }
                    }
                }
            }
        })
    }

    /// Builds the parameters for [`SEARCH_TEMPLATE`]. Absent criteria are
    /// left out so their sections don't render.
    pub fn to_template_params(&self) -> Value {
        let mut params = Map::new();
        params.insert("query".to_owned(), json!(self.query));
        if let Some(geo) = &self.geo {
            params.insert(
                "geo".to_owned(),
                json!({
                    "lat": geo.latitude,
                    "lon": geo.longitude,
                    "distance": geo.distance
                }),
            );
        }
        if let Some(rating) = self.rating {
            params.insert("rating".to_owned(), json!(rating));
        }
        let texts = [
            ("countryName", &self.country_name),
            ("countryCode", &self.country_code),
            ("city", &self.city),
        ];
        for (key, value) in texts {
            if let Some(value) = value {
                params.insert(key.to_owned(), json!(value));
            }
        }
        if !self.attractions.is_empty() {
            params.insert("attraction".to_owned(), json!(self.attractions));
        }
        Value::Object(params)
    }
}

/// The hits of a search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResults {
    /// The number of matching documents reported by the store, which may
    /// exceed `hits.len()`.
    pub total: u64,
    /// The returned documents, best first.
    pub hits: Vec<Map<String, Value>>,
}

/// Counts of a bulk request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Documents accepted.
    pub indexed: usize,
    /// Documents rejected.
    pub failed: usize,
}

/// An Elasticsearch client bound to one index.
///
/// When a template id is configured, searches go through the stored
/// search template, otherwise the query is built on the fly.
#[derive(Clone)]
pub struct ElasticsearchClient {
    client: Client,
    base_url: String,
    index: String,
    credentials: Option<(String, Option<String>)>,
    template_id: Option<String>,
}

impl ElasticsearchClient {
    /// Creates a client from the configuration.
    pub fn new(config: &SearchConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!("failed to build a http client with timeout: {err}");
                Client::new()
            });
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            index: config.index.clone(),
            credentials: config
                .username
                .clone()
                .map(|username| (username, config.password.clone())),
            template_id: config.template_id.clone(),
        }
    }

    /// Returns the index name.
    #[inline]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Returns the search template id, if searches use one.
    #[inline]
    pub fn template_id(&self) -> Option<&str> {
        self.template_id.as_deref()
    }

    /// Stores `source` as a mustache search template under `id`,
    /// replacing any previous version.
    pub async fn put_search_template(
        &self,
        id: &str,
        source: &str,
    ) -> Result<(), ServiceError> {
        let req = self
            .request(Method::PUT, &format!("/_scripts/{id}"))
            .json(&json!({ "script": { "lang": "mustache", "source": source } }));
        send(req).await?;
        info!("stored search template {id}");
        Ok(())
    }

    /// Indexes `docs` with one `_bulk` request.
    ///
    /// Rejected documents are logged and counted, nothing is retried.
    pub async fn bulk_index(
        &self,
        docs: &[Value],
    ) -> Result<BulkReport, ServiceError> {
        let action = json!({ "index": { "_index": self.index } }).to_string();
        let mut body = String::new();
        for doc in docs {
            body.push_str(&action);
            body.push('\n');
            body.push_str(&doc.to_string());
            body.push('\n');
        }

        let req = self
            .request(Method::POST, "/_bulk")
            .header(header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let resp = send(req).await?;
        Ok(parse_bulk_response(&resp))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        if let Some((username, password)) = &self.credentials {
            req = req.basic_auth(username, password.as_ref());
        }
        req
    }
}

#[async_trait]
impl SearchBackend for ElasticsearchClient {
    async fn search(
        &self,
        params: &SearchParams,
    ) -> Result<SearchResults, ServiceError> {
        let req = match &self.template_id {
            Some(id) => self
                .request(Method::POST, &format!("/{}/_search/template", self.index))
                .json(&json!({ "id": id, "params": params.to_template_params() })),
            None => self
                .request(Method::POST, &format!("/{}/_search", self.index))
                .json(&params.to_query()),
        };
        debug!(index = %self.index, template = ?self.template_id, "searching: {params:?}");

        let body = send(req).await?;
        let results = parse_search_response(body)?;
        debug!("search matched {} hotels", results.total);
        Ok(results)
    }
}

async fn send(req: RequestBuilder) -> Result<Value, ServiceError> {
    let resp = req.send().await.map_err(ServiceError::from_reqwest)?;
    let status = resp.status();
    let body = resp.text().await.map_err(ServiceError::from_reqwest)?;
    if !status.is_success() {
        return Err(ServiceError::new(
            ServiceErrorKind::Rejected,
            format!("server responded {status}: {body}"),
        ));
    }
    serde_json::from_str(&body).map_err(|err| {
        ServiceError::new(ServiceErrorKind::InvalidResponse, format!("{err}"))
    })
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    total: Option<Total>,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Total {
    Object { value: u64 },
    Count(u64),
}

#[derive(Deserialize)]
struct Hit {
    #[serde(default)]
    fields: Option<Map<String, Value>>,
    #[serde(default, rename = "_source")]
    source: Option<Map<String, Value>>,
}

/// Reads the hits out of a search response body.
pub fn parse_search_response(
    body: Value,
) -> Result<SearchResults, ServiceError> {
    let resp: SearchResponse = serde_json::from_value(body).map_err(|err| {
        ServiceError::new(ServiceErrorKind::InvalidResponse, format!("{err}"))
    })?;
    let hits: Vec<_> = resp
        .hits
        .hits
        .into_iter()
        .map(|hit| hit.fields.or(hit.source).unwrap_or_default())
        .collect();
    let total = match resp.hits.total {
        Some(Total::Object { value }) | Some(Total::Count(value)) => value,
        None => hits.len() as u64,
    };
    Ok(SearchResults { total, hits })
}

fn parse_bulk_response(resp: &Value) -> BulkReport {
    let mut report = BulkReport::default();
    let items = resp["items"].as_array().map(Vec::as_slice).unwrap_or_default();
    for item in items {
        // Each item is keyed by its action, e.g. `{"index": {...}}`.
        let Some(result) = item.as_object().and_then(|item| item.values().next())
        else {
            continue;
        };
        match result.get("error") {
            Some(error) => {
                report.failed += 1;
                warn!(
                    status = %result["status"],
                    "document rejected: {error}"
                );
            }
            None => report.indexed += 1,
        }
    }
    report
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            Some(text.trim().to_owned()).filter(|text| !text.is_empty())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect(),
        other => as_text(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_params_from_map() {
        let params = SearchParams::from_map(&object(json!({
            "query": "beach hotels",
            "latitude": "-28.64",
            "longitude": 153.6,
            "distance": "",
            "rating": 4,
            "countryName": "Australia",
            "attraction": "Beach, surf ,",
            "State": "NSW"
        })))
        .unwrap();
        assert_eq!(
            params,
            SearchParams {
                query: "beach hotels".to_owned(),
                geo: Some(GeoFilter {
                    latitude: -28.64,
                    longitude: 153.6,
                    distance: "5000m".to_owned(),
                }),
                rating: Some(4.0),
                country_name: Some("Australia".to_owned()),
                country_code: None,
                city: None,
                attractions: vec!["Beach".to_owned(), "surf".to_owned()],
            }
        );

        assert!(SearchParams::from_map(&object(json!({ "query": "  " }))).is_none());
        assert!(SearchParams::from_map(&object(json!({ "city": "Paris" }))).is_none());
    }

    #[test]
    fn test_radius_needs_coordinates() {
        let params = SearchParams::from_map(&object(json!({
            "query": "spa",
            "latitude": 48.85,
            "distance": "2km"
        })))
        .unwrap();
        assert_eq!(params.geo, None);
        let query = params.to_query();
        assert_eq!(query["retriever"]["standard"]["filter"]["bool"]["must"], json!([]));
    }

    #[test]
    fn test_to_query() {
        let params = SearchParams {
            query: "hotels near the Eiffel Tower".to_owned(),
            geo: Some(GeoFilter {
                latitude: 48.85,
                longitude: 2.29,
                distance: "1km".to_owned(),
            }),
            city: Some("Paris".to_owned()),
            attractions: vec!["gym".to_owned()],
            ..Default::default()
        };
        let query = params.to_query();
        assert_eq!(query["_source"], false);
        assert_eq!(query["fields"].as_array().unwrap().len(), 6);
        let standard = &query["retriever"]["standard"];
        assert_eq!(
            standard["query"]["bool"]["must"],
            json!([{
                "semantic": {
                    "field": "semantic_description_elser",
                    "query": "hotels near the Eiffel Tower"
                }
            }])
        );
        assert_eq!(
            standard["filter"]["bool"]["must"],
            json!([
                {
                    "geo_distance": {
                        "distance": "1km",
                        "location": { "lat": 48.85, "lon": 2.29 }
                    }
                },
                { "match": { "cityName": "Paris" } }
            ])
        );
        assert_eq!(
            standard["query"]["bool"]["should"][0]["wildcard"]["Attractions"]["value"],
            "*gym*"
        );
        assert!(standard["filter"]["bool"].get("should").is_none());
    }

    // Renders the template sections and variables used by simple searches.
    fn render_template(params: &Value) -> Value {
        let mut source = SEARCH_TEMPLATE.to_owned();
        for key in ["geo", "rating", "countryName", "countryCode", "city", "attraction"] {
            let open = format!("{{{{#{key}}}}}");
            let close = format!("{{{{/{key}}}}}");
            while let Some(start) = source.find(&open) {
                let end = start + source[start..].find(&close).unwrap();
                let body = source[start + open.len()..end].to_owned();
                let rendered = match &params[key] {
                    Value::Null => String::new(),
                    Value::Array(items) => items
                        .iter()
                        .map(|item| body.replace("{{.}}", item.as_str().unwrap()))
                        .collect(),
                    _ => body,
                };
                source.replace_range(start..end + close.len(), &rendered);
            }
        }
        for key in ["query", "countryName", "countryCode", "city"] {
            if let Some(value) = params[key].as_str() {
                source = source.replace(&format!("{{{{{key}}}}}"), value);
            }
        }
        serde_json::from_str(&source).unwrap()
    }

    #[test]
    fn test_attractions_rank_in_both_strategies() {
        let params = SearchParams {
            query: "hotels".to_owned(),
            attractions: vec!["pool".to_owned()],
            ..Default::default()
        };
        let dynamic = params.to_query();
        let templated = render_template(&params.to_template_params());
        let dynamic = &dynamic["retriever"]["standard"];
        let templated = &templated["retriever"]["standard"];

        // Neither strategy filters on attractions.
        assert_eq!(dynamic["filter"]["bool"]["must"], json!([]));
        assert_eq!(templated["filter"]["bool"]["must"], json!([{ "match_all": {} }]));
        assert!(dynamic["filter"]["bool"].get("should").is_none());
        assert!(templated["filter"]["bool"].get("should").is_none());

        // Both score them as optional clauses next to the semantic match.
        assert_eq!(dynamic["query"]["bool"]["must"], templated["query"]["bool"]["must"]);
        let wildcard = json!({
            "wildcard": {
                "Attractions": { "value": "*pool*", "case_insensitive": true }
            }
        });
        assert_eq!(dynamic["query"]["bool"]["should"], json!([wildcard]));
        assert_eq!(
            templated["query"]["bool"]["should"],
            json!([wildcard, { "match_none": {} }])
        );
    }

    #[test]
    fn test_template_filters_like_built_query() {
        let params = SearchParams {
            query: "spa".to_owned(),
            country_name: Some("Spain".to_owned()),
            city: Some("Almería".to_owned()),
            ..Default::default()
        };
        let dynamic = params.to_query();
        let templated = render_template(&params.to_template_params());
        let mut expected = dynamic["retriever"]["standard"]["filter"]["bool"]["must"]
            .as_array()
            .unwrap()
            .clone();
        expected.push(json!({ "match_all": {} }));
        assert_eq!(
            templated["retriever"]["standard"]["filter"]["bool"]["must"],
            json!(expected)
        );
    }

    #[test]
    fn test_to_template_params() {
        let params = SearchParams {
            query: "spa".to_owned(),
            geo: Some(GeoFilter {
                latitude: 1.5,
                longitude: 2.5,
                distance: "5000m".to_owned(),
            }),
            rating: Some(3.0),
            country_code: Some("AU".to_owned()),
            attractions: vec!["pool".to_owned(), "spa".to_owned()],
            ..Default::default()
        };
        assert_eq!(
            params.to_template_params(),
            json!({
                "query": "spa",
                "geo": { "lat": 1.5, "lon": 2.5, "distance": "5000m" },
                "rating": 3.0,
                "countryCode": "AU",
                "attraction": ["pool", "spa"]
            })
        );
    }

    #[test]
    fn test_parse_search_response() {
        let results = parse_search_response(json!({
            "took": 3,
            "hits": {
                "total": { "value": 8, "relation": "eq" },
                "hits": [
                    { "_id": "1", "fields": { "HotelName": ["Beach House"] } },
                    { "_id": "2", "_source": { "HotelName": "Surf Inn" } }
                ]
            }
        }))
        .unwrap();
        assert_eq!(results.total, 8);
        assert_eq!(results.hits[0]["HotelName"], json!(["Beach House"]));
        assert_eq!(results.hits[1]["HotelName"], json!("Surf Inn"));

        let results =
            parse_search_response(json!({ "hits": { "hits": [{}] } })).unwrap();
        assert_eq!(results.total, 1);

        let err = parse_search_response(json!({ "error": "boom" })).unwrap_err();
        assert_eq!(err.kind(), ServiceErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_bulk_response() {
        let report = parse_bulk_response(&json!({
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": { "status": 400, "error": { "type": "mapper_parsing_exception" } } },
                { "index": { "_id": "3", "status": 201 } }
            ]
        }));
        assert_eq!(report, BulkReport { indexed: 2, failed: 1 });
    }

    #[test]
    fn test_template_renders_every_criterion() {
        for key in ["{{#geo}}", "{{#rating}}", "{{#countryName}}", "{{#countryCode}}", "{{#city}}", "{{#attraction}}"] {
            assert!(SEARCH_TEMPLATE.contains(key), "missing section {key}");
        }
    }
}
