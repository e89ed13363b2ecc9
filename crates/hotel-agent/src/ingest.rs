//! Preparation of hotel records for bulk indexing.

use serde_json::{Map, Value, json};

const LATITUDE_KEYS: [&str; 3] = ["lat", "latitude", "latitud"];
const LONGITUDE_KEYS: [&str; 4] = ["lon", "lng", "longitude", "longitud"];
const YES: [&str; 4] = ["sí", "si", "yes", "true"];

/// Fields holding a yes/no answer as text.
pub const FLAG_FIELDS: [&str; 1] = ["mascotas"];

/// Rewrites a record so it fits the index mapping.
///
/// Every object field that holds a latitude and a longitude becomes a
/// `{"lat", "lon"}` geo point, and the [`FLAG_FIELDS`] become booleans.
/// Anything else is left untouched, as are non-object records.
pub fn normalize_record(record: Value) -> Value {
    let Value::Object(fields) = record else {
        return record;
    };
    let fields = fields
        .into_iter()
        .map(|(key, value)| {
            let value = if FLAG_FIELDS.contains(&key.as_str()) {
                normalize_flag(value)
            } else {
                normalize_geo_point(value)
            };
            (key, value)
        })
        .collect();
    Value::Object(fields)
}

fn normalize_geo_point(value: Value) -> Value {
    let point = match &value {
        Value::Object(point) => (
            coordinate(point, &LATITUDE_KEYS),
            coordinate(point, &LONGITUDE_KEYS),
        ),
        _ => (None, None),
    };
    match point {
        (Some(lat), Some(lon)) => json!({ "lat": lat, "lon": lon }),
        _ => value,
    }
}

fn coordinate(point: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| point.get(*key))
        .and_then(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().replace(',', ".").parse().ok(),
            _ => None,
        })
}

fn normalize_flag(value: Value) -> Value {
    match value {
        Value::String(text) => {
            Value::Bool(YES.contains(&text.trim().to_lowercase().as_str()))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_become_geo_points() {
        let record = normalize_record(json!({
            "nombre": "Hotel Playa",
            "coordenadas": { "latitud": "36,84", "longitud": -2.46 },
            "location": { "lat": 1.0, "lng": 2.0 },
            "precio": 80
        }));
        assert_eq!(
            record,
            json!({
                "nombre": "Hotel Playa",
                "coordenadas": { "lat": 36.84, "lon": -2.46 },
                "location": { "lat": 1.0, "lon": 2.0 },
                "precio": 80
            })
        );
    }

    #[test]
    fn test_partial_coordinates_are_kept() {
        let record = json!({ "coordenadas": { "latitud": 36.84 } });
        assert_eq!(normalize_record(record.clone()), record);
        assert_eq!(normalize_record(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_flags() {
        let record = normalize_record(json!({ "mascotas": "Sí" }));
        assert_eq!(record, json!({ "mascotas": true }));
        let record = normalize_record(json!({ "mascotas": "No" }));
        assert_eq!(record, json!({ "mascotas": false }));
    }
}
