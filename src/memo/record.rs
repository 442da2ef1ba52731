use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{MemoError, MemoResult};
use crate::geocoder::RawLocation;

/// Stable OpenStreetMap identifier of a geocoded place.
pub type OsmId = u64;

/// Placeholder stored for any address field the provider did not return.
pub const UNAVAILABLE: &str = "NA";

/// Provider bookkeeping fields that never make it into a [`LocationRecord`].
const DISCARDED_FIELDS: [&str; 9] = [
    "place_id",
    "licence",
    "osm_type",
    "osm_id",
    "class",
    "type",
    "place_rank",
    "importance",
    "boundingbox",
];

/// Canonical resolved attributes of a place, keyed in the memo by its OSM id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(deserialize_with = "coordinate")]
    pub latitude: f64,
    #[serde(deserialize_with = "coordinate")]
    pub longitude: f64,
    #[serde(default = "unavailable")]
    pub city: String,
    #[serde(default = "unavailable")]
    pub county: String,
    #[serde(default = "unavailable")]
    pub state: String,
    #[serde(default = "unavailable")]
    pub country: String,
    #[serde(default = "unavailable")]
    pub street: String,
    #[serde(default = "unavailable")]
    pub zip: String,
    #[serde(default = "unavailable")]
    pub building: String,
    #[serde(default = "unavailable")]
    pub house_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A name mapped onto a location id, with the confidence it was learned at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NameAlias {
    pub id: OsmId,
    pub confidence: f64,
}

fn unavailable() -> String {
    UNAVAILABLE.to_string()
}

/// Nominatim sends coordinates as strings; older memo files may hold numbers.
fn coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_coordinate(&value).ok_or_else(|| serde::de::Error::custom(format!("not a coordinate: {}", value)))
}

fn as_coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn address_field(address: Option<&serde_json::Map<String, Value>>, key: &str) -> String {
    address
        .and_then(|a| a.get(key))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(unavailable)
}

/// Extract the OSM id from a raw provider payload.
pub fn osm_id(raw: &RawLocation) -> Option<OsmId> {
    match raw.get("osm_id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize a raw provider payload into a [`LocationRecord`].
///
/// Bookkeeping fields are dropped, the nested `address` block is flattened
/// (missing parts become [`UNAVAILABLE`]) and `lat`/`lon` are accepted when
/// `latitude`/`longitude` are absent. The input is not modified.
pub fn format_location(raw: &RawLocation) -> MemoResult<LocationRecord> {
    let dropped: Vec<&str> = DISCARDED_FIELDS
        .iter()
        .copied()
        .filter(|key| raw.contains_key(*key))
        .collect();
    tracing::trace!(dropped = ?dropped, "Formatting location for memo");

    let latitude = raw
        .get("latitude")
        .or_else(|| raw.get("lat"))
        .and_then(as_coordinate)
        .ok_or_else(|| MemoError::InvalidLocation {
            message: "missing or non-numeric latitude".to_string(),
        })?;
    let longitude = raw
        .get("longitude")
        .or_else(|| raw.get("lon"))
        .and_then(as_coordinate)
        .ok_or_else(|| MemoError::InvalidLocation {
            message: "missing or non-numeric longitude".to_string(),
        })?;

    let address = raw.get("address").and_then(Value::as_object);

    Ok(LocationRecord {
        latitude,
        longitude,
        city: address_field(address, "city"),
        county: address_field(address, "county"),
        state: address_field(address, "state"),
        country: address_field(address, "country"),
        street: address_field(address, "road"),
        zip: address_field(address, "postcode"),
        building: address_field(address, "building"),
        house_number: address_field(address, "house_number"),
        display_name: raw
            .get("display_name")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}
