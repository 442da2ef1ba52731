use crate::memo::{LocationRecord, OsmId};

/// Value emitted for every field of a row that could not be resolved.
pub const UNRESOLVED: &str = "?";

/// Column names of the resolved fields, in output order after the query.
pub const RESULT_COLUMNS: [&str; 5] = ["latitude", "longitude", "state", "country", "city"];

/// A location found for a query, with how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub id: OsmId,
    pub record: LocationRecord,
    /// Product of every decay applied on the way to this result.
    pub confidence: f64,
}

/// Outcome of resolving one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow {
    /// The case-folded query.
    pub query: String,
    pub resolution: Option<Resolution>,
}

impl ResolvedRow {
    pub fn unresolved(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// `(query, latitude, longitude, state, country, city)` as output text.
    pub fn to_fields(&self) -> [String; 6] {
        match &self.resolution {
            Some(Resolution { record, .. }) => [
                self.query.clone(),
                record.latitude.to_string(),
                record.longitude.to_string(),
                record.state.clone(),
                record.country.clone(),
                record.city.clone(),
            ],
            None => [
                self.query.clone(),
                UNRESOLVED.to_string(),
                UNRESOLVED.to_string(),
                UNRESOLVED.to_string(),
                UNRESOLVED.to_string(),
                UNRESOLVED.to_string(),
            ],
        }
    }
}

/// Per-pass resolution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Rows resolved through a live geocoder call.
    pub geolocated: usize,
    /// Rows resolved from the memo.
    pub memolocated: usize,
    pub not_located: usize,
}

impl PassStats {
    pub fn total(&self) -> usize {
        self.geolocated + self.memolocated + self.not_located
    }
}
