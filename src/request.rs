use serde::{de, Deserialize, Deserializer};

use crate::entry::Entry;

/// Body of `POST /location/{order_id}/now`.
#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub lat: f32,
    pub lng: f32,
}

impl From<LocationRequest> for Entry {
    fn from(request: LocationRequest) -> Self {
        Entry::new(request.lat, request.lng)
    }
}

/// Query of `GET /location/{order_id}`. `max` limits the history to the most
/// recent entries. An empty `max=` is the same as leaving it out.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub max: Option<i64>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(value) if !value.is_empty() => value.parse().map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}
