use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }
}

/// One delivery attempt against a recipient. Append-only: never edited or
/// deleted after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub agent_id: Uuid,
    pub number: u32,
    pub successful: bool,
    pub notes: Option<String>,
    pub location: GeoPoint,
    pub photo_ref: Option<String>,
    pub valid: bool,
    pub recorded_at: DateTime<Utc>,
}
