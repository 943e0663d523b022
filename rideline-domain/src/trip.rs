use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trip status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TripStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

/// A named place, optionally geocoded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latitude: None,
            longitude: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub model: String,
    pub color: String,
    pub plate_number: String,
}

/// A driver-published journey with fixed seat capacity and price.
/// The remote API is the system of record; this is the client-session copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub driver_name: String,
    pub departure_location: Location,
    pub destination_location: Location,
    pub departure_date: NaiveDate,
    /// "HH:MM", as the backend sends it
    pub departure_time: String,
    /// Price per seat in minor currency units
    pub price_per_seat: i64,
    pub total_seats: u32,
    pub available_seats: u32,
    pub vehicle: Vehicle,
    pub status: TripStatus,
    /// Average ride rating, absent until first rated
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Whether a new booking for `seats` passes local headroom checks.
    /// The server remains authoritative; this only gates obvious over-asks.
    pub fn has_seats_for(&self, seats: u32) -> bool {
        self.status == TripStatus::Scheduled && self.available_seats >= seats
    }

    pub fn set_status(&mut self, status: TripStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
