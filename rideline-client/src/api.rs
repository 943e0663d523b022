use async_trait::async_trait;
use rideline_domain::{Booking, PaymentMethod, Trip};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for creating a booking
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub trip_id: Uuid,
    pub seats: u32,
    pub payment_method: PaymentMethod,
}

/// Result of a trip-level bulk completion: the updated trip plus every
/// booking the server cascaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripCompletion {
    pub trip: Trip,
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status; `message` is the first
    /// structured error message it sent
    #[error("remote rejected ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Transport-level failure, no usable response
    #[error("network failure: {0}")]
    Network(String),
}

/// The remote booking/trip API contract the lifecycle manager depends on.
///
/// Implementations are expected to be side-effect-free on error: a failed
/// call means the server applied nothing the client needs to mirror.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn create_booking(&self, req: &NewBooking) -> Result<Booking, ApiError>;

    async fn my_bookings(&self) -> Result<Vec<Booking>, ApiError>;

    async fn driver_pending(&self) -> Result<Vec<Booking>, ApiError>;

    async fn driver_bookings(&self) -> Result<Vec<Booking>, ApiError>;

    async fn booking(&self, id: Uuid) -> Result<Booking, ApiError>;

    async fn accept(&self, id: Uuid) -> Result<Booking, ApiError>;

    async fn reject(&self, id: Uuid, reason: &str) -> Result<Booking, ApiError>;

    async fn complete(&self, id: Uuid) -> Result<Booking, ApiError>;

    async fn cancel(&self, id: Uuid, reason: Option<&str>) -> Result<Booking, ApiError>;

    async fn complete_trip(&self, trip_id: Uuid) -> Result<TripCompletion, ApiError>;

    async fn driver_trips(&self) -> Result<Vec<Trip>, ApiError>;
}
