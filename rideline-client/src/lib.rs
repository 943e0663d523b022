pub mod api;
pub mod app_config;
pub mod http;

pub use api::{ApiError, BookingApi, NewBooking, TripCompletion};
pub use app_config::{ApiConfig, Config};
pub use http::HttpBookingApi;
