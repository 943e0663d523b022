pub mod booking;
pub mod fare;
pub mod trip;

pub use booking::{Booking, BookingStatus, PaymentMethod, PaymentStatus};
pub use fare::VehicleClass;
pub use trip::{Location, Trip, TripStatus, Vehicle};
