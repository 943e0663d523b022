pub mod error;
pub mod manager;
pub mod transitions;

pub use error::ManagerError;
pub use manager::LifecycleManager;
pub use transitions::{BookingAction, TransitionError};
