use rideline_client::ApiError;
use rideline_store::StoreError;
use uuid::Uuid;

use crate::transitions::TransitionError;

/// Every way a lifecycle operation can fail. None of these are fatal to the
/// manager: the store stays usable and a failed mutation applies nothing.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// A local precondition failed before any network call was made
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Another mutation for the same id is still in flight; callers should
    /// disable the triggering control rather than retry
    #[error("a mutation for {0} is already in flight")]
    MutationInFlight(Uuid),

    /// The referenced entity is absent from the local store; the view is
    /// stale and a refetch will recover
    #[error("entity not found: {0}")]
    EntityNotFound(Uuid),

    /// The server rejected the request; show `message` verbatim
    #[error("remote rejected ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Transport failure; the caller may retry
    #[error("network failure: {0}")]
    Network(String),
}

impl From<ApiError> for ManagerError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Remote { status, message } => ManagerError::Remote { status, message },
            ApiError::Network(msg) => ManagerError::Network(msg),
        }
    }
}

impl From<StoreError> for ManagerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EntityNotFound(id) => ManagerError::EntityNotFound(id),
        }
    }
}
