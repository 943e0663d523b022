use rideline_domain::{BookingStatus, Trip};

/// Actions a driver or passenger can take on a single booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    /// Driver accepts a pending request
    Accept,
    /// Driver rejects a pending request; requires a reason
    Reject,
    /// Driver marks an accepted booking as completed
    Complete,
    /// Passenger cancels while pending or booked
    Cancel,
}

impl BookingAction {
    fn target(&self) -> BookingStatus {
        match self {
            BookingAction::Accept => BookingStatus::Booked,
            BookingAction::Reject | BookingAction::Cancel => BookingStatus::Cancelled,
            BookingAction::Complete => BookingStatus::Completed,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
}

/// Decide legality of a booking status change. Pure: the table below is the
/// whole state machine, and terminal states absorb every action.
///
/// | from      | action   | to        |
/// |-----------|----------|-----------|
/// | pending   | accept   | booked    |
/// | pending   | reject   | cancelled |
/// | booked    | complete | completed |
/// | pending   | cancel   | cancelled |
/// | booked    | cancel   | cancelled |
pub fn check(from: BookingStatus, action: BookingAction) -> Result<BookingStatus, TransitionError> {
    let legal = matches!(
        (from, action),
        (BookingStatus::Pending, BookingAction::Accept)
            | (BookingStatus::Pending, BookingAction::Reject)
            | (BookingStatus::Booked, BookingAction::Complete)
            | (BookingStatus::Pending, BookingAction::Cancel)
            | (BookingStatus::Booked, BookingAction::Cancel)
    );
    if legal {
        Ok(action.target())
    } else {
        Err(TransitionError::InvalidTransition {
            from: from.display_label().to_string(),
            to: action.target().display_label().to_string(),
        })
    }
}

/// Local preconditions for creating a booking. The server stays
/// authoritative on seat headroom; this only rejects requests that are
/// wrong against the client's own snapshot.
pub fn check_create(trip: &Trip, seats: u32) -> Result<(), TransitionError> {
    if seats == 0 {
        return Err(TransitionError::PreconditionFailed(
            "seats must be a positive number".to_string(),
        ));
    }
    if !trip.has_seats_for(seats) {
        return Err(TransitionError::PreconditionFailed(format!(
            "trip {} cannot take {} more seat(s)",
            trip.id, seats
        )));
    }
    Ok(())
}

/// Local precondition for bulk-completing a trip.
pub fn check_complete_trip(trip: &Trip) -> Result<(), TransitionError> {
    use rideline_domain::TripStatus;
    if trip.status == TripStatus::Completed {
        return Err(TransitionError::PreconditionFailed(format!(
            "trip {} is already completed",
            trip.id
        )));
    }
    Ok(())
}
