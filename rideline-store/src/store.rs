use rideline_domain::{Booking, BookingStatus, Trip, TripStatus};
use std::collections::HashMap;
use uuid::Uuid;

/// The single mutation entry point's vocabulary. Every write to the store
/// goes through [`NormalizedStore::apply`]; nothing else mutates entities.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Upsert a full trip entity
    PutTrip(Trip),
    /// Upsert a full booking entity
    PutBooking(Booking),
    /// Upsert every trip from a refetched collection
    SyncTrips(Vec<Trip>),
    /// Upsert every booking from a refetched collection
    SyncBookings(Vec<Booking>),
    /// Status update for an already-known booking. The lifecycle manager
    /// applies full server entities via `PutBooking`/`SyncBookings`; this
    /// narrower form is for the view layer seeding a pushed status-change
    /// event, where an unknown id signals a stale view.
    SetBookingStatus {
        id: Uuid,
        status: BookingStatus,
        reason: Option<String>,
        rejected: bool,
    },
    /// Status update for an already-known trip; same contract as
    /// `SetBookingStatus`
    SetTripStatus { id: Uuid, status: TripStatus },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    EntityNotFound(Uuid),
}

/// Deduplicated Trip and Booking entities keyed by id.
///
/// Derived views (see [`crate::views`]) are computed on demand from a
/// snapshot; the store never recomputes anything on write, keeping every
/// mutation O(1) (or O(n) for collection syncs).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedStore {
    trips: HashMap<Uuid, Trip>,
    bookings: HashMap<Uuid, Booking>,
}

impl NormalizedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self, id: &Uuid) -> Option<&Trip> {
        self.trips.get(id)
    }

    pub fn booking(&self, id: &Uuid) -> Option<&Booking> {
        self.bookings.get(id)
    }

    pub fn trips(&self) -> impl Iterator<Item = &Trip> {
        self.trips.values()
    }

    pub fn bookings(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }

    /// Seats currently held against a trip by bookings in an active
    /// (pending or booked) state.
    pub fn seats_committed(&self, trip_id: &Uuid) -> u32 {
        self.bookings
            .values()
            .filter(|b| b.trip_id == *trip_id && b.status.is_active())
            .map(|b| b.seats_booked)
            .sum()
    }

    /// Apply a single mutation. Update-style mutations on an unknown id
    /// are no-ops that signal [`StoreError::EntityNotFound`]; the caller
    /// treats that as a stale view, never as a fatal condition.
    pub fn apply(&mut self, mutation: Mutation) -> Result<(), StoreError> {
        match mutation {
            Mutation::PutTrip(trip) => {
                self.trips.insert(trip.id, trip);
            }
            Mutation::PutBooking(booking) => {
                self.bookings.insert(booking.id, booking);
            }
            Mutation::SyncTrips(trips) => {
                for trip in trips {
                    self.trips.insert(trip.id, trip);
                }
            }
            Mutation::SyncBookings(bookings) => {
                for booking in bookings {
                    self.bookings.insert(booking.id, booking);
                }
            }
            Mutation::SetBookingStatus {
                id,
                status,
                reason,
                rejected,
            } => {
                let booking = self.bookings.get_mut(&id).ok_or_else(|| {
                    tracing::warn!(booking_id = %id, "status update for unknown booking");
                    StoreError::EntityNotFound(id)
                })?;
                booking.set_status(status);
                if reason.is_some() {
                    booking.status_reason = reason;
                }
                booking.rejected = rejected;
            }
            Mutation::SetTripStatus { id, status } => {
                let trip = self.trips.get_mut(&id).ok_or_else(|| {
                    tracing::warn!(trip_id = %id, "status update for unknown trip");
                    StoreError::EntityNotFound(id)
                })?;
                trip.set_status(status);
            }
        }
        Ok(())
    }
}
