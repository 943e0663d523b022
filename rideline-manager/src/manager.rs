use chrono::{DateTime, Utc};
use rideline_client::{ApiError, BookingApi, NewBooking, TripCompletion};
use rideline_domain::{Booking, PaymentMethod, Trip};
use rideline_store::{views, HistoryEntry, HistoryFilter, Mutation, NormalizedStore, SortOrder, TripGroup};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::ManagerError;
use crate::transitions::{self, BookingAction};

/// Coordinates the booking lifecycle for one client session.
///
/// Every mutating operation follows the same discipline: validate locally,
/// claim the id's in-flight slot, call the remote API, and only on success
/// apply the transition and refetch the affected collection. The remote
/// service is the system of record and wins on every conflict.
///
/// Mutations run on their own task: a caller that stops waiting (e.g. a
/// view unmounting) does not cancel the underlying request, and the late
/// response still lands in the store.
pub struct LifecycleManager {
    api: Arc<dyn BookingApi>,
    store: Arc<Mutex<NormalizedStore>>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

/// Clears the claimed id when the owning task finishes, so no outcome of a
/// mutation can wedge a booking.
struct InFlightGuard {
    slots: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        recover(self.slots.lock()).remove(&self.id);
    }
}

/// Mutex poisoning only happens if a holder panicked; the store is plain
/// data, so the value is still coherent and we keep going.
fn recover<'a, T>(
    result: Result<MutexGuard<'a, T>, std::sync::PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LifecycleManager {
    pub fn new(api: Arc<dyn BookingApi>) -> Self {
        Self {
            api,
            store: Arc::new(Mutex::new(NormalizedStore::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, NormalizedStore> {
        recover(self.store.lock())
    }

    fn claim(&self, id: Uuid) -> Result<InFlightGuard, ManagerError> {
        let mut slots = recover(self.in_flight.lock());
        if !slots.insert(id) {
            return Err(ManagerError::MutationInFlight(id));
        }
        Ok(InFlightGuard {
            slots: self.in_flight.clone(),
            id,
        })
    }

    /// Run a mutation to completion on a detached task. Dropping the
    /// returned future abandons the wait, not the work: the request, the
    /// store update and the refetch all still happen.
    async fn run_detached<T>(
        &self,
        work: impl Future<Output = Result<T, ManagerError>> + Send + 'static,
    ) -> Result<T, ManagerError>
    where
        T: Send + 'static,
    {
        match tokio::spawn(work).await {
            Ok(result) => result,
            // Mutation tasks are never aborted, so a join error means the
            // task panicked mid-mutation
            Err(err) => Err(ManagerError::Network(format!(
                "mutation task failed: {}",
                err
            ))),
        }
    }

    /// The single writer for the session store. The view layer seeds fetched
    /// entities through here; nothing mutates Trip/Booking fields directly.
    pub fn apply(&self, mutation: Mutation) -> Result<(), ManagerError> {
        self.lock_store().apply(mutation)?;
        Ok(())
    }

    pub fn booking(&self, id: &Uuid) -> Option<Booking> {
        self.lock_store().booking(id).cloned()
    }

    pub fn trip(&self, id: &Uuid) -> Option<Trip> {
        self.lock_store().trip(id).cloned()
    }

    /// Seats held against a trip by pending and booked bookings in the
    /// local snapshot.
    pub fn seats_committed(&self, trip_id: &Uuid) -> u32 {
        self.lock_store().seats_committed(trip_id)
    }

    // ----- derived views (read-only, computed on demand) -----

    pub fn pending_for(&self, driver_id: Uuid) -> Vec<Booking> {
        views::pending_for(&self.lock_store(), driver_id)
    }

    pub fn booked_for(&self, driver_id: Uuid) -> Vec<Booking> {
        views::booked_for(&self.lock_store(), driver_id)
    }

    pub fn history_for(
        &self,
        actor_id: Uuid,
        filter: &HistoryFilter,
        sort: SortOrder,
        now: DateTime<Utc>,
    ) -> Vec<HistoryEntry> {
        views::history_for(&self.lock_store(), actor_id, filter, sort, now)
    }

    pub fn group_by_trip(&self, driver_id: Uuid) -> Vec<TripGroup> {
        views::group_by_trip(&self.lock_store(), driver_id)
    }

    // ----- mutations -----

    /// Passenger requests seats on a trip. Locally validates seat count and
    /// trip status against the cached snapshot; the server remains
    /// authoritative on true headroom.
    pub async fn create_booking(
        &self,
        trip_id: Uuid,
        seats: u32,
        payment_method: PaymentMethod,
    ) -> Result<Booking, ManagerError> {
        let trip = self
            .lock_store()
            .trip(&trip_id)
            .cloned()
            .ok_or(ManagerError::EntityNotFound(trip_id))?;
        transitions::check_create(&trip, seats)?;

        // Keyed on the trip id: there is no booking id yet, and this also
        // debounces double-submits of the same request form.
        let guard = self.claim(trip_id)?;
        let api = self.api.clone();
        let store = self.store.clone();
        self.run_detached(async move {
            let _guard = guard;
            let booking = api
                .create_booking(&NewBooking {
                    trip_id,
                    seats,
                    payment_method,
                })
                .await?;
            tracing::info!(booking_id = %booking.id, %trip_id, seats, "booking requested");

            recover(store.lock()).apply(Mutation::PutBooking(booking.clone()))?;
            reconcile_passenger(api.as_ref(), &store).await;
            Ok(booking)
        })
        .await
    }

    /// Driver accepts a pending request: `pending` → `booked`.
    pub async fn accept(&self, id: Uuid) -> Result<Booking, ManagerError> {
        self.transition(id, BookingAction::Accept, None).await
    }

    /// Driver rejects a pending request; the reason is mandatory and the
    /// booking lands in `cancelled` tagged as rejected.
    pub async fn reject(&self, id: Uuid, reason: &str) -> Result<Booking, ManagerError> {
        if reason.trim().is_empty() {
            return Err(ManagerError::Validation(
                "a rejection reason is required".to_string(),
            ));
        }
        self.transition(id, BookingAction::Reject, Some(reason.to_string()))
            .await
    }

    /// Driver marks an accepted booking completed: `booked` → `completed`.
    pub async fn complete(&self, id: Uuid) -> Result<Booking, ManagerError> {
        self.transition(id, BookingAction::Complete, None).await
    }

    /// Passenger cancels while the booking is still pending or booked.
    pub async fn cancel(&self, id: Uuid, reason: Option<&str>) -> Result<Booking, ManagerError> {
        self.transition(id, BookingAction::Cancel, reason.map(str::to_string))
            .await
    }

    async fn transition(
        &self,
        id: Uuid,
        action: BookingAction,
        reason: Option<String>,
    ) -> Result<Booking, ManagerError> {
        let current = self
            .lock_store()
            .booking(&id)
            .cloned()
            .ok_or(ManagerError::EntityNotFound(id))?;
        // Illegal transitions are rejected here, before any network traffic
        transitions::check(current.status, action)?;

        let guard = self.claim(id)?;
        let api = self.api.clone();
        let store = self.store.clone();
        self.run_detached(async move {
            let _guard = guard;
            let result = match action {
                BookingAction::Accept => api.accept(id).await,
                BookingAction::Reject => {
                    api.reject(id, reason.as_deref().unwrap_or_default()).await
                }
                BookingAction::Complete => api.complete(id).await,
                BookingAction::Cancel => api.cancel(id, reason.as_deref()).await,
            };

            let updated = match result {
                Ok(updated) => updated,
                Err(err) => {
                    if matches!(err, ApiError::Remote { .. }) {
                        // The server saw a state we did not, e.g. a cancel
                        // racing a concurrent completion. Treat as stale and
                        // refetch so the caller's next read is authoritative.
                        tracing::warn!(booking_id = %id, %err, "remote refused transition, refetching");
                        reconcile_for(action, api.as_ref(), &store).await;
                    }
                    return Err(err.into());
                }
            };

            tracing::info!(booking_id = %id, status = updated.status.display_label(), "booking transitioned");
            recover(store.lock()).apply(Mutation::PutBooking(updated.clone()))?;
            reconcile_for(action, api.as_ref(), &store).await;
            Ok(updated)
        })
        .await
    }

    /// Driver-initiated bulk completion: the trip goes to `completed`, its
    /// `booked` bookings complete and its `pending` ones are auto-rejected.
    /// The cascade is applied from the server's response, never recomputed
    /// locally.
    pub async fn complete_trip(&self, trip_id: Uuid) -> Result<TripCompletion, ManagerError> {
        let trip = self
            .lock_store()
            .trip(&trip_id)
            .cloned()
            .ok_or(ManagerError::EntityNotFound(trip_id))?;
        transitions::check_complete_trip(&trip)?;

        let guard = self.claim(trip_id)?;
        let api = self.api.clone();
        let store = self.store.clone();
        self.run_detached(async move {
            let _guard = guard;
            let completion = api.complete_trip(trip_id).await?;
            tracing::info!(%trip_id, cascaded = completion.bookings.len(), "trip bulk-completed");

            {
                let mut store = recover(store.lock());
                store.apply(Mutation::PutTrip(completion.trip.clone()))?;
                store.apply(Mutation::SyncBookings(completion.bookings.clone()))?;
            }
            reconcile_driver(api.as_ref(), &store).await;
            Ok(completion)
        })
        .await
    }

    // ----- refetch / reconciliation -----

    /// Fetch one booking's authoritative state, e.g. for a details view.
    pub async fn refresh_booking(&self, id: Uuid) -> Result<Booking, ManagerError> {
        let booking = self.api.booking(id).await?;
        self.apply(Mutation::PutBooking(booking.clone()))?;
        Ok(booking)
    }

    pub async fn refresh_my_bookings(&self) -> Result<(), ManagerError> {
        fetch_my_bookings(self.api.as_ref(), &self.store).await
    }

    pub async fn refresh_driver_bookings(&self) -> Result<(), ManagerError> {
        fetch_driver_bookings(self.api.as_ref(), &self.store).await
    }

    pub async fn refresh_driver_pending(&self) -> Result<(), ManagerError> {
        let bookings = self.api.driver_pending().await?;
        self.apply(Mutation::SyncBookings(bookings))
    }

    pub async fn refresh_driver_trips(&self) -> Result<(), ManagerError> {
        fetch_driver_trips(self.api.as_ref(), &self.store).await
    }
}

async fn fetch_my_bookings(
    api: &dyn BookingApi,
    store: &Mutex<NormalizedStore>,
) -> Result<(), ManagerError> {
    let bookings = api.my_bookings().await?;
    recover(store.lock()).apply(Mutation::SyncBookings(bookings))?;
    Ok(())
}

async fn fetch_driver_bookings(
    api: &dyn BookingApi,
    store: &Mutex<NormalizedStore>,
) -> Result<(), ManagerError> {
    let bookings = api.driver_bookings().await?;
    recover(store.lock()).apply(Mutation::SyncBookings(bookings))?;
    Ok(())
}

async fn fetch_driver_trips(
    api: &dyn BookingApi,
    store: &Mutex<NormalizedStore>,
) -> Result<(), ManagerError> {
    let trips = api.driver_trips().await?;
    recover(store.lock()).apply(Mutation::SyncTrips(trips))?;
    Ok(())
}

fn is_driver_action(action: BookingAction) -> bool {
    matches!(
        action,
        BookingAction::Accept | BookingAction::Reject | BookingAction::Complete
    )
}

async fn reconcile_for(action: BookingAction, api: &dyn BookingApi, store: &Mutex<NormalizedStore>) {
    if is_driver_action(action) {
        reconcile_driver(api, store).await;
    } else {
        reconcile_passenger(api, store).await;
    }
}

/// Post-mutation refetches are reconciliation, not part of the mutation:
/// the mutation already succeeded, so a failed refetch is logged and the
/// local (slightly staler) state stands until the next read.
async fn reconcile_passenger(api: &dyn BookingApi, store: &Mutex<NormalizedStore>) {
    if let Err(err) = fetch_my_bookings(api, store).await {
        tracing::warn!(%err, "post-mutation refetch of my bookings failed");
    }
}

async fn reconcile_driver(api: &dyn BookingApi, store: &Mutex<NormalizedStore>) {
    if let Err(err) = fetch_driver_bookings(api, store).await {
        tracing::warn!(%err, "post-mutation refetch of driver bookings failed");
    }
    if let Err(err) = fetch_driver_trips(api, store).await {
        tracing::warn!(%err, "post-mutation refetch of driver trips failed");
    }
}
