use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rideline_client::{ApiError, BookingApi, NewBooking, TripCompletion};
use rideline_domain::{
    Booking, BookingStatus, Location, PaymentMethod, PaymentStatus, Trip, TripStatus, Vehicle,
};
use rideline_manager::{LifecycleManager, ManagerError};
use rideline_store::Mutation;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use uuid::Uuid;

fn make_trip(driver_id: Uuid, total_seats: u32) -> Trip {
    Trip {
        id: Uuid::new_v4(),
        driver_id,
        driver_name: "Bikash".to_string(),
        departure_location: Location::named("Pokhara"),
        destination_location: Location::named("Kathmandu, Nepal"),
        departure_date: NaiveDate::from_ymd_opt(2025, 7, 12).unwrap(),
        departure_time: "06:45".to_string(),
        price_per_seat: 1500,
        total_seats,
        available_seats: total_seats,
        vehicle: Vehicle {
            model: "Scorpio".to_string(),
            color: "black".to_string(),
            plate_number: "BA 12 CHA 456".to_string(),
        },
        status: TripStatus::Scheduled,
        rating: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn make_booking(trip_id: Uuid, seats: u32, status: BookingStatus) -> Booking {
    Booking {
        id: Uuid::new_v4(),
        trip_id,
        passenger_id: Uuid::new_v4(),
        passenger_name: "Anju".to_string(),
        seats_booked: seats,
        status,
        payment_method: PaymentMethod::Cod,
        payment_status: PaymentStatus::Pending,
        status_reason: None,
        rejected: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[derive(Default)]
struct MockState {
    trips: HashMap<Uuid, Trip>,
    bookings: HashMap<Uuid, Booking>,
    accept_calls: usize,
    reject_calls: usize,
    create_calls: usize,
}

/// Scripted stand-in for the remote booking service. It enforces the same
/// server-side rules the manager must treat as authoritative: seat capacity
/// on create, and status guards on every transition.
struct MockApi {
    state: Mutex<MockState>,
    /// When set, `accept` signals the first notify on entry and waits on
    /// the second before answering, so a test can hold a mutation in flight
    accept_gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl MockApi {
    fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            accept_gate: None,
        }
    }

    fn gated(entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            accept_gate: Some((entered, release)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn seed_trip(&self, trip: Trip) {
        self.lock().trips.insert(trip.id, trip);
    }

    fn seed_booking(&self, booking: Booking) {
        self.lock().bookings.insert(booking.id, booking);
    }

    fn remote(status: u16, message: &str) -> ApiError {
        ApiError::Remote {
            status,
            message: message.to_string(),
        }
    }

    fn committed_seats(state: &MockState, trip_id: Uuid) -> u32 {
        state
            .bookings
            .values()
            .filter(|b| b.trip_id == trip_id && b.status.is_active())
            .map(|b| b.seats_booked)
            .sum()
    }
}

#[async_trait]
impl BookingApi for MockApi {
    async fn create_booking(&self, req: &NewBooking) -> Result<Booking, ApiError> {
        let mut state = self.lock();
        state.create_calls += 1;
        let trip = state
            .trips
            .get(&req.trip_id)
            .ok_or_else(|| Self::remote(404, "trip not found"))?
            .clone();
        if Self::committed_seats(&state, trip.id) + req.seats > trip.total_seats {
            return Err(Self::remote(400, "not enough seats available"));
        }
        let mut booking = make_booking(trip.id, req.seats, BookingStatus::Pending);
        booking.payment_method = req.payment_method;
        state.bookings.insert(booking.id, booking.clone());
        let committed = Self::committed_seats(&state, trip.id);
        if let Some(t) = state.trips.get_mut(&trip.id) {
            t.available_seats = t.total_seats - committed;
        }
        Ok(booking)
    }

    async fn my_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        Ok(self.lock().bookings.values().cloned().collect())
    }

    async fn driver_pending(&self) -> Result<Vec<Booking>, ApiError> {
        Ok(self
            .lock()
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending)
            .cloned()
            .collect())
    }

    async fn driver_bookings(&self) -> Result<Vec<Booking>, ApiError> {
        Ok(self.lock().bookings.values().cloned().collect())
    }

    async fn booking(&self, id: Uuid) -> Result<Booking, ApiError> {
        self.lock()
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::remote(404, "booking not found"))
    }

    async fn accept(&self, id: Uuid) -> Result<Booking, ApiError> {
        if let Some((entered, release)) = &self.accept_gate {
            entered.notify_one();
            release.notified().await;
        }
        let mut state = self.lock();
        state.accept_calls += 1;
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| Self::remote(404, "booking not found"))?;
        if booking.status != BookingStatus::Pending {
            return Err(Self::remote(409, "only pending bookings can be accepted"));
        }
        booking.set_status(BookingStatus::Booked);
        Ok(booking.clone())
    }

    async fn reject(&self, id: Uuid, reason: &str) -> Result<Booking, ApiError> {
        let mut state = self.lock();
        state.reject_calls += 1;
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| Self::remote(404, "booking not found"))?;
        if booking.status != BookingStatus::Pending {
            return Err(Self::remote(409, "only pending bookings can be rejected"));
        }
        booking.set_status(BookingStatus::Cancelled);
        booking.rejected = true;
        booking.status_reason = Some(reason.to_string());
        Ok(booking.clone())
    }

    async fn complete(&self, id: Uuid) -> Result<Booking, ApiError> {
        let mut state = self.lock();
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| Self::remote(404, "booking not found"))?;
        if booking.status != BookingStatus::Booked {
            return Err(Self::remote(409, "only accepted bookings can be completed"));
        }
        booking.set_status(BookingStatus::Completed);
        Ok(booking.clone())
    }

    async fn cancel(&self, id: Uuid, reason: Option<&str>) -> Result<Booking, ApiError> {
        let mut state = self.lock();
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| Self::remote(404, "booking not found"))?;
        if !booking.status.is_active() {
            return Err(Self::remote(409, "booking can no longer be cancelled"));
        }
        booking.set_status(BookingStatus::Cancelled);
        booking.status_reason = reason.map(str::to_string);
        Ok(booking.clone())
    }

    async fn complete_trip(&self, trip_id: Uuid) -> Result<TripCompletion, ApiError> {
        let mut state = self.lock();
        let trip = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| Self::remote(404, "trip not found"))?;
        if trip.status == TripStatus::Completed {
            return Err(Self::remote(409, "trip already completed"));
        }
        trip.set_status(TripStatus::Completed);
        let trip = trip.clone();

        let mut cascaded = Vec::new();
        for booking in state.bookings.values_mut().filter(|b| b.trip_id == trip_id) {
            match booking.status {
                BookingStatus::Booked => booking.set_status(BookingStatus::Completed),
                BookingStatus::Pending => {
                    booking.set_status(BookingStatus::Cancelled);
                    booking.rejected = true;
                    booking.status_reason = Some("trip completed by driver".to_string());
                }
                _ => {}
            }
            cascaded.push(booking.clone());
        }
        Ok(TripCompletion {
            trip,
            bookings: cascaded,
        })
    }

    async fn driver_trips(&self) -> Result<Vec<Trip>, ApiError> {
        Ok(self.lock().trips.values().cloned().collect())
    }
}

/// Seed the same entities on both sides of the wire: the mock is the system
/// of record, the manager holds the session copy.
fn setup(api: &Arc<MockApi>, trips: Vec<Trip>, bookings: Vec<Booking>) -> LifecycleManager {
    let manager = LifecycleManager::new(api.clone() as Arc<dyn BookingApi>);
    for trip in trips {
        api.seed_trip(trip.clone());
        manager.apply(Mutation::PutTrip(trip)).unwrap();
    }
    for booking in bookings {
        api.seed_booking(booking.clone());
        manager.apply(Mutation::PutBooking(booking)).unwrap();
    }
    manager
}

#[tokio::test]
async fn test_request_accept_complete_round_trip() {
    let api = Arc::new(MockApi::new());
    let trip = make_trip(Uuid::new_v4(), 3);
    let manager = setup(&api, vec![trip.clone()], vec![]);

    let booking = manager
        .create_booking(trip.id, 2, PaymentMethod::Online)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);

    let accepted = manager.accept(booking.id).await.unwrap();
    assert_eq!(accepted.status, BookingStatus::Booked);

    let completed = manager.complete(booking.id).await.unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);
    assert_eq!(
        manager.booking(&booking.id).unwrap().status,
        BookingStatus::Completed
    );
}

#[tokio::test]
async fn test_reject_requires_a_reason_and_never_calls_the_api() {
    let api = Arc::new(MockApi::new());
    let trip = make_trip(Uuid::new_v4(), 3);
    let booking = make_booking(trip.id, 1, BookingStatus::Pending);
    let manager = setup(&api, vec![trip], vec![booking.clone()]);

    let err = manager.reject(booking.id, "   ").await.unwrap_err();
    assert!(matches!(err, ManagerError::Validation(_)));
    assert_eq!(api.lock().reject_calls, 0);

    manager.reject(booking.id, "vehicle is full").await.unwrap();
    let rejected = manager.booking(&booking.id).unwrap();
    assert_eq!(rejected.status, BookingStatus::Cancelled);
    assert!(rejected.rejected);
    assert_eq!(rejected.status_reason.as_deref(), Some("vehicle is full"));
}

#[tokio::test]
async fn test_double_accept_fails_locally() {
    let api = Arc::new(MockApi::new());
    let trip = make_trip(Uuid::new_v4(), 3);
    let booking = make_booking(trip.id, 1, BookingStatus::Pending);
    let manager = setup(&api, vec![trip], vec![booking.clone()]);

    manager.accept(booking.id).await.unwrap();
    let err = manager.accept(booking.id).await.unwrap_err();
    assert!(matches!(err, ManagerError::Transition(_)));
    // The illegal second attempt was stopped before the wire
    assert_eq!(api.lock().accept_calls, 1);
}

#[tokio::test]
async fn test_unknown_booking_is_a_stale_view() {
    let api = Arc::new(MockApi::new());
    let manager = setup(&api, vec![], vec![]);
    let id = Uuid::new_v4();
    let err = manager.accept(id).await.unwrap_err();
    assert!(matches!(err, ManagerError::EntityNotFound(found) if found == id));
}

#[tokio::test]
async fn test_bulk_complete_cascades() {
    let api = Arc::new(MockApi::new());
    let driver = Uuid::new_v4();
    let trip = make_trip(driver, 4);
    let b1 = make_booking(trip.id, 1, BookingStatus::Booked);
    let b2 = make_booking(trip.id, 1, BookingStatus::Pending);
    let b3 = make_booking(trip.id, 1, BookingStatus::Completed);
    let manager = setup(&api, vec![trip.clone()], vec![b1.clone(), b2.clone(), b3.clone()]);

    manager.complete_trip(trip.id).await.unwrap();

    assert_eq!(manager.trip(&trip.id).unwrap().status, TripStatus::Completed);
    assert_eq!(manager.booking(&b1.id).unwrap().status, BookingStatus::Completed);
    let auto_rejected = manager.booking(&b2.id).unwrap();
    assert_eq!(auto_rejected.status, BookingStatus::Cancelled);
    assert!(auto_rejected.rejected);
    assert_eq!(manager.booking(&b3.id).unwrap().status, BookingStatus::Completed);

    // A second bulk completion is refused before reaching the wire
    let err = manager.complete_trip(trip.id).await.unwrap_err();
    assert!(matches!(err, ManagerError::Transition(_)));
}

#[tokio::test]
async fn test_second_mutation_on_same_id_is_refused_while_in_flight() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let api = Arc::new(MockApi::gated(entered.clone(), release.clone()));
    let trip = make_trip(Uuid::new_v4(), 3);
    let booking = make_booking(trip.id, 1, BookingStatus::Pending);
    let manager = Arc::new(setup(&api, vec![trip], vec![booking.clone()]));

    let first = {
        let manager = manager.clone();
        let id = booking.id;
        tokio::spawn(async move { manager.accept(id).await })
    };
    // Wait until the first accept is truly on the wire
    entered.notified().await;

    let err = manager.accept(booking.id).await.unwrap_err();
    assert!(matches!(err, ManagerError::MutationInFlight(id) if id == booking.id));

    release.notify_one();
    let accepted = first.await.unwrap().unwrap();
    assert_eq!(accepted.status, BookingStatus::Booked);
    assert_eq!(api.lock().accept_calls, 1);

    // The slot is free again once the first mutation resolved
    let err = manager.accept(booking.id).await.unwrap_err();
    assert!(matches!(err, ManagerError::Transition(_)));
}

#[tokio::test]
async fn test_abandoned_caller_does_not_cancel_the_mutation() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let api = Arc::new(MockApi::gated(entered.clone(), release.clone()));
    let trip = make_trip(Uuid::new_v4(), 3);
    let booking = make_booking(trip.id, 1, BookingStatus::Pending);
    let manager = setup(&api, vec![trip], vec![booking.clone()]);

    // Drive the accept until it is on the wire, then stop listening, the
    // way a view does when it unmounts mid-request
    let mut accept = Box::pin(manager.accept(booking.id));
    tokio::select! {
        _ = &mut accept => panic!("accept resolved before the gate opened"),
        _ = entered.notified() => {}
    }
    drop(accept);

    release.notify_one();

    // The detached mutation still runs to completion and updates the store
    let mut status = manager.booking(&booking.id).unwrap().status;
    for _ in 0..200 {
        if status == BookingStatus::Booked {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        status = manager.booking(&booking.id).unwrap().status;
    }
    assert_eq!(status, BookingStatus::Booked);
    assert_eq!(api.lock().accept_calls, 1);
}

#[tokio::test]
async fn test_pushed_status_for_unknown_booking_signals_stale_view() {
    let api = Arc::new(MockApi::new());
    let manager = setup(&api, vec![], vec![]);

    // A status-change event arrives for a booking this session never loaded
    let id = Uuid::new_v4();
    let err = manager
        .apply(Mutation::SetBookingStatus {
            id,
            status: BookingStatus::Booked,
            reason: None,
            rejected: false,
        })
        .unwrap_err();
    assert!(matches!(err, ManagerError::EntityNotFound(found) if found == id));

    // Recoverable: a refetch brings the booking in and the event order
    // resolves itself from server state
    let trip = make_trip(Uuid::new_v4(), 2);
    let booking = make_booking(trip.id, 1, BookingStatus::Pending);
    api.seed_booking(booking.clone());
    manager.refresh_my_bookings().await.unwrap();
    assert_eq!(
        manager.booking(&booking.id).unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn test_stale_cancel_is_reconciled_by_refetch() {
    let api = Arc::new(MockApi::new());
    let trip = make_trip(Uuid::new_v4(), 3);
    let mut booking = make_booking(trip.id, 1, BookingStatus::Booked);
    let manager = setup(&api, vec![trip], vec![booking.clone()]);

    // The driver completed the ride while our view still says `booked`
    booking.set_status(BookingStatus::Completed);
    api.seed_booking(booking.clone());

    let err = manager.cancel(booking.id, None).await.unwrap_err();
    assert!(matches!(err, ManagerError::Remote { .. }));
    // The refetch pulled the authoritative state in
    assert_eq!(
        manager.booking(&booking.id).unwrap().status,
        BookingStatus::Completed
    );
}

#[tokio::test]
async fn test_seat_capacity_is_enforced_by_the_server_and_reconciled() {
    let api = Arc::new(MockApi::new());
    let trip = make_trip(Uuid::new_v4(), 3);
    let manager = setup(&api, vec![trip.clone()], vec![]);

    manager
        .create_booking(trip.id, 2, PaymentMethod::Cod)
        .await
        .unwrap();

    // Local validation still permits this: the cached trip shows headroom
    // and only the server knows the committed total. The server refuses.
    let err = manager
        .create_booking(trip.id, 2, PaymentMethod::Cod)
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::Remote { .. }));

    assert!(manager.seats_committed(&trip.id) <= trip.total_seats);

    // One more seat still fits
    manager
        .create_booking(trip.id, 1, PaymentMethod::Cod)
        .await
        .unwrap();
    assert_eq!(manager.seats_committed(&trip.id), 3);
}

#[tokio::test]
async fn test_over_ask_is_rejected_locally() {
    let api = Arc::new(MockApi::new());
    let trip = make_trip(Uuid::new_v4(), 2);
    let manager = setup(&api, vec![trip.clone()], vec![]);

    let err = manager
        .create_booking(trip.id, 5, PaymentMethod::Cod)
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::Transition(_)));
    let err = manager
        .create_booking(trip.id, 0, PaymentMethod::Cod)
        .await
        .unwrap_err();
    assert!(matches!(err, ManagerError::Transition(_)));
    assert_eq!(api.lock().create_calls, 0);
}
