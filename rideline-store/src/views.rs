//! Pure projections over the normalized store.
//!
//! Nothing here touches the network or mutates state: given the same store
//! snapshot and parameters, every function returns deep-equal output. Sorts
//! are made fully deterministic by a canonical pre-sort on (created_at, id)
//! before the stable sort on the requested key.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rideline_domain::{Booking, BookingStatus, Trip};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::store::NormalizedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Newest trip departure first
    Newest,
    /// Oldest trip departure first
    Oldest,
    /// Highest trip rating first; unrated trips count as 0
    HighestRated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    All,
    /// From the most recent Sunday, inclusive
    ThisWeek,
    ThisMonth,
    LastMonth,
}

impl DateRange {
    fn contains(&self, date: NaiveDate, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        match self {
            DateRange::All => true,
            DateRange::ThisWeek => {
                let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
                date >= week_start
            }
            DateRange::ThisMonth => date.year() == today.year() && date.month() == today.month(),
            DateRange::LastMonth => {
                let (year, month) = if today.month() == 1 {
                    (today.year() - 1, 12)
                } else {
                    (today.year(), today.month() - 1)
                };
                date.year() == year && date.month() == month
            }
        }
    }
}

/// Free-text and date-window filter for ride history
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Matched case-insensitively against departure, destination and the
    /// counterpart user's display name
    pub search: Option<String>,
    pub range: DateRange,
}

impl Default for DateRange {
    fn default() -> Self {
        DateRange::All
    }
}

/// A booking joined with its trip, as history views render it
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub booking: Booking,
    pub trip: Trip,
}

/// A driver's trip with every booking referencing it, used to drive the
/// bulk-complete surface
#[derive(Debug, Clone, PartialEq)]
pub struct TripGroup {
    pub trip: Trip,
    pub bookings: Vec<Booking>,
}

/// Pending booking requests on trips owned by `driver_id`, newest first.
pub fn pending_for(store: &NormalizedStore, driver_id: Uuid) -> Vec<Booking> {
    bookings_for_driver(store, driver_id, BookingStatus::Pending)
}

/// Accepted (booked) bookings on trips owned by `driver_id`, newest first.
pub fn booked_for(store: &NormalizedStore, driver_id: Uuid) -> Vec<Booking> {
    bookings_for_driver(store, driver_id, BookingStatus::Booked)
}

fn bookings_for_driver(store: &NormalizedStore, driver_id: Uuid, status: BookingStatus) -> Vec<Booking> {
    let mut out: Vec<Booking> = store
        .bookings()
        .filter(|b| b.status == status)
        .filter(|b| {
            store
                .trip(&b.trip_id)
                .is_some_and(|t| t.driver_id == driver_id)
        })
        .cloned()
        .collect();
    out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
    out
}

/// Ride history for an actor, as passenger or driver, filtered and sorted.
///
/// `now` is caller-supplied so the date windows stay pure and testable.
pub fn history_for(
    store: &NormalizedStore,
    actor_id: Uuid,
    filter: &HistoryFilter,
    sort: SortOrder,
    now: DateTime<Utc>,
) -> Vec<HistoryEntry> {
    let needle = filter
        .search
        .as_deref()
        .map(str::to_lowercase)
        .filter(|s| !s.is_empty());

    let mut entries: Vec<HistoryEntry> = store
        .bookings()
        .filter_map(|booking| {
            let trip = store.trip(&booking.trip_id)?;
            let counterpart = if booking.passenger_id == actor_id {
                &trip.driver_name
            } else if trip.driver_id == actor_id {
                &booking.passenger_name
            } else {
                return None;
            };
            if !filter.range.contains(trip.departure_date, now) {
                return None;
            }
            if let Some(needle) = &needle {
                let hit = trip.departure_location.name.to_lowercase().contains(needle)
                    || trip.destination_location.name.to_lowercase().contains(needle)
                    || counterpart.to_lowercase().contains(needle);
                if !hit {
                    return None;
                }
            }
            Some(HistoryEntry {
                booking: booking.clone(),
                trip: trip.clone(),
            })
        })
        .collect();

    // Canonical order first so equal sort keys come out the same every time
    entries.sort_by(|a, b| (a.booking.created_at, a.booking.id).cmp(&(b.booking.created_at, b.booking.id)));
    match sort {
        SortOrder::Newest => {
            entries.sort_by(|a, b| b.trip.departure_date.cmp(&a.trip.departure_date));
        }
        SortOrder::Oldest => {
            entries.sort_by(|a, b| a.trip.departure_date.cmp(&b.trip.departure_date));
        }
        SortOrder::HighestRated => {
            entries.sort_by(|a, b| {
                let ra = a.trip.rating.unwrap_or(0.0);
                let rb = b.trip.rating.unwrap_or(0.0);
                rb.partial_cmp(&ra).unwrap_or(Ordering::Equal)
            });
        }
    }
    entries
}

/// Trips owned by `driver_id`, each with its bookings. Trips come newest
/// departure first; bookings within a trip oldest first.
pub fn group_by_trip(store: &NormalizedStore, driver_id: Uuid) -> Vec<TripGroup> {
    let mut groups: Vec<TripGroup> = store
        .trips()
        .filter(|t| t.driver_id == driver_id)
        .map(|trip| {
            let mut bookings: Vec<Booking> = store
                .bookings()
                .filter(|b| b.trip_id == trip.id)
                .cloned()
                .collect();
            bookings.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
            TripGroup {
                trip: trip.clone(),
                bookings,
            }
        })
        .collect();
    groups.sort_by(|a, b| {
        (b.trip.departure_date, b.trip.id).cmp(&(a.trip.departure_date, a.trip.id))
    });
    groups
}
