pub mod store;
pub mod views;

pub use store::{Mutation, NormalizedStore, StoreError};
pub use views::{DateRange, HistoryEntry, HistoryFilter, SortOrder, TripGroup};
