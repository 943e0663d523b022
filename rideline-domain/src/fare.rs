use serde::{Deserialize, Serialize};

/// Vehicle class used for fare estimation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VehicleClass {
    Bike,
    Car,
    Electric,
}

impl VehicleClass {
    /// Base fare in minor currency units
    fn base_fare(&self) -> i64 {
        match self {
            VehicleClass::Bike => 50,
            VehicleClass::Car => 100,
            VehicleClass::Electric => 80,
        }
    }

    /// Per-kilometre rate in minor currency units
    fn rate_per_km(&self) -> i64 {
        match self {
            VehicleClass::Bike => 15,
            VehicleClass::Car => 30,
            VehicleClass::Electric => 25,
        }
    }
}

/// Estimated fare for a ride: `round(base + distance * rate)`.
///
/// Centralized here because several views used to carry their own copy of
/// the tables and drifted apart.
pub fn estimate(distance_km: f64, class: VehicleClass) -> i64 {
    let raw = class.base_fare() as f64 + distance_km * class.rate_per_km() as f64;
    raw.round() as i64
}
