//! Where flight details come from.

use crate::schema::FlightDetails;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// A source of details (cities, schedule) for a flight number.
///
/// Nothing real is wired up yet; `PlaceholderLookup` stands in until a flight data provider is.
pub trait FlightLookup: Debug + Send + Sync {
    /// Returns what is known about the flight. `now` is the time the flight is being tracked at.
    fn lookup(&self, flight_number: &str, now: DateTime<Utc>) -> FlightDetails;
}

/// A lookup that knows nothing, returning `FlightDetails::placeholder` for every flight.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderLookup;

impl FlightLookup for PlaceholderLookup {
    fn lookup(&self, _flight_number: &str, now: DateTime<Utc>) -> FlightDetails {
        FlightDetails::placeholder(now)
    }
}
