//! Types used throughout.
//!
//! > Schema defines the plain old data types that views operate on. Notably, the schema module has
//! > no knowledge of the database, nor any dependencies on any of the rest of the system.

use chrono::{DateTime, Utc};
use serde_derive::Serialize;

/// The city name used when nothing better is known about a flight.
pub const UNKNOWN_CITY: &str = "Unknown";

/// A user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    /// The user's database ID.
    #[serde(skip)]
    pub id: i32,

    /// The user's name.
    pub username: String,

    /// The user's email address.
    pub email: String,

    /// The user's password, as an argon2 PHC string.
    #[serde(skip)]
    pub password_hash: String,
}

/// Where and when a flight goes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FlightDetails {
    /// The city the flight leaves from.
    pub departing_city: String,

    /// The city the flight lands in.
    pub arriving_city: String,

    /// When the flight is scheduled to leave.
    pub scheduled_departure: DateTime<Utc>,

    /// When the flight is scheduled to land.
    pub scheduled_arrival: DateTime<Utc>,
}

impl FlightDetails {
    /// The details of a flight nobody has looked up yet: unknown cities, scheduled for `now`.
    pub fn placeholder(now: DateTime<Utc>) -> FlightDetails {
        FlightDetails {
            departing_city: UNKNOWN_CITY.to_string(),
            arriving_city: UNKNOWN_CITY.to_string(),
            scheduled_departure: now,
            scheduled_arrival: now,
        }
    }
}

/// A user's interest in a single flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackedFlight {
    /// The database ID. These increase in the order flights were first tracked.
    #[serde(skip)]
    pub id: i32,

    /// The database ID of the user tracking the flight. Only rows older than user accounts lack
    /// one.
    #[serde(skip)]
    pub user_id: Option<i32>,

    /// The normalized flight number, e.g. `AA100`.
    pub flight_number: String,

    /// Where and when the flight goes, as known when it was first tracked.
    #[serde(flatten)]
    pub details: FlightDetails,

    /// When the flight was first tracked.
    pub created_at: DateTime<Utc>,
}

/// The result of asking to track a flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tracking {
    /// The flight wasn't tracked before, and now is.
    Created(TrackedFlight),

    /// The flight was already tracked; the existing record is left as it was.
    AlreadyTracked(TrackedFlight),
}

impl Tracking {
    /// Whether this call created the record.
    pub fn is_new(&self) -> bool {
        match self {
            Tracking::Created(_) => true,
            Tracking::AlreadyTracked(_) => false,
        }
    }

    /// The tracked flight, whether or not it was just created.
    pub fn flight(&self) -> &TrackedFlight {
        match self {
            Tracking::Created(flight) | Tracking::AlreadyTracked(flight) => flight,
        }
    }
}
