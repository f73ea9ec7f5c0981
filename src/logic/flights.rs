//! Tracking flights.

use crate::{
    dal::DB,
    logic::lookup::FlightLookup,
    schema::{TrackedFlight, Tracking},
};
use chrono::Utc;
use failure::{Fail, Fallible};
use log::info;

/// Errors from trying to track a flight.
#[derive(Debug, Fail, PartialEq, Eq)]
pub enum TrackError {
    /// Nobody is logged in.
    #[fail(display = "You need to log in to track flights.")]
    Unauthenticated,

    /// The flight number doesn't look like one.
    #[fail(display = "{:?} doesn't look like a flight number.", _0)]
    InvalidFlightNumber(String),
}

/// Normalizes a flight number to upper case, checking that it's 2 to 10 ASCII letters and
/// digits.
pub fn normalize_flight_number(raw: &str) -> Result<String, TrackError> {
    let trimmed = raw.trim();
    let ok_len = trimmed.len() >= 2 && trimmed.len() <= 10;
    if ok_len && trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(TrackError::InvalidFlightNumber(raw.to_string()))
    }
}

/// Starts tracking a flight for the given user. Tracking a flight the user already tracks returns
/// the existing record untouched.
pub async fn track(
    db: &DB,
    lookup: &dyn FlightLookup,
    user: Option<i32>,
    flight_number: &str,
) -> Fallible<Tracking> {
    let user = user.ok_or(TrackError::Unauthenticated)?;
    let flight_number = normalize_flight_number(flight_number)?;
    let details = lookup.lookup(&flight_number, Utc::now());

    let tracking = db.track_flight(user, flight_number, details).await?;
    if tracking.is_new() {
        info!(
            "User {} started tracking {}",
            user,
            tracking.flight().flight_number
        );
    }
    Ok(tracking)
}

/// Lists the flights a user tracks, in the order they started tracking them.
pub async fn list(db: &DB, user: i32) -> Fallible<Vec<TrackedFlight>> {
    db.list_tracked_flights(user).await
}
