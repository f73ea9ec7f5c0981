//! The gate in front of everything that needs a logged-in user.
//!
//! Gated requests are described by an `Action`. If nobody is logged in, the action isn't
//! dropped: it becomes a `Continuation`, which rides along through the login form as the `next`
//! parameter, and gets dispatched once the user has logged in.

use crate::{
    dal::DB,
    logic::{flights, lookup::FlightLookup},
    schema::User,
};
use failure::Fallible;
use std::fmt;

/// Something a logged-in user can ask to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Start tracking a flight.
    TrackFlight {
        /// The flight number, as given by the user. It gets validated when the action runs.
        flight_number: String,
    },

    /// Look at one's own tracked flights.
    ViewProfile,
}

impl Action {
    /// Parses the textual form of an action, as produced by its `Display` impl. Anything else,
    /// including links to other sites, is `None`.
    pub fn parse(next: &str) -> Option<Action> {
        let path = next.strip_prefix('/')?;
        let segments = path.split('/').collect::<Vec<_>>();
        match segments.as_slice() {
            ["flights", flight_number, "track"] if !flight_number.is_empty() => {
                Some(Action::TrackFlight {
                    flight_number: flight_number.to_string(),
                })
            }
            ["accounts", "profile"] => Some(Action::ViewProfile),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::TrackFlight { flight_number } => write!(fmt, "/flights/{}/track", flight_number),
            Action::ViewProfile => fmt.write_str("/accounts/profile"),
        }
    }
}

/// An action deferred until somebody logs in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Continuation(pub Action);

impl Continuation {
    /// The URL of the login page, carrying this continuation.
    pub fn login_url(&self) -> Fallible<String> {
        let query = serde_urlencoded::to_string(&[("next", self.0.to_string())])?;
        Ok(format!("/accounts/login?{}", query))
    }
}

/// What the gate decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gate {
    /// The user is logged in; go ahead.
    Proceed(User, Action),

    /// Nobody is logged in; go log in first, then come back.
    Detour(Continuation),
}

/// Decides whether an action may go ahead. An expired session has already been turned into
/// `None` by the time it gets here.
pub fn authorize(principal: Option<User>, action: Action) -> Gate {
    match principal {
        Some(user) => Gate::Proceed(user, action),
        None => Gate::Detour(Continuation(action)),
    }
}

/// Runs an action for a logged-in user, returning where they should go afterwards.
pub async fn dispatch(
    db: &DB,
    lookup: &dyn FlightLookup,
    user: &User,
    action: &Action,
) -> Fallible<String> {
    match action {
        Action::TrackFlight { flight_number } => {
            let _ = flights::track(db, lookup, Some(user.id), flight_number).await?;
        }
        Action::ViewProfile => {}
    }
    Ok(Action::ViewProfile.to_string())
}

/// Picks up where a login detour left off: dispatches the `next` action if there is a sensible
/// one, and otherwise just sends the user to their profile.
pub async fn resume(
    db: &DB,
    lookup: &dyn FlightLookup,
    user: &User,
    next: Option<&str>,
) -> Fallible<String> {
    let action = next
        .and_then(Action::parse)
        .unwrap_or(Action::ViewProfile);
    dispatch(db, lookup, user, &action).await
}
