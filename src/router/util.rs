use failure::Error;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use warp::{
    http::StatusCode,
    reject::Reject,
    reply::{Reply, Response},
    Filter, Rejection,
};

/// A failure from the logic or DAL, carried through warp as a rejection.
#[derive(Debug)]
pub struct Failed(pub Error);

impl Reject for Failed {}

/// Wraps a failure up as a rejection.
pub fn reject(err: Error) -> Rejection {
    warp::reject::custom(Failed(err))
}

/// An extension trait for Results.
pub trait ResultExt<T>: Sized {
    /// Converts an error to a `warp::Rejection`.
    fn err_to_rejection(self) -> Result<T, Rejection>;
}

impl<T, E: Into<Error>> ResultExt<T> for Result<T, E> {
    fn err_to_rejection(self) -> Result<T, Rejection> {
        self.map_err(|e| reject(e.into()))
    }
}

/// Extracts a clone of the given value.
pub fn with<T: 'static + Clone + Send + Sync>(
    t: T,
) -> impl Clone + Filter<Extract = (T,), Error = Infallible> {
    warp::any().map(move || t.clone())
}

/// Extracts a small URL-encoded form body.
pub fn form<T: 'static + DeserializeOwned + Send>(
) -> impl Clone + Filter<Extract = (T,), Error = Rejection> {
    warp::body::content_length_limit(2 * 1024).and(warp::body::form())
}

/// A `303 See Other` to the given location.
pub fn see_other(location: &str) -> Response {
    warp::reply::with_header(StatusCode::SEE_OTHER, "location", location).into_response()
}
