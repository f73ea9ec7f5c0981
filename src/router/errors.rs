use crate::{
    logic::{auth::AuthError, flights::TrackError, gate::Continuation},
    router::util::{see_other, Failed},
    util::log_err,
    view::render_html,
};
use failure::Error;
use serde_json::json;
use warp::{
    http::StatusCode,
    reject::Reject,
    reply::{Reply, Response},
    Rejection,
};

/// The rejection for a gated request made without a live session.
#[derive(Debug)]
pub struct Detour(pub Continuation);

impl Reject for Detour {}

/// Turns the rejections this crate produces into responses. Anything else (404s and the like) is
/// left to warp.
pub async fn recover(rej: Rejection) -> Result<Response, Rejection> {
    if let Some(Detour(continuation)) = rej.find::<Detour>() {
        return Ok(match continuation.login_url() {
            Ok(url) => see_other(&url),
            Err(err) => last_chance(&err),
        });
    }
    if let Some(Failed(err)) = rej.find::<Failed>() {
        return Ok(failure_page(err));
    }
    Err(rej)
}

/// Renders an error for the user. Validation errors get their message shown; anything else is
/// logged and shown as a generic failure.
pub fn failure_page(err: &Error) -> Response {
    let (status, message) = if let Some(track_err) = err.downcast_ref::<TrackError>() {
        match track_err {
            TrackError::Unauthenticated => return see_other("/accounts/login"),
            TrackError::InvalidFlightNumber(_) => (StatusCode::BAD_REQUEST, track_err.to_string()),
        }
    } else if let Some(auth_err) = err.downcast_ref::<AuthError>() {
        (StatusCode::BAD_REQUEST, auth_err.to_string())
    } else {
        log_err(err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something broke on our end. Please try again in a bit.".to_string(),
        )
    };

    match render_html(status, "error.html", json!({ "me": null, "message": message })) {
        Ok(resp) => resp,
        Err(err) => {
            log_err(&err);
            last_chance(&err)
        }
    }
}

/// A last-chance handler for errors that can't even be rendered with a template.
pub fn last_chance(err: &Error) -> Response {
    let mut msg = "Internal Server Error; please report the following:\n".to_string();
    for cause in err.iter_chain() {
        msg.push('\n');
        msg += &cause.to_string();
    }
    warp::reply::with_status(msg, StatusCode::INTERNAL_SERVER_ERROR).into_response()
}
