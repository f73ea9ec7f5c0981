//! Rendering to templates.
//!
//! > View is the only module that knows anything about HTML, or JSON, or other "renderings" of the
//! > response. I'm happy to call this "view" in common with traditional stateless MVC, because
//! > it's role is largely the same.

use crate::schema::TrackedFlight;
use chrono_humanize::HumanTime;
use failure::Fallible;
use packer::Packer;
use serde::Serialize;
use serde_json::{json, Value};
use tera::{Context, Tera};
use warp::{
    http::StatusCode,
    reply::{Reply, Response},
};

lazy_static::lazy_static! {
    static ref TERA: Tera = {
        #[derive(Packer)]
        #[folder = "src/view/templates"]
        struct Templates;

        let mut tera = Tera::default();
        let templates = Templates::list()
            .filter_map(|name| Templates::get_str(name).map(|body| (name, body)))
            .collect::<Vec<_>>();
        tera.add_raw_templates(templates)
            .expect("The embedded templates are broken");
        tera
    };
}

/// Renders a template as HTML to a String.
pub fn render<T: Serialize>(name: &str, data: T) -> Fallible<String> {
    let context = Context::from_serialize(data)?;
    Ok(TERA.render(name, &context)?)
}

/// Renders a template as HTML to a `warp::Reply`, with the given status.
pub fn render_html<T: Serialize>(status: StatusCode, name: &str, data: T) -> Fallible<Response> {
    let body = render(name, data)?;
    Ok(warp::reply::with_status(warp::reply::html(body), status).into_response())
}

/// Prepares tracked flights for display, adding humanized times.
pub fn flight_rows(flights: &[TrackedFlight]) -> Vec<Value> {
    flights
        .iter()
        .map(|flight| {
            json!({
                "flight": flight,
                "departs": HumanTime::from(flight.details.scheduled_departure).to_string(),
                "tracked": HumanTime::from(flight.created_at).to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FlightDetails, User};
    use chrono::Utc;

    fn alice() -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
        }
    }

    #[test]
    fn every_page_renders() {
        let me = alice();
        let pages = vec![
            ("index.html", json!({ "me": me })),
            ("index.html", json!({ "me": null })),
            ("login.html", json!({ "me": null, "next": "/flights/AA100/track" })),
            ("signup.html", json!({ "me": null, "next": null })),
            ("profile.html", json!({ "me": me, "flights": [] })),
            ("error.html", json!({ "me": null, "message": "Oops" })),
        ];
        for (name, data) in pages {
            assert!(render(name, data).is_ok(), "{} failed to render", name);
        }
    }

    #[test]
    fn profile_lists_flights_without_secrets() {
        let now = Utc::now();
        let flights = vec![TrackedFlight {
            id: 7,
            user_id: Some(1),
            flight_number: "AA100".to_string(),
            details: FlightDetails::placeholder(now),
            created_at: now,
        }];
        let html = render(
            "profile.html",
            json!({ "me": alice(), "flights": flight_rows(&flights) }),
        )
        .unwrap();
        assert!(html.contains("AA100"));
        assert!(html.contains("Unknown"));
        assert!(html.contains("alice"));
        assert!(!html.contains("$argon2id$secret"));
    }

    #[test]
    fn user_input_is_escaped() {
        let html = render(
            "error.html",
            json!({ "me": null, "message": "<script>alert(1)</script>" }),
        )
        .unwrap();
        assert!(!html.contains("<script>"));
    }
}
