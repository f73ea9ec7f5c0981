//! The HTTP server.
//!
//! > **Router** is the the only module that knows anything about HTTP. Every other part of the
//! > system has no knowledge of how the request is really being made. The router's responsibility
//! > is to call into the domain logic, and then render that response data with an appropriate view.

mod auth;
mod errors;
mod flights;
mod util;

use crate::{
    dal::DB,
    logic::lookup::{FlightLookup, PlaceholderLookup},
    router::util::ResultExt,
    schema::User,
    view::render_html,
};
use chrono::Duration;
use failure::Fallible;
use log::{info, warn};
use serde_json::json;
use std::{net::SocketAddr, path::Path, sync::Arc};
use warp::{http::StatusCode, Filter, Rejection};

/// Everything a request handler needs.
#[allow(missing_debug_implementations)]
#[derive(Clone)]
pub struct Context {
    /// The database.
    pub db: DB,

    /// Where details of newly tracked flights come from.
    pub lookup: Arc<dyn FlightLookup>,

    /// How long a login lasts.
    pub session_lifetime: Duration,
}

impl Context {
    /// Creates a context that fills in flight details with placeholders.
    pub fn new(db: DB, session_lifetime: Duration) -> Context {
        Context {
            db,
            lookup: Arc::new(PlaceholderLookup),
            session_lifetime,
        }
    }
}

/// Starts an HTTP server at the given address. If the server ever exits, it gets restarted, so
/// this only returns if the address can't be bound.
pub async fn serve_on(addr: SocketAddr, ctx: Context) -> Fallible<()> {
    loop {
        info!("Starting to serve...");
        let (addr, server) = warp::serve(routes(ctx.clone())).try_bind_ephemeral(addr)?;
        info!("Listening on http://{}", addr);
        server.await;
        warn!("HTTP server exited; restarting...");
    }
}

/// All the routes of the site.
pub fn routes(ctx: Context) -> Resp!() {
    statics()
        .or(route_any! {
            GET () => simple_page(ctx.clone(), "index.html"),
            GET ("accounts" / "login") => auth::login_form(ctx.clone()),
            POST ("accounts" / "login") => auth::login(ctx.clone()),
            GET ("accounts" / "signup") => auth::signup_form(ctx.clone()),
            POST ("accounts" / "signup") => auth::signup(ctx.clone()),
            ANY ("accounts" / "logout") => auth::logout(ctx.clone()),
            POST ("accounts" / "delete") => auth::delete_account(ctx.clone()),
            GET ("accounts" / "profile") => flights::profile(ctx.clone()),
            POST ("flights" / ..) => flights::track(ctx),
        })
        .recover(errors::recover)
        .with(warp::log("flightwatch::router"))
        .boxed()
}

fn statics() -> Resp!() {
    use packer::Packer;

    #[derive(Packer)]
    #[folder = "src/static"]
    struct Assets;

    warp::path("static")
        .and(warp::get())
        .and(warp::path::tail())
        .and_then(|path: warp::path::Tail| async move {
            let body = Assets::get(path.as_str()).ok_or_else(warp::reject::not_found)?;
            let content_type = match Path::new(path.as_str())
                .extension()
                .and_then(|ext| ext.to_str())
            {
                Some("css") => "text/css; charset=utf-8",
                Some("js") => "application/javascript",
                Some("svg") => "image/svg+xml",
                Some("png") => "image/png",
                _ => "application/octet-stream",
            };
            Ok::<_, Rejection>(warp::reply::with_header(
                body.to_vec(),
                "content-type",
                content_type,
            ))
        })
        .boxed()
}

fn simple_page(ctx: Context, name: &'static str) -> Resp!() {
    auth::principal(ctx)
        .and_then(move |me: Option<User>| async move {
            render_html(StatusCode::OK, name, json!({ "me": me })).err_to_rejection()
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dal::testing, logic};
    use tempfile::TempDir;
    use warp::{http::Response, hyper::body::Bytes, test::request};

    const FORM: &str = "application/x-www-form-urlencoded";

    fn context() -> (TempDir, Context) {
        let (dir, db) = testing::db();
        (dir, Context::new(db, Duration::days(1)))
    }

    async fn register_alice(ctx: &Context) {
        let _ = logic::auth::register(
            &ctx.db,
            "alice".to_string(),
            "alice@example.com".to_string(),
            "correct horse".to_string(),
        )
        .await
        .unwrap();
    }

    /// Registers alice and logs her in, returning her cookie.
    async fn alice(ctx: &Context) -> String {
        register_alice(ctx).await;
        let (_, token) =
            logic::auth::login(&ctx.db, "alice", "correct horse", ctx.session_lifetime)
                .await
                .unwrap();
        format!("{}={}", auth::AUTH_COOKIE, token)
    }

    fn header<'a>(res: &'a Response<Bytes>, name: &str) -> Option<&'a str> {
        res.headers().get(name).and_then(|value| value.to_str().ok())
    }

    fn body(res: &Response<Bytes>) -> String {
        String::from_utf8_lossy(res.body()).into_owned()
    }

    /// The `name=value` part of the session cookie the response sets.
    fn set_cookie(res: &Response<Bytes>) -> Option<String> {
        header(res, "set-cookie").map(|cookie| cookie.split(';').next().unwrap_or("").to_string())
    }

    async fn tracked(ctx: &Context) -> Vec<String> {
        let user = ctx
            .db
            .get_user_by_username("alice".to_string())
            .await
            .unwrap()
            .unwrap();
        logic::flights::list(&ctx.db, user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|flight| flight.flight_number)
            .collect()
    }

    #[tokio::test]
    async fn anonymous_tracking_detours_through_login() {
        let (_dir, ctx) = context();
        let res = request()
            .method("POST")
            .path("/flights/AA100/track")
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            header(&res, "location"),
            Some("/accounts/login?next=%2Fflights%2FAA100%2Ftrack")
        );
    }

    #[tokio::test]
    async fn logging_in_resumes_the_detour() {
        let (_dir, ctx) = context();
        register_alice(&ctx).await;

        let res = request()
            .method("POST")
            .path("/accounts/login")
            .header("content-type", FORM)
            .body("username=alice&password=correct+horse&next=%2Fflights%2Faa100%2Ftrack")
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(header(&res, "location"), Some("/accounts/profile"));
        let cookie = set_cookie(&res).unwrap();
        assert_eq!(tracked(&ctx).await, vec!["AA100"]);

        let res = request()
            .path("/accounts/profile")
            .header("cookie", cookie)
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body(&res).contains("AA100"));
    }

    #[tokio::test]
    async fn failed_logins_keep_the_continuation() {
        let (_dir, ctx) = context();
        register_alice(&ctx).await;

        let res = request()
            .method("POST")
            .path("/accounts/login")
            .header("content-type", FORM)
            .body("username=alice&password=wrong+horse&next=%2Fflights%2FAA100%2Ftrack")
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(header(&res, "set-cookie").is_none());
        assert!(body(&res).contains("AA100"));
        assert!(tracked(&ctx).await.is_empty());
    }

    #[tokio::test]
    async fn tracking_twice_keeps_one_record() {
        let (_dir, ctx) = context();
        let cookie = alice(&ctx).await;

        for path in &["/flights/AA100/track", "/flights/BA2/track", "/flights/aa100/track"] {
            let res = request()
                .method("POST")
                .path(path)
                .header("cookie", cookie.as_str())
                .reply(&routes(ctx.clone()))
                .await;
            assert_eq!(res.status(), StatusCode::SEE_OTHER, "{}", path);
            assert_eq!(header(&res, "location"), Some("/accounts/profile"));
        }

        let res = request()
            .method("POST")
            .path("/flights/track")
            .header("cookie", cookie.as_str())
            .header("content-type", FORM)
            .body("flight_number=LH400")
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);

        assert_eq!(tracked(&ctx).await, vec!["AA100", "BA2", "LH400"]);
    }

    #[tokio::test]
    async fn bad_flight_numbers_are_refused() {
        let (_dir, ctx) = context();
        let cookie = alice(&ctx).await;

        let res = request()
            .method("POST")
            .path("/flights/NOT-A-FLIGHT/track")
            .header("cookie", cookie)
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body(&res).contains("look like a flight number"));
        assert!(tracked(&ctx).await.is_empty());
    }

    #[tokio::test]
    async fn stale_cookies_are_anonymous() {
        let (_dir, ctx) = context();
        register_alice(&ctx).await;
        let (_, token) = logic::auth::login(&ctx.db, "alice", "correct horse", Duration::seconds(-1))
            .await
            .unwrap();

        for cookie in vec![format!("auth={}", token), "auth=garbage".to_string()] {
            let res = request()
                .path("/accounts/profile")
                .header("cookie", cookie)
                .reply(&routes(ctx.clone()))
                .await;
            assert_eq!(res.status(), StatusCode::SEE_OTHER);
            assert_eq!(
                header(&res, "location"),
                Some("/accounts/login?next=%2Faccounts%2Fprofile")
            );
        }
    }

    #[tokio::test]
    async fn signing_up_logs_in() {
        let (_dir, ctx) = context();
        let res = request()
            .method("POST")
            .path("/accounts/signup")
            .header("content-type", FORM)
            .body("username=bob&email=bob%40example.com&password=hunter2222&next=%2Fflights%2FUA1%2Ftrack")
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(header(&res, "location"), Some("/accounts/profile"));
        let cookie = set_cookie(&res).unwrap();
        let token = cookie.trim_start_matches("auth=");
        let bob = logic::auth::authed_user(&ctx.db, token).await.unwrap().unwrap();
        let flights = logic::flights::list(&ctx.db, bob.id).await.unwrap();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].flight_number, "UA1");

        let res = request()
            .method("POST")
            .path("/accounts/signup")
            .header("content-type", FORM)
            .body("username=bob&email=bob2%40example.com&password=hunter2222")
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body(&res).contains("already taken"));
        assert!(header(&res, "set-cookie").is_none());
    }

    #[tokio::test]
    async fn logging_out_ends_the_session() {
        let (_dir, ctx) = context();
        let cookie = alice(&ctx).await;

        let res = request()
            .method("POST")
            .path("/accounts/logout")
            .header("cookie", cookie.as_str())
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(header(&res, "location"), Some("/"));
        assert_eq!(set_cookie(&res), Some("auth=".to_string()));

        let token = cookie.trim_start_matches("auth=");
        assert!(logic::auth::authed_user(&ctx.db, token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_an_account_deletes_its_flights() {
        let (_dir, ctx) = context();
        let cookie = alice(&ctx).await;
        let _ = request()
            .method("POST")
            .path("/flights/AA100/track")
            .header("cookie", cookie.as_str())
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(tracked(&ctx).await, vec!["AA100"]);
        let id = ctx
            .db
            .get_user_by_username("alice".to_string())
            .await
            .unwrap()
            .unwrap()
            .id;

        let res = request()
            .method("POST")
            .path("/accounts/delete")
            .header("cookie", cookie.as_str())
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(set_cookie(&res), Some("auth=".to_string()));
        assert!(ctx
            .db
            .get_user_by_username("alice".to_string())
            .await
            .unwrap()
            .is_none());
        assert!(ctx.db.list_tracked_flights(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn form_tracking_survives_the_login_detour() {
        let (_dir, ctx) = context();
        register_alice(&ctx).await;

        let res = request()
            .method("POST")
            .path("/flights/track")
            .header("content-type", FORM)
            .body("flight_number=lh400")
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let location = header(&res, "location").unwrap().to_string();
        assert_eq!(location, "/accounts/login?next=%2Fflights%2Flh400%2Ftrack");

        // Follow the redirect to the form, then post it back the way a browser would.
        let res = request()
            .path(&location)
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let next = location.trim_start_matches("/accounts/login?");
        let res = request()
            .method("POST")
            .path("/accounts/login")
            .header("content-type", FORM)
            .body(format!("username=alice&password=correct+horse&{}", next))
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(header(&res, "location"), Some("/accounts/profile"));
        assert!(set_cookie(&res).is_some());
        assert_eq!(tracked(&ctx).await, vec!["LH400"]);
    }

    #[tokio::test]
    async fn pages_render() {
        let (_dir, ctx) = context();
        let cookie = alice(&ctx).await;

        for path in &["/", "/accounts/login", "/accounts/signup?next=%2Faccounts%2Fprofile"] {
            let res = request().path(path).reply(&routes(ctx.clone())).await;
            assert_eq!(res.status(), StatusCode::OK, "{}", path);
        }

        let res = request()
            .path("/")
            .header("cookie", cookie)
            .reply(&routes(ctx.clone()))
            .await;
        assert!(body(&res).contains("alice"));
    }

    #[tokio::test]
    async fn statics_are_served() {
        let (_dir, ctx) = context();
        let res = request()
            .path("/static/style.css")
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header(&res, "content-type"), Some("text/css; charset=utf-8"));

        let res = request()
            .path("/static/nope.css")
            .reply(&routes(ctx.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
