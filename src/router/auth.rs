use crate::{
    logic::{
        self,
        auth::AuthError,
        gate::{Action, Gate},
    },
    router::{
        errors::{failure_page, Detour},
        util::{form, reject, see_other, with, ResultExt},
        Context,
    },
    schema::User,
    view::render_html,
};
use chrono::Duration;
use serde_derive::Deserialize;
use serde_json::json;
use uuid::Uuid;
use warp::{
    http::StatusCode,
    reply::{Reply, Response},
    Filter, Rejection,
};

/// The cookie holding the session token.
pub const AUTH_COOKIE: &str = "auth";

/// A filter that resolves the user's authentication cookie, if it names a live session.
pub fn principal(ctx: Context) -> impl Clone + Filter<Extract = (Option<User>,), Error = Rejection> {
    warp::cookie::optional(AUTH_COOKIE)
        .and(with(ctx))
        .and_then(|token: Option<String>, ctx: Context| async move {
            match token {
                Some(token) => logic::auth::authed_user(&ctx.db, &token)
                    .await
                    .err_to_rejection(),
                None => Ok(None),
            }
        })
}

/// A filter that lets the action through only for a logged-in user. Otherwise, the request is
/// rejected with a `Detour` carrying the action, which `errors::recover` turns into a redirect
/// to the login page.
pub fn gate<F>(
    ctx: Context,
    action: F,
) -> impl Clone + Filter<Extract = (User, Action), Error = Rejection>
where
    F: 'static + Clone + Send + Sync + Filter<Extract = (Action,), Error = Rejection>,
{
    action
        .and(principal(ctx))
        .and_then(|action: Action, me: Option<User>| async move {
            match logic::gate::authorize(me, action) {
                Gate::Proceed(user, action) => Ok((user, action)),
                Gate::Detour(continuation) => Err(warp::reject::custom(Detour(continuation))),
            }
        })
        .untuple_one()
}

#[derive(Debug, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

pub fn login_form(ctx: Context) -> Resp!() {
    warp::query::<NextQuery>()
        .and(principal(ctx))
        .and_then(|query: NextQuery, me: Option<User>| async move {
            render_html(
                StatusCode::OK,
                "login.html",
                json!({ "me": me, "next": query.next }),
            )
            .err_to_rejection()
        })
        .boxed()
}

pub fn login(ctx: Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        username: String,
        password: String,
        next: Option<String>,
    }

    form()
        .and(with(ctx))
        .and_then(|form: Form, ctx: Context| async move {
            let result = logic::auth::login(
                &ctx.db,
                &form.username,
                &form.password,
                ctx.session_lifetime,
            )
            .await;
            match result {
                Ok((user, token)) => Ok(start_session(&ctx, &user, token, form.next.as_deref()).await),
                Err(err) => match err.downcast::<AuthError>() {
                    Ok(err) => render_html(
                        StatusCode::UNAUTHORIZED,
                        "login.html",
                        json!({
                            "me": null,
                            "next": form.next,
                            "username": form.username,
                            "error": err.to_string(),
                        }),
                    )
                    .err_to_rejection(),
                    Err(err) => Err(reject(err)),
                },
            }
        })
        .boxed()
}

pub fn signup_form(ctx: Context) -> Resp!() {
    warp::query::<NextQuery>()
        .and(principal(ctx))
        .and_then(|query: NextQuery, me: Option<User>| async move {
            render_html(
                StatusCode::OK,
                "signup.html",
                json!({ "me": me, "next": query.next }),
            )
            .err_to_rejection()
        })
        .boxed()
}

pub fn signup(ctx: Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        username: String,
        email: String,
        password: String,
        next: Option<String>,
    }

    form()
        .and(with(ctx))
        .and_then(|form: Form, ctx: Context| async move {
            let registered = logic::auth::register(
                &ctx.db,
                form.username.clone(),
                form.email.clone(),
                form.password.clone(),
            )
            .await;
            if let Err(err) = registered {
                return match err.downcast::<AuthError>() {
                    Ok(err) => render_html(
                        StatusCode::BAD_REQUEST,
                        "signup.html",
                        json!({
                            "me": null,
                            "next": form.next,
                            "username": form.username,
                            "email": form.email,
                            "error": err.to_string(),
                        }),
                    )
                    .err_to_rejection(),
                    Err(err) => Err(reject(err)),
                };
            }

            let (user, token) = logic::auth::login(
                &ctx.db,
                &form.username,
                &form.password,
                ctx.session_lifetime,
            )
            .await
            .err_to_rejection()?;
            Ok(start_session(&ctx, &user, token, form.next.as_deref()).await)
        })
        .boxed()
}

pub fn logout(ctx: Context) -> Resp!() {
    warp::cookie::optional(AUTH_COOKIE)
        .and(with(ctx))
        .and_then(|token: Option<String>, ctx: Context| async move {
            if let Some(token) = token {
                logic::auth::logout(&ctx.db, &token)
                    .await
                    .err_to_rejection()?;
            }
            Ok::<_, Rejection>(with_cookie(see_other("/"), cleared_cookie()))
        })
        .boxed()
}

pub fn delete_account(ctx: Context) -> Resp!() {
    gate(ctx.clone(), warp::path::end().map(|| Action::ViewProfile))
        .and(with(ctx))
        .and_then(|user: User, _: Action, ctx: Context| async move {
            logic::auth::delete_account(&ctx.db, &user)
                .await
                .err_to_rejection()?;
            Ok::<_, Rejection>(with_cookie(see_other("/"), cleared_cookie()))
        })
        .boxed()
}

/// Sets the session cookie, and picks up whatever the user was doing before they had to log in.
async fn start_session(ctx: &Context, user: &User, token: Uuid, next: Option<&str>) -> Response {
    let resp = match logic::gate::resume(&ctx.db, &*ctx.lookup, user, next).await {
        Ok(landing) => see_other(&landing),
        Err(err) => failure_page(&err),
    };
    with_cookie(resp, session_cookie(token, ctx.session_lifetime))
}

fn session_cookie(token: Uuid, lifetime: Duration) -> String {
    format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        AUTH_COOKIE,
        token,
        lifetime.num_seconds().max(0)
    )
}

fn cleared_cookie() -> String {
    format!("{}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax", AUTH_COOKIE)
}

fn with_cookie(resp: Response, cookie: String) -> Response {
    warp::reply::with_header(resp, "set-cookie", cookie).into_response()
}
