use crate::{
    logic::{self, gate::Action},
    router::{
        auth::gate,
        util::{form, reject, see_other, with, ResultExt},
        Context,
    },
    schema::User,
    view::{flight_rows, render_html},
};
use serde_derive::Deserialize;
use serde_json::json;
use warp::{http::StatusCode, Filter, Rejection};

/// Tracking a flight, either as `POST /flights/<FLIGHT>/track` or from the form on the index
/// page, as `POST /flights/track`. The router has already eaten the `flights` segment.
pub fn track(ctx: Context) -> Resp!() {
    #[derive(Debug, Deserialize)]
    struct Form {
        flight_number: String,
    }

    let from_path = warp::path!(String / "track");
    let from_form = warp::path!("track")
        .and(form())
        .map(|form: Form| form.flight_number);
    let action = from_form
        .or(from_path)
        .unify()
        .map(|flight_number: String| Action::TrackFlight { flight_number });

    gate(ctx.clone(), action)
        .and(with(ctx))
        .and_then(|user: User, action: Action, ctx: Context| async move {
            match logic::gate::dispatch(&ctx.db, &*ctx.lookup, &user, &action).await {
                Ok(landing) => Ok(see_other(&landing)),
                Err(err) => Err::<_, Rejection>(reject(err)),
            }
        })
        .boxed()
}

/// The logged-in user's profile, listing the flights they track.
pub fn profile(ctx: Context) -> Resp!() {
    gate(ctx.clone(), warp::path::end().map(|| Action::ViewProfile))
        .and(with(ctx))
        .and_then(|me: User, _: Action, ctx: Context| async move {
            let flights = logic::flights::list(&ctx.db, me.id)
                .await
                .err_to_rejection()?;
            render_html(
                StatusCode::OK,
                "profile.html",
                json!({ "me": me, "flights": flight_rows(&flights) }),
            )
            .err_to_rejection()
        })
        .boxed()
}
