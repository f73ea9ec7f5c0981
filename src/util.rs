//! Various utilities.

use failure::Fallible;
use log::error;

/// Logs an error, including its causes and backtrace (if possible).
pub fn log_err(err: &failure::Error) {
    let mut first = true;
    let num_errs = err.iter_chain().count();
    if num_errs <= 1 {
        error!("{}", err);
    } else {
        for cause in err.iter_chain() {
            if first {
                first = false;
                error!("           {}", cause);
            } else {
                error!("caused by: {}", cause);
            }
        }
    }
    let bt = err.backtrace().to_string();
    if bt != "" {
        error!("{}", bt);
    }
}

/// Runs a blocking function on the runtime's blocking thread pool, so it doesn't stall the
/// threads serving requests. Diesel and argon2 both go through here.
pub async fn blocking<F, T>(func: F) -> Fallible<T>
where
    F: 'static + Send + FnOnce() -> Fallible<T>,
    T: 'static + Send,
{
    tokio::task::spawn_blocking(func).await?
}

/// The type of a responder. Since `impl Trait` can't be used in `type` items, this magics one up.
macro_rules! Resp {
    () => { warp::filters::BoxedFilter<(impl warp::Reply,)> };
}

/// Inserts `.or(...)` between the given filters, each guarded by its path and then its method.
macro_rules! route_any {
    ($hm:ident $hp:tt => $h:expr $(, $tm:ident $tp:tt => $t:expr)* $(,)*) => {
        route_any!(@internal @path $hm $hp).and($h)
            $(.or(route_any!(@internal @path $tm $tp).and($t)))*
    };

    (@internal @path $m:ident ()) => {{
        warp::path::end().and(route_any!(@internal @method $m))
    }};
    (@internal @path $m:ident $p:tt) => {{
        use warp::path;
        (path! $p).and(route_any!(@internal @method $m))
    }};

    (@internal @method GET) => {{ warp::get() }};
    (@internal @method POST) => {{ warp::post() }};
    (@internal @method ANY) => {{ warp::any() }};
}
