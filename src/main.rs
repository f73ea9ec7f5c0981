use chrono::Duration;
use failure::{bail, Fallible};
use flightwatch::{
    dal::DB,
    router::{serve_on, Context},
    util::log_err,
};
use log::warn;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    process::exit,
};
use structopt::StructOpt;
use tokio::runtime::Builder;

fn main() {
    dotenv::dotenv().ok();

    let options = Options::from_args();
    if let Err(err) = options.start_logger() {
        warn!("Logging couldn't start: {}", err);
    }

    if let Err(err) = run(options) {
        log_err(&err);
        exit(1);
    }
}

fn run(options: Options) -> Fallible<()> {
    let serve_addr = options.serve_addr()?;
    let session_lifetime = session_lifetime(options.session_days)?;

    let runtime = Builder::new_multi_thread().enable_all().build()?;
    let db = DB::connect(&options.database_url)?;
    let ctx = Context::new(db, session_lifetime);
    runtime.block_on(serve_on(serve_addr, ctx))
}

/// The longest a login may last, in days.
const MAX_SESSION_DAYS: i64 = 3650;

/// Checks the `--session-days` option, turning it into a lifetime.
fn session_lifetime(days: i64) -> Fallible<Duration> {
    if days <= 0 || days > MAX_SESSION_DAYS {
        bail!(
            "Sessions must last between 1 and {} days, not {}",
            MAX_SESSION_DAYS,
            days
        );
    }
    match Duration::try_days(days) {
        Some(lifetime) => Ok(lifetime),
        None => bail!("{} days is too long for a session", days),
    }
}

#[derive(Debug, StructOpt)]
#[structopt(setting = structopt::clap::AppSettings::ColoredHelp)]
pub struct Options {
    /// Turns off message output. Passing once prevents logging to syslog. Passing twice or more
    /// disables all logging.
    #[structopt(short = "q", long = "quiet", parse(from_occurrences))]
    quiet: usize,

    /// Increases the verbosity. Default verbosity is warnings and higher to syslog, info and
    /// higher to the console.
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,

    /// The path to the SQLite database. It gets created if it doesn't exist.
    #[structopt(long = "db", env = "DATABASE_URL", default_value = "flightwatch.sqlite3")]
    pub database_url: String,

    /// The host to serve on.
    #[structopt(short = "H", long = "host", env = "HOST", default_value = "::")]
    host: String,

    /// The port to serve on.
    #[structopt(short = "P", long = "port", env = "PORT", default_value = "8080")]
    port: u16,

    /// How many days a login lasts.
    #[structopt(long = "session-days", env = "SESSION_DAYS", default_value = "14")]
    session_days: i64,

    /// The syslog server to send logs to.
    #[structopt(short = "s", long = "syslog-server", env = "SYSLOG_SERVER")]
    syslog_server: Option<String>,
}

impl Options {
    /// Get the address to serve on.
    pub fn serve_addr(&self) -> Fallible<SocketAddr> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .collect::<Vec<_>>();
        if addrs.is_empty() {
            bail!("No matching address exists")
        } else {
            Ok(addrs[0])
        }
    }

    /// Sets up logging as specified by the `-q`, `-s`, and `-v` flags.
    pub fn start_logger(&self) -> Fallible<()> {
        use fern::Dispatch;
        use log::LevelFilter;

        if self.quiet >= 2 {
            return Ok(());
        }

        let (console_ll, syslog_ll) = match self.verbose {
            0 => (LevelFilter::Info, LevelFilter::Warn),
            1 => (LevelFilter::Debug, LevelFilter::Info),
            2 => (LevelFilter::Trace, LevelFilter::Debug),
            _ => (LevelFilter::Trace, LevelFilter::Trace),
        };

        let fern = Dispatch::new().chain(
            Dispatch::new()
                .level(console_ll)
                .format(move |out, message, record| {
                    out.finish(format_args!(
                        "[{}] [{}] {}",
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(std::io::stderr()),
        );

        let fern = if self.quiet == 0 {
            let formatter = syslog::Formatter3164 {
                facility: syslog::Facility::LOG_DAEMON,
                hostname: hostname::get_hostname(),
                process: "flightwatch".to_owned(),
                pid: std::process::id() as i32,
            };

            let syslog = if let Some(ref server) = self.syslog_server {
                syslog::tcp(formatter, server).map_err(failure::SyncFailure::new)?
            } else {
                syslog::unix(formatter.clone())
                    .or_else(|_| syslog::tcp(formatter.clone(), ("127.0.0.1", 601)))
                    .or_else(|_| {
                        syslog::udp(formatter.clone(), ("127.0.0.1", 0), ("127.0.0.1", 514))
                    })
                    .map_err(failure::SyncFailure::new)?
            };

            fern.chain(Dispatch::new().level(syslog_ll).chain(syslog))
        } else {
            fern
        };

        fern.apply()?;
        Ok(())
    }
}
