//! Bindings to the database.
//!
//! > **DAL**, for lack of a better term (borrowing this one from "data access layer" since I don't
//! > want to use "model"), is the only module that does any talking to the database, or any other
//! > IO or interaction with other kinds of externalized state for that matter.

#[allow(dead_code, unused_import_braces)]
mod schema;

use crate::{
    dal::schema::{auths, tracked_flights, users},
    schema::{FlightDetails, TrackedFlight, Tracking, User},
    util::blocking,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use diesel::{
    connection::SimpleConnection,
    dsl::{delete, insert_into},
    prelude::*,
    r2d2::{ConnectionManager, CustomizeConnection, Pool},
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use failure::{format_err, Error, Fail, Fallible};
use log::{debug, info};
use std::sync::Arc;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// The error returned when creating a user whose username or email is already in use.
#[derive(Debug, Fail)]
#[fail(display = "That {} is already taken", field)]
pub struct AlreadyTaken {
    /// The column that collided; either `"username"` or `"email"`.
    pub field: &'static str,
}

/// A pool of connections to the database.
#[allow(missing_debug_implementations)]
#[derive(Clone)]
pub struct DB {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
}

impl DB {
    /// Connects to the SQLite database at the given path (or `:memory:`), creating and migrating
    /// it as needed.
    pub fn connect(database_url: &str) -> Result<DB, Error> {
        let mut builder = Pool::<ConnectionManager<SqliteConnection>>::builder()
            .connection_customizer(Box::new(ConnectionOptions));
        if database_url == ":memory:" {
            // Every connection to :memory: is its own database.
            builder = builder.max_size(1);
        }
        let pool = Arc::new(builder.build(ConnectionManager::new(database_url))?);

        let mut conn = pool.get()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| format_err!("Couldn't run migrations: {}", err))?;
        for migration in applied {
            info!("Applied migration {}", migration);
        }

        Ok(DB { pool })
    }

    /// Creates a session for the given user, valid until `expires`, returning its token.
    pub async fn create_session(&self, user: i32, expires: DateTime<Utc>) -> Fallible<Uuid> {
        self.async_query(move |conn| {
            let token = Uuid::new_v4();
            insert_into(auths::table)
                .values((
                    auths::id.eq(token.to_string()),
                    auths::user_id.eq(user),
                    auths::expires.eq(expires.naive_utc()),
                ))
                .execute(conn)
                .map(|_| token)
        })
        .await
    }

    /// Creates a user, returning their ID.
    pub async fn create_user(
        &self,
        username: String,
        email: String,
        password_hash: String,
    ) -> Fallible<i32> {
        self.async_query(move |conn| {
            insert_into(users::table)
                .values((
                    users::username.eq(&username),
                    users::email.eq(&email),
                    users::password_hash.eq(&password_hash),
                ))
                .returning(users::id)
                .get_result::<i32>(conn)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
                        let field = if info.message().contains("users.email") {
                            "email"
                        } else {
                            "username"
                        };
                        Error::from(AlreadyTaken { field })
                    }
                    err => Error::from(err),
                })
        })
        .await
    }

    /// Deletes a session. Deleting a session that doesn't exist is not an error.
    pub async fn delete_session(&self, token: Uuid) -> Fallible<()> {
        self.async_query(move |conn| {
            delete(auths::table.find(token.to_string()))
                .execute(conn)
                .map(|_| ())
        })
        .await
    }

    /// Deletes a user, along with their sessions and tracked flights. Returns whether the user
    /// existed.
    pub async fn delete_user(&self, user: i32) -> Fallible<bool> {
        self.async_query(move |conn| {
            delete(users::table.find(user))
                .execute(conn)
                .map(|n| n > 0)
        })
        .await
    }

    /// Looks up a session, returning the user it belongs to if it hasn't expired.
    pub async fn get_session_user(&self, token: Uuid) -> Fallible<Option<User>> {
        self.async_query(move |conn| {
            auths::table
                .inner_join(users::table)
                .filter(auths::id.eq(token.to_string()))
                .filter(auths::expires.gt(Utc::now().naive_utc()))
                .select(UserRow::as_select())
                .first::<UserRow>(conn)
                .optional()
                .map(|row| row.map(User::from))
        })
        .await
    }

    /// Gets a user by username.
    pub async fn get_user_by_username(&self, username: String) -> Fallible<Option<User>> {
        self.async_query(move |conn| {
            users::table
                .filter(users::username.eq(&username))
                .select(UserRow::as_select())
                .first::<UserRow>(conn)
                .optional()
                .map(|row| row.map(User::from))
        })
        .await
    }

    /// Lists the flights a user tracks, in the order they were first tracked.
    pub async fn list_tracked_flights(&self, user: i32) -> Fallible<Vec<TrackedFlight>> {
        self.async_query(move |conn| {
            tracked_flights::table
                .filter(tracked_flights::user_id.eq(user))
                .order(tracked_flights::id.asc())
                .select(FlightRow::as_select())
                .load::<FlightRow>(conn)
                .map(|rows| rows.into_iter().map(TrackedFlight::from).collect())
        })
        .await
    }

    /// Tracks a flight for a user, unless they already track it. The existing record wins; the
    /// given details are only used for a new one.
    ///
    /// The check and the insert happen in a single `IMMEDIATE` transaction, so SQLite's write
    /// lock is held across both, and concurrent calls can't both insert. The unique constraint on
    /// `(user_id, flight_number)` backs this up.
    pub async fn track_flight(
        &self,
        user: i32,
        flight_number: String,
        details: FlightDetails,
    ) -> Fallible<Tracking> {
        self.async_query(move |conn| {
            conn.immediate_transaction(|conn| {
                let existing = tracked_flights::table
                    .filter(tracked_flights::user_id.eq(user))
                    .filter(tracked_flights::flight_number.eq(&flight_number))
                    .select(FlightRow::as_select())
                    .first::<FlightRow>(conn)
                    .optional()?;
                if let Some(row) = existing {
                    debug!("User {} already tracks {}", user, flight_number);
                    return Ok(Tracking::AlreadyTracked(row.into()));
                }

                let row = insert_into(tracked_flights::table)
                    .values(NewFlight {
                        user_id: Some(user),
                        flight_number: &flight_number,
                        departing_city: &details.departing_city,
                        arriving_city: &details.arriving_city,
                        scheduled_departure: details.scheduled_departure.naive_utc(),
                        scheduled_arrival: details.scheduled_arrival.naive_utc(),
                        created_at: Utc::now().naive_utc(),
                    })
                    .returning(FlightRow::as_returning())
                    .get_result::<FlightRow>(conn)?;
                Ok::<_, DieselError>(Tracking::Created(row.into()))
            })
        })
        .await
    }

    /// Performs a query "asynchronously." Diesel does not support async, so the query runs on
    /// the blocking pool via `crate::util::blocking`, with a connection checked out of the pool
    /// for its duration.
    ///
    /// NOTE: SQLite serializes writers, so the pool size mostly buys concurrent reads.
    async fn async_query<E, F, T>(&self, func: F) -> Fallible<T>
    where
        E: Into<Error>,
        F: 'static + Send + FnOnce(&mut SqliteConnection) -> Result<T, E>,
        T: 'static + Send,
    {
        let pool = self.pool.clone();
        blocking(move || {
            let mut conn = pool.get()?;
            func(&mut conn).map_err(|e| e.into())
        })
        .await
    }
}

/// Per-connection settings. SQLite doesn't enforce foreign keys (and hence cascading deletes)
/// unless asked to, and gives up on a locked database immediately by default.
#[derive(Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = users)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> User {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
        }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = tracked_flights)]
struct FlightRow {
    id: i32,
    user_id: Option<i32>,
    flight_number: String,
    departing_city: String,
    arriving_city: String,
    scheduled_departure: NaiveDateTime,
    scheduled_arrival: NaiveDateTime,
    created_at: NaiveDateTime,
}

impl From<FlightRow> for TrackedFlight {
    fn from(row: FlightRow) -> TrackedFlight {
        TrackedFlight {
            id: row.id,
            user_id: row.user_id,
            flight_number: row.flight_number,
            details: FlightDetails {
                departing_city: row.departing_city,
                arriving_city: row.arriving_city,
                scheduled_departure: Utc.from_utc_datetime(&row.scheduled_departure),
                scheduled_arrival: Utc.from_utc_datetime(&row.scheduled_arrival),
            },
            created_at: Utc.from_utc_datetime(&row.created_at),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tracked_flights)]
struct NewFlight<'a> {
    user_id: Option<i32>,
    flight_number: &'a str,
    departing_city: &'a str,
    arriving_city: &'a str,
    scheduled_departure: NaiveDateTime,
    scheduled_arrival: NaiveDateTime,
    created_at: NaiveDateTime,
}
