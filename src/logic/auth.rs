//! Authentication and authorization-related logic.

use crate::{
    dal::{AlreadyTaken, DB},
    schema::User,
    util::blocking,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use failure::{format_err, Fail, Fallible};
use log::{info, warn};
use uuid::Uuid;

/// Errors a user can fix by filling out a form differently.
#[derive(Debug, Fail, PartialEq, Eq)]
pub enum AuthError {
    /// The username has the wrong length or characters.
    #[fail(display = "Your username must be 3 to 32 letters, digits, or underscores.")]
    BadUsername,

    /// The email address doesn't look like one.
    #[fail(display = "That doesn't look like an email address...")]
    BadEmail,

    /// The password is too short.
    #[fail(display = "Your password must be at least 8 characters.")]
    BadPassword,

    /// Somebody else has the username.
    #[fail(display = "This username is already taken.")]
    UsernameTaken,

    /// Somebody else registered with the email address.
    #[fail(display = "This email is already registered.")]
    EmailTaken,

    /// The username or the password is wrong. Which one isn't said.
    #[fail(display = "That username and password don't match.")]
    InvalidCredentials,
}

/// Returns the user authenticated by the given token, if any. Malformed, unknown, and expired
/// tokens all just mean nobody is logged in.
pub async fn authed_user(db: &DB, token: &str) -> Fallible<Option<User>> {
    match token.parse() {
        Ok(token) => db.get_session_user(token).await,
        Err(_) => Ok(None),
    }
}

/// Creates a new user, returning their ID.
pub async fn register(db: &DB, username: String, email: String, password: String) -> Fallible<i32> {
    check_username(&username)?;
    check_email(&email)?;
    if password.chars().count() < 8 {
        return Err(AuthError::BadPassword.into());
    }

    let password_hash = blocking(move || hash_password(&password)).await?;
    match db.create_user(username.clone(), email, password_hash).await {
        Ok(id) => {
            info!("Registered user {} ({})", username, id);
            Ok(id)
        }
        Err(err) => match err.downcast::<AlreadyTaken>() {
            Ok(AlreadyTaken { field: "email" }) => Err(AuthError::EmailTaken.into()),
            Ok(AlreadyTaken { .. }) => Err(AuthError::UsernameTaken.into()),
            Err(err) => Err(err),
        },
    }
}

/// Checks a user's password, and starts a session for them lasting `lifetime`. Returns the user
/// and the session's token.
pub async fn login(
    db: &DB,
    username: &str,
    password: &str,
    lifetime: Duration,
) -> Fallible<(User, Uuid)> {
    let user = match db.get_user_by_username(username.to_string()).await? {
        Some(user) => user,
        None => {
            warn!("Login attempt for unknown user {:?}", username);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let hash = user.password_hash.clone();
    let password = password.to_string();
    if !blocking(move || Ok(verify_password(&password, &hash))).await? {
        warn!("Wrong password for user {:?}", username);
        return Err(AuthError::InvalidCredentials.into());
    }

    let expires = Utc::now()
        .checked_add_signed(lifetime)
        .ok_or_else(|| format_err!("A session lasting {} would never expire", lifetime))?;
    let token = db.create_session(user.id, expires).await?;
    info!("User {} logged in", user.username);
    Ok((user, token))
}

/// Ends the session with the given token, if it exists.
pub async fn logout(db: &DB, token: &str) -> Fallible<()> {
    match token.parse() {
        Ok(token) => db.delete_session(token).await,
        Err(_) => Ok(()),
    }
}

/// Deletes a user's account. Their sessions and tracked flights go with it.
pub async fn delete_account(db: &DB, user: &User) -> Fallible<()> {
    if db.delete_user(user.id).await? {
        info!("Deleted user {}", user.username);
    }
    Ok(())
}

fn check_username(username: &str) -> Result<(), AuthError> {
    let ok_len = username.len() >= 3 && username.len() <= 32;
    if ok_len && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(AuthError::BadUsername)
    }
}

fn check_email(email: &str) -> Result<(), AuthError> {
    let mut parts = email.splitn(2, '@');
    match (parts.next(), parts.next()) {
        (Some(local), Some(domain))
            if !local.is_empty() && !domain.is_empty() && email.len() <= 254 =>
        {
            Ok(())
        }
        _ => Err(AuthError::BadEmail),
    }
}

fn hash_password(password: &str) -> Fallible<String> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| format_err!("Couldn't hash password: {}", err))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match (PasswordHash::new(hash), hasher()) {
        (Ok(hash), Ok(hasher)) => hasher.verify_password(password.as_bytes(), &hash).is_ok(),
        _ => false,
    }
}

#[cfg(not(test))]
fn hasher() -> Fallible<Argon2<'static>> {
    Ok(Argon2::default())
}

/// Minimum-cost parameters for tests.
#[cfg(test)]
fn hasher() -> Fallible<Argon2<'static>> {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
        .map_err(|err| format_err!("{}", err))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}
