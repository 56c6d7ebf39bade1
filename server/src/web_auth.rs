//! Browser-side authentication: password accounts and the `session` cookie.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use getrandom::getrandom;
use poem::web::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    db::{Storage, User},
    handlers::Error,
    pairing::{random_id, unix_timestamp},
};

pub const SESSION_COOKIE: &str = "session";

/// The user behind the request's `session` cookie, if it names a live web session.
pub async fn current_user(cookie_jar: &CookieJar, storage: &dyn Storage) -> Result<Option<User>, Error> {
    match cookie_jar.get(SESSION_COOKIE) {
        Some(cookie) => storage.web_session_user(cookie.value_str()).await,
        None => Ok(None),
    }
}

/// Log in with an existing account, or register the email if it is new.
pub async fn login_or_register(storage: &dyn Storage, email: &str, password: &str) -> Result<User, Error> {
    match storage.find_user_by_email(email).await? {
        Some(user) => {
            if verify_password(password.to_string(), user.password_hash.clone()).await? {
                Ok(user)
            } else {
                Err(Error::InvalidCredentials)
            }
        }
        None => {
            let user = User {
                user_id: random_id()?,
                email: email.to_string(),
                password_hash: hash_password(password.to_string()).await?,
            };
            storage.create_user(user.clone()).await?;

            tracing::info!(user_id = %user.user_id, "registered new user");
            Ok(user)
        }
    }
}

/// Create a web session for `user` and set its cookie.
pub async fn start_session(cookie_jar: &CookieJar, storage: &dyn Storage, user: &User) -> Result<(), Error> {
    let web_session_id = random_id()?;
    storage
        .create_web_session(&web_session_id, &user.user_id, unix_timestamp())
        .await?;

    let mut cookie = Cookie::new_with_str(SESSION_COOKIE, web_session_id);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie_jar.add(cookie);

    Ok(())
}

async fn hash_password(password: String) -> Result<String, Error> {
    let mut salt = [0u8; 16];
    getrandom(&mut salt)?;

    // hashing blocks for tens of milliseconds
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::encode_b64(&salt).map_err(|_| Error::PasswordHash)?;

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| Error::PasswordHash)
    })
    .await?
}

async fn verify_password(password: String, hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|_| Error::PasswordHash)?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await?
}
