pub(crate) mod cli_login;
pub(crate) mod login;

use poem::{error::ResponseError, http::StatusCode, Body, Response};
use shared::crypto::CryptoError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("missing search params")]
    MissingParameters,
    #[error("invalid session id")]
    InvalidSessionId,
    #[error("invalid public key")]
    InvalidKey,
    #[error("missing email or password")]
    MissingCredentials,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email address is already registered")]
    EmailTaken,
    #[error("this login link has already been used")]
    SessionAlreadyBound,
    #[error("cli session not found")]
    SessionNotFound,
    #[error("cli session has expired")]
    SessionExpired,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database returned data of an unexpected shape")]
    DatabaseTypeMismatch,
    #[error("cryptographic failure: {0}")]
    Crypto(#[from] CryptoError),
    #[error("random number generator failed: {0}")]
    Random(#[from] getrandom::Error),
    #[error("password hashing failed")]
    PasswordHash,
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ResponseError for Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::MissingParameters
            | Error::InvalidSessionId
            | Error::InvalidKey
            | Error::MissingCredentials
            | Error::InvalidCredentials => StatusCode::BAD_REQUEST,
            Error::EmailTaken | Error::SessionAlreadyBound => StatusCode::CONFLICT,
            Error::SessionNotFound => StatusCode::NOT_FOUND,
            Error::SessionExpired => StatusCode::GONE,
            Error::Database(_)
            | Error::DatabaseTypeMismatch
            | Error::Crypto(_)
            | Error::Random(_)
            | Error::PasswordHash
            | Error::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn as_response(&self) -> Response {
        let status = self.status();

        // internal details stay in the log
        let body = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            Body::from_string("internal server error".to_string())
        } else {
            Body::from_string(self.to_string())
        };

        Response::builder().status(status).body(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_errors_carry_their_message() {
        let response = Error::MissingParameters.as_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.into_body().into_string().await.unwrap(), "missing search params");
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let response = Error::Crypto(CryptoError::CryptoUnavailable).as_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.into_body().into_string().await.unwrap(), "internal server error");
    }

    #[test]
    fn statuses() {
        assert_eq!(Error::SessionNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::SessionExpired.status(), StatusCode::GONE);
        assert_eq!(Error::InvalidKey.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(Error::SessionAlreadyBound.status(), StatusCode::CONFLICT);
    }
}
