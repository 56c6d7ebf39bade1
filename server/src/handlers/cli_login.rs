//! Handlers for pairing a CLI with a logged-in browser session.

use poem::{
    handler,
    web::{cookie::CookieJar, Data, Html, Json, Path, Query, Redirect},
    IntoResponse, Request, Response,
};
use shared::{
    client_message::CliLoginParams,
    constants::{is_valid_session_id, CLI_LOGIN_PATH},
    crypto::{import_public_key, EncryptedEnvelope},
    server_message::PollResponse,
    types::RawPublicKey,
};

use crate::{
    db::{BindOutcome, PairingSession},
    handlers::Error,
    pages,
    pairing::{unix_timestamp, PairingStatus},
    routes::AppState,
    web_auth,
};

/// Opened by the user's browser: binds the CLI session to the logged-in user and issues a token.
#[handler]
pub async fn cli_login_bind(
    req: &Request,
    Query(params): Query<CliLoginParams>,
    cookie_jar: &CookieJar,
    Data(state): Data<&AppState>,
) -> poem::Result<Response> {
    let user = match web_auth::current_user(cookie_jar, state.storage.as_ref()).await? {
        Some(user) => user,
        None => {
            let next = req
                .uri()
                .path_and_query()
                .map_or(CLI_LOGIN_PATH, |path| path.as_str());
            let location = format!("/login?next={}", urlencoding::encode(next));

            return Ok(Redirect::see_other(location).into_response());
        }
    };

    let (session_id, pub_key) = match (params.session, params.pub_key) {
        (Some(session_id), Some(pub_key)) => (session_id, pub_key),
        _ => return Err(Error::MissingParameters.into()),
    };

    if !is_valid_session_id(&session_id) {
        return Err(Error::InvalidSessionId.into());
    }

    let client_public_key = parse_public_key(&pub_key)?;

    let pairing = PairingSession::new(session_id, client_public_key, user.user_id)?;
    let outcome = state.storage.bind_pairing(pairing.clone()).await?;

    match &outcome {
        BindOutcome::Created(session) => {
            tracing::info!(session_id = %session.session_id, user_id = %session.user_id, "cli session bound");
        }
        // a different key or user could never receive the token issued for the stored binding
        BindOutcome::Existing(session)
            if session.client_public_key != pairing.client_public_key || session.user_id != pairing.user_id =>
        {
            tracing::warn!(session_id = %session.session_id, "cli session already bound to another key or user");
            return Err(Error::SessionAlreadyBound.into());
        }
        BindOutcome::Existing(session) => {
            tracing::debug!(session_id = %session.session_id, "cli session already bound");
        }
    }

    if outcome.session().status(unix_timestamp(), state.pairing_ttl) == PairingStatus::Expired {
        return Err(Error::SessionExpired.into());
    }

    Ok(Html(pages::cli_login_approved()).into_response())
}

/// Polled by the CLI: returns the access token encrypted to the CLI's public key.
#[handler]
pub async fn cli_login_poll(
    Path(session_id): Path<String>,
    Data(state): Data<&AppState>,
) -> poem::Result<Json<PollResponse>> {
    let pairing = state
        .storage
        .find_pairing(&session_id)
        .await?
        .ok_or(Error::SessionNotFound)?;

    if pairing.status(unix_timestamp(), state.pairing_ttl) == PairingStatus::Expired {
        return Err(Error::SessionExpired.into());
    }

    let recipient = import_public_key(&pairing.client_public_key).map_err(Error::from)?;
    let envelope = EncryptedEnvelope::seal(&recipient, pairing.token_id.as_bytes()).map_err(Error::from)?;

    tracing::debug!(session_id = %pairing.session_id, "delivered encrypted token");

    Ok(Json(PollResponse::from_envelope(&envelope)))
}

/// Decode and validate the CLI's key before anything is stored for it.
fn parse_public_key(pub_key: &str) -> Result<RawPublicKey, Error> {
    let raw = hex::decode(pub_key).map_err(|_| Error::InvalidKey)?;
    import_public_key(&raw).map_err(|_| Error::InvalidKey)?;

    raw.try_into().map_err(|_| Error::InvalidKey)
}
