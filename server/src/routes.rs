use std::time::Duration;

use poem::{
    get,
    middleware::{CookieJarManager, Tracing},
    Endpoint, EndpointExt, Route,
};
use shared::constants::CLI_LOGIN_PATH;

use crate::{
    db::SharedStorage,
    handlers::{
        cli_login::{cli_login_bind, cli_login_poll},
        login::{index, login_page, login_submit},
    },
};

/// Everything the handlers share, attached to every request.
#[derive(Clone)]
pub struct AppState {
    pub storage: SharedStorage,
    /// How long a bound CLI session stays fulfilled before it is reported as expired.
    pub pairing_ttl: Duration,
}

pub fn app(state: AppState) -> impl Endpoint {
    Route::new()
        .at("/", get(index))
        .at("/login", get(login_page).post(login_submit))
        .at(CLI_LOGIN_PATH, get(cli_login_bind))
        .at(format!("{CLI_LOGIN_PATH}/:session"), get(cli_login_poll))
        .with(CookieJarManager::new())
        .with(Tracing)
        .data(state)
}
