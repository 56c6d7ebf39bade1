//! Handlers for the browser login pages.

use poem::{
    handler,
    web::{cookie::CookieJar, Data, Form, Html, Query, Redirect},
    IntoResponse, Response,
};
use serde::Deserialize;

use crate::{handlers::Error, pages, routes::AppState, web_auth};

#[derive(Deserialize, Debug, Default)]
pub struct NextParam {
    next: Option<String>,
}

impl NextParam {
    /// Where to go after logging in. Only local paths are followed.
    fn target(&self) -> &str {
        match self.next.as_deref() {
            Some(next) if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') => next,
            _ => "/",
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginForm {
    email: Option<String>,
    password: Option<String>,
}

#[handler]
pub async fn index(cookie_jar: &CookieJar, Data(state): Data<&AppState>) -> poem::Result<Response> {
    match web_auth::current_user(cookie_jar, state.storage.as_ref()).await? {
        Some(user) => Ok(Html(pages::home(&user.email)).into_response()),
        None => Ok(Redirect::see_other("/login").into_response()),
    }
}

#[handler]
pub fn login_page(Query(params): Query<NextParam>) -> Html<String> {
    Html(pages::login_form(params.target()))
}

#[handler]
pub async fn login_submit(
    Query(params): Query<NextParam>,
    Form(form): Form<LoginForm>,
    cookie_jar: &CookieJar,
    Data(state): Data<&AppState>,
) -> poem::Result<Response> {
    let (email, password) = match (form.email, form.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (email.trim().to_string(), password)
        }
        _ => return Err(Error::MissingCredentials.into()),
    };

    let user = web_auth::login_or_register(state.storage.as_ref(), &email, &password).await?;
    web_auth::start_session(cookie_jar, state.storage.as_ref(), &user).await?;

    tracing::info!(user_id = %user.user_id, "user logged in");

    Ok(Redirect::see_other(params.target()).into_response())
}
