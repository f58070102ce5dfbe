use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{HOME_PATH, LOGIN_PATH};
use crate::middleware::session::{build_session_cookie, clear_session_cookie, session_id};
use crate::router::ConsoleState;
use crate::types::credential::Credential;
use crate::types::views::{LOGIN_FAILED, LoginView};

/// Login form body. Never `Debug`.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// GET / -> the login page.
pub async fn root() -> Redirect {
    Redirect::to(LOGIN_PATH)
}

/// GET /login
pub async fn login_page() -> Json<LoginView> {
    Json(LoginView { error: None })
}

/// POST /login -> verifies the credential against the database, rotates the
/// pool onto it and starts a session.
pub async fn login(
    State(state): State<ConsoleState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if state.login_limiter.check_key(&form.username).is_err() {
        warn!("login attempt throttled");
        return login_failed();
    }

    let credential = Credential::new(
        form.username,
        form.password,
        state.settings.connect_target.clone(),
    );
    if let Err(e) = state.provider.login(&credential).await {
        warn!(error = %e, "login rejected");
        return login_failed();
    }

    if let Some(previous) = session_id(&jar) {
        state.sessions.remove(&previous).await;
    }
    let id = state.sessions.create(credential).await;
    let jar = jar.add(build_session_cookie(id, !state.settings.insecure_cookie));

    info!("login succeeded; session started");
    (jar, Redirect::to(HOME_PATH)).into_response()
}

/// POST /logout -> forgets the session and clears its cookie.
pub async fn logout(State(state): State<ConsoleState>, jar: PrivateCookieJar) -> impl IntoResponse {
    if let Some(id) = session_id(&jar) {
        state.sessions.remove(&id).await;
        info!("session ended");
    }
    (jar.remove(clear_session_cookie()), Redirect::to(LOGIN_PATH))
}

fn login_failed() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(LoginView {
            error: Some(LOGIN_FAILED),
        }),
    )
        .into_response()
}
