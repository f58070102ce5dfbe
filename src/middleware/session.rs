use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use time::Duration;
use tracing::debug;

use crate::error::LOGIN_PATH;
use crate::router::ConsoleState;
use crate::service::session_store::{SESSION_TTL, SessionId, SessionStore};
use crate::types::credential::Credential;

pub const SESSION_COOKIE: &str = "tabula_sid";

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub credential: Credential,
}

/// Session id from the private cookie, if present and well formed.
pub fn session_id(jar: &PrivateCookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| SessionId::parse(c.value()))
}

/// Resolve the caller's session. No session is routine: the caller is sent
/// to the login page rather than shown an error.
pub async fn require_session(
    jar: &PrivateCookieJar,
    store: &SessionStore,
) -> Result<Session, Redirect> {
    let Some(id) = session_id(jar) else {
        debug!("no session cookie; redirecting to login");
        return Err(Redirect::to(LOGIN_PATH));
    };
    match store.get(&id).await {
        Some(credential) => Ok(Session { id, credential }),
        None => {
            debug!("unknown session; redirecting to login");
            Err(Redirect::to(LOGIN_PATH))
        }
    }
}

/// Extractor guarding every data-bearing route.
#[derive(Debug, Clone)]
pub struct RequireSession(pub Session);

impl FromRequestParts<ConsoleState> for RequireSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ConsoleState,
    ) -> Result<Self, Self::Rejection> {
        let jar = match PrivateCookieJar::<Key>::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(never) => match never {},
        };
        require_session(&jar, &state.sessions)
            .await
            .map(RequireSession)
            .map_err(IntoResponse::into_response)
    }
}

pub fn build_session_cookie(id: SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(SESSION_TTL.as_secs() as i64))
        .build()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
