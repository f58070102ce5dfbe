use axum::Router;
use axum::extract::FromRef;
use axum::routing::{get, post};
use axum_extra::extract::cookie::Key;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::provider::ProviderHandle;
use crate::error::ConsoleError;
use crate::handlers::{auth, tables};
use crate::service::session_store::SessionStore;

/// Settings the handlers read on every request.
#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub connect_target: String,
    pub identifying_column: String,
    pub insecure_cookie: bool,
}

#[derive(Clone)]
pub struct ConsoleState {
    pub provider: ProviderHandle,
    pub sessions: SessionStore,
    pub settings: Arc<ConsoleSettings>,
    pub login_limiter: Arc<DefaultKeyedRateLimiter<String>>,
    key: Key,
}

impl ConsoleState {
    pub fn new(provider: ProviderHandle, cfg: &Config) -> Result<Self, ConsoleError> {
        let key = match cfg.basic.cookie_secret.as_deref() {
            Some(secret) => Key::try_from(secret.as_bytes()).map_err(|_| {
                ConsoleError::Config("cookie_secret must be at least 64 bytes".to_string())
            })?,
            None => {
                warn!("no cookie_secret configured; sessions will not survive a restart");
                Key::generate()
            }
        };
        let per_minute =
            NonZeroU32::new(cfg.basic.login_attempts_per_minute).unwrap_or(NonZeroU32::MIN);
        let login_limiter = Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute)));
        spawn_limiter_sweeper(&login_limiter);

        Ok(Self {
            provider,
            sessions: SessionStore::new(),
            settings: Arc::new(ConsoleSettings {
                connect_target: cfg.database.connect_target.clone(),
                identifying_column: cfg.database.identifying_column.clone(),
                insecure_cookie: cfg.basic.insecure_cookie,
            }),
            login_limiter,
            key,
        })
    }
}

/// How often the login limiter forgets usernames whose quota has refilled.
const LIMITER_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Drop limiter entries that are indistinguishable from a fresh key. Login
/// usernames are caller-chosen, so without this the map only grows.
pub fn sweep_login_limiter(limiter: &DefaultKeyedRateLimiter<String>) {
    limiter.retain_recent();
    limiter.shrink_to_fit();
    debug!(tracked = limiter.len(), "login limiter swept");
}

// Ends once the state holding the limiter is gone.
fn spawn_limiter_sweeper(limiter: &Arc<DefaultKeyedRateLimiter<String>>) {
    let limiter = Arc::downgrade(limiter);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LIMITER_SWEEP_PERIOD);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(limiter) = limiter.upgrade() else {
                break;
            };
            sweep_login_limiter(&limiter);
        }
    });
}

impl FromRef<ConsoleState> for Key {
    fn from_ref(state: &ConsoleState) -> Self {
        state.key.clone()
    }
}

pub fn console_router(state: ConsoleState) -> Router {
    Router::new()
        .route("/", get(auth::root))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/home", get(tables::home))
        .route("/tables", post(tables::tables))
        .route("/view-table", post(tables::view_table))
        .route("/update-table", post(tables::update_table))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_forgets_refilled_usernames() {
        let limiter: DefaultKeyedRateLimiter<String> =
            RateLimiter::keyed(Quota::per_second(NonZeroU32::new(1000).unwrap()));
        for i in 0..50 {
            assert!(limiter.check_key(&format!("user{i}")).is_ok());
        }
        assert_eq!(limiter.len(), 50);

        std::thread::sleep(Duration::from_millis(20));
        sweep_login_limiter(&limiter);
        assert!(limiter.is_empty());
    }

    #[test]
    fn sweep_keeps_usernames_still_throttled() {
        let limiter: DefaultKeyedRateLimiter<String> =
            RateLimiter::keyed(Quota::per_minute(NonZeroU32::MIN));
        assert!(limiter.check_key(&"mallory".to_string()).is_ok());
        sweep_login_limiter(&limiter);
        assert_eq!(limiter.len(), 1);
        assert!(limiter.check_key(&"mallory".to_string()).is_err());
    }
}
