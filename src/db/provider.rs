use crate::config::DatabaseConfig;
use crate::db::dialect::Dialect;
use crate::error::ConsoleError;
use crate::types::credential::Credential;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Connection};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed settings for every pool the provider builds.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub dialect: Dialect,
    /// min = max; the pool never grows or shrinks.
    pub pool_size: u32,
    pub acquire_timeout: Duration,
    pub close_grace: Duration,
}

impl ProviderSettings {
    pub fn from_config(cfg: &DatabaseConfig) -> Result<Self, ConsoleError> {
        if cfg.pool_size == 0 {
            return Err(ConsoleError::Config("pool_size must be at least 1".to_string()));
        }
        Ok(Self {
            dialect: Dialect::from_target(&cfg.connect_target)?,
            pool_size: cfg.pool_size,
            acquire_timeout: cfg.acquire_timeout(),
            close_grace: cfg.close_grace(),
        })
    }
}

/// Messages handled by the connection provider actor.
///
/// Pools are built by the caller, never inside the actor, so a slow or
/// unreachable database only holds up the login that asked for it.
#[derive(Debug)]
pub enum ProviderMessage {
    /// Active pool if it belongs to this credential, `None` if it does not.
    Lookup(Credential, RpcReplyPort<Result<Option<AnyPool>, ConsoleError>>),
    /// Make a freshly built pool for this credential the active one. Replies
    /// with whichever pool is active for the credential afterwards.
    Install(Credential, AnyPool, RpcReplyPort<Result<AnyPool, ConsoleError>>),
    /// Active pool, whoever it belongs to.
    CurrentPool(RpcReplyPort<Result<AnyPool, ConsoleError>>),
    /// Close for good; replies whether the pool drained within the grace period.
    Close(Duration, RpcReplyPort<bool>),
}

/// Handle for interacting with the connection provider actor.
#[derive(Clone)]
pub struct ProviderHandle {
    actor: ActorRef<ProviderMessage>,
    settings: ProviderSettings,
}

impl ProviderHandle {
    pub fn dialect(&self) -> Dialect {
        self.settings.dialect
    }

    /// Check the credential with a standalone connection, then rotate the
    /// pool onto it. Every failure is the same [`ConsoleError::Auth`].
    pub async fn login(&self, credential: &Credential) -> Result<(), ConsoleError> {
        verify(credential).await?;
        self.rotate(credential.clone()).await.map(|_| ())
    }

    /// Build a pool for `credential` and make it the active one.
    pub async fn rotate(&self, credential: Credential) -> Result<AnyPool, ConsoleError> {
        let pool = build_pool(&self.settings, &credential).await?;
        ractor::call!(self.actor, ProviderMessage::Install, credential, pool)
            .map_err(|e| ConsoleError::Actor(format!("Install RPC failed: {e}")))?
    }

    /// Active pool for this credential, rotating first if another login took over.
    pub async fn pool_for(&self, credential: &Credential) -> Result<AnyPool, ConsoleError> {
        let active = ractor::call!(self.actor, ProviderMessage::Lookup, credential.clone())
            .map_err(|e| ConsoleError::Actor(format!("Lookup RPC failed: {e}")))??;
        match active {
            Some(pool) => Ok(pool),
            None => {
                debug!("session credential differs from active pool; rotating");
                self.rotate(credential.clone()).await
            }
        }
    }

    /// Check out a connection from the active pool, waiting up to the
    /// configured acquire timeout.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>, ConsoleError> {
        let pool = ractor::call!(self.actor, ProviderMessage::CurrentPool)
            .map_err(|e| ConsoleError::Actor(format!("CurrentPool RPC failed: {e}")))??;
        checkout(&pool).await
    }

    /// Check out a connection that runs under the session's own credential.
    pub async fn acquire_for(
        &self,
        credential: &Credential,
    ) -> Result<PoolConnection<Any>, ConsoleError> {
        let pool = self.pool_for(credential).await?;
        checkout(&pool).await
    }

    /// Hand a connection back before the end of its scope. Dropping a
    /// [`PoolConnection`] returns it as well, so error paths need nothing.
    pub fn release(&self, conn: PoolConnection<Any>) {
        drop(conn);
    }

    /// Close the active pool; later acquisitions fail with `PoolClosed`.
    pub async fn close(&self, grace: Duration) -> bool {
        match ractor::call!(self.actor, ProviderMessage::Close, grace) {
            Ok(clean) => clean,
            Err(e) => {
                warn!("Close RPC failed: {e}");
                false
            }
        }
    }
}

async fn verify(credential: &Credential) -> Result<(), ConsoleError> {
    let url = credential.connect_url()?;
    let conn = AnyConnection::connect(&url).await.map_err(|e| {
        debug!(error = %e, "credential check failed");
        ConsoleError::Auth
    })?;
    if let Err(e) = conn.close().await {
        debug!(error = %e, "closing verification connection failed");
    }
    Ok(())
}

async fn build_pool(
    settings: &ProviderSettings,
    credential: &Credential,
) -> Result<AnyPool, ConsoleError> {
    let url = credential.connect_url()?;
    AnyPoolOptions::new()
        .min_connections(settings.pool_size)
        .max_connections(settings.pool_size)
        .acquire_timeout(settings.acquire_timeout)
        .connect(&url)
        .await
        .map_err(|e| {
            warn!(error = %e, "building connection pool failed");
            ConsoleError::Auth
        })
}

async fn checkout(pool: &AnyPool) -> Result<PoolConnection<Any>, ConsoleError> {
    pool.acquire().await.map_err(|e| match e {
        sqlx::Error::PoolTimedOut => ConsoleError::PoolExhausted,
        sqlx::Error::PoolClosed => ConsoleError::PoolClosed,
        other => ConsoleError::Database(other),
    })
}

enum PoolState {
    Uninitialized,
    Open { pool: AnyPool, credential: Credential },
    Closed,
}

/// Internal state held by the provider actor.
struct ProviderState {
    settings: ProviderSettings,
    pool: PoolState,
}

/// Owns the process-wide pool: built on first login, replaced on each new
/// login, closed on shutdown.
struct ConnectionProvider;

#[ractor::async_trait]
impl Actor for ConnectionProvider {
    type Msg = ProviderMessage;
    type State = ProviderState;
    type Arguments = ProviderSettings;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        settings: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(
            dialect = ?settings.dialect,
            pool_size = settings.pool_size,
            "ConnectionProvider started; waiting for first login"
        );
        Ok(ProviderState {
            settings,
            pool: PoolState::Uninitialized,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ProviderMessage::Lookup(credential, rp) => {
                let _ = rp.send(lookup(state, &credential));
            }
            ProviderMessage::Install(credential, pool, rp) => {
                let _ = rp.send(self.handle_install(state, credential, pool));
            }
            ProviderMessage::CurrentPool(rp) => {
                let _ = rp.send(current_pool(state));
            }
            ProviderMessage::Close(grace, rp) => {
                let _ = rp.send(self.handle_close(state, grace).await);
            }
        }
        Ok(())
    }
}

fn lookup(state: &ProviderState, credential: &Credential) -> Result<Option<AnyPool>, ConsoleError> {
    match &state.pool {
        PoolState::Open {
            pool,
            credential: active,
        } if active == credential => Ok(Some(pool.clone())),
        PoolState::Open { .. } | PoolState::Uninitialized => Ok(None),
        PoolState::Closed => Err(ConsoleError::PoolClosed),
    }
}

fn current_pool(state: &ProviderState) -> Result<AnyPool, ConsoleError> {
    match &state.pool {
        PoolState::Open { pool, .. } => Ok(pool.clone()),
        PoolState::Uninitialized | PoolState::Closed => Err(ConsoleError::PoolClosed),
    }
}

impl ConnectionProvider {
    fn handle_install(
        &self,
        state: &mut ProviderState,
        credential: Credential,
        pool: AnyPool,
    ) -> Result<AnyPool, ConsoleError> {
        let grace = state.settings.close_grace;
        match &state.pool {
            PoolState::Closed => {
                discard(pool);
                return Err(ConsoleError::PoolClosed);
            }
            // Another request rotated onto the same credential first.
            PoolState::Open {
                pool: active,
                credential: owner,
            } if *owner == credential => {
                let active = active.clone();
                discard(pool);
                return Ok(active);
            }
            _ => {}
        }

        let previous = std::mem::replace(
            &mut state.pool,
            PoolState::Open {
                pool: pool.clone(),
                credential,
            },
        );
        if let PoolState::Open { pool: old, .. } = previous {
            retire(old, grace);
        }
        info!(pool_size = state.settings.pool_size, "connection pool started");
        Ok(pool)
    }

    async fn handle_close(&self, state: &mut ProviderState, grace: Duration) -> bool {
        let previous = std::mem::replace(&mut state.pool, PoolState::Closed);
        let PoolState::Open { pool, .. } = previous else {
            return true;
        };
        match tokio::time::timeout(grace, pool.close()).await {
            Ok(()) => {
                info!("connection pool closed");
                true
            }
            Err(_) => {
                warn!(grace_secs = grace.as_secs(), "connection pool did not drain in time");
                false
            }
        }
    }
}

/// Close a replaced pool in the background. It stays open for `grace` so
/// requests that already hold it can still check out, then gets another
/// `grace` to drain.
fn retire(pool: AnyPool, grace: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        match tokio::time::timeout(grace, pool.close()).await {
            Ok(()) => debug!("previous connection pool drained"),
            Err(_) => warn!(
                grace_secs = grace.as_secs(),
                "previous connection pool still busy after grace period"
            ),
        }
    });
}

/// Close a pool nobody has used yet.
fn discard(pool: AnyPool) {
    tokio::spawn(async move { pool.close().await });
}

/// Spawn the connection provider actor and return a handle.
pub async fn spawn(settings: ProviderSettings) -> Result<ProviderHandle, ConsoleError> {
    install_default_drivers();
    let (actor, _jh) = Actor::spawn(None, ConnectionProvider, settings.clone())
        .await
        .map_err(|e| ConsoleError::Actor(format!("failed to spawn ConnectionProvider: {e}")))?;
    Ok(ProviderHandle { actor, settings })
}
