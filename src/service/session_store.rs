use crate::types::credential::Credential;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Opaque session identifier carried in the private session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// How long a session lives after login; the cookie carries the same max age.
pub const SESSION_TTL: Duration = Duration::from_secs(8 * 60 * 60);

struct SessionEntry {
    credential: Credential,
    expires_at: Instant,
}

/// In-memory credential store keyed by session. Entries expire after the
/// configured TTL whether or not the user ever logs out.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Credential for a live session. An expired entry is evicted here.
    pub async fn get(&self, id: &SessionId) -> Option<Credential> {
        {
            let sessions = self.inner.read().await;
            match sessions.get(id) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.credential.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        debug!("session expired");
        self.inner.write().await.remove(id);
        None
    }

    /// Store a credential under a fresh session id and return the id.
    /// Expired sessions of users who never came back are purged on the way.
    pub async fn create(&self, credential: Credential) -> SessionId {
        let id = SessionId::generate();
        let now = Instant::now();
        let mut sessions = self.inner.write().await;
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(
            id,
            SessionEntry {
                credential,
                expires_at: now + self.ttl,
            },
        );
        id
    }

    pub async fn remove(&self, id: &SessionId) -> Option<Credential> {
        self.inner
            .write()
            .await
            .remove(id)
            .map(|entry| entry.credential)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
