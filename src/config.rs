use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Optional on-disk configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment prefix; sections are separated with `__`,
/// e.g. `TABULA_DATABASE__POOL_SIZE=4`.
pub const ENV_PREFIX: &str = "TABULA_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub database: DatabaseConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub loglevel: String,
    /// Master key for the private session cookie. Must be at least 64 bytes;
    /// a random key is generated per process when unset.
    pub cookie_secret: Option<String>,
    /// Drop the `Secure` cookie attribute (plain HTTP during local use).
    pub insecure_cookie: bool,
    pub login_attempts_per_minute: u32,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            loglevel: "info".to_string(),
            cookie_secret: None,
            insecure_cookie: false,
            login_attempts_per_minute: 10,
        }
    }
}

impl std::fmt::Debug for BasicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicConfig")
            .field("listen_addr", &self.listen_addr)
            .field("loglevel", &self.loglevel)
            .field("cookie_secret", &self.cookie_secret.as_ref().map(|_| "<set>"))
            .field("insecure_cookie", &self.insecure_cookie)
            .field("login_attempts_per_minute", &self.login_attempts_per_minute)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL without credentials. Login supplies user and password.
    pub connect_target: String,
    /// Fixed pool size (min = max).
    pub pool_size: u32,
    pub acquire_timeout_secs: u64,
    /// Bounded wait for a pool to drain on rotation and shutdown.
    pub close_grace_secs: u64,
    /// Column used in the WHERE clause of every synthesized UPDATE.
    pub identifying_column: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connect_target: "postgres://localhost:5432/console".to_string(),
            pool_size: 10,
            acquire_timeout_secs: 30,
            close_grace_secs: 10,
            identifying_column: "ORG_ID".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_secs(self.close_grace_secs)
    }
}

impl Config {
    /// Defaults, then `config.toml`, then `TABULA_*` environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
