use crate::error::ConsoleError;
use crate::db::dialect::Dialect;
use url::Url;

/// Database credentials captured at login and kept for the session's lifetime.
///
/// `Debug` never prints the username or password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub connect_target: String,
}

impl Credential {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        connect_target: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            connect_target: connect_target.into(),
        }
    }

    /// Build the driver URL for this credential. SQLite targets carry no
    /// authentication, so the target is used as-is.
    pub fn connect_url(&self) -> Result<String, ConsoleError> {
        match Dialect::from_target(&self.connect_target)? {
            Dialect::Sqlite => Ok(self.connect_target.clone()),
            Dialect::Postgres => {
                let mut url = Url::parse(&self.connect_target).map_err(|_| ConsoleError::Auth)?;
                url.set_username(&self.username)
                    .map_err(|_| ConsoleError::Auth)?;
                url.set_password(Some(&self.password))
                    .map_err(|_| ConsoleError::Auth)?;
                Ok(url.into())
            }
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .field("connect_target", &self.connect_target)
            .finish()
    }
}
