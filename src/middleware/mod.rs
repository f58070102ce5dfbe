pub mod session;

pub use session::{RequireSession, Session, require_session};
