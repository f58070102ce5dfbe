pub mod form_payload;
pub mod session_store;
pub mod update;

pub use form_payload::EditGrid;
pub use session_store::{SessionId, SessionStore};
pub use update::{UpdateStatement, UpdateSynthesizer};
