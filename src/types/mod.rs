pub mod credential;
pub mod views;

pub use credential::Credential;
