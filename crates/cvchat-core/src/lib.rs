//! Configuration, secret handling and the document question-answering session.

pub mod config;
pub mod prompt;
pub mod session;
pub mod vault;

pub use config::Config;
pub use session::{Session, SessionError, SessionSettings};
