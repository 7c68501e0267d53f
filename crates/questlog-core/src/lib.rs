//! questlog-core - Core types and traits for the questlog API client.
//!
//! This crate holds everything that does not touch the network: validated
//! URLs, token newtypes, the authenticated [`Identity`], claims decoding and
//! the [`SessionStorage`] abstraction used to mirror a session to durable
//! storage.

pub mod credentials;
pub mod error;
pub mod identity;
pub mod storage;
pub mod tokens;
pub mod types;

pub use credentials::{Credentials, Registration};
pub use error::Error;
pub use identity::{Identity, Role};
pub use storage::{MemoryStorage, SessionStorage};
pub use tokens::{AccessToken, CredentialPair, RefreshToken};
pub use types::ApiUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
