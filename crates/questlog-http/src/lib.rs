//! questlog-http - HTTP client for the questlog API.
//!
//! All calls flow through [`Client::request`]. The client attaches the
//! current access credential, and when the server answers 401 it performs a
//! single shared refresh for every caller that hit the same condition, then
//! replays each failed call exactly once.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use questlog_core::{ApiUrl, Credentials, MemoryStorage};
//! use questlog_http::{Client, ClientConfig, RequestOptions};
//!
//! # async fn example() -> Result<(), questlog_core::Error> {
//! let config = ClientConfig::new(ApiUrl::new("https://rpg.example.com/api")?);
//! let client = Client::new(config, Arc::new(MemoryStorage::new()))?;
//!
//! client.login(Credentials::new("amy", "secret")).await?;
//! let campaigns = client.request("/campaigns", RequestOptions::get()).await?;
//! println!("{:?}", campaigns);
//! # Ok(())
//! # }
//! ```

mod bootstrap;
mod client;
mod config;
mod coordinator;
mod endpoints;
mod events;
mod executor;
mod resolver;
mod store;

pub use bootstrap::SessionBootstrapper;
pub use client::Client;
pub use config::ClientConfig;
pub use coordinator::RefreshCoordinator;
pub use endpoints::{LoginShape, RefreshShape};
pub use events::SessionEvent;
pub use executor::{Body, Outcome, RequestExecutor, RequestOptions};
pub use resolver::IdentityResolver;
pub use store::CredentialStore;

pub use reqwest::Method;
