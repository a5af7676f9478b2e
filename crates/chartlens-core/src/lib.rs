//! ChartLens core library.
//!
//! This crate owns everything below the UI layer:
//!
//! - `auth`: the session manager that signs users in, persists the token set
//!   and keeps the id token fresh in the background
//! - `api`: the HTTP client for the hosted identity provider
//! - `storage`: key-value persistence backends for the session
//! - `models`: identity and chart-analysis data types
//! - `analysis`: the (mocked) chart analysis generator
//! - `config`: on-disk configuration

pub mod analysis;
pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;
pub mod utils;

pub use api::{ApiError, IdentityClient, IdentityProvider};
pub use auth::{AuthError, SessionManager, SessionTokenSet};
pub use config::Config;
pub use models::User;
pub use storage::{FileStore, KeyValueStore, KeychainStore, MemoryStore, StorageError};
