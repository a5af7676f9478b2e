//! REST client module for the hosted identity provider.
//!
//! This module provides the `IdentityProvider` seam used by the session
//! manager and `IdentityClient`, its HTTP implementation. The provider
//! exposes three operations: password sign-in, account creation and
//! refresh-token exchange.

pub mod client;
pub mod error;

pub use client::{IdentityClient, IdentityProvider};
pub use error::ApiError;
