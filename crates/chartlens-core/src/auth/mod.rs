//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: single-actor owner of the token set that signs in,
//!   persists, and refreshes the id token ahead of expiry
//! - `SessionTokenSet`: the persisted token set and its expiry rules
//! - `Scheduler`/`Clock`: injectable timer and wall clock
//! - `validate_credentials`: caller-side form validation
//!
//! Tokens are refreshed 5 minutes before they expire, either by the armed
//! timer or on the next read of the stored session.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod scheduler;
pub mod session;

pub use credentials::{validate_credentials, CredentialError};
pub use error::AuthError;
pub use manager::SessionManager;
pub use scheduler::{Clock, RefreshDue, Scheduler, SystemClock, Timer, TokioScheduler};
pub use session::{refresh_delay, SessionTokenSet, REFRESH_BUFFER_SECS, SESSION_KEYS};
