//! Wire types for foxden.
//!
//! Shared between the session supervisor (`foxden`) and the HTTP front end
//! (`foxden-cli`).
//!
//! # Main Types
//!
//! - [`Profile`] - Stored browser profile configuration
//! - [`ProxyConfig`] - Optional upstream proxy attached to a profile
//! - [`PublicSession`] - Externally visible view of a running session
//! - [`SessionStatus`] - Lifecycle state reported for a session

pub mod api;
pub mod profile;
pub mod session;

pub use api::{ErrorBody, StartSessionRequest, StopSessionRequest};
pub use profile::{Profile, ProxyConfig, ProxyProtocol, ScreenSize};
pub use session::{PublicSession, SessionId, SessionStatus};
