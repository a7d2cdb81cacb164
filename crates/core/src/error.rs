//! Errors returned by the session supervisor.

use foxden_protocol::SessionId;
use thiserror::Error;

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by [`crate::Supervisor`].
///
/// Directory cleanup failures are logged and never returned.
#[derive(Debug, Error)]
pub enum SessionError {
	/// The profile already has an active session.
	#[error("profile '{0}' already has an active session")]
	Conflict(String),

	#[error("session not found: {0}")]
	NotFound(SessionId),

	/// The engine cannot be launched on this machine.
	#[error("engine unavailable: {0}")]
	EngineUnavailable(String),

	/// The execution unit failed before becoming ready.
	#[error("failed to start session: {0}")]
	LaunchFailure(String),

	#[error("invalid profile: {0}")]
	InvalidProfile(String),
}
