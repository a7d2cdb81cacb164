//! Error types for the engine runtime.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while launching or driving a browser engine.
#[derive(Debug, Error)]
pub enum Error {
	/// The engine binary could not be located.
	#[error("browser engine not available: {0}")]
	EngineUnavailable(String),

	/// The engine process could not be started or never exposed its debugging endpoint.
	#[error("browser launch failed: {0}")]
	LaunchFailed(String),

	/// The DevTools WebSocket could not be opened.
	#[error("failed to connect to browser: {0}")]
	ConnectionFailed(String),

	/// The browser answered a command with an error.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// A command did not complete in time.
	#[error("timeout: {0}")]
	Timeout(String),

	/// The browser (or the page) is gone.
	#[error("target closed: {0}")]
	TargetClosed(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true when the error means the engine itself is missing.
	pub fn is_unavailable(&self) -> bool {
		matches!(self, Error::EngineUnavailable(_))
	}
}
