//! HTTP request and response bodies.

use serde::{Deserialize, Serialize};

use crate::profile::ScreenSize;
use crate::session::SessionId;

/// Body of `POST /api/session`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartSessionRequest {
	#[serde(default)]
	pub profile_name: Option<String>,
	#[serde(default)]
	pub screen_width: Option<u32>,
	#[serde(default)]
	pub screen_height: Option<u32>,
}

impl StartSessionRequest {
	pub fn screen(&self) -> Option<ScreenSize> {
		ScreenSize::from_parts(self.screen_width, self.screen_height)
	}
}

/// Body of `DELETE /api/session`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopSessionRequest {
	#[serde(default)]
	pub session_id: Option<SessionId>,
}

/// Error envelope returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Short error class, e.g. `Conflict` or `Not Found`.
	pub error: String,
	/// Human-readable detail.
	pub message: String,
}
