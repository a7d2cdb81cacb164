//! Public session views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque session handle returned by `start` and accepted by `stop`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SessionId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for SessionId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

/// Lifecycle state of a registered session.
///
/// A session that has ended is removed rather than given a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
	Starting,
	Running,
	Stopping,
}

impl std::fmt::Display for SessionStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SessionStatus::Starting => write!(f, "starting"),
			SessionStatus::Running => write!(f, "running"),
			SessionStatus::Stopping => write!(f, "stopping"),
		}
	}
}

/// Externally visible fields of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSession {
	#[serde(rename = "session_id")]
	pub id: SessionId,
	pub profile_name: String,
	pub status: SessionStatus,
	/// RFC 3339 / ISO-8601 UTC timestamp.
	pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;
	use serde_json::json;

	use super::*;

	#[test]
	fn public_session_serializes_wire_field_names() {
		let session = PublicSession {
			id: SessionId::new("work-1700000000000"),
			profile_name: "work".to_string(),
			status: SessionStatus::Running,
			started_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
		};

		let value = serde_json::to_value(&session).unwrap();
		assert_eq!(
			value,
			json!({
				"session_id": "work-1700000000000",
				"profile_name": "work",
				"status": "running",
				"started_at": "2024-01-02T03:04:05Z"
			})
		);
	}
}
