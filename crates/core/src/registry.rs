use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use foxden_protocol::{PublicSession, SessionId, SessionStatus};

use crate::dirs::EphemeralSlot;
use crate::error::{Result, SessionError};
use crate::unit::{StopSignal, UnitHandle};

/// Registry entry for one session.
pub(crate) struct Session {
	pub id: SessionId,
	pub profile_name: String,
	pub status: SessionStatus,
	pub started_at: DateTime<Utc>,
	pub stop: Arc<StopSignal>,
	pub dir: Arc<EphemeralSlot>,
	/// Attached right after the unit thread is spawned.
	pub unit: Option<UnitHandle>,
}

impl Session {
	pub fn public(&self) -> PublicSession {
		PublicSession {
			id: self.id.clone(),
			profile_name: self.profile_name.clone(),
			status: self.status,
			started_at: self.started_at,
		}
	}

	fn unit_finished(&self) -> bool {
		self.unit.as_ref().is_some_and(UnitHandle::is_finished)
	}
}

/// All live sessions, keyed by id.
#[derive(Default)]
pub(crate) struct Registry {
	sessions: HashMap<SessionId, Session>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether `profile_name` already has a registered session.
	pub fn has_active_session(&self, profile_name: &str) -> bool {
		self.sessions.values().any(|session| session.profile_name == profile_name)
	}

	/// Registers a new Starting session for `profile_name` unless one is already active.
	pub fn admit(&mut self, profile_name: &str, now: DateTime<Utc>) -> Result<&Session> {
		if self.has_active_session(profile_name) {
			return Err(SessionError::Conflict(profile_name.to_string()));
		}

		let id = session_id_for(profile_name, now, |candidate| self.sessions.contains_key(candidate));
		let session = Session {
			id: id.clone(),
			profile_name: profile_name.to_string(),
			status: SessionStatus::Starting,
			started_at: now,
			stop: Arc::new(StopSignal::default()),
			dir: Arc::new(EphemeralSlot::new()),
			unit: None,
		};
		Ok(self.sessions.entry(id).or_insert(session))
	}

	pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
		self.sessions.get_mut(id)
	}

	pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
		self.sessions.remove(id)
	}

	pub fn ids(&self) -> Vec<SessionId> {
		self.sessions.keys().cloned().collect()
	}

	/// Removes sessions whose unit thread has exited.
	///
	/// Starting sessions are left to `start`, which owns their failure path.
	pub fn take_finished(&mut self) -> Vec<Session> {
		let finished: Vec<SessionId> = self
			.sessions
			.values()
			.filter(|session| session.status != SessionStatus::Starting && session.unit_finished())
			.map(|session| session.id.clone())
			.collect();
		finished.iter().filter_map(|id| self.sessions.remove(id)).collect()
	}

	pub fn public_views(&self) -> Vec<PublicSession> {
		self.sessions.values().map(Session::public).collect()
	}

	pub fn raise_all_stop_signals(&self) {
		for session in self.sessions.values() {
			session.stop.trigger();
		}
	}
}

/// `{profile name, lowercased, spaces to dashes}-{unix ms}`, suffixed `-N` while taken.
fn session_id_for(profile_name: &str, now: DateTime<Utc>, taken: impl Fn(&SessionId) -> bool) -> SessionId {
	let base = format!("{}-{}", profile_name.replace(' ', "-").to_lowercase(), now.timestamp_millis());
	let mut id = SessionId::new(base.clone());
	let mut suffix = 1;
	while taken(&id) {
		id = SessionId::new(format!("{base}-{suffix}"));
		suffix += 1;
	}
	id
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;

	use super::*;

	fn at(ms: i64) -> DateTime<Utc> {
		Utc.timestamp_millis_opt(ms).unwrap()
	}

	#[test]
	fn id_is_derived_from_name_and_time() {
		let id = session_id_for("My Work Profile", at(1_700_000_000_123), |_| false);
		assert_eq!(id.as_str(), "my-work-profile-1700000000123");
	}

	#[test]
	fn id_gets_suffix_when_taken() {
		let taken = ["a-5", "a-5-1"];
		let id = session_id_for("A", at(5), |id| taken.contains(&id.as_str()));
		assert_eq!(id.as_str(), "a-5-2");
	}

	#[test]
	fn admit_rejects_second_session_for_profile() {
		let mut registry = Registry::new();
		let id = registry.admit("Work", at(1)).unwrap().id.clone();
		assert!(registry.has_active_session("Work"));

		let err = registry.admit("Work", at(2)).err().unwrap();
		assert!(matches!(err, SessionError::Conflict(ref name) if name == "Work"));

		registry.admit("Home", at(1)).unwrap();
		assert_eq!(registry.public_views().len(), 2);

		registry.remove(&id);
		assert!(!registry.has_active_session("Work"));
		registry.admit("Work", at(3)).unwrap();
	}

	#[test]
	fn admitted_sessions_start_in_starting_state() {
		let mut registry = Registry::new();
		let session = registry.admit("Work", at(42)).unwrap();
		assert_eq!(session.status, SessionStatus::Starting);
		assert_eq!(session.started_at, at(42));
		assert!(session.unit.is_none());

		let views = registry.public_views();
		assert_eq!(views.len(), 1);
		assert_eq!(views[0].profile_name, "Work");
	}

	#[test]
	fn unattached_sessions_are_never_reaped() {
		let mut registry = Registry::new();
		let id = registry.admit("Work", at(1)).unwrap().id.clone();
		registry.get_mut(&id).unwrap().status = SessionStatus::Running;
		assert!(registry.take_finished().is_empty());
		assert_eq!(registry.public_views().len(), 1);
	}
}
