//! Public session API: start, stop, list, shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use foxden_protocol::{Profile, PublicSession, ScreenSize, SessionId, SessionStatus};
use foxden_runtime::Engine;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::dirs::ScratchArea;
use crate::error::{Result, SessionError};
use crate::registry::{Registry, Session};
use crate::unit::{self, LaunchError, UnitOutcome, UnitSpec};

/// Timeouts and paths used by [`Supervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	/// How long `start` waits for the browser to come up.
	pub readiness_timeout: Duration,
	/// How long `stop` waits for the unit to exit before detaching it.
	pub stop_timeout: Duration,
	/// How often a running unit re-checks its stop signal.
	pub poll_interval: Duration,
	/// Parent of ephemeral session directories.
	pub scratch_dir: PathBuf,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			readiness_timeout: Duration::from_secs(30),
			stop_timeout: Duration::from_secs(5),
			poll_interval: Duration::from_millis(500),
			scratch_dir: std::env::temp_dir(),
		}
	}
}

/// Owns every session and enforces one active session per profile.
pub struct Supervisor {
	engine: Arc<dyn Engine>,
	registry: Mutex<Registry>,
	scratch: ScratchArea,
	config: SupervisorConfig,
}

impl Supervisor {
	pub fn new(engine: Arc<dyn Engine>, config: SupervisorConfig) -> Self {
		Self {
			engine,
			registry: Mutex::new(Registry::new()),
			scratch: ScratchArea::new(config.scratch_dir.clone()),
			config,
		}
	}

	/// Launches a session for `profile` and waits until its browser is ready.
	///
	/// `screen` is only used by fullscreen profiles.
	pub async fn start(&self, profile: &Profile, screen: Option<ScreenSize>) -> Result<PublicSession> {
		if profile.name.trim().is_empty() {
			return Err(SessionError::InvalidProfile("profile name is required".to_string()));
		}

		self.engine.ensure_available().map_err(|err| match err {
			foxden_runtime::Error::EngineUnavailable(message) => SessionError::EngineUnavailable(message),
			other => SessionError::EngineUnavailable(other.to_string()),
		})?;

		let (id, stop, slot) = {
			let mut registry = self.registry.lock();
			let session = registry.admit(&profile.name, Utc::now())?;
			(session.id.clone(), Arc::clone(&session.stop), Arc::clone(&session.dir))
		};
		info!(target = "foxden.session", session_id = %id, profile = %profile.name, "starting session");

		let spec = UnitSpec {
			id: id.clone(),
			profile: profile.clone(),
			screen,
			engine: Arc::clone(&self.engine),
			scratch: self.scratch.clone(),
			slot: Arc::clone(&slot),
			stop: Arc::clone(&stop),
			poll_interval: self.config.poll_interval,
		};

		let (handle, ready) = match unit::spawn(spec) {
			Ok(spawned) => spawned,
			Err(err) => {
				self.registry.lock().remove(&id);
				slot.cleanup();
				return Err(SessionError::LaunchFailure(format!("failed to spawn session thread: {err}")));
			}
		};

		let attached = {
			let mut registry = self.registry.lock();
			match registry.get_mut(&id) {
				Some(session) => {
					session.unit = Some(handle);
					true
				}
				None => false,
			}
		};
		if !attached {
			// Stopped before the unit was attached; it sees the signal and cleans up after itself.
			stop.trigger();
			return Err(SessionError::NotFound(id));
		}

		let pending = PendingStart {
			supervisor: self,
			id: id.clone(),
			armed: true,
		};
		let readiness = tokio::time::timeout(self.config.readiness_timeout, ready).await;
		pending.disarm();

		let failure = match readiness {
			Ok(Ok(Ok(()))) => None,
			Ok(Ok(Err(LaunchError::Unavailable(reason)))) => Some(SessionError::EngineUnavailable(reason)),
			Ok(Ok(Err(LaunchError::Failed(reason)))) => Some(SessionError::LaunchFailure(reason)),
			Ok(Err(_)) => Some(SessionError::LaunchFailure("session exited before it became ready".to_string())),
			Err(_) => Some(SessionError::LaunchFailure(format!(
				"session not ready after {}s",
				self.config.readiness_timeout.as_secs_f32()
			))),
		};

		if let Some(err) = failure {
			let removed = self.registry.lock().remove(&id);
			let Some(session) = removed else {
				return Err(SessionError::NotFound(id));
			};
			warn!(target = "foxden.session", session_id = %id, error = %err, "session failed to start");
			self.teardown(session).await;
			return Err(err);
		}

		let mut registry = self.registry.lock();
		match registry.get_mut(&id) {
			Some(session) if session.status == SessionStatus::Starting => {
				session.status = SessionStatus::Running;
				info!(target = "foxden.session", session_id = %id, "session running");
				Ok(session.public())
			}
			_ => Err(SessionError::NotFound(id)),
		}
	}

	/// Stops a session and removes it, even if its unit does not exit in time.
	pub async fn stop(&self, id: &SessionId) -> Result<()> {
		let waiter = {
			let mut registry = self.registry.lock();
			let session = registry.get_mut(id).ok_or_else(|| SessionError::NotFound(id.clone()))?;
			session.status = SessionStatus::Stopping;
			session.stop.trigger();
			session.unit.as_ref().map(|unit| unit.waiter())
		};
		info!(target = "foxden.session", session_id = %id, "stopping session");

		if let Some(waiter) = waiter {
			if !waiter.wait(self.config.stop_timeout).await {
				warn!(
					target = "foxden.session",
					session_id = %id,
					timeout_secs = self.config.stop_timeout.as_secs_f32(),
					"session did not exit in time"
				);
			}
		}

		let removed = self.registry.lock().remove(id);
		if let Some(session) = removed {
			let outcome = release(session);
			debug!(target = "foxden.session", session_id = %id, outcome = ?outcome, "session removed");
		}
		Ok(())
	}

	/// Reaps sessions whose unit has exited and returns the rest.
	pub fn list(&self) -> Vec<PublicSession> {
		let (finished, sessions) = {
			let mut registry = self.registry.lock();
			let finished = registry.take_finished();
			(finished, registry.public_views())
		};

		for session in finished {
			let id = session.id.clone();
			match release(session) {
				Some(outcome) => info!(target = "foxden.session", session_id = %id, %outcome, "reaped session"),
				None => info!(target = "foxden.session", session_id = %id, "reaped session without outcome"),
			}
		}

		trace!(target = "foxden.session", count = sessions.len(), "listed sessions");
		sessions
	}

	/// Stops every registered session concurrently.
	pub async fn shutdown(&self) {
		let ids = self.registry.lock().ids();
		if ids.is_empty() {
			return;
		}
		info!(target = "foxden.session", count = ids.len(), "stopping all sessions");

		let results = futures_util::future::join_all(ids.iter().map(|id| self.stop(id))).await;
		for (id, result) in ids.iter().zip(results) {
			if let Err(err) = result {
				debug!(target = "foxden.session", session_id = %id, error = %err, "session already gone at shutdown");
			}
		}
	}

	/// Raises the stop signal of `session`, waits for its unit, then releases it.
	async fn teardown(&self, session: Session) {
		session.stop.trigger();
		if let Some(unit) = &session.unit {
			if !unit.waiter().wait(self.config.stop_timeout).await {
				warn!(target = "foxden.session", session_id = %session.id, "failed session did not exit in time");
			}
		}
		release(session);
	}
}

impl Drop for Supervisor {
	fn drop(&mut self) {
		self.registry.get_mut().raise_all_stop_signals();
	}
}

/// Removes a starting session if the `start` call waiting on it is dropped.
struct PendingStart<'a> {
	supervisor: &'a Supervisor,
	id: SessionId,
	armed: bool,
}

impl PendingStart<'_> {
	fn disarm(mut self) {
		self.armed = false;
	}
}

impl Drop for PendingStart<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		let removed = self.supervisor.registry.lock().remove(&self.id);
		if let Some(session) = removed {
			session.stop.trigger();
			warn!(target = "foxden.session", session_id = %self.id, "start abandoned before the session was ready");
			release(session);
		}
	}
}

/// Cleans the ephemeral directory and joins (or detaches) the unit thread.
fn release(mut session: Session) -> Option<UnitOutcome> {
	session.dir.cleanup();
	session.unit.take().and_then(|unit| unit.finish(&session.id))
}
