//! Per-session execution unit.
//!
//! Each session runs on its own OS thread with a current-thread runtime. The
//! unit owns the engine context for its whole life: it launches the browser,
//! reports readiness, then waits for either the browser to close or the stop
//! signal, and finally closes the context and removes the ephemeral directory.

use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use foxden_protocol::{Profile, ScreenSize, SessionId};
use foxden_runtime::{Engine, EngineContext, Viewport};
use tokio::sync::{Notify, oneshot, watch};
use tracing::{debug, info, warn};

use crate::dirs::{EphemeralSlot, ScratchArea, resolve_data_dir};
use crate::options::{launch_options, resolve_viewport};

/// How a session's execution unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
	/// The browser went away on its own (window closed, crash).
	Closed,
	/// The stop signal was raised.
	Stopped,
	Failed(String),
}

impl std::fmt::Display for UnitOutcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			UnitOutcome::Closed => write!(f, "closed"),
			UnitOutcome::Stopped => write!(f, "stopped"),
			UnitOutcome::Failed(reason) => write!(f, "failed: {reason}"),
		}
	}
}

/// Why a unit never became ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LaunchError {
	Unavailable(String),
	Failed(String),
}

pub(crate) type Readiness = oneshot::Receiver<Result<(), LaunchError>>;

/// Cooperative stop flag, raised at most once.
#[derive(Debug, Default)]
pub(crate) struct StopSignal(AtomicBool);

impl StopSignal {
	/// Raises the flag. Returns true for the first caller only.
	pub(crate) fn trigger(&self) -> bool {
		!self.0.swap(true, Ordering::SeqCst)
	}

	pub(crate) fn is_set(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Inputs for one execution unit.
pub(crate) struct UnitSpec {
	pub id: SessionId,
	pub profile: Profile,
	pub screen: Option<ScreenSize>,
	pub engine: Arc<dyn Engine>,
	pub scratch: ScratchArea,
	pub slot: Arc<EphemeralSlot>,
	pub stop: Arc<StopSignal>,
	pub poll_interval: Duration,
}

/// Thread handle plus exit channel of a running unit.
pub(crate) struct UnitHandle {
	thread: JoinHandle<()>,
	exit: watch::Receiver<Option<UnitOutcome>>,
}

impl UnitHandle {
	pub(crate) fn is_finished(&self) -> bool {
		self.thread.is_finished()
	}

	pub(crate) fn waiter(&self) -> UnitWaiter {
		UnitWaiter(self.exit.clone())
	}

	/// Releases the thread: joins it if it has exited, detaches it otherwise.
	pub(crate) fn finish(self, id: &SessionId) -> Option<UnitOutcome> {
		let outcome = self.exit.borrow().clone();
		if self.thread.is_finished() {
			if self.thread.join().is_err() {
				warn!(target = "foxden.unit", session_id = %id, "session thread panicked");
			}
		} else {
			warn!(target = "foxden.unit", session_id = %id, "session thread still running, detaching");
		}
		outcome
	}
}

/// Waits for a unit to publish its outcome.
#[derive(Clone)]
pub(crate) struct UnitWaiter(watch::Receiver<Option<UnitOutcome>>);

impl UnitWaiter {
	/// Returns false if the unit is still running after `limit`.
	pub(crate) async fn wait(&self, limit: Duration) -> bool {
		let mut exit = self.0.clone();
		// A dropped sender means the thread is gone, which counts as exited.
		tokio::time::timeout(limit, async move {
			let _ = exit.wait_for(Option::is_some).await;
		})
		.await
		.is_ok()
	}
}

/// Starts the unit thread. The readiness receiver resolves once the browser is up or has failed.
pub(crate) fn spawn(spec: UnitSpec) -> io::Result<(UnitHandle, Readiness)> {
	let (ready_tx, ready_rx) = oneshot::channel();
	let (exit_tx, exit_rx) = watch::channel(None);

	let thread = std::thread::Builder::new()
		.name(format!("foxden-session-{}", spec.id))
		.spawn(move || {
			let id = spec.id.clone();
			let slot = Arc::clone(&spec.slot);

			let outcome = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => match std::panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(run(spec, ready_tx)))) {
					Ok(outcome) => outcome,
					Err(payload) => UnitOutcome::Failed(format!("engine panicked: {}", panic_message(&*payload))),
				},
				Err(err) => {
					let reason = format!("failed to build session runtime: {err}");
					let _ = ready_tx.send(Err(LaunchError::Failed(reason.clone())));
					UnitOutcome::Failed(reason)
				}
			};

			slot.cleanup();

			match &outcome {
				UnitOutcome::Failed(reason) => warn!(target = "foxden.unit", session_id = %id, %reason, "session unit failed"),
				other => info!(target = "foxden.unit", session_id = %id, outcome = %other, "session unit exited"),
			}
			let _ = exit_tx.send(Some(outcome));
		})?;

	Ok((UnitHandle { thread, exit: exit_rx }, ready_rx))
}

async fn run(spec: UnitSpec, ready: oneshot::Sender<Result<(), LaunchError>>) -> UnitOutcome {
	let UnitSpec {
		id,
		profile,
		screen,
		engine,
		scratch,
		slot,
		stop,
		poll_interval,
	} = spec;

	if stop.is_set() {
		let _ = ready.send(Err(LaunchError::Failed("stopped before launch".to_string())));
		return UnitOutcome::Stopped;
	}

	let viewport = resolve_viewport(&profile, screen);
	let data_dir = match resolve_data_dir(&profile, &scratch, &slot) {
		Ok(dir) => dir,
		Err(err) => {
			let reason = format!("cannot prepare data directory: {err}");
			let _ = ready.send(Err(LaunchError::Failed(reason.clone())));
			return UnitOutcome::Failed(reason);
		}
	};
	debug!(
		target = "foxden.unit",
		session_id = %id,
		engine = engine.name(),
		dir = %data_dir.path().display(),
		persistent = data_dir.is_persistent(),
		"launching engine"
	);

	let context = match engine.launch(launch_options(&profile, viewport, data_dir)).await {
		Ok(context) => context,
		Err(err) => {
			let reason = err.to_string();
			let launch_error = match err {
				foxden_runtime::Error::EngineUnavailable(message) => LaunchError::Unavailable(message),
				_ => LaunchError::Failed(reason.clone()),
			};
			let _ = ready.send(Err(launch_error));
			return UnitOutcome::Failed(reason);
		}
	};

	if let Err(err) = apply_viewport(context.as_ref(), viewport).await {
		warn!(target = "foxden.unit", session_id = %id, error = %err, "failed to apply viewport");
	}

	let closed = Arc::new(Notify::new());
	{
		let closed = Arc::clone(&closed);
		context.on_close(Box::new(move || closed.notify_one()));
	}

	if ready.send(Ok(())).is_err() {
		debug!(target = "foxden.unit", session_id = %id, "nobody awaiting readiness");
	}

	let outcome = loop {
		if stop.is_set() {
			break UnitOutcome::Stopped;
		}
		if tokio::time::timeout(poll_interval, closed.notified()).await.is_ok() {
			break UnitOutcome::Closed;
		}
	};

	debug!(target = "foxden.unit", session_id = %id, %outcome, "closing engine");
	if let Err(err) = context.close().await {
		warn!(target = "foxden.unit", session_id = %id, error = %err, "error while closing engine");
	}

	outcome
}

async fn apply_viewport(context: &dyn EngineContext, viewport: Viewport) -> foxden_runtime::Result<()> {
	let page = match context.pages().await?.into_iter().next() {
		Some(page) => page,
		None => context.new_page().await?,
	};
	context.set_viewport(&page, viewport).await
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic".to_string()
	}
}
