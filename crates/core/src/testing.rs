//! Test doubles for exercising the supervisor without a real browser.
//!
//! [`FakeEngine`] records every launch and viewport change and lets a test
//! close a "window" from outside, fail or panic the next launch, stall
//! `close`, or report the engine as unavailable.
//!
//! ```ignore
//! let engine = FakeEngine::new();
//! let supervisor = Supervisor::new(Arc::new(engine.clone()), config);
//! let session = supervisor.start(&Profile::named("Work"), None).await?;
//! engine.close_window(0);
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use foxden_runtime::{CloseHandler, Engine, EngineContext, Error, LaunchOptions, PageId, Result, Viewport};
use parking_lot::Mutex;

/// How the next launch should misbehave.
#[derive(Debug, Clone)]
enum Fault {
	Fail(String),
	Panic(String),
}

#[derive(Default)]
struct EngineState {
	unavailable: Option<String>,
	next_fault: Option<Fault>,
	launch_delay: Option<Duration>,
	close_delay: Option<Duration>,
	launches: Vec<LaunchOptions>,
	windows: Vec<Arc<FakeWindow>>,
}

/// In-memory engine. Clones share state.
#[derive(Clone, Default)]
pub struct FakeEngine {
	state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes `ensure_available` (and launches) fail with `reason`.
	pub fn set_unavailable(&self, reason: impl Into<String>) {
		self.state.lock().unavailable = Some(reason.into());
	}

	pub fn fail_next_launch(&self, reason: impl Into<String>) {
		self.state.lock().next_fault = Some(Fault::Fail(reason.into()));
	}

	pub fn panic_next_launch(&self, message: impl Into<String>) {
		self.state.lock().next_fault = Some(Fault::Panic(message.into()));
	}

	/// Delays every launch, to exercise readiness timeouts and concurrent stops.
	pub fn set_launch_delay(&self, delay: Duration) {
		self.state.lock().launch_delay = Some(delay);
	}

	/// Makes `close` on contexts launched from now on take `delay` before the window goes away.
	pub fn set_close_delay(&self, delay: Duration) {
		self.state.lock().close_delay = Some(delay);
	}

	/// Options of every launch attempt, including failed ones.
	pub fn launches(&self) -> Vec<LaunchOptions> {
		self.state.lock().launches.clone()
	}

	/// Viewports applied per successful launch, in launch order.
	pub fn viewports(&self) -> Vec<Option<Viewport>> {
		self.state.lock().windows.iter().map(|window| *window.viewport.lock()).collect()
	}

	/// Simulates the user closing the browser of the `index`-th successful launch.
	pub fn close_window(&self, index: usize) {
		let window = self.state.lock().windows.get(index).cloned();
		if let Some(window) = window {
			window.close();
		}
	}

	/// Number of launched browsers that have not been closed.
	pub fn open_windows(&self) -> usize {
		self.state.lock().windows.iter().filter(|window| !window.is_closed()).count()
	}
}

#[async_trait]
impl Engine for FakeEngine {
	fn name(&self) -> &str {
		"fake"
	}

	fn ensure_available(&self) -> Result<()> {
		match &self.state.lock().unavailable {
			Some(reason) => Err(Error::EngineUnavailable(reason.clone())),
			None => Ok(()),
		}
	}

	async fn launch(&self, options: LaunchOptions) -> Result<Box<dyn EngineContext>> {
		let (fault, delay) = {
			let mut state = self.state.lock();
			state.launches.push(options);
			if let Some(reason) = &state.unavailable {
				return Err(Error::EngineUnavailable(reason.clone()));
			}
			(state.next_fault.take(), state.launch_delay)
		};

		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}

		match fault {
			Some(Fault::Fail(reason)) => return Err(Error::LaunchFailed(reason)),
			Some(Fault::Panic(message)) => panic!("{message}"),
			None => {}
		}

		let window = Arc::new(FakeWindow::default());
		let close_delay = {
			let mut state = self.state.lock();
			state.windows.push(Arc::clone(&window));
			state.close_delay
		};
		Ok(Box::new(FakeContext { window, close_delay }))
	}
}

#[derive(Default)]
struct WindowState {
	closed: bool,
	handlers: Vec<CloseHandler>,
}

#[derive(Default)]
struct FakeWindow {
	state: Mutex<WindowState>,
	viewport: Mutex<Option<Viewport>>,
}

impl FakeWindow {
	fn close(&self) {
		let handlers = {
			let mut state = self.state.lock();
			if state.closed {
				return;
			}
			state.closed = true;
			std::mem::take(&mut state.handlers)
		};
		for handler in handlers {
			handler();
		}
	}

	fn is_closed(&self) -> bool {
		self.state.lock().closed
	}
}

/// Context handed out by [`FakeEngine`]. It has a single page, `page-1`.
pub struct FakeContext {
	window: Arc<FakeWindow>,
	close_delay: Option<Duration>,
}

impl FakeContext {
	fn ensure_open(&self) -> Result<()> {
		if self.window.is_closed() {
			return Err(Error::TargetClosed("fake browser closed".to_string()));
		}
		Ok(())
	}
}

#[async_trait]
impl EngineContext for FakeContext {
	async fn pages(&self) -> Result<Vec<PageId>> {
		self.ensure_open()?;
		Ok(vec![PageId::new("page-1")])
	}

	async fn new_page(&self) -> Result<PageId> {
		self.ensure_open()?;
		Ok(PageId::new("page-2"))
	}

	async fn set_viewport(&self, _page: &PageId, viewport: Viewport) -> Result<()> {
		self.ensure_open()?;
		*self.window.viewport.lock() = Some(viewport);
		Ok(())
	}

	fn on_close(&self, handler: CloseHandler) {
		let mut state = self.window.state.lock();
		if state.closed {
			drop(state);
			handler();
		} else {
			state.handlers.push(handler);
		}
	}

	async fn close(self: Box<Self>) -> Result<()> {
		if let Some(delay) = self.close_delay {
			tokio::time::sleep(delay).await;
		}
		self.window.close();
		Ok(())
	}
}
