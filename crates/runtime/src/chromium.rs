//! Chromium-family engine driven over the DevTools protocol.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::process::{Child, Command};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser_finder::resolve_browser_executable;
use crate::cdp::{CdpConnection, CdpEvent, DEVTOOLS_PORT_FILE, wait_for_devtools_endpoint};
use crate::engine::{CloseHandler, Engine, EngineContext, LaunchOptions, PageId, Viewport};
use crate::error::{Error, Result};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// How to find and start the browser.
#[derive(Debug, Clone, Default)]
pub struct ChromiumConfig {
	/// Browser binary. Discovered from `FOXDEN_BROWSER` and well-known locations when unset.
	pub executable: Option<PathBuf>,
	pub headless: bool,
	/// Appended after the generated flags.
	pub extra_args: Vec<String>,
}

/// Launches one Chromium process per session, each with its own data directory.
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine {
	config: ChromiumConfig,
}

impl ChromiumEngine {
	pub fn new(config: ChromiumConfig) -> Self {
		Self { config }
	}

	/// Resolves the browser binary this engine would launch.
	pub fn executable(&self) -> Result<PathBuf> {
		resolve_browser_executable(self.config.executable.as_deref())
	}

	/// Command-line flags for `options`.
	pub fn launch_args(&self, options: &LaunchOptions) -> Vec<String> {
		let mut args = vec![
			"--remote-debugging-port=0".to_string(),
			format!("--user-data-dir={}", options.data_dir.path().display()),
			"--no-first-run".to_string(),
			"--no-default-browser-check".to_string(),
			format!("--window-size={},{}", options.window.width, options.window.height),
		];
		if let Some(proxy) = &options.proxy {
			args.push(format!("--proxy-server={}", proxy.server));
		}
		if self.config.headless {
			args.push("--headless=new".to_string());
		}
		args.extend(self.config.extra_args.iter().cloned());
		args.push("about:blank".to_string());
		args
	}
}

#[async_trait]
impl Engine for ChromiumEngine {
	fn name(&self) -> &str {
		"chromium"
	}

	fn ensure_available(&self) -> Result<()> {
		self.executable().map(|_| ())
	}

	async fn launch(&self, options: LaunchOptions) -> Result<Box<dyn EngineContext>> {
		let executable = self.executable()?;
		let data_dir = options.data_dir.path().to_path_buf();

		match tokio::fs::remove_file(data_dir.join(DEVTOOLS_PORT_FILE)).await {
			Ok(()) => debug!(target = "foxden.engine", dir = %data_dir.display(), "removed stale devtools port file"),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
			Err(err) => return Err(Error::LaunchFailed(format!("cannot reset {}: {err}", data_dir.display()))),
		}

		if options.geoip {
			info!(target = "foxden.engine", "geoip alignment is not supported by the chromium engine, ignoring");
		}

		let args = self.launch_args(&options);
		debug!(target = "foxden.engine", executable = %executable.display(), ?args, "launching browser");

		let mut child = Command::new(&executable)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.map_err(|err| match err.kind() {
				std::io::ErrorKind::NotFound => Error::EngineUnavailable(format!("{}: {err}", executable.display())),
				_ => Error::LaunchFailed(format!("failed to spawn {}: {err}", executable.display())),
			})?;

		let ws_url = match wait_for_devtools_endpoint(&data_dir, &mut child).await {
			Ok(url) => url,
			Err(err) => {
				let _ = child.start_kill();
				return Err(err);
			}
		};

		let conn = match CdpConnection::connect(&ws_url).await {
			Ok(conn) => Arc::new(conn),
			Err(err) => {
				let _ = child.start_kill();
				return Err(err);
			}
		};

		info!(target = "foxden.engine", pid = child.id(), dir = %data_dir.display(), "browser started");

		let credentials = options
			.proxy
			.as_ref()
			.and_then(|proxy| proxy.credentials())
			.map(|(user, pass)| (user.to_string(), pass.to_string()));
		let context = ChromiumContext::start(child, conn, credentials);

		// Reports existing targets and every later page open/close to the watcher.
		if let Err(err) = context.conn.call("Target.setDiscoverTargets", json!({ "discover": true }), None).await {
			warn!(
				target = "foxden.engine",
				error = %err,
				"target discovery unavailable, window close relies on process exit"
			);
		}

		if context.credentials.is_some() {
			// Pages must answer proxy auth challenges from their first request on.
			for page in context.pages().await? {
				context.attach(&page).await?;
			}
		}

		Ok(Box::new(context))
	}
}

#[derive(Default)]
struct CloseState {
	fired: bool,
	handlers: Vec<CloseHandler>,
}

/// A running Chromium process and its DevTools connection.
pub struct ChromiumContext {
	conn: Arc<CdpConnection>,
	sessions: Mutex<HashMap<PageId, String>>,
	credentials: Option<(String, String)>,
	close_state: Arc<Mutex<CloseState>>,
	exited: watch::Receiver<bool>,
	kill: Mutex<Option<oneshot::Sender<()>>>,
	auth_task: Option<JoinHandle<()>>,
}

enum Exit {
	Process(String),
	Disconnected,
	/// Every page was closed while the process kept running (macOS keeps the app alive).
	PagesClosed,
	Requested,
}

impl ChromiumContext {
	fn start(child: Child, conn: Arc<CdpConnection>, credentials: Option<(String, String)>) -> Self {
		let close_state = Arc::new(Mutex::new(CloseState::default()));
		let (exited_tx, exited) = watch::channel(false);
		let (kill_tx, kill_rx) = oneshot::channel();

		let targets = conn.subscribe();
		tokio::spawn(watch_browser(
			child,
			Arc::clone(&conn),
			targets,
			kill_rx,
			Arc::clone(&close_state),
			exited_tx,
		));

		let auth_task = credentials
			.as_ref()
			.map(|(user, pass)| spawn_auth_responder(Arc::clone(&conn), user.clone(), pass.clone()));

		Self {
			conn,
			sessions: Mutex::new(HashMap::new()),
			credentials,
			close_state,
			exited,
			kill: Mutex::new(Some(kill_tx)),
			auth_task,
		}
	}

	/// Attaches a flattened session to `page`, reusing an earlier one.
	async fn attach(&self, page: &PageId) -> Result<String> {
		if let Some(session_id) = self.sessions.lock().get(page) {
			return Ok(session_id.clone());
		}

		let result = self
			.conn
			.call("Target.attachToTarget", json!({ "targetId": page.as_str(), "flatten": true }), None)
			.await?;
		let session_id = result
			.get("sessionId")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::Protocol("Target.attachToTarget returned no sessionId".to_string()))?
			.to_string();

		if self.credentials.is_some() {
			self.conn
				.call("Fetch.enable", json!({ "handleAuthRequests": true }), Some(&session_id))
				.await?;
		}

		self.sessions.lock().insert(page.clone(), session_id.clone());
		Ok(session_id)
	}

	fn kill(&self) {
		if let Some(kill) = self.kill.lock().take() {
			let _ = kill.send(());
		}
	}

	async fn wait_exited(&self, limit: Duration) -> bool {
		let mut exited = self.exited.clone();
		tokio::time::timeout(limit, async move { exited.wait_for(|done| *done).await.is_ok() })
			.await
			.unwrap_or(false)
	}
}

#[async_trait]
impl EngineContext for ChromiumContext {
	async fn pages(&self) -> Result<Vec<PageId>> {
		let result = self.conn.call("Target.getTargets", json!({}), None).await?;
		let pages = result
			.get("targetInfos")
			.and_then(Value::as_array)
			.map(|infos| {
				infos
					.iter()
					.filter(|info| info.get("type").and_then(Value::as_str) == Some("page"))
					.filter_map(|info| info.get("targetId").and_then(Value::as_str))
					.map(PageId::new)
					.collect()
			})
			.unwrap_or_default();
		Ok(pages)
	}

	async fn new_page(&self) -> Result<PageId> {
		let result = self
			.conn
			.call("Target.createTarget", json!({ "url": "about:blank" }), None)
			.await?;
		let page = result
			.get("targetId")
			.and_then(Value::as_str)
			.map(PageId::new)
			.ok_or_else(|| Error::Protocol("Target.createTarget returned no targetId".to_string()))?;
		if self.credentials.is_some() {
			self.attach(&page).await?;
		}
		Ok(page)
	}

	async fn set_viewport(&self, page: &PageId, viewport: Viewport) -> Result<()> {
		let session_id = self.attach(page).await?;
		self.conn
			.call(
				"Emulation.setDeviceMetricsOverride",
				json!({
					"width": viewport.width,
					"height": viewport.height,
					"deviceScaleFactor": 0,
					"mobile": false,
				}),
				Some(&session_id),
			)
			.await?;
		Ok(())
	}

	fn on_close(&self, handler: CloseHandler) {
		let mut state = self.close_state.lock();
		if state.fired {
			drop(state);
			handler();
		} else {
			state.handlers.push(handler);
		}
	}

	async fn close(self: Box<Self>) -> Result<()> {
		let mut result = Ok(());
		if !self.conn.is_closed() {
			match self.conn.call("Browser.close", json!({}), None).await {
				// The socket drops while the browser shuts down.
				Ok(_) | Err(Error::TargetClosed(_)) => {}
				Err(err) => {
					warn!(target = "foxden.engine", error = %err, "Browser.close failed, killing process");
					self.kill();
					result = Err(err);
				}
			}
		}

		if !self.wait_exited(CLOSE_TIMEOUT).await {
			warn!(target = "foxden.engine", "browser did not exit in time, killing process");
			self.kill();
			if !self.wait_exited(CLOSE_TIMEOUT).await {
				return Err(Error::Timeout("browser process did not exit after kill".to_string()));
			}
		}

		result
	}
}

impl Drop for ChromiumContext {
	fn drop(&mut self) {
		if let Some(task) = self.auth_task.take() {
			task.abort();
		}
		self.kill();
	}
}

/// Waits for the browser to go away, fires close handlers, then reaps the process.
async fn watch_browser(
	mut child: Child,
	conn: Arc<CdpConnection>,
	targets: broadcast::Receiver<CdpEvent>,
	mut kill_rx: oneshot::Receiver<()>,
	close_state: Arc<Mutex<CloseState>>,
	exited_tx: watch::Sender<bool>,
) {
	let exit = tokio::select! {
		status = child.wait() => Exit::Process(match status {
			Ok(status) => status.to_string(),
			Err(err) => err.to_string(),
		}),
		_ = conn.closed() => Exit::Disconnected,
		_ = last_page_closed(targets) => Exit::PagesClosed,
		_ = &mut kill_rx => Exit::Requested,
	};

	match &exit {
		Exit::Process(status) => debug!(target = "foxden.engine", %status, "browser process exited"),
		Exit::Disconnected => debug!(target = "foxden.engine", "devtools connection closed"),
		Exit::PagesClosed => debug!(target = "foxden.engine", "last browser page closed"),
		Exit::Requested => debug!(target = "foxden.engine", "browser kill requested"),
	}

	let handlers = {
		let mut state = close_state.lock();
		state.fired = true;
		std::mem::take(&mut state.handlers)
	};
	for handler in handlers {
		handler();
	}

	match exit {
		Exit::Process(_) => {}
		Exit::Disconnected | Exit::PagesClosed => {
			let graceful = tokio::select! {
				_ = child.wait() => true,
				_ = &mut kill_rx => false,
				_ = tokio::time::sleep(CLOSE_TIMEOUT) => false,
			};
			if !graceful {
				let _ = child.kill().await;
			}
		}
		Exit::Requested => {
			let _ = child.kill().await;
		}
	}

	drop(conn);
	let _ = exited_tx.send(true);
}

/// Open page targets, fed from `Target.*` discovery events.
#[derive(Debug, Default)]
struct PageTracker {
	pages: HashSet<String>,
}

impl PageTracker {
	/// Returns true once a destroyed page leaves no page open.
	fn observe(&mut self, event: &CdpEvent) -> bool {
		match event.method.as_str() {
			"Target.targetCreated" | "Target.targetInfoChanged" => {
				let info = &event.params["targetInfo"];
				if let Some(id) = info["targetId"].as_str() {
					if info["type"].as_str() == Some("page") {
						self.pages.insert(id.to_string());
					}
				}
				false
			}
			"Target.targetDestroyed" => match event.params["targetId"].as_str() {
				Some(id) => self.pages.remove(id) && self.pages.is_empty(),
				None => false,
			},
			_ => false,
		}
	}
}

/// Resolves when the last open page goes away. Never resolves if the event stream ends.
async fn last_page_closed(mut events: broadcast::Receiver<CdpEvent>) {
	let mut tracker = PageTracker::default();
	loop {
		match events.recv().await {
			Ok(event) => {
				if tracker.observe(&event) {
					return;
				}
			}
			Err(RecvError::Lagged(skipped)) => {
				warn!(target = "foxden.engine", skipped, "page tracker lagged behind devtools events");
			}
			Err(RecvError::Closed) => std::future::pending::<()>().await,
		}
	}
}

/// Answers proxy authentication challenges on attached pages.
fn spawn_auth_responder(conn: Arc<CdpConnection>, username: String, password: String) -> JoinHandle<()> {
	let mut events = conn.subscribe();
	tokio::spawn(async move {
		loop {
			let event = match events.recv().await {
				Ok(event) => event,
				Err(RecvError::Lagged(skipped)) => {
					warn!(target = "foxden.engine", skipped, "auth responder lagged behind devtools events");
					continue;
				}
				Err(RecvError::Closed) => break,
			};

			let (Some(session_id), Some(request_id)) = (
				event.session_id.clone(),
				event.params.get("requestId").and_then(Value::as_str).map(str::to_string),
			) else {
				continue;
			};

			let (method, params) = match event.method.as_str() {
				"Fetch.requestPaused" => ("Fetch.continueRequest", json!({ "requestId": request_id })),
				"Fetch.authRequired" => (
					"Fetch.continueWithAuth",
					json!({
						"requestId": request_id,
						"authChallengeResponse": {
							"response": "ProvideCredentials",
							"username": username,
							"password": password,
						},
					}),
				),
				_ => continue,
			};

			let conn = Arc::clone(&conn);
			tokio::spawn(async move {
				if let Err(err) = conn.call(method, params, Some(&session_id)).await {
					debug!(target = "foxden.engine", method, error = %err, "fetch interception reply failed");
				}
			});
		}
	})
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use super::*;
	use crate::engine::{DataDir, ProxyEndpoint, WindowSize};

	fn options() -> LaunchOptions {
		LaunchOptions {
			window: WindowSize { width: 1282, height: 888 },
			data_dir: DataDir::Ephemeral(PathBuf::from("/tmp/foxden-profile-abc")),
			proxy: None,
			geoip: false,
		}
	}

	#[test]
	fn launch_args_cover_window_and_data_dir() {
		let engine = ChromiumEngine::default();
		let args = engine.launch_args(&options());

		assert_eq!(args[0], "--remote-debugging-port=0");
		assert!(args.contains(&"--user-data-dir=/tmp/foxden-profile-abc".to_string()));
		assert!(args.contains(&"--window-size=1282,888".to_string()));
		assert!(args.contains(&"--no-first-run".to_string()));
		assert!(!args.iter().any(|arg| arg.starts_with("--proxy-server")));
		assert!(!args.iter().any(|arg| arg.starts_with("--headless")));
		assert_eq!(args.last().map(String::as_str), Some("about:blank"));
	}

	#[test]
	fn launch_args_include_proxy_and_headless() {
		let engine = ChromiumEngine::new(ChromiumConfig {
			headless: true,
			extra_args: vec!["--disable-gpu".to_string()],
			..ChromiumConfig::default()
		});
		let mut opts = options();
		opts.proxy = Some(ProxyEndpoint {
			server: "socks5://10.0.0.1:1080".to_string(),
			username: Some("u".to_string()),
			password: None,
		});

		let args = engine.launch_args(&opts);
		assert!(args.contains(&"--proxy-server=socks5://10.0.0.1:1080".to_string()));
		assert!(args.contains(&"--headless=new".to_string()));
		assert!(args.contains(&"--disable-gpu".to_string()));
	}

	fn event(method: &str, params: Value) -> CdpEvent {
		CdpEvent {
			method: method.to_string(),
			params,
			session_id: None,
		}
	}

	fn created(id: &str, kind: &str) -> CdpEvent {
		event("Target.targetCreated", json!({ "targetInfo": { "targetId": id, "type": kind } }))
	}

	fn destroyed(id: &str) -> CdpEvent {
		event("Target.targetDestroyed", json!({ "targetId": id }))
	}

	#[test]
	fn page_tracker_fires_when_last_page_closes() {
		let mut tracker = PageTracker::default();
		assert!(!tracker.observe(&created("P1", "page")));
		assert!(!tracker.observe(&created("P2", "page")));
		assert!(!tracker.observe(&created("W1", "service_worker")));

		assert!(!tracker.observe(&destroyed("P1")));
		assert!(!tracker.observe(&destroyed("W1")));
		assert!(tracker.observe(&destroyed("P2")));
	}

	#[test]
	fn page_tracker_ignores_non_page_targets() {
		let mut tracker = PageTracker::default();
		assert!(!tracker.observe(&created("W1", "service_worker")));
		assert!(!tracker.observe(&destroyed("W1")));
		assert!(!tracker.observe(&destroyed("unknown")));
		assert!(!tracker.observe(&event("Page.loadEventFired", json!({}))));
	}

	#[test]
	fn explicit_missing_executable_is_unavailable() {
		let engine = ChromiumEngine::new(ChromiumConfig {
			executable: Some(PathBuf::from("/nonexistent/foxden/chrome")),
			..ChromiumConfig::default()
		});
		assert!(engine.ensure_available().unwrap_err().is_unavailable());
	}
}
