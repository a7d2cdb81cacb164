//! Engine abstraction consumed by the session supervisor.
//!
//! An [`Engine`] launches one isolated browser instance per call and hands
//! back an [`EngineContext`]. The context owns the running browser: pages,
//! viewport control, the close notification, and shutdown.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// Outer browser window size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
	pub width: u32,
	pub height: u32,
}

/// Page viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
	pub width: u32,
	pub height: u32,
}

/// Browser data directory handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataDir {
	/// Caller-owned directory that outlives the session.
	Persistent(PathBuf),
	/// Session-scoped directory removed on teardown.
	Ephemeral(PathBuf),
}

impl DataDir {
	pub fn path(&self) -> &Path {
		match self {
			DataDir::Persistent(path) | DataDir::Ephemeral(path) => path,
		}
	}

	pub fn is_persistent(&self) -> bool {
		matches!(self, DataDir::Persistent(_))
	}
}

/// Upstream proxy endpoint in `scheme://host:port` form plus optional credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
	pub server: String,
	pub username: Option<String>,
	pub password: Option<String>,
}

impl ProxyEndpoint {
	/// Returns credentials when a username is set. A missing password is sent as empty.
	pub fn credentials(&self) -> Option<(&str, &str)> {
		self.username
			.as_deref()
			.map(|user| (user, self.password.as_deref().unwrap_or_default()))
	}
}

/// Everything an engine needs to start one browser instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
	pub window: WindowSize,
	pub data_dir: DataDir,
	pub proxy: Option<ProxyEndpoint>,
	/// Align locale and timezone with the proxy exit address, where supported.
	pub geoip: bool,
}

/// Identifier of a page (tab) inside an engine context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId(String);

impl PageId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for PageId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

/// Callback fired once when the browser goes away.
pub type CloseHandler = Box<dyn FnOnce() + Send + 'static>;

/// Launches browser instances.
#[async_trait]
pub trait Engine: Send + Sync {
	/// Short engine name used in logs.
	fn name(&self) -> &str;

	/// Checks that the engine can be launched at all (binary present, etc.).
	fn ensure_available(&self) -> Result<()>;

	/// Starts a browser and returns its running context.
	async fn launch(&self, options: LaunchOptions) -> Result<Box<dyn EngineContext>>;
}

/// A running browser instance.
#[async_trait]
pub trait EngineContext: Send + Sync {
	/// Lists open pages, oldest first.
	async fn pages(&self) -> Result<Vec<PageId>>;

	/// Opens a blank page.
	async fn new_page(&self) -> Result<PageId>;

	/// Resizes the viewport of `page`.
	async fn set_viewport(&self, page: &PageId, viewport: Viewport) -> Result<()>;

	/// Registers `handler` to run when the browser closes for any reason.
	///
	/// Runs immediately if the browser is already closed.
	fn on_close(&self, handler: CloseHandler);

	/// Closes the browser and releases its resources.
	async fn close(self: Box<Self>) -> Result<()>;
}
