//! HTTP API.

mod profiles;
mod sessions;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use foxden::Supervisor;
use foxden_runtime::ChromiumEngine;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::store::ProfileStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
	pub supervisor: Arc<Supervisor>,
	pub store: Arc<ProfileStore>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(|| async { "ok" }))
		.route("/api/profiles", get(profiles::list).post(profiles::create))
		.route(
			"/api/profiles/{name}",
			get(profiles::get).put(profiles::update).delete(profiles::delete),
		)
		.route(
			"/api/session",
			get(sessions::list).post(sessions::start).delete(sessions::stop),
		)
		.layer(CorsLayer::permissive())
		.with_state(state)
}

/// Serves files under `dir` for every path the API does not handle; `/` maps to `index.html`.
pub fn with_static_files(app: Router, dir: &Path) -> Router {
	app.fallback_service(ServeDir::new(dir))
}

/// Serves the API until SIGINT/SIGTERM, then stops every session.
pub async fn serve(config: ServerConfig) -> Result<()> {
	let engine = ChromiumEngine::new(config.chromium.clone());
	match engine.executable() {
		Ok(path) => info!(target = "foxden.http", browser = %path.display(), "using browser"),
		Err(err) => warn!(target = "foxden.http", error = %err, "no browser found, sessions cannot start until one is installed"),
	}

	let supervisor = Arc::new(Supervisor::new(Arc::new(engine), config.supervisor.clone()));
	let store = Arc::new(ProfileStore::new(config.profiles_path.clone()));
	let state = AppState {
		supervisor: Arc::clone(&supervisor),
		store: Arc::clone(&store),
	};

	let listener = TcpListener::bind(&config.bind)
		.await
		.with_context(|| format!("Failed to bind {}", config.bind))?;
	let addr = listener.local_addr().context("Failed to read listener address")?;
	info!(target = "foxden.http", %addr, profiles = %store.path().display(), "listening");

	let mut app = router(state);
	if let Some(dir) = &config.static_dir {
		info!(target = "foxden.http", dir = %dir.display(), "serving web UI");
		app = with_static_files(app, dir);
	}

	let served = axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("HTTP server failed");

	supervisor.shutdown().await;
	info!(target = "foxden.http", "server stopped");
	served
}

#[cfg(unix)]
async fn shutdown_signal() {
	use tokio::signal::unix::{SignalKind, signal};

	let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
		(Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
		(Err(err), _) | (_, Err(err)) => {
			warn!(target = "foxden.http", error = %err, "failed to install signal handlers, falling back to Ctrl+C");
			let _ = tokio::signal::ctrl_c().await;
			return;
		}
	};

	tokio::select! {
		_ = sigterm.recv() => info!(target = "foxden.http", "received SIGTERM, shutting down"),
		_ = sigint.recv() => info!(target = "foxden.http", "received SIGINT, shutting down"),
	}
}

#[cfg(not(unix))]
async fn shutdown_signal() {
	if tokio::signal::ctrl_c().await.is_ok() {
		info!(target = "foxden.http", "received Ctrl+C, shutting down");
	}
}
