use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Child;
use tracing::debug;

use crate::error::{Error, Result};

/// File Chromium writes into its data directory once remote debugging is listening.
pub const DEVTOOLS_PORT_FILE: &str = "DevToolsActivePort";

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const MAX_POLLS: u32 = 75;

/// `/json/version` response subset.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
}

/// Parses `DevToolsActivePort`: the port on the first line, the browser target path on the second.
pub fn parse_devtools_port_file(contents: &str) -> Option<(u16, String)> {
	let mut lines = contents.lines().map(str::trim);
	let port = lines.next()?.parse::<u16>().ok().filter(|port| *port != 0)?;
	let path = lines.next().filter(|path| path.starts_with('/'))?;
	Some((port, path.to_string()))
}

/// Asks the browser for its WebSocket URL over HTTP.
pub async fn fetch_version(port: u16) -> Result<CdpVersionInfo> {
	let client = reqwest::Client::builder()
		.timeout(Duration::from_millis(400))
		.build()
		.map_err(|err| Error::ConnectionFailed(format!("failed to create HTTP client: {err}")))?;
	let mut last_error = "no response".to_string();

	for url in [
		format!("http://127.0.0.1:{port}/json/version"),
		format!("http://localhost:{port}/json/version"),
		format!("http://[::1]:{port}/json/version"),
	] {
		let response = match client.get(&url).send().await {
			Ok(response) => response,
			Err(err) => {
				last_error = err.to_string();
				continue;
			}
		};

		if !response.status().is_success() {
			last_error = format!("unexpected status {}", response.status());
			continue;
		}

		return response
			.json::<CdpVersionInfo>()
			.await
			.map_err(|err| Error::ConnectionFailed(format!("failed to parse /json/version: {err}")));
	}

	Err(Error::ConnectionFailed(format!("port {port}: {last_error}")))
}

/// Waits until the browser started with `--remote-debugging-port=0` publishes its endpoint.
///
/// Fails early if `child` exits first.
pub async fn wait_for_devtools_endpoint(data_dir: &Path, child: &mut Child) -> Result<String> {
	let port_file = data_dir.join(DEVTOOLS_PORT_FILE);

	for _ in 0..MAX_POLLS {
		tokio::time::sleep(POLL_INTERVAL).await;

		if let Ok(Some(status)) = child.try_wait() {
			return Err(Error::LaunchFailed(format!(
				"browser exited before the debugging endpoint became available (status: {status})"
			)));
		}

		let Ok(contents) = tokio::fs::read_to_string(&port_file).await else {
			continue;
		};
		let Some((port, path)) = parse_devtools_port_file(&contents) else {
			continue;
		};

		return match fetch_version(port).await {
			Ok(info) => {
				debug!(
					target = "foxden.engine",
					port,
					browser = info.browser.as_deref().unwrap_or("unknown"),
					"devtools endpoint ready"
				);
				Ok(info.web_socket_debugger_url)
			}
			Err(err) => {
				debug!(target = "foxden.engine", port, error = %err, "version probe failed, using port file path");
				Ok(format!("ws://127.0.0.1:{port}{path}"))
			}
		};
	}

	Err(Error::LaunchFailed(format!(
		"debugging endpoint did not appear in {} within {}s",
		data_dir.display(),
		(POLL_INTERVAL * MAX_POLLS).as_secs()
	)))
}
