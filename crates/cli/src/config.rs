//! Server configuration assembled from `foxden serve` arguments.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use foxden::SupervisorConfig;
use foxden_runtime::ChromiumConfig;

use crate::cli::ServeArgs;

/// Everything `serve` needs to run.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	/// `host:port` to bind.
	pub bind: String,
	pub profiles_path: PathBuf,
	/// Web UI files served at `/`, if any.
	pub static_dir: Option<PathBuf>,
	pub supervisor: SupervisorConfig,
	pub chromium: ChromiumConfig,
}

impl ServerConfig {
	pub fn from_args(args: &ServeArgs) -> Result<Self> {
		let profiles_path = match &args.profiles {
			Some(path) => path.clone(),
			None => default_profiles_path().context("Cannot determine config directory; pass --profiles")?,
		};

		let mut supervisor = SupervisorConfig {
			readiness_timeout: Duration::from_secs(args.readiness_timeout),
			stop_timeout: Duration::from_secs(args.stop_timeout),
			poll_interval: Duration::from_millis(args.poll_interval_ms.max(1)),
			..SupervisorConfig::default()
		};
		if let Some(dir) = &args.scratch_dir {
			supervisor.scratch_dir = dir.clone();
		}

		Ok(Self {
			bind: format!("{}:{}", args.host, args.port),
			profiles_path,
			static_dir: args.static_dir.clone(),
			supervisor,
			chromium: ChromiumConfig {
				executable: args.browser.clone(),
				headless: args.headless,
				extra_args: Vec::new(),
			},
		})
	}
}

/// `<config dir>/foxden/profiles.json`
pub fn default_profiles_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("foxden").join("profiles.json"))
}
