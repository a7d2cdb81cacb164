//! Locates a Chromium-family browser executable.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable that overrides browser discovery.
pub const BROWSER_ENV: &str = "FOXDEN_BROWSER";

/// Resolves the browser to launch.
///
/// Order: explicit path, `FOXDEN_BROWSER`, platform candidates.
pub fn resolve_browser_executable(explicit: Option<&Path>) -> Result<PathBuf> {
	if let Some(path) = explicit {
		return existing(path).ok_or_else(|| Error::EngineUnavailable(format!("browser executable not found at {}", path.display())));
	}

	if let Some(value) = std::env::var_os(BROWSER_ENV) {
		let path = PathBuf::from(value);
		return existing(&path).ok_or_else(|| {
			Error::EngineUnavailable(format!("{BROWSER_ENV} points to {}, which does not exist", path.display()))
		});
	}

	find_browser_executable().ok_or_else(|| {
		Error::EngineUnavailable(format!(
			"could not find Chrome/Chromium. Install one or set {BROWSER_ENV} to the browser executable"
		))
	})
}

fn existing(path: &Path) -> Option<PathBuf> {
	if path.components().count() == 1 {
		return which::which(path).ok();
	}
	path.exists().then(|| path.to_path_buf())
}

/// Searches well-known install locations and `PATH`.
pub fn find_browser_executable() -> Option<PathBuf> {
	let candidates: Vec<String> = if cfg!(target_os = "macos") {
		vec![
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
			"/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_browser_candidates()
	} else {
		vec![
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"microsoft-edge",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	};

	for candidate in candidates {
		if candidate.starts_with('/') || candidate.contains('\\') || candidate.contains(':') {
			let path = PathBuf::from(&candidate);
			if path.exists() {
				debug!(target = "foxden.engine", path = %path.display(), "found browser executable");
				return Some(path);
			}
		} else if let Ok(path) = which::which(&candidate) {
			debug!(target = "foxden.engine", path = %path.display(), "found browser on PATH");
			return Some(path);
		}
	}

	None
}

fn windows_browser_candidates() -> Vec<String> {
	let mut candidates = Vec::new();

	let mut roots = Vec::new();
	for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
		if let Ok(value) = std::env::var(key) {
			roots.push(PathBuf::from(value));
		}
	}
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Chromium", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["BraveSoftware", "Brave-Browser", "Application", "brave.exe"],
	];

	for root in roots {
		for suffix in suffixes {
			let mut path = root.clone();
			for component in *suffix {
				path.push(component);
			}
			candidates.push(path.to_string_lossy().to_string());
		}
	}

	candidates.extend(["chrome.exe", "msedge.exe", "brave.exe"].map(str::to_string));
	candidates
}
