//! Translation of a profile into engine launch options.

use foxden_protocol::{Profile, ProxyConfig, ScreenSize};
use foxden_runtime::{DataDir, LaunchOptions, ProxyEndpoint, Viewport, WindowSize};

/// Width of the browser frame around the viewport.
pub const WINDOW_CHROME_WIDTH: u32 = 2;
/// Height of the tab strip and toolbar above the viewport.
pub const WINDOW_CHROME_HEIGHT: u32 = 88;

/// Fullscreen profiles use the client's screen when both dimensions are known.
pub fn resolve_viewport(profile: &Profile, screen: Option<ScreenSize>) -> Viewport {
	match screen {
		Some(screen) if profile.fullscreen => Viewport {
			width: screen.width,
			height: screen.height,
		},
		_ => Viewport {
			width: profile.viewport_width,
			height: profile.viewport_height,
		},
	}
}

/// Outer window size that fits `viewport`.
pub fn window_for(viewport: Viewport) -> WindowSize {
	WindowSize {
		width: viewport.width.saturating_add(WINDOW_CHROME_WIDTH),
		height: viewport.height.saturating_add(WINDOW_CHROME_HEIGHT),
	}
}

/// Returns the proxy endpoint when it is enabled and fully specified.
pub fn resolve_proxy(proxy: &ProxyConfig) -> Option<ProxyEndpoint> {
	let host = proxy.host.trim();
	if !proxy.enabled || host.is_empty() || proxy.port == 0 {
		return None;
	}

	let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
	Some(ProxyEndpoint {
		server: format!("{}://{}:{}", proxy.protocol.scheme(), host, proxy.port),
		username: non_empty(&proxy.username),
		password: non_empty(&proxy.password),
	})
}

/// Assembles launch options for `profile`.
pub fn launch_options(profile: &Profile, viewport: Viewport, data_dir: DataDir) -> LaunchOptions {
	let proxy = resolve_proxy(&profile.proxy);
	let geoip = proxy.is_some() && profile.use_geoip;
	LaunchOptions {
		window: window_for(viewport),
		data_dir,
		proxy,
		geoip,
	}
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use foxden_protocol::ProxyProtocol;

	use super::*;

	fn proxied_profile() -> Profile {
		let mut profile = Profile::named("Proxied");
		profile.proxy = ProxyConfig {
			enabled: true,
			host: "10.0.0.5".to_string(),
			port: 3128,
			protocol: ProxyProtocol::Http,
			username: "alice".to_string(),
			password: String::new(),
		};
		profile
	}

	#[test]
	fn fullscreen_uses_screen_when_present() {
		let mut profile = Profile::named("Wide");
		profile.fullscreen = true;
		let screen = ScreenSize { width: 2560, height: 1440 };

		assert_eq!(resolve_viewport(&profile, Some(screen)), Viewport { width: 2560, height: 1440 });
		assert_eq!(resolve_viewport(&profile, None), Viewport { width: 1280, height: 800 });

		profile.fullscreen = false;
		assert_eq!(resolve_viewport(&profile, Some(screen)), Viewport { width: 1280, height: 800 });
	}

	#[test]
	fn window_adds_browser_chrome() {
		assert_eq!(window_for(Viewport { width: 1280, height: 800 }), WindowSize { width: 1282, height: 888 });
	}

	#[test]
	fn proxy_requires_enabled_host_and_port() {
		let profile = proxied_profile();
		let endpoint = resolve_proxy(&profile.proxy).unwrap();
		assert_eq!(endpoint.server, "http://10.0.0.5:3128");
		assert_eq!(endpoint.username.as_deref(), Some("alice"));
		assert_eq!(endpoint.password, None);

		let mut disabled = profile.proxy.clone();
		disabled.enabled = false;
		assert_eq!(resolve_proxy(&disabled), None);

		let mut no_port = profile.proxy.clone();
		no_port.port = 0;
		assert_eq!(resolve_proxy(&no_port), None);

		let mut no_host = profile.proxy;
		no_host.host = " ".to_string();
		assert_eq!(resolve_proxy(&no_host), None);
	}

	#[test]
	fn geoip_only_with_resolved_proxy() {
		let dir = || DataDir::Ephemeral(PathBuf::from("/tmp/x"));

		let mut profile = proxied_profile();
		profile.use_geoip = true;
		assert!(launch_options(&profile, Viewport { width: 800, height: 600 }, dir()).geoip);

		profile.proxy.enabled = false;
		let options = launch_options(&profile, Viewport { width: 800, height: 600 }, dir());
		assert!(!options.geoip);
		assert_eq!(options.proxy, None);
	}
}
