//! Browser profile records.

use serde::{Deserialize, Deserializer, Serialize};

/// Default viewport width applied to profiles that omit it.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
/// Default viewport height applied to profiles that omit it.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 800;

/// Stored configuration for one logical browser profile.
///
/// Every field is optional on the wire; missing fields take the documented defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
	/// Unique profile name, also used to derive session ids.
	pub name: String,
	/// Viewport width in CSS pixels.
	pub viewport_width: u32,
	/// Viewport height in CSS pixels.
	pub viewport_height: u32,
	/// Use the caller-supplied screen size instead of the stored viewport.
	pub fullscreen: bool,
	/// Keep browser data in [`persistent_dir`](Self::persistent_dir) across sessions.
	pub storage_enabled: bool,
	/// User-chosen data directory, only honoured when storage is enabled.
	#[serde(deserialize_with = "null_as_default")]
	pub persistent_dir: String,
	/// Ask the engine to align locale/timezone with the proxy exit address.
	pub use_geoip: bool,
	/// Upstream proxy settings.
	#[serde(deserialize_with = "null_as_default")]
	pub proxy: ProxyConfig,
}

impl Default for Profile {
	fn default() -> Self {
		Self {
			name: String::new(),
			viewport_width: DEFAULT_VIEWPORT_WIDTH,
			viewport_height: DEFAULT_VIEWPORT_HEIGHT,
			fullscreen: false,
			storage_enabled: false,
			persistent_dir: String::new(),
			use_geoip: false,
			proxy: ProxyConfig::default(),
		}
	}
}

impl Profile {
	/// Creates a profile with defaults and the given `name`.
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	/// Returns the persistent directory when storage is enabled and a directory is set.
	pub fn persistent_dir(&self) -> Option<&str> {
		let dir = self.persistent_dir.trim();
		(self.storage_enabled && !dir.is_empty()).then_some(dir)
	}
}

/// Upstream proxy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
	/// Proxy is only applied when explicitly enabled.
	pub enabled: bool,
	#[serde(deserialize_with = "null_as_default")]
	pub host: String,
	/// `null` reads as 0, i.e. unset.
	#[serde(deserialize_with = "null_as_default")]
	pub port: u16,
	pub protocol: ProxyProtocol,
	#[serde(deserialize_with = "null_as_default")]
	pub username: String,
	#[serde(deserialize_with = "null_as_default")]
	pub password: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Proxy URL scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
	#[default]
	Socks5,
	Http,
	Https,
}

impl ProxyProtocol {
	/// URL scheme used when building the proxy endpoint.
	pub fn scheme(self) -> &'static str {
		match self {
			ProxyProtocol::Socks5 => "socks5",
			ProxyProtocol::Http => "http",
			ProxyProtocol::Https => "https",
		}
	}
}

impl std::fmt::Display for ProxyProtocol {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.scheme())
	}
}

/// Screen dimensions reported by the client, used for fullscreen profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
	pub width: u32,
	pub height: u32,
}

impl ScreenSize {
	/// Builds a screen size only when both dimensions are present and non-zero.
	pub fn from_parts(width: Option<u32>, height: Option<u32>) -> Option<Self> {
		match (width, height) {
			(Some(width), Some(height)) if width > 0 && height > 0 => Some(Self { width, height }),
			_ => None,
		}
	}
}
