//! Profile validation applied before a profile is stored.

use foxden_protocol::{Profile, ProxyConfig};
use thiserror::Error;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_PROXY_HOST_LEN: usize = 255;
pub const MIN_VIEWPORT: u32 = 320;
pub const MAX_VIEWPORT: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn invalid(message: impl Into<String>) -> ValidationError {
	ValidationError(message.into())
}

pub fn validate_profile(profile: &Profile) -> Result<(), ValidationError> {
	let name = profile.name.trim();
	if name.is_empty() {
		return Err(invalid("Profile name cannot be empty"));
	}
	if name.chars().count() > MAX_NAME_LEN {
		return Err(invalid(format!("Profile name must be {MAX_NAME_LEN} characters or less")));
	}

	let viewport = MIN_VIEWPORT..=MAX_VIEWPORT;
	if !viewport.contains(&profile.viewport_width) {
		return Err(invalid(format!("Viewport width must be between {MIN_VIEWPORT} and {MAX_VIEWPORT}")));
	}
	if !viewport.contains(&profile.viewport_height) {
		return Err(invalid(format!("Viewport height must be between {MIN_VIEWPORT} and {MAX_VIEWPORT}")));
	}

	if profile.storage_enabled && profile.persistent_dir.trim().is_empty() {
		return Err(invalid("Persistent storage directory cannot be empty"));
	}

	let proxy = &profile.proxy;
	if proxy.enabled || !proxy.host.trim().is_empty() {
		validate_proxy(proxy).map_err(|err| invalid(format!("Proxy error: {err}")))?;
	}

	Ok(())
}

fn validate_proxy(proxy: &ProxyConfig) -> Result<(), ValidationError> {
	let host = proxy.host.trim();
	if proxy.enabled && (host.is_empty() || proxy.port == 0) {
		return Err(invalid("Host and port required when proxy is enabled"));
	}
	if host.chars().count() > MAX_PROXY_HOST_LEN {
		return Err(invalid(format!("Proxy host must be {MAX_PROXY_HOST_LEN} characters or less")));
	}
	if proxy.port == 0 {
		return Err(invalid("Proxy port must be between 1 and 65535"));
	}
	Ok(())
}
