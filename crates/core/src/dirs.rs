//! Working-directory lifecycle.
//!
//! A session either uses the profile's persistent directory, which is never
//! deleted, or an ephemeral directory allocated under the scratch area. The
//! ephemeral path lives in an [`EphemeralSlot`] shared by the registry and the
//! execution unit; whoever cleans up first takes it out of the slot, so the
//! directory is removed at most once.

use std::io;
use std::path::PathBuf;

use foxden_protocol::Profile;
use foxden_runtime::DataDir;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Name prefix of ephemeral session directories.
pub const EPHEMERAL_PREFIX: &str = "foxden-profile-";

/// Parent directory for ephemeral session directories.
#[derive(Debug, Clone)]
pub struct ScratchArea {
	root: PathBuf,
}

impl ScratchArea {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Creates a new uniquely named directory. The caller owns its removal.
	pub fn allocate(&self) -> io::Result<PathBuf> {
		std::fs::create_dir_all(&self.root)?;
		let dir = tempfile::Builder::new().prefix(EPHEMERAL_PREFIX).tempdir_in(&self.root)?;
		Ok(dir.keep())
	}
}

impl Default for ScratchArea {
	fn default() -> Self {
		Self::new(std::env::temp_dir())
	}
}

/// Holds a session's ephemeral directory until it is cleaned up.
#[derive(Debug, Default)]
pub struct EphemeralSlot(Mutex<Option<PathBuf>>);

impl EphemeralSlot {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record(&self, path: PathBuf) {
		*self.0.lock() = Some(path);
	}

	pub fn path(&self) -> Option<PathBuf> {
		self.0.lock().clone()
	}

	/// Removes the recorded directory, if any. Later calls are no-ops.
	///
	/// Failures are logged, never returned.
	pub fn cleanup(&self) {
		let Some(path) = self.0.lock().take() else {
			return;
		};

		match std::fs::remove_dir_all(&path) {
			Ok(()) => debug!(target = "foxden.session", dir = %path.display(), "removed ephemeral directory"),
			Err(err) if err.kind() == io::ErrorKind::NotFound => {}
			Err(err) => warn!(
				target = "foxden.session",
				dir = %path.display(),
				error = %err,
				"failed to remove ephemeral directory"
			),
		}
	}
}

/// Picks the data directory for `profile`.
///
/// Persistent directories are created when missing and made absolute.
/// Otherwise a fresh ephemeral directory is allocated and recorded in `slot`.
pub fn resolve_data_dir(profile: &Profile, scratch: &ScratchArea, slot: &EphemeralSlot) -> io::Result<DataDir> {
	if let Some(dir) = profile.persistent_dir() {
		let path = PathBuf::from(dir);
		std::fs::create_dir_all(&path)?;
		let path = std::path::absolute(&path)?;
		return Ok(DataDir::Persistent(path));
	}

	let path = scratch.allocate()?;
	slot.record(path.clone());
	Ok(DataDir::Ephemeral(path))
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn ephemeral_dir_is_recorded_and_removed_once() {
		let temp = TempDir::new().unwrap();
		let scratch = ScratchArea::new(temp.path());
		let slot = EphemeralSlot::new();

		let dir = resolve_data_dir(&Profile::named("Work"), &scratch, &slot).unwrap();
		let DataDir::Ephemeral(path) = dir else {
			panic!("expected ephemeral dir, got {dir:?}");
		};
		assert!(path.is_dir());
		assert!(path.file_name().unwrap().to_string_lossy().starts_with(EPHEMERAL_PREFIX));
		assert_eq!(slot.path(), Some(path.clone()));

		slot.cleanup();
		assert!(!path.exists());
		assert_eq!(slot.path(), None);

		// Second cleanup must not touch a directory recreated at the same path.
		std::fs::create_dir(&path).unwrap();
		slot.cleanup();
		assert!(path.exists());
	}

	#[test]
	fn persistent_dir_is_created_and_not_recorded() {
		let temp = TempDir::new().unwrap();
		let target = temp.path().join("profiles").join("work");
		let mut profile = Profile::named("Work");
		profile.storage_enabled = true;
		profile.persistent_dir = target.to_string_lossy().to_string();

		let slot = EphemeralSlot::new();
		let dir = resolve_data_dir(&profile, &ScratchArea::new(temp.path()), &slot).unwrap();

		assert_eq!(dir, DataDir::Persistent(target.clone()));
		assert!(target.is_dir());
		assert_eq!(slot.path(), None);
	}

	#[test]
	fn storage_without_dir_falls_back_to_ephemeral() {
		let temp = TempDir::new().unwrap();
		let mut profile = Profile::named("Work");
		profile.storage_enabled = true;
		profile.persistent_dir = "   ".to_string();

		let slot = EphemeralSlot::new();
		let dir = resolve_data_dir(&profile, &ScratchArea::new(temp.path()), &slot).unwrap();
		assert!(!dir.is_persistent());
		slot.cleanup();
	}

	#[test]
	fn cleanup_tolerates_missing_directory() {
		let temp = TempDir::new().unwrap();
		let slot = EphemeralSlot::new();
		slot.record(temp.path().join("gone"));
		slot.cleanup();
		assert_eq!(slot.path(), None);
	}
}
