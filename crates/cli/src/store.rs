//! JSON file store for profiles.
//!
//! The file holds a JSON array of profiles. A file that is not valid JSON is
//! moved aside to `<file>.corrupted.<unix ts>` and treated as empty. Valid JSON
//! that does not describe profiles is reported and left in place. Writes go to
//! a sibling temp file that is then renamed over the original.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use foxden_protocol::Profile;
use parking_lot::Mutex;
use serde_json::error::Category;
use thiserror::Error;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("Profile '{0}' already exists")]
	Duplicate(String),

	#[error("Profile '{0}' not found")]
	NotFound(String),

	#[error("failed to access {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("{} does not hold valid profiles: {source}", path.display())]
	InvalidData {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
	move |source| StoreError::Io {
		path: path.to_path_buf(),
		source,
	}
}

/// Profile store backed by a single JSON file.
pub struct ProfileStore {
	path: PathBuf,
	/// Serializes read-modify-write cycles.
	lock: Mutex<()>,
}

impl ProfileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn list(&self) -> Result<Vec<Profile>> {
		let _guard = self.lock.lock();
		self.load()
	}

	pub fn find(&self, name: &str) -> Result<Option<Profile>> {
		let _guard = self.lock.lock();
		Ok(self.load()?.into_iter().find(|profile| profile.name == name))
	}

	/// Appends `profile`. Names are unique.
	pub fn create(&self, profile: Profile) -> Result<()> {
		let _guard = self.lock.lock();
		let mut profiles = self.load()?;
		if profiles.iter().any(|existing| existing.name == profile.name) {
			return Err(StoreError::Duplicate(profile.name));
		}
		profiles.push(profile);
		self.save(&profiles)
	}

	/// Replaces the profile called `name`. Renaming onto another existing profile is a conflict.
	pub fn update(&self, name: &str, profile: Profile) -> Result<()> {
		let _guard = self.lock.lock();
		let mut profiles = self.load()?;
		let index = profiles
			.iter()
			.position(|existing| existing.name == name)
			.ok_or_else(|| StoreError::NotFound(name.to_string()))?;
		if profile.name != name && profiles.iter().any(|existing| existing.name == profile.name) {
			return Err(StoreError::Duplicate(profile.name));
		}
		profiles[index] = profile;
		self.save(&profiles)
	}

	pub fn delete(&self, name: &str) -> Result<()> {
		let _guard = self.lock.lock();
		let mut profiles = self.load()?;
		let before = profiles.len();
		profiles.retain(|profile| profile.name != name);
		if profiles.len() == before {
			return Err(StoreError::NotFound(name.to_string()));
		}
		self.save(&profiles)
	}

	fn load(&self) -> Result<Vec<Profile>> {
		let content = match std::fs::read_to_string(&self.path) {
			Ok(content) => content,
			Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(io_error(&self.path)(err)),
		};

		match serde_json::from_str(&content) {
			Ok(profiles) => Ok(profiles),
			Err(err) if err.classify() == Category::Data => {
				warn!(
					target = "foxden.store",
					path = %self.path.display(),
					error = %err,
					"profile store holds invalid profiles"
				);
				Err(StoreError::InvalidData {
					path: self.path.clone(),
					source: err,
				})
			}
			Err(err) => {
				let backup = self.backup_path();
				warn!(
					target = "foxden.store",
					path = %self.path.display(),
					backup = %backup.display(),
					error = %err,
					"profile store is corrupted, moving it aside"
				);
				std::fs::rename(&self.path, &backup).map_err(io_error(&self.path))?;
				Ok(Vec::new())
			}
		}
	}

	fn save(&self, profiles: &[Profile]) -> Result<()> {
		if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent).map_err(io_error(parent))?;
		}

		let temp = self.sibling("tmp");
		let json = serde_json::to_string_pretty(profiles)?;
		if let Err(err) = std::fs::write(&temp, json).and_then(|()| std::fs::rename(&temp, &self.path)) {
			let _ = std::fs::remove_file(&temp);
			return Err(io_error(&self.path)(err));
		}

		debug!(target = "foxden.store", path = %self.path.display(), count = profiles.len(), "saved profiles");
		Ok(())
	}

	fn backup_path(&self) -> PathBuf {
		self.sibling(&format!("corrupted.{}", Utc::now().timestamp()))
	}

	fn sibling(&self, suffix: &str) -> PathBuf {
		let mut name = self.path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
		name.push(".");
		name.push(suffix);
		self.path.with_file_name(name)
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn store(temp: &TempDir) -> ProfileStore {
		ProfileStore::new(temp.path().join("nested").join("profiles.json"))
	}

	#[test]
	fn missing_file_is_empty() {
		let temp = TempDir::new().unwrap();
		assert!(store(&temp).list().unwrap().is_empty());
	}

	#[test]
	fn create_find_update_delete() {
		let temp = TempDir::new().unwrap();
		let store = store(&temp);

		store.create(Profile::named("Work")).unwrap();
		store.create(Profile::named("Home")).unwrap();
		assert!(matches!(store.create(Profile::named("Work")), Err(StoreError::Duplicate(_))));

		let mut work = store.find("Work").unwrap().unwrap();
		assert_eq!(work.viewport_width, 1280);

		work.viewport_width = 1600;
		store.update("Work", work).unwrap();
		assert_eq!(store.find("Work").unwrap().unwrap().viewport_width, 1600);

		assert!(matches!(store.update("Nope", Profile::named("Nope")), Err(StoreError::NotFound(_))));
		assert!(matches!(store.update("Work", Profile::named("Home")), Err(StoreError::Duplicate(_))));

		store.delete("Home").unwrap();
		assert!(matches!(store.delete("Home"), Err(StoreError::NotFound(_))));

		let names: Vec<_> = store.list().unwrap().into_iter().map(|p| p.name).collect();
		assert_eq!(names, vec!["Work"]);
		assert!(!temp.path().join("nested").join("profiles.json.tmp").exists());
	}

	#[test]
	fn saved_file_is_a_json_array() {
		let temp = TempDir::new().unwrap();
		let store = store(&temp);
		store.create(Profile::named("Work")).unwrap();

		let raw = std::fs::read_to_string(store.path()).unwrap();
		let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
		assert_eq!(value[0]["name"], "Work");
		assert_eq!(value[0]["proxy"]["protocol"], "socks5");
	}

	#[test]
	fn corrupted_file_is_moved_aside() {
		let temp = TempDir::new().unwrap();
		let store = store(&temp);
		std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
		std::fs::write(store.path(), "{ not json").unwrap();

		assert!(store.list().unwrap().is_empty());
		assert!(!store.path().exists());

		let backups: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
			.unwrap()
			.map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
			.filter(|name| name.starts_with("profiles.json.corrupted."))
			.collect();
		assert_eq!(backups.len(), 1);

		store.create(Profile::named("Fresh")).unwrap();
		assert_eq!(store.list().unwrap().len(), 1);
	}

	#[test]
	fn null_proxy_port_keeps_every_profile() {
		let temp = TempDir::new().unwrap();
		let store = store(&temp);
		std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
		let raw = r#"[
			{ "name": "Work", "proxy": { "host": "", "port": null } },
			{ "name": "Home", "viewport_width": 1600 }
		]"#;
		std::fs::write(store.path(), raw).unwrap();

		let profiles = store.list().unwrap();
		assert_eq!(profiles.len(), 2);
		assert_eq!(profiles[0].proxy.port, 0);
		assert_eq!(profiles[1].viewport_width, 1600);
		assert!(store.path().exists());
	}

	#[test]
	fn mistyped_profiles_are_reported_not_moved() {
		let temp = TempDir::new().unwrap();
		let store = store(&temp);
		std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
		let raw = r#"[{ "name": "Work", "viewport_width": "wide" }]"#;
		std::fs::write(store.path(), raw).unwrap();

		assert!(matches!(store.list(), Err(StoreError::InvalidData { .. })));
		assert!(matches!(store.create(Profile::named("Home")), Err(StoreError::InvalidData { .. })));
		assert_eq!(std::fs::read_to_string(store.path()).unwrap(), raw);
	}
}
