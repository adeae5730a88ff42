// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project settings: which project to talk to, with which keys, and where.
//!
//! Settings are resolved from layered sources, highest precedence last:
//!
//! 1. Built-in defaults
//! 2. A TOML file
//! 3. Environment variables (`KEEN_PROJECT_ID`, `KEEN_MASTER_KEY`,
//!    `KEEN_WRITE_KEY`, `KEEN_READ_KEY`, `KEEN_SERVER_URL`)
//!
//! Keys may also be read from a file named by `<VAR>_FILE`, e.g.
//! `KEEN_WRITE_KEY_FILE=/run/secrets/keen_write_key`.
//!
//! ```toml
//! project_id = "5f1e..."
//! write_key = "..."
//! base_url = "https://api.keen.io/3.0"
//! ```

use std::path::{Path, PathBuf};

use keen_core::{ApiKey, KeyKind, ProjectKeys};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

/// Service root used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.keen.io/3.0";

pub const ENV_PROJECT_ID: &str = "KEEN_PROJECT_ID";
pub const ENV_MASTER_KEY: &str = "KEEN_MASTER_KEY";
pub const ENV_WRITE_KEY: &str = "KEEN_WRITE_KEY";
pub const ENV_READ_KEY: &str = "KEEN_READ_KEY";
pub const ENV_SERVER_URL: &str = "KEEN_SERVER_URL";

#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("failed to read settings file {}: {source}", .path.display())]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse settings file {}: {source}", .path.display())]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("failed to read {var} from {}: {source}", .path.display())]
	SecretFile {
		var: String,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("project id is not configured")]
	MissingProjectId,

	#[error("no API key is configured")]
	MissingKeys,
}

/// Resolved settings for one project.
#[derive(Debug, Clone)]
pub struct ProjectSettings {
	pub project_id: String,
	pub keys: ProjectKeys,
	pub base_url: String,
}

impl ProjectSettings {
	pub fn new(project_id: impl Into<String>) -> Self {
		Self {
			project_id: project_id.into(),
			keys: ProjectKeys::default(),
			base_url: DEFAULT_BASE_URL.to_string(),
		}
	}

	pub fn master_key(mut self, key: impl Into<String>) -> Self {
		self.keys.master = Some(ApiKey::new(key));
		self
	}

	pub fn write_key(mut self, key: impl Into<String>) -> Self {
		self.keys.write = Some(ApiKey::new(key));
		self
	}

	pub fn read_key(mut self, key: impl Into<String>) -> Self {
		self.keys.read = Some(ApiKey::new(key));
		self
	}

	pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into();
		self
	}

	/// The key to use for `kind`, falling back to the master key.
	pub fn key(&self, kind: KeyKind) -> Option<&ApiKey> {
		self.keys.for_kind(kind)
	}

	/// Loads settings from defaults and the process environment.
	pub fn from_env() -> Result<Self, SettingsError> {
		load(vec![Box::new(DefaultsSource), Box::new(EnvSource::new())])
	}

	/// Loads settings from defaults, `path`, and the process environment.
	///
	/// A missing file is treated as empty.
	pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
		load(vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(path)),
			Box::new(EnvSource::new()),
		])
	}
}

/// A partially specified set of settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSettingsLayer {
	pub project_id: Option<String>,
	pub master_key: Option<ApiKey>,
	pub write_key: Option<ApiKey>,
	pub read_key: Option<ApiKey>,
	pub base_url: Option<String>,
}

impl ProjectSettingsLayer {
	/// Overlays `other` onto this layer, field by field.
	pub fn merge(&mut self, other: ProjectSettingsLayer) {
		if other.project_id.is_some() {
			self.project_id = other.project_id;
		}
		if other.master_key.is_some() {
			self.master_key = other.master_key;
		}
		if other.write_key.is_some() {
			self.write_key = other.write_key;
		}
		if other.read_key.is_some() {
			self.read_key = other.read_key;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
	}

	/// Resolves the layer, requiring a project id and at least one key.
	pub fn finalize(self) -> Result<ProjectSettings, SettingsError> {
		let project_id = self
			.project_id
			.filter(|id| !id.trim().is_empty())
			.ok_or(SettingsError::MissingProjectId)?;

		let keys = ProjectKeys {
			master: self.master_key,
			write: self.write_key,
			read: self.read_key,
		};
		if keys.is_empty() {
			return Err(SettingsError::MissingKeys);
		}

		let base_url = self
			.base_url
			.filter(|url| !url.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

		Ok(ProjectSettings {
			project_id,
			keys,
			base_url,
		})
	}
}

impl From<ProjectSettings> for ProjectSettingsLayer {
	fn from(settings: ProjectSettings) -> Self {
		let ProjectKeys {
			master,
			write,
			read,
		} = settings.keys;
		Self {
			project_id: Some(settings.project_id),
			master_key: master,
			write_key: write,
			read_key: read,
			base_url: Some(settings.base_url),
		}
	}
}

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// A source of settings.
pub trait SettingsSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ProjectSettingsLayer, SettingsError>;
}

/// Loads and merges `sources` in precedence order.
pub fn load(mut sources: Vec<Box<dyn SettingsSource>>) -> Result<ProjectSettings, SettingsError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ProjectSettingsLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading settings source");
		merged.merge(source.load()?);
	}

	merged.finalize()
}

/// Built-in defaults.
pub struct DefaultsSource;

impl SettingsSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ProjectSettingsLayer, SettingsError> {
		Ok(ProjectSettingsLayer {
			base_url: Some(DEFAULT_BASE_URL.to_string()),
			..Default::default()
		})
	}
}

/// A TOML settings file.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl SettingsSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ProjectSettingsLayer, SettingsError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "settings file not found, skipping");
			return Ok(ProjectSettingsLayer::default());
		}

		let content = std::fs::read_to_string(&self.path).map_err(|e| SettingsError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer = toml::from_str(&content).map_err(|e| SettingsError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(path = %self.path.display(), "parsed settings file");
		Ok(layer)
	}
}

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Environment variables.
pub struct EnvSource {
	lookup: Box<Lookup>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn new() -> Self {
		Self::with_lookup(|name| std::env::var(name).ok())
	}

	/// Reads variables through `lookup` instead of the process environment.
	pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
		Self {
			lookup: Box::new(lookup),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|value| !value.is_empty())
	}

	/// Reads `<name>_FILE` if set, otherwise `name`.
	fn secret(&self, name: &str) -> Result<Option<ApiKey>, SettingsError> {
		let file_var = format!("{name}_FILE");
		if let Some(path) = self.var(&file_var) {
			let path = PathBuf::from(path);
			let content = read_secret_file(&path).map_err(|e| SettingsError::SecretFile {
				var: file_var,
				path,
				source: e,
			})?;
			return Ok(Some(ApiKey::new(content)));
		}

		Ok(self.var(name).map(ApiKey::new))
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl SettingsSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ProjectSettingsLayer, SettingsError> {
		Ok(ProjectSettingsLayer {
			project_id: self.var(ENV_PROJECT_ID),
			master_key: self.secret(ENV_MASTER_KEY)?,
			write_key: self.secret(ENV_WRITE_KEY)?,
			read_key: self.secret(ENV_READ_KEY)?,
			base_url: self.var(ENV_SERVER_URL),
		})
	}
}

fn read_secret_file(path: &Path) -> std::io::Result<String> {
	let content = std::fs::read_to_string(path)?;
	Ok(content.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
}
