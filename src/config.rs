//! Configuration management for the schema compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (di.toml, .di.toml, config/di.toml, XDG config dir)
//! - An explicit file passed with `--config`
//! - Environment variables (DI__SECTION__KEY)
//!
//! ## Example config file (di.toml):
//! ```toml
//! [paths]
//! schema = "schema"
//! build = "build"
//!
//! [build]
//! server = "http://localhost:3000"
//! compositions = ["Timestamps"]
//! ignore = []
//!
//! [[build.previous]]
//! name = "User"
//!
//! [[build.remote]]
//! name = "Post"
//! hash = "9F86D081884C7D659A2FEAA0C55AD015A3BF4F1B2B0B822CD15D6C15B0F00A08"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};

/// Main configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiConfig {
    /// Input and output locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Build settings and version history
    #[serde(default)]
    pub build: BuildSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// A `.di` file or a directory of them
    #[serde(default = "default_schema_path")]
    pub schema: PathBuf,

    #[serde(default = "default_build_path")]
    pub build: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    #[serde(default)]
    pub server: String,

    /// Models that are only composed into others
    #[serde(default)]
    pub compositions: Vec<String>,

    /// Interfaces left out of the definition summary
    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub previous: Vec<HistoryEntry>,

    #[serde(default)]
    pub remote: Vec<HistoryEntry>,
}

/// One interface's recorded version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("schema")
}

fn default_build_path() -> PathBuf {
    PathBuf::from("build")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            schema: default_schema_path(),
            build: default_build_path(),
        }
    }
}

impl DiConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        for location in ["di.toml", ".di.toml", "config/di.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "distributed-interfaces", "di") {
            let xdg_config = dirs.config_dir().join("di.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("DI")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("build.compositions")
                .with_list_parse_key("build.ignore")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Schema location, resolved against the working directory
    pub fn schema_path(&self) -> PathBuf {
        absolute(&self.paths.schema)
    }

    /// Build directory, resolved against the working directory
    pub fn build_path(&self) -> PathBuf {
        absolute(&self.paths.build)
    }

    /// Immutable build settings passed through the pipeline
    pub fn build_config(&self) -> Result<BuildConfig> {
        BuildConfig::try_from(&self.build)
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

/// An explicitly configured previous version of an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousVersion {
    /// The interface has never been published
    Genesis,
    Hash(Checksum),
}

/// Build settings consumed by the canonicalizer and ledger builder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    pub server: String,
    pub previous_interfaces: BTreeMap<String, PreviousVersion>,
    pub remote_interfaces: BTreeMap<String, Checksum>,
    pub compositions: BTreeSet<String>,
    pub ignore: BTreeSet<String>,
}

impl BuildConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    pub fn with_previous(mut self, name: impl Into<String>, version: PreviousVersion) -> Self {
        self.previous_interfaces.insert(name.into(), version);
        self
    }

    pub fn with_remote(mut self, name: impl Into<String>, hash: Checksum) -> Self {
        self.remote_interfaces.insert(name.into(), hash);
        self
    }

    pub fn with_composition(mut self, name: impl Into<String>) -> Self {
        self.compositions.insert(name.into());
        self
    }

    pub fn with_ignored(mut self, name: impl Into<String>) -> Self {
        self.ignore.insert(name.into());
        self
    }

    pub fn is_composition(&self, name: &str) -> bool {
        self.compositions.contains(name)
    }
}

impl TryFrom<&BuildSection> for BuildConfig {
    type Error = SchemaError;

    fn try_from(section: &BuildSection) -> Result<Self> {
        let mut previous_interfaces = BTreeMap::new();
        for entry in &section.previous {
            let version = match entry.hash.as_deref().map(str::trim) {
                None | Some("") | Some("none") | Some("null") => PreviousVersion::Genesis,
                Some(hash) => PreviousVersion::Hash(Checksum::parse(hash)?),
            };
            if previous_interfaces.insert(entry.name.clone(), version).is_some() {
                return Err(duplicate_entry("build.previous", &entry.name));
            }
        }

        let mut remote_interfaces = BTreeMap::new();
        for entry in &section.remote {
            let hash = entry.hash.as_deref().ok_or_else(|| {
                SchemaError::Config(ConfigError::Message(format!(
                    "build.remote entry '{}' has no hash",
                    entry.name
                )))
            })?;
            if remote_interfaces
                .insert(entry.name.clone(), Checksum::parse(hash)?)
                .is_some()
            {
                return Err(duplicate_entry("build.remote", &entry.name));
            }
        }

        Ok(Self {
            server: section.server.clone(),
            previous_interfaces,
            remote_interfaces,
            compositions: section.compositions.iter().cloned().collect(),
            ignore: section.ignore.iter().cloned().collect(),
        })
    }
}

fn duplicate_entry(list: &str, name: &str) -> SchemaError {
    SchemaError::Config(ConfigError::Message(format!(
        "{} lists '{}' more than once",
        list, name
    )))
}
