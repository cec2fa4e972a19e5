//! Storage collaborators
//!
//! The compiler never touches the filesystem itself: sources come in and build
//! artifacts go out through [`Storage`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Result;

/// One schema source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// Name used in error messages
    pub name: String,
    pub text: String,
}

impl SourceText {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Files of a build directory, keyed by relative path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArtifacts {
    pub files: BTreeMap<String, String>,
}

impl BuildArtifacts {
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}

pub trait Storage {
    /// Read every schema source, in a stable order
    fn read_sources(&self) -> Result<Vec<SourceText>>;

    /// Replace the whole build output with `artifacts`
    fn replace_build(&mut self, artifacts: &BuildArtifacts) -> Result<()>;
}

/// Filesystem storage: a `.di` file or directory in, a build directory out
#[derive(Debug, Clone)]
pub struct FsStorage {
    schema: PathBuf,
    build: PathBuf,
}

impl FsStorage {
    pub fn new(schema: impl Into<PathBuf>, build: impl Into<PathBuf>) -> Self {
        Self {
            schema: schema.into(),
            build: build.into(),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .build
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "build".to_string());
        self.build.with_file_name(format!(".{}.{}", name, suffix))
    }
}

impl Storage for FsStorage {
    fn read_sources(&self) -> Result<Vec<SourceText>> {
        if self.schema.is_file() {
            let text = fs::read_to_string(&self.schema)?;
            return Ok(vec![SourceText::new(self.schema.display().to_string(), text)]);
        }

        let mut sources = Vec::new();
        for entry in WalkDir::new(&self.schema).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |e| e != "di") {
                continue;
            }
            debug!(path = %path.display(), "reading schema source");
            let name = path
                .strip_prefix(&self.schema)
                .unwrap_or(path)
                .display()
                .to_string();
            sources.push(SourceText::new(name, fs::read_to_string(path)?));
        }
        Ok(sources)
    }

    fn replace_build(&mut self, artifacts: &BuildArtifacts) -> Result<()> {
        let staging = self.sibling("staging");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        for (relative, content) in &artifacts.files {
            let path = staging.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
        }

        let previous = self.sibling("previous");
        if self.build.exists() {
            if previous.exists() {
                fs::remove_dir_all(&previous)?;
            }
            fs::rename(&self.build, &previous)?;
        }
        fs::rename(&staging, &self.build)?;
        if previous.exists() {
            fs::remove_dir_all(&previous)?;
        }

        info!(
            path = %self.build.display(),
            files = artifacts.files.len(),
            "replaced build directory"
        );
        Ok(())
    }
}

/// In-memory storage for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    pub sources: Vec<SourceText>,
    pub build: Option<BuildArtifacts>,
}

impl MemoryStorage {
    pub fn new(sources: Vec<SourceText>) -> Self {
        Self {
            sources,
            build: None,
        }
    }
}

impl Storage for MemoryStorage {
    fn read_sources(&self) -> Result<Vec<SourceText>> {
        Ok(self.sources.clone())
    }

    fn replace_build(&mut self, artifacts: &BuildArtifacts) -> Result<()> {
        self.build = Some(artifacts.clone());
        Ok(())
    }
}
