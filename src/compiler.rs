//! Compiler entry points
//!
//! [`compile`] runs the whole pipeline in memory:
//!
//! ```text
//! sources ─parse─▶ syntax trees ─build─▶ schema ─canonicalize─▶ canonical schema
//!         ─encode─▶ interfaces ─▶ ledger, definition, linked models
//! ```
//!
//! [`build`] wraps it with a [`Storage`] for reading sources and replacing the
//! build directory.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ast::Schema;
use crate::builder::build_schema;
use crate::canonical::{canonicalize, CanonicalSchema, InterfaceKind};
use crate::checksum::Checksum;
use crate::config::BuildConfig;
use crate::definition::{build_definition, Definition};
use crate::encode::{encode_schema, EncodedInterface};
use crate::error::Result;
use crate::grammar::parse_source;
use crate::ledger::{build_ledger, Ledger};
use crate::linked::{build_linked, LinkedModels};
use crate::storage::{BuildArtifacts, SourceText, Storage};

/// Result of compiling a schema
#[derive(Debug, Clone)]
pub struct Compilation {
    pub canonical: CanonicalSchema,
    pub interfaces: Vec<EncodedInterface>,
    pub ledger: Ledger,
    /// Interfaces whose encoding matches their last known version
    pub unchanged: BTreeSet<String>,
    pub definition: Definition,
    pub linked: LinkedModels,
}

/// Summary written next to the build artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub created_at: DateTime<Utc>,
    pub stats: BuildStats,
    pub unchanged: Vec<String>,
    /// Checksum over every interface's file hash, in ledger order
    pub bundle_checksum: Checksum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStats {
    pub models: usize,
    pub compositions: usize,
    pub relations: usize,
    pub written: usize,
}

impl Compilation {
    pub fn interface(&self, name: &str) -> Option<&EncodedInterface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn is_unchanged(&self, name: &str) -> bool {
        self.unchanged.contains(name)
    }

    /// Interfaces whose canonical file goes into the build directory
    pub fn changed(&self) -> impl Iterator<Item = &EncodedInterface> {
        self.interfaces.iter().filter(|i| !self.is_unchanged(&i.name))
    }

    pub fn manifest(&self) -> BuildManifest {
        let count = |kind: InterfaceKind| self.interfaces.iter().filter(|i| i.kind == kind).count();
        let stats = BuildStats {
            models: count(InterfaceKind::Model),
            compositions: count(InterfaceKind::Composition),
            relations: count(InterfaceKind::Relation),
            written: self.changed().count(),
        };

        let combined = self
            .ledger
            .entries
            .values()
            .map(|e| e.file.to_string())
            .collect::<Vec<_>>()
            .join(",");

        BuildManifest {
            created_at: Utc::now(),
            stats,
            unchanged: self.unchanged.iter().cloned().collect(),
            bundle_checksum: Checksum::of(&combined),
        }
    }

    /// Everything the build directory should contain
    pub fn artifacts(&self) -> Result<BuildArtifacts> {
        let mut artifacts = BuildArtifacts::default();
        for interface in self.changed() {
            artifacts.insert(interface.file_path(), interface.text.clone());
        }
        artifacts.insert("ledger.json", serde_json::to_string_pretty(&self.ledger)?);
        artifacts.insert("definition.json", serde_json::to_string_pretty(&self.definition)?);
        artifacts.insert("linked.json", serde_json::to_string_pretty(&self.linked)?);
        artifacts.insert("manifest.json", serde_json::to_string_pretty(&self.manifest())?);
        Ok(artifacts)
    }
}

/// Parse every source into one schema, declarations kept in source order
pub fn parse_sources(sources: &[SourceText]) -> Result<Schema> {
    let mut schema = Schema::default();
    for source in sources {
        let tree = parse_source(&source.name, &source.text)?;
        schema.extend(build_schema(&tree));
    }
    Ok(schema)
}

/// Compile schema sources without touching storage
pub fn compile(sources: &[SourceText], config: &BuildConfig) -> Result<Compilation> {
    let schema = parse_sources(sources)?;
    info!(
        sources = sources.len(),
        models = schema.models.len(),
        relations = schema.relations.len(),
        "parsed schema"
    );

    let canonical = canonicalize(&schema, config)?;
    let interfaces = encode_schema(&canonical);
    let (ledger, unchanged) = build_ledger(&interfaces, config);
    let definition = build_definition(&interfaces, config);
    let linked = build_linked(&canonical, &interfaces);

    info!(
        interfaces = interfaces.len(),
        unchanged = unchanged.len(),
        "compiled interfaces"
    );

    Ok(Compilation {
        canonical,
        interfaces,
        ledger,
        unchanged,
        definition,
        linked,
    })
}

/// Compile the sources in `storage` and replace its build output.
///
/// Nothing is written unless the whole pipeline succeeds.
pub fn build(storage: &mut impl Storage, config: &BuildConfig) -> Result<Compilation> {
    let sources = storage.read_sources()?;
    let compilation = compile(&sources, config)?;
    let artifacts = compilation.artifacts()?;
    storage.replace_build(&artifacts)?;
    Ok(compilation)
}
