//! Version ledger
//!
//! Each interface is registered as a `{root, prev, file}` triple:
//!
//! - `root` is the SHA256 of the interface name and never changes
//! - `prev` links to the version this build supersedes
//! - `file` is the SHA256 of the canonical encoding
//!
//! `prev` comes from an explicit previous version when configured (a genesis
//! marker there maps to `root`), then from the last published remote hash,
//! then falls back to `root`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checksum::Checksum;
use crate::config::{BuildConfig, PreviousVersion};
use crate::encode::EncodedInterface;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub root: Checksum,
    pub prev: Checksum,
    pub file: Checksum,
}

/// Ledger entries keyed by interface name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    pub entries: BTreeMap<String, LedgerEntry>,
}

impl Ledger {
    pub fn get(&self, name: &str) -> Option<&LedgerEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute the ledger triple for one interface
pub fn ledger_entry(name: &str, file: &Checksum, config: &BuildConfig) -> LedgerEntry {
    let root = Checksum::of(name);
    let prev = match config.previous_interfaces.get(name) {
        Some(PreviousVersion::Genesis) => root.clone(),
        Some(PreviousVersion::Hash(hash)) => hash.clone(),
        None => config
            .remote_interfaces
            .get(name)
            .cloned()
            .unwrap_or_else(|| root.clone()),
    };

    LedgerEntry {
        root,
        prev,
        file: file.clone(),
    }
}

/// Whether the encoding matches the last known version of the interface
pub fn is_unchanged(name: &str, file: &Checksum, config: &BuildConfig) -> bool {
    let known = config.remote_interfaces.get(name).or_else(|| {
        match config.previous_interfaces.get(name) {
            Some(PreviousVersion::Hash(hash)) => Some(hash),
            _ => None,
        }
    });
    known == Some(file)
}

/// Build the ledger and the set of unchanged interfaces
pub fn build_ledger(
    interfaces: &[EncodedInterface],
    config: &BuildConfig,
) -> (Ledger, BTreeSet<String>) {
    let mut ledger = Ledger::default();
    let mut unchanged = BTreeSet::new();

    for interface in interfaces {
        let entry = ledger_entry(&interface.name, &interface.file, config);
        if is_unchanged(&interface.name, &interface.file, config) {
            debug!(interface = %interface.name, "unchanged since last version");
            unchanged.insert(interface.name.clone());
        }
        ledger.entries.insert(interface.name.clone(), entry);
    }

    (ledger, unchanged)
}
