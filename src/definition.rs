//! Definition summary
//!
//! Maps every interface name to its uppercase file hash, split into models,
//! compositions and relations, for code generation and distribution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::InterfaceKind;
use crate::config::BuildConfig;
use crate::encode::EncodedInterface;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub server: String,
    pub models: BTreeMap<String, String>,
    pub compositions: BTreeMap<String, String>,
    pub relations: BTreeMap<String, String>,
}

impl Definition {
    /// Number of interfaces listed
    pub fn len(&self) -> usize {
        self.models.len() + self.compositions.len() + self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Summarize local interfaces, filling in remote ones not defined locally
pub fn build_definition(interfaces: &[EncodedInterface], config: &BuildConfig) -> Definition {
    let mut models = BTreeMap::new();
    let mut relations = BTreeMap::new();

    for interface in interfaces {
        let target = match interface.kind {
            InterfaceKind::Relation => &mut relations,
            _ => &mut models,
        };
        target
            .entry(interface.name.clone())
            .or_insert_with(|| interface.file.to_upper());
    }

    for (name, hash) in &config.remote_interfaces {
        let target = if name.contains('-') {
            &mut relations
        } else {
            &mut models
        };
        target.entry(name.clone()).or_insert_with(|| hash.to_upper());
    }

    let (compositions, models): (BTreeMap<_, _>, BTreeMap<_, _>) = models
        .into_iter()
        .partition(|(name, _)| config.is_composition(name));

    let keep = |(name, _): &(String, String)| !config.ignore.contains(name);

    Definition {
        server: config.server.clone(),
        models: models.into_iter().filter(keep).collect(),
        compositions: compositions.into_iter().filter(keep).collect(),
        relations: relations.into_iter().filter(keep).collect(),
    }
}
