//! Linked models for introspection
//!
//! Every model is keyed by its id (the uppercase file hash) and carries the
//! relations it takes part in, seen from its side: only the counterpart field
//! is kept, tagged with the counterpart model's id. A self-relation keeps its
//! single field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::{Annotation, ModelField, RelationField};
use crate::canonical::{CanonicalSchema, InterfaceKind};
use crate::encode::EncodedInterface;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedModel {
    pub id: String,
    pub name: String,
    pub kind: InterfaceKind,
    pub fields: Vec<ModelField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub compositions: Vec<CompositionRef>,
    pub relations: Vec<LinkedRelation>,
}

/// A composed model, by reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionRef {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedRelation {
    pub id: String,
    pub identity: String,
    pub fields: Vec<LinkedRelationField>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedRelationField {
    #[serde(flatten)]
    pub field: RelationField,
    /// Id of the referenced model, when it is defined locally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Linked models keyed by id
pub type LinkedModels = BTreeMap<String, LinkedModel>;

pub fn build_linked(schema: &CanonicalSchema, interfaces: &[EncodedInterface]) -> LinkedModels {
    let ids: BTreeMap<&str, String> = interfaces
        .iter()
        .map(|i| (i.name.as_str(), i.file.to_upper()))
        .collect();
    let id_of = |name: &str| ids.get(name).cloned();

    schema
        .models
        .iter()
        .filter_map(|canonical| {
            let model = &canonical.model;
            let id = id_of(&model.name)?;

            let relations = schema
                .relations
                .iter()
                .filter(|r| r.relation.fields.iter().any(|f| f.target == model.name))
                .map(|r| {
                    let fields = &r.relation.fields;
                    let seen: Vec<&RelationField> = if fields.len() == 1 {
                        fields.iter().collect()
                    } else {
                        fields.iter().filter(|f| f.target != model.name).collect()
                    };
                    LinkedRelation {
                        id: id_of(&r.identity).unwrap_or_default(),
                        identity: r.identity.clone(),
                        fields: seen
                            .into_iter()
                            .map(|f| LinkedRelationField {
                                field: f.clone(),
                                id: id_of(&f.target),
                            })
                            .collect(),
                        comment: r.relation.comment.clone(),
                    }
                })
                .collect();

            let compositions = canonical
                .compositions
                .iter()
                .filter_map(|name| {
                    id_of(name).map(|id| CompositionRef {
                        name: name.clone(),
                        id,
                    })
                })
                .collect();

            let linked = LinkedModel {
                id: id.clone(),
                name: model.name.clone(),
                kind: canonical.kind,
                fields: model.fields.clone(),
                annotations: model.annotations.clone(),
                comment: model.comment.clone(),
                compositions,
                relations,
            };
            Some((id, linked))
        })
        .collect()
}
