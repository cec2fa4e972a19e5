//! Canonical form of a schema
//!
//! Everything that reaches the encoder goes through here, so two builders
//! given the same declarations in any order produce the same bytes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{FieldType, Model, ModelField, Relation, Schema};
use crate::compose;
use crate::config::BuildConfig;
use crate::error::{Result, SchemaError};

/// How an interface is published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Model,
    /// A model only ever composed into others
    Composition,
    Relation,
}

impl InterfaceKind {
    /// Build directory holding this kind's canonical files
    pub fn dir_name(&self) -> &'static str {
        match self {
            InterfaceKind::Model | InterfaceKind::Composition => "models",
            InterfaceKind::Relation => "relations",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalModel {
    pub kind: InterfaceKind,
    /// Resolved model with basic fields, fields sorted by name
    pub model: Model,
    /// Names of the models composed into this one, sorted
    pub compositions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRelation {
    /// Interface name: target types then field names, joined by `-`
    pub identity: String,
    /// Relation with fields in body order (sorted by name)
    pub relation: Relation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalSchema {
    /// Sorted by name
    pub models: Vec<CanonicalModel>,
    /// Sorted by identity
    pub relations: Vec<CanonicalRelation>,
}

impl CanonicalSchema {
    pub fn model(&self, name: &str) -> Option<&CanonicalModel> {
        self.models.iter().find(|m| m.model.name == name)
    }

    pub fn relation(&self, identity: &str) -> Option<&CanonicalRelation> {
        self.relations.iter().find(|r| r.identity == identity)
    }
}

/// The fields every resolved model carries, in injection order
pub fn basic_fields() -> Vec<ModelField> {
    let mut id = ModelField::new("_id", FieldType::String);
    id.is_primary_key = true;

    let mut created_at = ModelField::new("_created_at", FieldType::Int64);
    created_at.do_not_update = true;

    let updated_at = ModelField::new("_updated_at", FieldType::Int64);
    let change = ModelField::new("_change", FieldType::Int64);

    let mut fields = vec![id, created_at, updated_at, change];
    for field in &mut fields {
        field.is_basic_field = true;
    }
    fields
}

/// Resolve, validate and order a parsed schema
pub fn canonicalize(schema: &Schema, config: &BuildConfig) -> Result<CanonicalSchema> {
    let mut names = BTreeSet::new();
    for model in &schema.models {
        if !names.insert(model.name.as_str()) {
            return Err(SchemaError::DuplicateInterface {
                name: model.name.clone(),
            });
        }
    }

    compose::check_references(schema, &config.remote_interfaces)?;

    let mut models = schema.models.clone();
    compose::sort_compositions(&mut models);
    let resolved = compose::resolve_compositions(&models)?;

    let mut canonical_models = Vec::with_capacity(resolved.len());
    for (source, model) in models.iter().zip(resolved) {
        let model = with_basic_fields(model)?;
        let kind = if config.is_composition(&model.name) {
            InterfaceKind::Composition
        } else {
            InterfaceKind::Model
        };
        canonical_models.push(CanonicalModel {
            kind,
            model,
            compositions: source.compositions.iter().map(|c| c.name.clone()).collect(),
        });
    }
    canonical_models.sort_by(|a, b| a.model.name.cmp(&b.model.name));

    let mut canonical_relations = Vec::with_capacity(schema.relations.len());
    let mut identities = BTreeSet::new();
    for relation in &schema.relations {
        let canonical = canonicalize_relation(relation)?;
        if names.contains(canonical.identity.as_str())
            || !identities.insert(canonical.identity.clone())
        {
            return Err(SchemaError::DuplicateInterface {
                name: canonical.identity,
            });
        }
        canonical_relations.push(canonical);
    }
    canonical_relations.sort_by(|a, b| a.identity.cmp(&b.identity));

    debug!(
        models = canonical_models.len(),
        relations = canonical_relations.len(),
        "canonicalized schema"
    );

    Ok(CanonicalSchema {
        models: canonical_models,
        relations: canonical_relations,
    })
}

fn with_basic_fields(mut model: Model) -> Result<Model> {
    let mut fields = basic_fields();
    fields.append(&mut model.fields);
    fields.sort_by(|a, b| a.name.cmp(&b.name));

    if let Some(pair) = fields.windows(2).find(|w| w[0].name == w[1].name) {
        return Err(SchemaError::DuplicateField {
            model: model.name.clone(),
            field: pair[0].name.clone(),
        });
    }

    model.fields = fields;
    Ok(model)
}

/// Interface name of a relation: fields ordered by target type (then name),
/// types first and names after, joined by `-`
pub fn relation_identity(relation: &Relation) -> String {
    let mut fields: Vec<_> = relation.fields.iter().collect();
    fields.sort_by(|a, b| a.target.cmp(&b.target).then_with(|| a.name.cmp(&b.name)));

    fields
        .iter()
        .map(|f| f.target.as_str())
        .chain(fields.iter().map(|f| f.name.as_str()))
        .collect::<Vec<_>>()
        .join("-")
}

/// Validate the shape of a relation and order its body by field name
pub fn canonicalize_relation(relation: &Relation) -> Result<CanonicalRelation> {
    let identity = relation_identity(relation);
    validate_relation_shape(relation).map_err(|reason| SchemaError::RelationShape {
        relation: identity.clone(),
        reason: reason.to_string(),
    })?;

    let mut relation = relation.clone();
    relation.fields.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(CanonicalRelation { identity, relation })
}

fn validate_relation_shape(relation: &Relation) -> std::result::Result<(), &'static str> {
    let fields = &relation.fields;
    match fields.len() {
        1 if !fields[0].is_nullable => Err("a self-relation field must be nullable"),
        1 => Ok(()),
        2 if fields.iter().all(|f| f.is_nullable) => Err("both fields cannot be nullable"),
        2 if fields.iter().all(|f| !f.is_nullable && !f.is_array) => {
            Err("both fields cannot be required single references")
        }
        2 => Ok(()),
        _ => Err("a relation needs one or two fields"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Composition, RelationField};
    use pretty_assertions::assert_eq;

    fn model(name: &str, fields: &[&str]) -> Model {
        Model {
            name: name.into(),
            fields: fields.iter().map(|f| ModelField::new(*f, FieldType::String)).collect(),
            ..Model::default()
        }
    }

    fn relation(fields: Vec<RelationField>) -> Relation {
        Relation { fields, comment: String::new() }
    }

    fn rel_field(name: &str, target: &str, nullable: bool, array: bool) -> RelationField {
        let mut f = RelationField::new(name, target);
        f.is_nullable = nullable;
        f.is_array = array;
        f
    }

    #[test]
    fn test_basic_fields_injected_and_sorted() {
        let schema = Schema { models: vec![model("User", &["name"])], relations: vec![] };
        let canonical = canonicalize(&schema, &BuildConfig::default()).unwrap();
        let user = &canonical.models[0].model;
        let names: Vec<_> = user.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["_change", "_created_at", "_id", "_updated_at", "name"]);
        assert!(user.field("_id").unwrap().is_primary_key);
        assert!(user.field("_created_at").unwrap().do_not_update);
        assert!(user.fields[..4].iter().all(|f| f.is_basic_field));
        assert!(!user.field("name").unwrap().is_basic_field);
    }

    #[test]
    fn test_composition_kind_follows_config() {
        let mut user = model("User", &["name"]);
        user.compositions.push(Composition { name: "Stamp".into(), comment: String::new() });
        let schema = Schema { models: vec![user, model("Stamp", &["at"])], relations: vec![] };
        let config = BuildConfig::default().with_composition("Stamp");
        let canonical = canonicalize(&schema, &config).unwrap();

        let stamp = canonical.model("Stamp").unwrap();
        assert_eq!(stamp.kind, InterfaceKind::Composition);
        let user = canonical.model("User").unwrap();
        assert_eq!(user.kind, InterfaceKind::Model);
        assert_eq!(user.compositions, vec!["Stamp"]);
        assert!(user.model.field("at").is_some());
    }

    #[test]
    fn test_duplicate_field_after_resolution() {
        let mut user = model("User", &["at"]);
        user.compositions.push(Composition { name: "Stamp".into(), comment: String::new() });
        let schema = Schema { models: vec![user, model("Stamp", &["at"])], relations: vec![] };
        assert!(matches!(
            canonicalize(&schema, &BuildConfig::default()),
            Err(SchemaError::DuplicateField { field, .. }) if field == "at"
        ));
    }

    #[test]
    fn test_duplicate_model() {
        let schema = Schema { models: vec![model("User", &[]), model("User", &[])], relations: vec![] };
        assert!(matches!(
            canonicalize(&schema, &BuildConfig::default()),
            Err(SchemaError::DuplicateInterface { name }) if name == "User"
        ));
    }

    #[test]
    fn test_relation_identity_and_body_orders_differ() {
        let r = relation(vec![
            rel_field("zeta", "Author", false, false),
            rel_field("alpha", "Post", false, true),
        ]);
        let canonical = canonicalize_relation(&r).unwrap();
        assert_eq!(canonical.identity, "Author-Post-zeta-alpha");
        let body: Vec<_> = canonical.relation.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(body, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_self_relation_identity() {
        let r = relation(vec![rel_field("parent", "Node", true, false)]);
        assert_eq!(relation_identity(&r), "Node-parent");
    }

    #[test]
    fn test_relation_shapes() {
        let cases = vec![
            relation(vec![]),
            relation(vec![
                rel_field("a", "A", true, false),
                rel_field("b", "B", false, true),
                rel_field("c", "C", false, true),
            ]),
            relation(vec![rel_field("a", "A", true, false), rel_field("b", "B", true, false)]),
            relation(vec![rel_field("a", "A", false, false), rel_field("b", "B", false, false)]),
            relation(vec![rel_field("a", "A", false, false)]),
        ];
        for r in cases {
            assert!(
                matches!(canonicalize_relation(&r), Err(SchemaError::RelationShape { .. })),
                "{:?}",
                r
            );
        }

        assert!(canonicalize_relation(&relation(vec![
            rel_field("a", "A", true, false),
            rel_field("b", "B", false, false),
        ]))
        .is_ok());
    }

    #[test]
    fn test_relations_sorted_by_identity() {
        let schema = Schema {
            models: vec![model("A", &[]), model("B", &[])],
            relations: vec![
                relation(vec![rel_field("x", "B", true, false)]),
                relation(vec![rel_field("y", "A", true, false)]),
            ],
        };
        let canonical = canonicalize(&schema, &BuildConfig::default()).unwrap();
        let ids: Vec<_> = canonical.relations.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(ids, vec!["A-y", "B-x"]);
        assert_eq!(canonical.relation("B-x").unwrap().relation.fields[0].target, "B");
        assert!(canonical.relation("x-B").is_none());
    }
}
