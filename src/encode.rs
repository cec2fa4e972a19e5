//! Canonical text encoding
//!
//! The encoded text is the identity of an interface: its SHA256 is the file
//! hash recorded in the ledger, so every byte here is significant.

use crate::ast::{Model, ModelField, Relation, RelationField, Validation};
use crate::canonical::{CanonicalSchema, InterfaceKind};
use crate::checksum::Checksum;

/// One interface in its canonical encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInterface {
    /// Model name or relation identity
    pub name: String,
    pub kind: InterfaceKind,
    pub text: String,
    pub file: Checksum,
}

impl EncodedInterface {
    fn new(name: String, kind: InterfaceKind, text: String) -> Self {
        let file = Checksum::of(&text);
        Self { name, kind, text, file }
    }

    /// Path of the canonical file inside the build directory
    pub fn file_path(&self) -> String {
        format!("{}/{}.di", self.kind.dir_name(), self.file.to_upper())
    }
}

/// Encode every model and relation, models first
pub fn encode_schema(schema: &CanonicalSchema) -> Vec<EncodedInterface> {
    let models = schema
        .models
        .iter()
        .map(|m| EncodedInterface::new(m.model.name.clone(), m.kind, encode_model(&m.model)));
    let relations = schema.relations.iter().map(|r| {
        EncodedInterface::new(
            r.identity.clone(),
            InterfaceKind::Relation,
            encode_relation(&r.relation),
        )
    });
    models.chain(relations).collect()
}

/// Encode a model with its fields in their current order
pub fn encode_model(model: &Model) -> String {
    let mut lines = vec![format!("model {} {{", model.name)];
    lines.extend(model.compositions.iter().map(|c| format!("\t{}", c.name)));
    lines.extend(model.fields.iter().map(encode_model_field));
    lines.push("}".to_string());
    lines.join("\n")
}

fn encode_model_field(field: &ModelField) -> String {
    let mut line = format!("\t{} {}", field.name, field.ty);
    if field.is_nullable {
        line.push('?');
    }
    if field.do_not_create {
        line.push('+');
    }
    if field.do_not_update {
        line.push('-');
    }

    let flags = [
        (field.is_auto_gen, "auto"),
        (field.is_unique, "unique"),
        (field.is_hidden, "hidden"),
        (field.is_private, "private"),
    ];
    let mut specifiers: Vec<String> = flags
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, word)| word.to_string())
        .collect();

    match &field.validation {
        Some(Validation::Numeric(v)) if field.ty.is_numeric() => {
            let clauses = [("gt", v.gt), ("gte", v.gte), ("lt", v.lt), ("lte", v.lte), ("mul", v.mul)];
            specifiers.extend(
                clauses
                    .iter()
                    .filter_map(|(op, n)| n.map(|n| format!("{}({})", op, n))),
            );
        }
        Some(Validation::Text(v)) if field.ty.is_text() => {
            if let Some(n) = v.minlen {
                specifiers.push(format!("minlen({})", n));
            }
            if let Some(n) = v.maxlen {
                specifiers.push(format!("maxlen({})", n));
            }
            if let Some(re) = &v.regex {
                specifiers.push(format!("regex({})", re));
            }
        }
        _ => {}
    }

    for specifier in specifiers {
        line.push(' ');
        line.push_str(&specifier);
    }
    line
}

/// Encode a relation with its fields in their current order
pub fn encode_relation(relation: &Relation) -> String {
    let self_relation = relation.fields.len() == 1;
    let mut lines = vec!["relation {".to_string()];
    lines.extend(
        relation
            .fields
            .iter()
            .map(|f| encode_relation_field(f, self_relation)),
    );
    lines.push("}".to_string());
    lines.join("\n")
}

fn encode_relation_field(field: &RelationField, self_relation: bool) -> String {
    let mut line = format!("\t{} {}", field.name, field.target);
    if field.is_array {
        line.push_str("[]");
    }
    if field.is_nullable {
        line.push('?');
    }

    let mut specifiers = Vec::new();
    if !field.references.is_empty() {
        specifiers.push(format!("ref({})", field.references.join(",")));
    }
    if field.is_mutual && field.is_nullable && self_relation {
        specifiers.push("mutual".to_string());
    }
    if field.is_mutable && !field.is_nullable && !field.is_array {
        specifiers.push("mutable".to_string());
    }
    if let Some(action) = field.on_delete {
        specifiers.push(format!("delete({})", action));
    }
    if let Some(action) = field.on_update {
        specifiers.push(format!("update({})", action));
    }

    for specifier in specifiers {
        line.push(' ');
        line.push_str(&specifier);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Composition, FieldType, NumericValidation, RefAction, TextValidation};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_model_encoding() {
        let mut email = ModelField::new("email", FieldType::String);
        email.is_nullable = true;
        email.is_private = true;
        email.is_unique = true;
        email.validation = Some(Validation::Text(TextValidation {
            minlen: Some(3),
            maxlen: None,
            regex: Some("^.+@.+$".into()),
        }));
        let mut age = ModelField::new("age", FieldType::Uint8);
        age.do_not_update = true;
        age.is_auto_gen = true;
        age.validation = Some(Validation::Numeric(NumericValidation {
            lte: Some(150),
            gt: Some(0),
            ..Default::default()
        }));

        let model = Model {
            name: "User".into(),
            fields: vec![age, email],
            ..Model::default()
        };
        assert_eq!(
            encode_model(&model),
            "model User {\n\tage uint8- auto gt(0) lte(150)\n\temail string? unique private minlen(3) regex(^.+@.+$)\n}"
        );
    }

    #[test]
    fn test_unresolved_compositions_come_first() {
        let model = Model {
            name: "Post".into(),
            fields: vec![ModelField::new("title", FieldType::String)],
            compositions: vec![Composition { name: "Stamp".into(), comment: String::new() }],
            ..Model::default()
        };
        assert_eq!(encode_model(&model), "model Post {\n\tStamp\n\ttitle string\n}");
    }

    #[test]
    fn test_mismatched_validation_is_not_encoded() {
        let mut flag = ModelField::new("flag", FieldType::Bool);
        flag.validation = Some(Validation::Numeric(NumericValidation { gt: Some(1), ..Default::default() }));
        let model = Model { name: "F".into(), fields: vec![flag], ..Model::default() };
        assert_eq!(encode_model(&model), "model F {\n\tflag bool\n}");
    }

    #[test]
    fn test_relation_encoding() {
        let mut author = RelationField::new("author", "User");
        author.is_mutable = true;
        author.is_mutual = true;
        author.on_delete = Some(RefAction::Cascade);
        author.references = vec!["id".into(), "org".into()];
        let mut posts = RelationField::new("posts", "Post");
        posts.is_array = true;
        posts.is_mutable = true;
        posts.on_update = Some(RefAction::Unlink);

        let relation = Relation { fields: vec![author, posts], comment: String::new() };
        assert_eq!(
            encode_relation(&relation),
            "relation {\n\tauthor User ref(id,org) mutable delete(cascade)\n\tposts Post[] update(unlink)\n}"
        );
    }

    #[test]
    fn test_mutual_only_on_self_relation() {
        let mut parent = RelationField::new("parent", "Node");
        parent.is_nullable = true;
        parent.is_mutual = true;
        let relation = Relation { fields: vec![parent], comment: String::new() };
        assert_eq!(encode_relation(&relation), "relation {\n\tparent Node? mutual\n}");
    }

    #[test]
    fn test_file_path_uses_uppercase_hash() {
        let encoded = EncodedInterface::new("A".into(), InterfaceKind::Composition, "model A {\n}".into());
        assert_eq!(
            encoded.file_path(),
            format!("models/{}.di", Checksum::of("model A {\n}").to_upper())
        );
    }
}
