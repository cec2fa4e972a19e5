//! Semantic builder: concrete syntax tree to typed AST
//!
//! The parser has already rejected malformed input, so this walk is
//! infallible. Tokens it cannot place are logged and dropped.

use tracing::warn;

use crate::ast::{
    Annotation, Composition, FieldType, Model, ModelField, NumericValidation, Relation,
    RelationField, Schema, TextValidation, Validation,
};
use crate::grammar::{Arg, BodyEntry, FieldNode, Item, ModelNode, RelationNode, SourceTree, Specifier, Symbol};

/// Build the typed schema for one source tree
pub fn build_schema(tree: &SourceTree) -> Schema {
    let mut schema = Schema::default();
    for item in &tree.items {
        match item {
            Item::Model(node) => schema.models.push(build_model(node)),
            Item::Relation(node) => schema.relations.push(build_relation(node)),
        }
    }
    schema
}

fn build_model(node: &ModelNode) -> Model {
    let mut model = Model {
        name: node.name.clone(),
        comment: join_comments(&node.comments),
        ..Model::default()
    };

    for entry in &node.entries {
        match entry {
            BodyEntry::Field(field) => {
                if let Some(field) = build_model_field(&node.name, field) {
                    model.fields.push(field);
                }
            }
            BodyEntry::Composition(c) => model.compositions.push(Composition {
                name: c.name.clone(),
                comment: join_comments(&c.comments),
            }),
            BodyEntry::Annotation(a) => model.annotations.push(Annotation {
                name: a.name.clone(),
                params: a.params.clone(),
            }),
        }
    }

    model
}

fn build_model_field(model: &str, node: &FieldNode) -> Option<ModelField> {
    let ty = match node.ty.parse::<FieldType>() {
        Ok(ty) => ty,
        Err(e) => {
            warn!(model, field = %node.name, "dropping field: {}", e);
            return None;
        }
    };

    let mut field = ModelField::new(node.name.clone(), ty);
    field.comment = join_comments(&node.comments);

    match node.symbol {
        Some(Symbol::Nullable) => field.is_nullable = true,
        Some(Symbol::NoCreate) => field.do_not_create = true,
        Some(Symbol::NoUpdate) => field.do_not_update = true,
        Some(Symbol::Array) => warn!(model, field = %node.name, "'[]' ignored on a model field"),
        None => {}
    }

    for spec in &node.specifiers {
        match spec.name.as_str() {
            "auto" => field.is_auto_gen = true,
            "unique" => field.is_unique = true,
            "hidden" => field.is_hidden = true,
            "private" => field.is_private = true,
            "gt" | "gte" | "lt" | "lte" | "mul" => apply_numeric(&mut field, spec),
            "minlen" | "maxlen" | "regex" => apply_text(&mut field, spec),
            other => warn!(model, field = %node.name, "unknown specifier '{}'", other),
        }
    }

    Some(field)
}

fn apply_numeric(field: &mut ModelField, spec: &Specifier) {
    let Some(Arg::Int(n)) = spec.args.first() else {
        warn!(field = %field.name, "'{}' without an integer argument", spec.name);
        return;
    };
    if !matches!(field.validation, Some(Validation::Numeric(_))) {
        field.validation = Some(Validation::Numeric(NumericValidation::default()));
    }
    if let Some(Validation::Numeric(v)) = &mut field.validation {
        let slot = match spec.name.as_str() {
            "gt" => &mut v.gt,
            "gte" => &mut v.gte,
            "lt" => &mut v.lt,
            "lte" => &mut v.lte,
            _ => &mut v.mul,
        };
        *slot = Some(*n);
    }
}

fn apply_text(field: &mut ModelField, spec: &Specifier) {
    if !matches!(field.validation, Some(Validation::Text(_))) {
        field.validation = Some(Validation::Text(TextValidation::default()));
    }
    let Some(Validation::Text(v)) = &mut field.validation else {
        return;
    };
    match (spec.name.as_str(), spec.args.first()) {
        ("minlen", Some(Arg::Int(n))) => v.minlen = u64::try_from(*n).ok(),
        ("maxlen", Some(Arg::Int(n))) => v.maxlen = u64::try_from(*n).ok(),
        ("regex", Some(Arg::Raw(body))) => v.regex = Some(body.clone()),
        (name, arg) => warn!(field = %field.name, "'{}' with unexpected argument {:?}", name, arg),
    }
}

fn build_relation(node: &RelationNode) -> Relation {
    Relation {
        fields: node.fields.iter().map(build_relation_field).collect(),
        comment: join_comments(&node.comments),
    }
}

fn build_relation_field(node: &FieldNode) -> RelationField {
    let mut field = RelationField::new(node.name.clone(), node.ty.clone());
    field.comment = join_comments(&node.comments);

    match node.symbol {
        Some(Symbol::Nullable) => field.is_nullable = true,
        Some(Symbol::Array) => field.is_array = true,
        Some(other) => warn!(field = %node.name, "{:?} ignored on a relation field", other),
        None => {}
    }

    for spec in &node.specifiers {
        match spec.name.as_str() {
            "mutual" => field.is_mutual = true,
            "mutable" => field.is_mutable = true,
            "delete" => field.on_delete = action_arg(spec),
            "update" => field.on_update = action_arg(spec),
            "ref" => {
                field.references = spec
                    .args
                    .iter()
                    .filter_map(|a| match a {
                        Arg::Word(w) => Some(w.clone()),
                        _ => None,
                    })
                    .collect()
            }
            other => warn!(field = %node.name, "unknown relation specifier '{}'", other),
        }
    }

    field
}

fn action_arg(spec: &Specifier) -> Option<crate::ast::RefAction> {
    match spec.args.first() {
        Some(Arg::Word(w)) => w.parse().ok(),
        _ => None,
    }
}

fn join_comments(comments: &[String]) -> String {
    comments.join("\n")
}
