//! Typed schema AST
//!
//! Produced by the semantic builder from the concrete syntax tree. Nodes are
//! immutable once built; later stages produce new values instead of editing them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A parsed schema: every model and relation declared in the sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub models: Vec<Model>,
    pub relations: Vec<Relation>,
}

impl Schema {
    /// Append another schema's declarations after this one's
    pub fn extend(&mut self, other: Schema) {
        self.models.extend(other.models);
        self.relations.extend(other.relations);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ModelField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compositions: Vec<Composition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&ModelField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A by-name reference to another model whose fields get inlined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
}

/// Scalar type of a model field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Float32,
    Float64,
    Date,
    String,
    Bytes,
}

impl FieldType {
    pub const ALL: [FieldType; 17] = [
        FieldType::Bool,
        FieldType::Int,
        FieldType::Int8,
        FieldType::Int16,
        FieldType::Int32,
        FieldType::Int64,
        FieldType::Uint,
        FieldType::Uint8,
        FieldType::Uint16,
        FieldType::Uint32,
        FieldType::Uint64,
        FieldType::Float,
        FieldType::Float32,
        FieldType::Float64,
        FieldType::Date,
        FieldType::String,
        FieldType::Bytes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Uint => "uint",
            FieldType::Uint8 => "uint8",
            FieldType::Uint16 => "uint16",
            FieldType::Uint32 => "uint32",
            FieldType::Uint64 => "uint64",
            FieldType::Float => "float",
            FieldType::Float32 => "float32",
            FieldType::Float64 => "float64",
            FieldType::Date => "date",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
        }
    }

    /// Numeric and date types accept `gt/gte/lt/lte/mul`
    pub fn is_numeric(&self) -> bool {
        !matches!(self, FieldType::Bool | FieldType::String | FieldType::Bytes)
    }

    /// String types accept `minlen/maxlen/regex`
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::String)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown field type '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_nullable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_unique: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_private: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_auto_gen: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub do_not_create: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub do_not_update: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_primary_key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_basic_field: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl ModelField {
    /// A plain field with no flags set
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            is_nullable: false,
            is_unique: false,
            is_private: false,
            is_hidden: false,
            is_auto_gen: false,
            do_not_create: false,
            do_not_update: false,
            is_primary_key: false,
            is_basic_field: false,
            validation: None,
            comment: String::new(),
        }
    }
}

/// Validation rules attached to a field; the variant follows the field type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Validation {
    Numeric(NumericValidation),
    Text(TextValidation),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mul: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minlen: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxlen: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub fields: Vec<RelationField>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

/// What happens to a relation when the referenced record is deleted or updated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefAction {
    Nothing,
    Cascade,
    Unlink,
}

impl RefAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefAction::Nothing => "nothing",
            RefAction::Cascade => "cascade",
            RefAction::Unlink => "unlink",
        }
    }
}

impl fmt::Display for RefAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nothing" => Ok(RefAction::Nothing),
            "cascade" => Ok(RefAction::Cascade),
            "unlink" => Ok(RefAction::Unlink),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationField {
    pub name: String,
    /// Name of the referenced model
    #[serde(rename = "type")]
    pub target: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_array: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_nullable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_mutual: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_mutable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<RefAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<RefAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl RelationField {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            is_array: false,
            is_nullable: false,
            is_mutual: false,
            is_mutable: false,
            on_delete: None,
            on_update: None,
            references: Vec::new(),
            comment: String::new(),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
