//! Error types for the schema compiler

use thiserror::Error;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema compiler errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Syntax error in {file} at line {line}, column {column}: expected {expected}")]
    Syntax {
        file: String,
        line: usize,
        column: usize,
        expected: String,
    },

    #[error("The following models are missing: {}", .0.join(", "))]
    MissingModels(Vec<String>),

    #[error("Composition cycle detected: {}", .path.join(" -> "))]
    CompositionCycle { path: Vec<String> },

    #[error("Invalid relation {relation}: {reason}")]
    RelationShape { relation: String, reason: String },

    #[error("Interface defined more than once: {name}")]
    DuplicateInterface { name: String },

    #[error("Field {field} appears more than once in resolved model {model}")]
    DuplicateField { model: String, field: String },

    #[error("Invalid hash {value:?}: {reason}")]
    InvalidHash { value: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Whether the error comes from the schema itself rather than the environment
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            SchemaError::Syntax { .. }
                | SchemaError::MissingModels(_)
                | SchemaError::CompositionCycle { .. }
                | SchemaError::RelationShape { .. }
                | SchemaError::DuplicateInterface { .. }
                | SchemaError::DuplicateField { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_errors_are_told_apart() {
        let cycle = SchemaError::CompositionCycle { path: vec!["A".into(), "A".into()] };
        assert!(cycle.is_schema_error());
        assert!(SchemaError::MissingModels(vec!["Gone".into()]).is_schema_error());

        let io = SchemaError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "schema"));
        assert!(!io.is_schema_error());
        let hash = SchemaError::InvalidHash { value: "zz".into(), reason: "not hex".into() };
        assert!(!hash.is_schema_error());
    }
}
