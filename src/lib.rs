//! Distributed Interfaces schema compiler
//!
//! Compiles `.di` schema sources (models, relations, validation rules and
//! compositions) into canonical, content-addressed interface artifacts.
//!
//! ## Features
//!
//! - **Deterministic Encoding**: Independent builders produce byte-identical output
//! - **Composition**: Models inline the fields of the models they compose
//! - **Version Ledger**: Every interface gets a `{root, prev, file}` SHA256 triple
//! - **Unchanged Detection**: Interfaces matching their published hash are not rewritten
//!
//! ## Build Directory
//!
//! ```text
//! build/
//! ├── models/
//! │   └── 5A1F….di
//! ├── relations/
//! │   └── 0C9E….di
//! ├── ledger.json
//! ├── definition.json
//! ├── linked.json
//! └── manifest.json
//! ```

pub mod ast;
pub mod builder;
pub mod canonical;
pub mod checksum;
pub mod compiler;
pub mod compose;
pub mod config;
pub mod definition;
pub mod encode;
pub mod error;
pub mod grammar;
pub mod ledger;
pub mod linked;
pub mod storage;

pub use ast::{Model, ModelField, Relation, RelationField, Schema};
pub use canonical::{CanonicalSchema, InterfaceKind};
pub use checksum::Checksum;
pub use compiler::{build, compile, Compilation};
pub use config::{BuildConfig, DiConfig, PreviousVersion};
pub use definition::Definition;
pub use error::{Result, SchemaError};
pub use ledger::{Ledger, LedgerEntry};
pub use storage::{BuildArtifacts, FsStorage, MemoryStorage, SourceText, Storage};
