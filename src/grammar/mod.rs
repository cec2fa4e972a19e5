//! Schema text to concrete syntax tree

pub mod cst;
mod parser;

pub use cst::*;
pub use parser::parse_source;
