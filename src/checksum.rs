//! SHA256 content hashes identifying interfaces and their versions

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Result, SchemaError};

/// SHA256 checksum, stored as lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a string
    pub fn of(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Parse a hex digest, accepting either case and an optional `0x` prefix
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(digits).map_err(|e| SchemaError::InvalidHash {
            value: value.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.len() != 32 {
            return Err(SchemaError::InvalidHash {
                value: value.to_string(),
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            });
        }

        Ok(Self(digits.to_ascii_lowercase()))
    }

    /// Get the lowercase hex representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercase hex, used for file names and definition entries
    pub fn to_upper(&self) -> String {
        self.0.to_ascii_uppercase()
    }

    /// Verify that content matches this checksum
    pub fn verify(&self, content: &str) -> bool {
        Self::of(content) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Checksum {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}
