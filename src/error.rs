//! Error types for vcf2magetab
//!
//! Every variant is terminal for a run: there is no retry and no partial
//! archive. The binary wraps these in `anyhow` at the CLI boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the protocol descriptor set
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more descriptors lack required fields (all offenders listed)
    #[error("Missing required protocol descriptor fields:\n{}", .0.join("\n"))]
    MissingFields(Vec<String>),

    /// Two descriptors declare the same protocol name
    #[error("Duplicate protocol name '{name}' in {}", .path.display())]
    DuplicateProtocol { name: String, path: PathBuf },

    /// No descriptor documents were found
    #[error("No protocol descriptor files (.yml/.yaml) found in {}", .0.display())]
    EmptyRegistry(PathBuf),

    /// A descriptor could not be decoded into a flat mapping
    #[error("Failed to decode protocol descriptor {}: {msg}", .path.display())]
    Decode { path: PathBuf, msg: String },
}

/// Main error type for archive assembly
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Malformed header annotation line
    #[error("Parse error in {} line {line}: {msg}", .path.display())]
    Parse { path: PathBuf, line: usize, msg: String },

    /// Protocol short name has no descriptor
    #[error("No protocol descriptor named '{short_name}' for {}", .path.display())]
    Resolution { short_name: String, path: PathBuf },

    /// A sample row reached completion with a missing value
    #[error("Incomplete SDRF row for sample {sample} in {}: missing {field}", .path.display())]
    Completeness {
        sample: String,
        path: PathBuf,
        field: &'static str,
    },

    /// A variant-call input cannot contribute to the archive
    #[error("Invalid input {}: {msg}", .path.display())]
    Input { path: PathBuf, msg: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchiveError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;
