//! Error handling module for sldprt2stl
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Only a handful of these stop a run; everything else is caught close to
//! where it happens, logged, and the batch carries on.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for sldprt2stl
#[derive(Error, Debug)]
pub enum ConvertError {
    /// IO errors (file operations, child process pipes, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required runtime dependency is not installed
    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    /// The input directory does not exist or is not usable
    #[error("Invalid directory: {0}")]
    DirectoryInvalid(String),

    /// The output directory could not be created
    #[error("Cannot create output directory {path:?}: {reason}")]
    OutputDirectory { path: PathBuf, reason: String },

    /// The input directory could not be listed
    #[error("Failed to scan {dir:?}: {source}")]
    Discovery {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every connection strategy failed
    #[error("Unable to connect to SOLIDWORKS after {attempts} attempt(s); make sure it is installed")]
    EngineUnavailable { attempts: usize },

    /// A call into the engine raised
    #[error("Engine error: {0}")]
    Engine(String),

    /// The automation bridge process misbehaved (died, garbled reply)
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// Interactive prompt failed (no terminal, read error)
    #[error("Prompt error: {0}")]
    Prompt(String),
}

/// Result type alias for sldprt2stl operations
pub type Result<T> = std::result::Result<T, ConvertError>;

// Convenient error constructors
impl ConvertError {
    /// Create a dependency error
    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::DependencyMissing(msg.into())
    }

    /// Create a directory error
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::DirectoryInvalid(msg.into())
    }

    /// Create an engine call error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a bridge transport error
    pub fn bridge(msg: impl Into<String>) -> Self {
        Self::Bridge(msg.into())
    }

    /// Create a prompt error
    pub fn prompt(msg: impl Into<String>) -> Self {
        Self::Prompt(msg.into())
    }

    /// Process exit code for errors that end the program.
    ///
    /// Missing dependencies and directory problems exit with 1. An
    /// unreachable engine is reported but still exits cleanly.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DependencyMissing(_)
            | Self::DirectoryInvalid(_)
            | Self::OutputDirectory { .. } => 1,
            _ => 0,
        }
    }
}
