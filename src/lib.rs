//! sldprt2stl library
//!
//! Batch conversion of SOLIDWORKS part files to STL. SOLIDWORKS itself does
//! the geometry work; this crate finds the files, manages the application
//! session and keeps the batch going when individual files fail.

pub mod cli;
pub mod convert;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod frontend;
pub mod path_resolver;
pub mod process_guard;
pub mod progress;
pub mod sanity;
pub mod settings;

// Re-export main types for convenience
pub use convert::{run_batch, BatchConverter, ConversionReport, FailureReason, FileOutcome};
pub use discovery::{scan, CandidateSet};
pub use engine::bridge::{BridgeCommand, BridgeConnector};
pub use engine::{
    acquire, connection_plan, ConnectStrategy, DocumentHandle, EngineApp, EngineConnector,
    OpenSignature, Session, DEFAULT_ENGINE_VERSIONS,
};
pub use error::{ConvertError, Result};
pub use frontend::{choose_directories, Prompter, TerminalPrompter};
pub use path_resolver::{NativePathResolver, PathResolver, ShortPathResolver};
pub use settings::{Settings, SettingsStore};
