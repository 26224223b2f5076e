//! The batch conversion loop.
//!
//! Files are processed one at a time in path order. For each file:
//!
//! 1. resolve the path handed to SOLIDWORKS (falls back to the original)
//! 2. make sure it exists, otherwise fail without touching the engine
//! 3. clear documents left over from earlier files
//! 4. open with the primary [`OpenSignature`], trying the others only when it
//!    yields no document
//! 5. save as `<output>/<stem>.STL`
//! 6. close the document, whatever happened in 4 and 5
//!
//! A failing file is counted and the loop moves on; nothing in here aborts
//! the batch.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::discovery::{self, CandidateSet};
use crate::engine::{
    self, ConnectStrategy, DocumentHandle, EngineApp, EngineConnector, OpenSignature, Session,
};
use crate::error::Result;
use crate::path_resolver::PathResolver;
use crate::progress::Progress;

/// Extension of exported files; SOLIDWORKS picks the format from it
pub const TARGET_EXTENSION: &str = "STL";

/// Why a single file was not converted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("path invalid or file does not exist: {0:?}")]
    PathInvalid(PathBuf),

    #[error("SOLIDWORKS could not open the document")]
    CannotOpen,

    #[error("SOLIDWORKS rejected the export")]
    ExportRejected,

    #[error("{0}")]
    Engine(String),
}

/// Result for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Path of the written file
    Success(PathBuf),
    Failure(FailureReason),
}

/// Counters for a whole batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub success: usize,
    pub failed: usize,
    /// Files never reached because the run was interrupted
    pub skipped: usize,
    pub total: usize,
    pub failures: Vec<(PathBuf, FailureReason)>,
    pub interrupted: bool,
}

impl ConversionReport {
    fn with_total(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    fn record(&mut self, source: &Path, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Success(_) => self.success += 1,
            FileOutcome::Failure(reason) => {
                self.failed += 1;
                self.failures.push((source.to_path_buf(), reason));
            }
        }
    }

    /// Every discovered file is accounted for exactly once
    pub fn is_balanced(&self) -> bool {
        self.success + self.failed + self.skipped == self.total
    }
}

/// `<output_dir>/<stem of source>.STL`
pub fn target_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{}.{}", stem, TARGET_EXTENSION))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Open with the primary signature, falling back to the alternatives only
/// when it returns no document. An error from the primary fails the file
/// with its detail; errors from the alternatives count as no document.
fn open_with_fallback<A: EngineApp>(
    app: &mut A,
    path: &Path,
) -> std::result::Result<DocumentHandle, FailureReason> {
    for signature in OpenSignature::iter() {
        match app.open_document(path, signature) {
            Ok(Some(doc)) => {
                debug!("Opened {:?} via {}", path, signature);
                return Ok(doc);
            }
            Ok(None) => debug!("{} returned no document for {:?}", signature, path),
            Err(e) if signature == OpenSignature::OpenDoc => {
                return Err(FailureReason::Engine(e.to_string()));
            }
            Err(e) => warn!("{} failed for {:?}: {}", signature, path, e),
        }
    }
    Err(FailureReason::CannotOpen)
}

/// Drives one batch through an engine session
pub struct BatchConverter<'a> {
    output_dir: &'a Path,
    resolver: &'a dyn PathResolver,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> BatchConverter<'a> {
    pub fn new(output_dir: &'a Path, resolver: &'a dyn PathResolver) -> Self {
        Self {
            output_dir,
            resolver,
            cancel: None,
        }
    }

    /// Stop before the next file once `flag` is raised
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Convert every file in `files`, in order.
    pub fn run<A: EngineApp>(
        &self,
        session: &mut Session<A>,
        files: &CandidateSet,
    ) -> ConversionReport {
        let total = files.len();
        let mut report = ConversionReport::with_total(total);
        let start = Instant::now();

        for (i, source) in files.iter().enumerate() {
            if self.cancelled() {
                report.skipped = total - i;
                report.interrupted = true;
                warn!("Interrupted, skipping {} remaining file(s)", report.skipped);
                break;
            }

            let progress = Progress::new(i + 1, total, start.elapsed());
            let name = display_name(source);
            match progress.timing() {
                Some(timing) => println!("{} Processing {} - {}", progress, name, timing),
                None => println!("{} Processing {}", progress, name),
            }

            let outcome = self.convert_one(session, source);
            match &outcome {
                FileOutcome::Success(target) => {
                    println!("  Converted to STL: {}", target.display())
                }
                FileOutcome::Failure(reason) => {
                    println!("  Conversion failed for {}: {}", name, reason)
                }
            }
            report.record(source, outcome);
        }

        println!(
            "Batch conversion finished! Success: {}, Failed: {}, Total: {}",
            report.success, report.failed, report.total
        );
        info!(
            success = report.success,
            failed = report.failed,
            skipped = report.skipped,
            total = report.total,
            "Batch finished"
        );
        report
    }

    fn convert_one<A: EngineApp>(&self, session: &mut Session<A>, source: &Path) -> FileOutcome {
        let resolved = match self.resolver.resolve(source) {
            Ok(path) => path,
            Err(e) => {
                println!("  Note: could not get short path, using original path ({})", e);
                source.to_path_buf()
            }
        };

        if !resolved.exists() {
            return FileOutcome::Failure(FailureReason::PathInvalid(resolved));
        }

        if let Err(e) = session.app().close_all_documents() {
            warn!("Could not close previously opened documents: {}", e);
        }

        let mut scope = session.document_scope(display_name(source));

        let doc = match open_with_fallback(scope.app(), &resolved) {
            Ok(doc) => doc,
            Err(reason) => return FileOutcome::Failure(reason),
        };

        let target = target_path(self.output_dir, source);
        match scope.app().save_as(&doc, &target) {
            Ok(true) => FileOutcome::Success(target),
            Ok(false) => FileOutcome::Failure(FailureReason::ExportRejected),
            Err(e) => FileOutcome::Failure(FailureReason::Engine(e.to_string())),
        }
    }
}

/// Discover, connect, convert, release.
///
/// The engine is only started when there is something to convert. The
/// session is released on every path out of here, including unwinding.
pub fn run_batch<C: EngineConnector>(
    connector: &mut C,
    plan: &[ConnectStrategy],
    input_dir: &Path,
    converter: &BatchConverter<'_>,
) -> Result<ConversionReport> {
    let files = discovery::scan(input_dir)?;
    if files.is_empty() {
        println!("No valid SLDPRT files found in {}", input_dir.display());
        return Ok(ConversionReport::default());
    }
    println!("Found {} SLDPRT file(s) to convert", files.len());

    let mut session = engine::acquire(connector, plan)?;
    println!("Using {}", session.source());
    if let Some(revision) = session.revision() {
        println!("SOLIDWORKS revision: {}", revision);
    }

    let report = converter.run(&mut session, &files);
    session.release();
    Ok(report)
}
