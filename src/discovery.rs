//! Candidate file discovery.
//!
//! Scans one directory (no recursion) for SOLIDWORKS part files. Lock files
//! left behind by an open session (`~$Part1.SLDPRT`) and anything that looks
//! like an archive (`bundle.zip.SLDPRT`) are skipped.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ConvertError, Result};

/// Extension of SOLIDWORKS part files, matched case-insensitively
pub const SOURCE_EXTENSION: &str = "SLDPRT";

/// Prefix SOLIDWORKS gives its temporary lock files
pub const LOCK_FILE_PREFIX: &str = "~$";

/// Names containing this (lowercased) are treated as archives
pub const ARCHIVE_MARKER: &str = ".zip";

/// Distinct candidate files, ordered by path
pub type CandidateSet = BTreeSet<PathBuf>;

/// Whether a bare file name is eligible for conversion
pub fn is_candidate_name(name: &str) -> bool {
    if name.starts_with(LOCK_FILE_PREFIX) {
        return false;
    }
    if name.to_lowercase().contains(ARCHIVE_MARKER) {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

/// List the candidate part files directly inside `dir`.
///
/// Returns an empty set when nothing matches. Fails only when the directory
/// itself cannot be listed.
pub fn scan(dir: &Path) -> Result<CandidateSet> {
    let entries = fs::read_dir(dir).map_err(|source| ConvertError::Discovery {
        dir: dir.to_path_buf(),
        source,
    })?;

    // Canonical identity -> smallest path seen for it
    let mut by_identity: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {:?}: {}", dir, e);
                continue;
            }
        };

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            debug!("Skipping non-UTF-8 file name {:?}", entry.file_name());
            continue;
        };
        if !is_candidate_name(name) {
            continue;
        }

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        // The same file may be reachable under two spellings (links,
        // case-insensitive filesystems); keep the smallest, whatever the
        // directory order
        let identity = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        match by_identity.entry(identity) {
            Entry::Vacant(slot) => {
                slot.insert(path);
            }
            Entry::Occupied(mut slot) => {
                if path < *slot.get() {
                    slot.insert(path);
                }
            }
        }
    }

    let files: CandidateSet = by_identity.into_values().collect();
    debug!("Discovered {} candidate file(s) in {:?}", files.len(), dir);
    Ok(files)
}
