//! Path rewriting before a part is handed to SOLIDWORKS.
//!
//! On Windows the COM open call chokes on some long or non-ASCII paths, so
//! the 8.3 short form is used when the filesystem provides one. Elsewhere
//! the step is a no-op.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{ConvertError, Result};
use crate::process_guard::CommandProcessGroup;

/// Turns a discovered path into the one passed to the engine
pub trait PathResolver {
    fn resolve(&self, path: &Path) -> Result<PathBuf>;
}

/// Leaves paths untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePathResolver;

impl PathResolver for NativePathResolver {
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}

/// Environment variable carrying the path into the helper command, which
/// sidesteps command-line quoting entirely
const TARGET_ENV: &str = "SLDPRT2STL_TARGET";

const SHORT_PATH_SCRIPT: &str =
    "(New-Object -ComObject Scripting.FileSystemObject).GetFile($env:SLDPRT2STL_TARGET).ShortPath";

/// Asks the Windows scripting host for the short form of a path
#[derive(Debug, Clone)]
pub struct ShortPathResolver {
    shell: String,
}

impl ShortPathResolver {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl PathResolver for ShortPathResolver {
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let output = Command::new(&self.shell)
            .args(["-NoProfile", "-NonInteractive", "-Command", SHORT_PATH_SCRIPT])
            .env(TARGET_ENV, path)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .in_new_process_group()
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::engine(format!(
                "short path lookup failed: {}",
                stderr.trim()
            )));
        }

        let short = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if short.is_empty() {
            return Err(ConvertError::engine("short path lookup returned nothing"));
        }
        Ok(PathBuf::from(short))
    }
}

/// Resolver suited to the current platform
pub fn platform_resolver(shell: &str) -> Box<dyn PathResolver> {
    if cfg!(windows) {
        Box::new(ShortPathResolver::new(shell))
    } else {
        Box::new(NativePathResolver)
    }
}
