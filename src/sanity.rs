//! Pre-flight checks for the runtime environment
//!
//! Verifies, before anything is prompted for:
//! - the scripting host that runs the automation bridge is installed
//! - the bridge script itself can be found
//!
//! If either is missing the program prints what to install and exits 1
//! once the user has had a chance to read it.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

use crate::engine::bridge::{self, BRIDGE_SCRIPT_ENV, BRIDGE_SCRIPT_NAME};
use crate::error::{ConvertError, Result};

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub shell: String,
    pub shell_found: bool,
    pub bridge_script: Option<PathBuf>,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.shell_found && self.bridge_script.is_some()
    }

    /// The first problem as an error value
    pub fn to_error(&self) -> Option<ConvertError> {
        if !self.shell_found {
            return Some(ConvertError::dependency(format!(
                "scripting host '{}' not found",
                self.shell
            )));
        }
        if self.bridge_script.is_none() {
            return Some(ConvertError::dependency(format!(
                "bridge script {} not found",
                BRIDGE_SCRIPT_NAME
            )));
        }
        None
    }
}

/// Check if a program is available, either as a path or on PATH
fn binary_exists(name: &str) -> bool {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }

    let finder = if cfg!(windows) { "where" } else { "which" };
    Command::new(finder)
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Perform all checks for the given scripting host
pub fn verify_environment(shell: &str) -> SanityCheckResult {
    let shell_found = binary_exists(shell);
    let bridge_script = bridge::locate_script();
    debug!(
        "Pre-flight: shell {} found={}, bridge script {:?}",
        shell, shell_found, bridge_script
    );

    SanityCheckResult {
        shell: shell.to_string(),
        shell_found,
        bridge_script,
    }
}

/// Print what is missing and how to get it to stderr
pub fn print_missing_dependencies(result: &SanityCheckResult) {
    eprintln!();
    eprintln!("Error: missing required dependencies");
    eprintln!();

    if !result.shell_found {
        eprintln!("  - {} is not installed or not on PATH", result.shell);
        eprintln!("    Windows ships with powershell.exe; elsewhere install PowerShell (pwsh).");
    }
    if result.bridge_script.is_none() {
        eprintln!("  - automation bridge script {} not found", BRIDGE_SCRIPT_NAME);
        eprintln!(
            "    Place it in a 'scripts' folder next to the executable or set {}.",
            BRIDGE_SCRIPT_ENV
        );
    }
    eprintln!();
}

/// Verify the environment; returns the bridge script, or a
/// `DependencyMissing` error after printing what is missing
pub fn run_preflight_checks(shell: &str) -> Result<PathBuf> {
    debug!("Running pre-flight checks...");

    let result = verify_environment(shell);
    if let Some(e) = result.to_error() {
        error!("Pre-flight check failed: {}", e);
        print_missing_dependencies(&result);
        return Err(e);
    }

    match result.bridge_script {
        Some(script) => {
            info!("Pre-flight checks passed, bridge script {:?}", script);
            Ok(script)
        }
        None => Err(ConvertError::dependency(BRIDGE_SCRIPT_NAME)),
    }
}
