//! Child process lifecycle and interrupt handling
//!
//! The automation bridge runs as a child process. If we leave without
//! shutting it down (panic, early return) it must not linger holding a
//! SOLIDWORKS COM reference, so [`ChildGuard`] reaps it on drop: a short
//! grace period for a clean exit, then a kill.
//!
//! Ctrl+C does not kill the program outright. The first interrupt raises a
//! flag the conversion loop checks between files, letting the session guard
//! shut SOLIDWORKS down on the way out. For that the bridge has to survive
//! the interrupt too, so children are started in their own process group
//! (see [`CommandProcessGroup`]) where the terminal's Ctrl+C does not reach
//! them. A second interrupt exits at once without releasing anything; the
//! bridge then sees EOF on its stdin and stops by itself.

use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Exit code used when the user insists on stopping (128 + SIGINT)
pub const FORCED_EXIT_CODE: i32 = 130;

/// How long a child gets to exit on its own before being killed
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Flag raised by the first Ctrl+C
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Install the Ctrl+C handler. Call once at program start.
pub fn init_interrupt_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            eprintln!("\nInterrupted again, exiting immediately");
            std::process::exit(FORCED_EXIT_CODE);
        }
        eprintln!("\nInterrupt received, stopping after the current file...");
    })
}

/// Start children outside our console process group so that a terminal
/// Ctrl+C is delivered to this program only
pub trait CommandProcessGroup {
    fn in_new_process_group(&mut self) -> &mut Self;
}

#[cfg(unix)]
impl CommandProcessGroup for Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // PGID = child PID
        self.process_group(0)
    }
}

#[cfg(windows)]
impl CommandProcessGroup for Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::windows::process::CommandExt;
        // Also turns off CTRL_C_EVENT handling in the child
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        self.creation_flags(CREATE_NEW_PROCESS_GROUP)
    }
}

#[cfg(not(any(unix, windows)))]
impl CommandProcessGroup for Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        self
    }
}

/// Process group of `pid`, read from procfs
#[cfg(all(test, target_os = "linux"))]
pub(crate) fn process_group_of(pid: u32) -> Option<u32> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // pid (comm) state ppid pgrp ...
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().nth(2)?.parse().ok()
}

/// Owns a child process and makes sure it is gone when dropped
#[derive(Debug)]
pub struct ChildGuard {
    child: Option<Child>,
    name: String,
    grace_period: Duration,
}

impl ChildGuard {
    pub fn new(child: Child, name: impl Into<String>) -> Self {
        let name = name.into();
        debug!("Tracking child process {} (PID {})", name, child.id());
        Self {
            child: Some(child),
            name,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// PID of the tracked child, if still tracked
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Wait up to the grace period for a clean exit, then kill.
    pub fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        let start = Instant::now();
        while start.elapsed() < self.grace_period {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("{} exited with {}", self.name, status);
                    return;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(e) => {
                    warn!("Failed to poll {}: {}", self.name, e);
                    break;
                }
            }
        }

        info!("{} did not exit in time, killing PID {}", self.name, child.id());
        if let Err(e) = child.kill() {
            warn!("Failed to kill {}: {}", self.name, e);
        }
        let _ = child.wait();
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}
