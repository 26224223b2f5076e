//! SOLIDWORKS reached through an automation bridge process.
//!
//! The bridge is a PowerShell host script (`scripts/sldprt_bridge.ps1`) that
//! owns the COM objects. We talk to it over its stdin/stdout using the
//! line-delimited JSON in [`super::protocol`]. One bridge process backs one
//! [`BridgeApp`]; failed connection attempts hand the process on to the next
//! attempt instead of starting a new one.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info};

use super::protocol::{self, Op, Reply, Request};
use super::{DocumentHandle, EngineApp, EngineConnector, OpenSignature};
use crate::error::{ConvertError, Result};
use crate::process_guard::{ChildGuard, CommandProcessGroup};

/// File name of the bridge host script
pub const BRIDGE_SCRIPT_NAME: &str = "sldprt_bridge.ps1";

/// Overrides where the bridge script is looked up
pub const BRIDGE_SCRIPT_ENV: &str = "SLDPRT2STL_BRIDGE_SCRIPT";

/// Overrides the scripting host executable
pub const SHELL_ENV: &str = "SLDPRT2STL_SHELL";

/// Scripting host used to run the bridge
pub fn default_shell() -> String {
    std::env::var(SHELL_ENV).unwrap_or_else(|_| {
        if cfg!(windows) {
            "powershell.exe".to_string()
        } else {
            "pwsh".to_string()
        }
    })
}

/// Find the bridge script: environment override, then `scripts/` next to
/// the executable, then `scripts/` in the working directory.
pub fn locate_script() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(BRIDGE_SCRIPT_ENV) {
        return Some(PathBuf::from(path)).filter(|p| p.is_file());
    }

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("scripts").join(BRIDGE_SCRIPT_NAME)));

    beside_exe
        .into_iter()
        .chain(std::iter::once(PathBuf::from("scripts").join(BRIDGE_SCRIPT_NAME)))
        .find(|p| p.is_file())
}

/// How to start a bridge process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl BridgeCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Run `script` under the scripting host
    pub fn powershell(shell: impl Into<String>, script: &Path) -> Self {
        Self::new(
            shell,
            vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-ExecutionPolicy".to_string(),
                "Bypass".to_string(),
                "-File".to_string(),
                script.to_string_lossy().into_owned(),
            ],
        )
    }
}

/// A running bridge and its pipes
pub struct BridgeProcess {
    // Dropped first so the bridge sees EOF before the guard starts waiting
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    guard: ChildGuard,
    next_id: u64,
}

impl BridgeProcess {
    pub fn spawn(command: &BridgeCommand) -> Result<Self> {
        debug!("Starting bridge: {} {:?}", command.program, command.args);

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .in_new_process_group()
            .spawn()
            .map_err(|e| {
                ConvertError::bridge(format!("failed to start {}: {}", command.program, e))
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let guard = ChildGuard::new(child, "automation bridge");

        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => Ok(Self {
                stdin,
                stdout: BufReader::new(stdout),
                guard,
                next_id: 1,
            }),
            _ => Err(ConvertError::bridge("bridge pipes unavailable")),
        }
    }

    /// Send one request and wait for its reply.
    pub fn call(&mut self, op: Op) -> Result<serde_json::Value> {
        let id = self.next_id;
        self.next_id += 1;

        let line = serde_json::to_string(&Request { id, op })?;
        debug!("bridge <- {}", line);
        writeln!(self.stdin, "{}", line)?;
        self.stdin.flush()?;

        loop {
            let mut buf = String::new();
            if self.stdout.read_line(&mut buf)? == 0 {
                return Err(ConvertError::bridge(format!(
                    "bridge (PID {:?}) exited before answering request {}",
                    self.guard.id(),
                    id
                )));
            }

            let buf = buf.trim();
            // The host may print banners or warnings of its own
            if !buf.starts_with('{') {
                if !buf.is_empty() {
                    debug!("bridge noise: {}", buf);
                }
                continue;
            }

            debug!("bridge -> {}", buf);
            let reply: Reply = serde_json::from_str(buf)?;
            return reply.into_result(id);
        }
    }
}

/// Interpret a COM return value the way a scripting language would
fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

/// SOLIDWORKS application driven through a bridge process
pub struct BridgeApp {
    process: BridgeProcess,
}

impl EngineApp for BridgeApp {
    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.process.call(Op::SetVisible { visible }).map(drop)
    }

    fn revision(&mut self) -> Result<String> {
        let value = self.process.call(Op::Revision)?;
        Ok(match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
    }

    fn close_all_documents(&mut self) -> Result<()> {
        self.process.call(Op::CloseAll).map(drop)
    }

    fn open_document(
        &mut self,
        path: &Path,
        signature: OpenSignature,
    ) -> Result<Option<DocumentHandle>> {
        let value = self.process.call(Op::Open {
            path: path.to_path_buf(),
            signature,
        })?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    fn save_as(&mut self, doc: &DocumentHandle, target: &Path) -> Result<bool> {
        let value = self.process.call(Op::SaveAs {
            handle: doc.handle,
            path: target.to_path_buf(),
        })?;
        Ok(truthy(&value))
    }

    fn close_document(&mut self, title: &str) -> Result<()> {
        self.process
            .call(Op::CloseDoc {
                title: title.to_string(),
            })
            .map(drop)
    }

    fn exit_app(&mut self) -> Result<()> {
        self.process.call(Op::ExitApp).map(drop)
    }
}

/// Connects to SOLIDWORKS by starting (and reusing) bridge processes
pub struct BridgeConnector {
    command: BridgeCommand,
    idle: Option<BridgeProcess>,
}

impl BridgeConnector {
    pub fn new(command: BridgeCommand) -> Self {
        Self {
            command,
            idle: None,
        }
    }

    fn connect(&mut self, op: Op) -> Result<BridgeApp> {
        let mut process = match self.idle.take() {
            Some(process) => process,
            None => BridgeProcess::spawn(&self.command)?,
        };

        match process.call(op) {
            Ok(_) => Ok(BridgeApp { process }),
            Err(e) => {
                // A refused connection leaves the bridge usable; a broken
                // transport does not
                if matches!(e, ConvertError::Engine(_)) {
                    self.idle = Some(process);
                } else {
                    info!("Discarding bridge after transport failure: {}", e);
                }
                Err(e)
            }
        }
    }
}

impl EngineConnector for BridgeConnector {
    type App = BridgeApp;

    fn attach(&mut self) -> Result<BridgeApp> {
        self.connect(Op::Attach)
    }

    fn create(&mut self, version: Option<u32>) -> Result<BridgeApp> {
        self.connect(Op::Create {
            prog_id: protocol::prog_id(version),
        })
    }
}
