//! SOLIDWORKS session management.
//!
//! The CAD application is an opaque collaborator reached through two
//! capability traits: [`EngineConnector`] produces a live application handle
//! and [`EngineApp`] is what the conversion loop drives. The concrete
//! implementation lives in [`bridge`]; tests substitute a scripted fake.
//!
//! # Connection order
//!
//! [`acquire`] walks a [`ConnectStrategy`] plan in order and keeps the first
//! handle that comes back:
//!
//! 1. attach to a running instance
//! 2. create an instance for each known version, newest first
//! 3. create the unversioned default
//!
//! # Release
//!
//! A [`Session`] shuts the application down exactly once, either through
//! [`Session::release`] or when it is dropped on an early return or unwind.

pub mod bridge;
pub mod protocol;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use strum::{Display, EnumIter};
use tracing::{debug, info, warn};

use crate::error::{ConvertError, Result};

/// Versioned COM class registrations tried after attaching, newest first
pub const DEFAULT_ENGINE_VERSIONS: &[u32] = &[31, 30, 29, 28, 27, 26];

/// Argument shapes tried, in order, when opening a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OpenSignature {
    /// `OpenDoc(path, part)`
    OpenDoc,
    /// `OpenDoc6(path, part, silent, "", errors, warnings)`
    OpenDoc6Silent,
    /// `OpenDoc6(path, part, 0, "", errors, warnings)`
    OpenDoc6Minimal,
}

/// An open document inside the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHandle {
    pub handle: u64,
    pub title: String,
}

/// Operations the conversion loop needs from a running application.
///
/// All calls block until the application answers.
pub trait EngineApp {
    /// Show or hide the application window
    fn set_visible(&mut self, visible: bool) -> Result<()>;

    /// Application revision string, e.g. `"31.1.0"`
    fn revision(&mut self) -> Result<String>;

    /// Close every open document without saving
    fn close_all_documents(&mut self) -> Result<()>;

    /// Open a part; `Ok(None)` means the call succeeded but produced no document
    fn open_document(
        &mut self,
        path: &Path,
        signature: OpenSignature,
    ) -> Result<Option<DocumentHandle>>;

    /// Save `doc` under `target`, the format following the extension.
    /// `Ok(false)` means the application refused.
    fn save_as(&mut self, doc: &DocumentHandle, target: &Path) -> Result<bool>;

    /// Close the document with the given title
    fn close_document(&mut self, title: &str) -> Result<()>;

    /// Quit the application
    fn exit_app(&mut self) -> Result<()>;
}

/// Ways of getting hold of an application instance
pub trait EngineConnector {
    type App: EngineApp;

    /// Attach to an instance that is already running
    fn attach(&mut self) -> Result<Self::App>;

    /// Start a new instance; `None` asks for the default registration
    fn create(&mut self, version: Option<u32>) -> Result<Self::App>;
}

/// One step of the connection plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStrategy {
    Attach,
    Create(u32),
    CreateDefault,
}

impl fmt::Display for ConnectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attach => write!(f, "attached to running SOLIDWORKS instance"),
            Self::Create(version) => write!(f, "new SOLIDWORKS instance (version {})", version),
            Self::CreateDefault => write!(f, "new SOLIDWORKS instance (default version)"),
        }
    }
}

impl ConnectStrategy {
    fn attempt<C: EngineConnector>(self, connector: &mut C) -> Result<C::App> {
        match self {
            Self::Attach => connector.attach(),
            Self::Create(version) => connector.create(Some(version)),
            Self::CreateDefault => connector.create(None),
        }
    }
}

/// Attach first, then every version in the given order, then the default.
pub fn connection_plan(versions: &[u32]) -> Vec<ConnectStrategy> {
    std::iter::once(ConnectStrategy::Attach)
        .chain(versions.iter().copied().map(ConnectStrategy::Create))
        .chain(std::iter::once(ConnectStrategy::CreateDefault))
        .collect()
}

/// Connect using the first strategy in `plan` that works.
///
/// Failed attempts are logged at debug level and otherwise ignored. On
/// success the window is shown and the revision logged; neither step can
/// fail the acquisition.
pub fn acquire<C: EngineConnector>(
    connector: &mut C,
    plan: &[ConnectStrategy],
) -> Result<Session<C::App>> {
    for &strategy in plan {
        match strategy.attempt(connector) {
            Ok(app) => {
                info!("Engine session: {}", strategy);
                let mut session = Session::new(app, strategy);
                session.prepare();
                return Ok(session);
            }
            Err(e) => debug!("Connection attempt '{}' failed: {}", strategy, e),
        }
    }

    Err(ConvertError::EngineUnavailable {
        attempts: plan.len(),
    })
}

/// A live application handle, shut down exactly once
pub struct Session<A: EngineApp> {
    app: A,
    source: ConnectStrategy,
    revision: Option<String>,
    released: bool,
}

impl<A: EngineApp> Session<A> {
    fn new(app: A, source: ConnectStrategy) -> Self {
        Self {
            app,
            source,
            revision: None,
            released: false,
        }
    }

    fn prepare(&mut self) {
        if let Err(e) = self.app.set_visible(true) {
            warn!("Could not show the SOLIDWORKS window: {}", e);
        }
        match self.app.revision() {
            Ok(revision) => {
                info!("SOLIDWORKS revision: {}", revision);
                self.revision = Some(revision);
            }
            Err(e) => warn!("Could not read SOLIDWORKS revision, continuing anyway: {}", e),
        }
    }

    /// Which strategy produced this session
    pub fn source(&self) -> ConnectStrategy {
        self.source
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn app(&mut self) -> &mut A {
        &mut self.app
    }

    /// Open a scope that closes `title` when it ends
    pub fn document_scope(&mut self, title: impl Into<String>) -> DocumentScope<'_, A> {
        DocumentScope {
            app: &mut self.app,
            title: title.into(),
        }
    }

    /// Close all documents and quit the application.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        debug!("Releasing engine session ({})", self.source);
        if let Err(e) = self.app.close_all_documents() {
            warn!("Failed to close documents during shutdown: {}", e);
        }
        match self.app.exit_app() {
            Ok(()) => info!("SOLIDWORKS session closed"),
            Err(e) => warn!("Error while exiting SOLIDWORKS: {}", e),
        }
    }
}

impl<A: EngineApp> Drop for Session<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Closes one document when dropped, whatever happened while it was open
pub struct DocumentScope<'s, A: EngineApp> {
    app: &'s mut A,
    title: String,
}

impl<A: EngineApp> DocumentScope<'_, A> {
    pub fn app(&mut self) -> &mut A {
        &mut *self.app
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl<A: EngineApp> Drop for DocumentScope<'_, A> {
    fn drop(&mut self) {
        match self.app.close_document(&self.title) {
            Ok(()) => debug!("Closed document {}", self.title),
            Err(e) => warn!("Error closing document {}: {}", self.title, e),
        }
    }
}
