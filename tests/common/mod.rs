//! Scripted stand-in for SOLIDWORKS shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sldprt2stl::{
    ConnectStrategy, ConvertError, DocumentHandle, EngineApp, EngineConnector, OpenSignature,
    Result,
};
use tempfile::TempDir;

/// What `open_document` does for a given signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenBehavior {
    Document,
    NoDocument,
    Raise,
}

/// What `save_as` does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveBehavior {
    Accept,
    Reject,
    Raise,
    /// Unwinds out of the conversion loop
    Panic,
}

/// Per-file script; unlisted files open and save fine
#[derive(Debug, Clone)]
pub struct FileScript {
    pub open: Vec<OpenBehavior>,
    pub save: SaveBehavior,
}

impl Default for FileScript {
    fn default() -> Self {
        Self {
            open: vec![OpenBehavior::Document],
            save: SaveBehavior::Accept,
        }
    }
}

/// Everything the fake was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetVisible(bool),
    Revision,
    CloseAll,
    Open(String, OpenSignature),
    SaveAs(String, PathBuf),
    CloseDoc(String),
    ExitApp,
}

#[derive(Default)]
pub struct Shared {
    pub calls: Vec<Call>,
    pub scripts: HashMap<String, FileScript>,
    pub fail_close_doc: bool,
}

impl Shared {
    pub fn count(&self, wanted: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| wanted(c)).count()
    }

    pub fn closed_docs(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::CloseDoc(title) => Some(title.clone()),
                _ => None,
            })
            .collect()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

pub struct FakeApp {
    pub shared: Rc<RefCell<Shared>>,
    next_handle: u64,
}

impl EngineApp for FakeApp {
    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.shared.borrow_mut().calls.push(Call::SetVisible(visible));
        Ok(())
    }

    fn revision(&mut self) -> Result<String> {
        self.shared.borrow_mut().calls.push(Call::Revision);
        Ok("30.0.0".to_string())
    }

    fn close_all_documents(&mut self) -> Result<()> {
        self.shared.borrow_mut().calls.push(Call::CloseAll);
        Ok(())
    }

    fn open_document(
        &mut self,
        path: &Path,
        signature: OpenSignature,
    ) -> Result<Option<DocumentHandle>> {
        let name = file_name(path);
        let mut shared = self.shared.borrow_mut();
        shared.calls.push(Call::Open(name.clone(), signature));

        let script = shared.scripts.get(&name).cloned().unwrap_or_default();
        let attempt = shared
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Open(n, _) if *n == name))
            .count();
        let behavior = script
            .open
            .get(attempt - 1)
            .copied()
            .unwrap_or(OpenBehavior::NoDocument);

        match behavior {
            OpenBehavior::Document => {
                self.next_handle += 1;
                Ok(Some(DocumentHandle {
                    handle: self.next_handle,
                    title: name,
                }))
            }
            OpenBehavior::NoDocument => Ok(None),
            OpenBehavior::Raise => Err(ConvertError::engine("file is corrupt")),
        }
    }

    fn save_as(&mut self, doc: &DocumentHandle, target: &Path) -> Result<bool> {
        let mut shared = self.shared.borrow_mut();
        shared
            .calls
            .push(Call::SaveAs(doc.title.clone(), target.to_path_buf()));
        let script = shared.scripts.get(&doc.title).cloned().unwrap_or_default();
        drop(shared);
        match script.save {
            SaveBehavior::Accept => Ok(true),
            SaveBehavior::Reject => Ok(false),
            SaveBehavior::Raise => Err(ConvertError::engine("export crashed")),
            SaveBehavior::Panic => panic!("export panicked for {}", doc.title),
        }
    }

    fn close_document(&mut self, title: &str) -> Result<()> {
        let mut shared = self.shared.borrow_mut();
        shared.calls.push(Call::CloseDoc(title.to_string()));
        if shared.fail_close_doc {
            return Err(ConvertError::engine("document is busy"));
        }
        Ok(())
    }

    fn exit_app(&mut self) -> Result<()> {
        self.shared.borrow_mut().calls.push(Call::ExitApp);
        Ok(())
    }
}

/// Connects only for the strategies listed in `working`
pub struct FakeConnector {
    pub working: Vec<ConnectStrategy>,
    pub attempts: Vec<ConnectStrategy>,
    pub shared: Rc<RefCell<Shared>>,
}

impl FakeConnector {
    pub fn attaching() -> Self {
        Self::new(vec![ConnectStrategy::Attach])
    }

    pub fn new(working: Vec<ConnectStrategy>) -> Self {
        Self {
            working,
            attempts: Vec::new(),
            shared: Rc::default(),
        }
    }

    pub fn script(&self, name: &str, script: FileScript) {
        self.shared
            .borrow_mut()
            .scripts
            .insert(name.to_string(), script);
    }

    fn connect(&mut self, strategy: ConnectStrategy) -> Result<FakeApp> {
        self.attempts.push(strategy);
        if self.working.contains(&strategy) {
            Ok(FakeApp {
                shared: Rc::clone(&self.shared),
                next_handle: 0,
            })
        } else {
            Err(ConvertError::engine("Invalid class string"))
        }
    }
}

impl EngineConnector for FakeConnector {
    type App = FakeApp;

    fn attach(&mut self) -> Result<FakeApp> {
        self.connect(ConnectStrategy::Attach)
    }

    fn create(&mut self, version: Option<u32>) -> Result<FakeApp> {
        self.connect(version.map_or(ConnectStrategy::CreateDefault, ConnectStrategy::Create))
    }
}

/// Temp directory with empty part files
pub fn parts_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), b"part").unwrap();
    }
    dir
}
