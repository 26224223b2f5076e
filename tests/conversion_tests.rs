//! Conversion loop and session lifecycle against a scripted engine.

mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use common::{parts_dir, Call, FakeConnector, FileScript, OpenBehavior, SaveBehavior};
use sldprt2stl::{
    acquire, connection_plan, run_batch, scan, BatchConverter, ConnectStrategy, ConvertError,
    FailureReason, NativePathResolver, OpenSignature, PathResolver, Result, Settings,
    SettingsStore,
};
use tempfile::TempDir;

/// Points every file at a path that does not exist
struct VanishingResolver;

impl PathResolver for VanishingResolver {
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        Ok(path.with_file_name("vanished.SLDPRT"))
    }
}

/// Always fails, forcing the fallback to the original path
struct BrokenResolver;

impl PathResolver for BrokenResolver {
    fn resolve(&self, _path: &Path) -> Result<PathBuf> {
        Err(ConvertError::engine("GetShortPathName failed"))
    }
}

#[test]
fn first_file_fails_to_open_rest_succeed() {
    let input = parts_dir(&["A.SLDPRT", "B.SLDPRT", "C.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();
    connector.script(
        "A.SLDPRT",
        FileScript {
            open: vec![OpenBehavior::NoDocument; 3],
            save: SaveBehavior::Accept,
        },
    );

    let files = scan(input.path()).unwrap();
    let mut session = acquire(&mut connector, &connection_plan(&[])).unwrap();
    let report =
        BatchConverter::new(output.path(), &NativePathResolver).run(&mut session, &files);
    session.release();

    assert_eq!((report.success, report.failed, report.total), (2, 1, 3));
    assert!(report.is_balanced());
    assert_eq!(
        report.failures,
        vec![(input.path().join("A.SLDPRT"), FailureReason::CannotOpen)]
    );

    let shared = connector.shared.borrow();
    assert_eq!(shared.closed_docs(), vec!["A.SLDPRT", "B.SLDPRT", "C.SLDPRT"]);
    assert_eq!(shared.count(|c| *c == Call::ExitApp), 1);
}

#[test]
fn open_falls_back_through_signatures() {
    let input = parts_dir(&["Bracket.sldprt"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();
    connector.script(
        "Bracket.sldprt",
        FileScript {
            open: vec![OpenBehavior::NoDocument, OpenBehavior::Raise, OpenBehavior::Document],
            save: SaveBehavior::Accept,
        },
    );

    let files = scan(input.path()).unwrap();
    let mut session = acquire(&mut connector, &connection_plan(&[])).unwrap();
    let report =
        BatchConverter::new(output.path(), &NativePathResolver).run(&mut session, &files);
    drop(session);

    assert_eq!(report.success, 1);
    let shared = connector.shared.borrow();
    let opens: Vec<OpenSignature> = shared
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::Open(_, sig) => Some(*sig),
            _ => None,
        })
        .collect();
    assert_eq!(
        opens,
        vec![
            OpenSignature::OpenDoc,
            OpenSignature::OpenDoc6Silent,
            OpenSignature::OpenDoc6Minimal
        ]
    );
    assert!(shared.calls.contains(&Call::SaveAs(
        "Bracket.sldprt".to_string(),
        output.path().join("Bracket.STL")
    )));
}

#[test]
fn export_rejection_and_errors_are_counted_not_fatal() {
    let input = parts_dir(&["a.SLDPRT", "b.SLDPRT", "c.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();
    connector.script(
        "a.SLDPRT",
        FileScript {
            save: SaveBehavior::Reject,
            ..FileScript::default()
        },
    );
    connector.script(
        "b.SLDPRT",
        FileScript {
            save: SaveBehavior::Raise,
            ..FileScript::default()
        },
    );
    connector.shared.borrow_mut().fail_close_doc = true;

    let files = scan(input.path()).unwrap();
    let mut session = acquire(&mut connector, &connection_plan(&[])).unwrap();
    let report =
        BatchConverter::new(output.path(), &NativePathResolver).run(&mut session, &files);
    session.release();

    assert_eq!((report.success, report.failed, report.total), (1, 2, 3));
    assert_eq!(report.failures[0].1, FailureReason::ExportRejected);
    assert!(matches!(
        report.failures[1].1,
        FailureReason::Engine(ref m) if m.contains("export crashed")
    ));
    // Close failures are logged and the loop keeps going
    assert_eq!(connector.shared.borrow().closed_docs().len(), 3);
}

#[test]
fn invalid_path_fails_without_touching_the_engine() {
    let input = parts_dir(&["Gone.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();

    let files = scan(input.path()).unwrap();
    let mut session = acquire(&mut connector, &connection_plan(&[])).unwrap();
    let report =
        BatchConverter::new(output.path(), &VanishingResolver).run(&mut session, &files);
    session.release();

    assert_eq!((report.success, report.failed), (0, 1));
    assert!(matches!(report.failures[0].1, FailureReason::PathInvalid(_)));
    let shared = connector.shared.borrow();
    assert_eq!(shared.count(|c| matches!(c, Call::Open(..))), 0);
    assert!(shared.closed_docs().is_empty());
}

#[test]
fn failed_path_resolution_uses_original_path() {
    let input = parts_dir(&["Part1.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();

    let files = scan(input.path()).unwrap();
    let mut session = acquire(&mut connector, &connection_plan(&[])).unwrap();
    let report = BatchConverter::new(output.path(), &BrokenResolver).run(&mut session, &files);
    session.release();

    assert_eq!(report.success, 1);
}

#[test]
fn release_happens_once_when_every_file_fails() {
    let input = parts_dir(&["a.SLDPRT", "b.SLDPRT", "c.SLDPRT", "d.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();
    for name in ["a.SLDPRT", "b.SLDPRT", "c.SLDPRT", "d.SLDPRT"] {
        connector.script(
            name,
            FileScript {
                open: vec![OpenBehavior::Raise; 3],
                save: SaveBehavior::Accept,
            },
        );
    }

    let converter = BatchConverter::new(output.path(), &NativePathResolver);
    let report =
        run_batch(&mut connector, &connection_plan(&[31]), input.path(), &converter).unwrap();

    assert_eq!((report.success, report.failed, report.total), (0, 4, 4));
    assert!(report.failures.iter().all(|(_, reason)| {
        matches!(reason, FailureReason::Engine(m) if m.contains("file is corrupt"))
    }));
    assert_eq!(connector.shared.borrow().count(|c| *c == Call::ExitApp), 1);
}

#[test]
fn session_released_when_loop_panics() {
    let input = parts_dir(&["a.SLDPRT", "b.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();
    connector.script(
        "a.SLDPRT",
        FileScript {
            save: SaveBehavior::Panic,
            ..FileScript::default()
        },
    );
    let shared = connector.shared.clone();

    let files = scan(input.path()).unwrap();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut session = acquire(&mut connector, &connection_plan(&[])).unwrap();
        BatchConverter::new(output.path(), &NativePathResolver).run(&mut session, &files)
    }));

    assert!(result.is_err());
    let shared = shared.borrow();
    // The second file was never reached
    assert_eq!(shared.count(|c| matches!(c, Call::Open(..))), 1);
    assert_eq!(shared.closed_docs(), vec!["a.SLDPRT"]);
    assert_eq!(shared.count(|c| *c == Call::ExitApp), 1);
    assert_eq!(shared.calls.last(), Some(&Call::ExitApp));
}

#[test]
fn primary_open_error_fails_file_without_fallback() {
    let input = parts_dir(&["Cracked.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();
    connector.script(
        "Cracked.SLDPRT",
        FileScript {
            open: vec![OpenBehavior::Raise, OpenBehavior::Document],
            save: SaveBehavior::Accept,
        },
    );

    let files = scan(input.path()).unwrap();
    let mut session = acquire(&mut connector, &connection_plan(&[])).unwrap();
    let report =
        BatchConverter::new(output.path(), &NativePathResolver).run(&mut session, &files);
    session.release();

    assert_eq!((report.success, report.failed), (0, 1));
    assert!(matches!(
        report.failures[0].1,
        FailureReason::Engine(ref m) if m.contains("file is corrupt")
    ));
    let shared = connector.shared.borrow();
    assert_eq!(
        shared.count(|c| matches!(c, Call::Open(..))),
        1,
        "alternative signatures must not run after the primary raised"
    );
    assert_eq!(shared.count(|c| matches!(c, Call::SaveAs(..))), 0);
    assert_eq!(shared.closed_docs(), vec!["Cracked.SLDPRT"]);
}

#[test]
fn alternative_open_errors_count_as_no_document() {
    let input = parts_dir(&["Legacy.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();
    connector.script(
        "Legacy.SLDPRT",
        FileScript {
            open: vec![OpenBehavior::NoDocument, OpenBehavior::Raise, OpenBehavior::Raise],
            save: SaveBehavior::Accept,
        },
    );

    let files = scan(input.path()).unwrap();
    let mut session = acquire(&mut connector, &connection_plan(&[])).unwrap();
    let report =
        BatchConverter::new(output.path(), &NativePathResolver).run(&mut session, &files);
    session.release();

    assert_eq!(report.failures[0].1, FailureReason::CannotOpen);
    assert_eq!(connector.shared.borrow().count(|c| matches!(c, Call::Open(..))), 3);
}

#[test]
fn interrupt_skips_remaining_files() {
    let input = parts_dir(&["a.SLDPRT", "b.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();
    let cancel = AtomicBool::new(true);

    let files = scan(input.path()).unwrap();
    let mut session = acquire(&mut connector, &connection_plan(&[])).unwrap();
    let report = BatchConverter::new(output.path(), &NativePathResolver)
        .with_cancel(&cancel)
        .run(&mut session, &files);
    session.release();

    assert!(report.interrupted);
    assert_eq!((report.success, report.failed, report.skipped), (0, 0, 2));
    assert!(report.is_balanced());
    assert_eq!(connector.shared.borrow().count(|c| *c == Call::ExitApp), 1);
}

#[test]
fn engine_not_started_for_empty_directory() {
    let input = parts_dir(&["~$Part1.SLDPRT", "notes.txt"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::attaching();

    let converter = BatchConverter::new(output.path(), &NativePathResolver);
    let report =
        run_batch(&mut connector, &connection_plan(&[]), input.path(), &converter).unwrap();

    assert_eq!(report.total, 0);
    assert!(connector.attempts.is_empty());
}

#[test]
fn unreachable_engine_aborts_before_any_file() {
    let input = parts_dir(&["a.SLDPRT"]);
    let output = TempDir::new().unwrap();
    let mut connector = FakeConnector::new(vec![]);

    let converter = BatchConverter::new(output.path(), &NativePathResolver);
    let err = run_batch(&mut connector, &connection_plan(&[31, 30]), input.path(), &converter)
        .unwrap_err();

    assert!(matches!(err, ConvertError::EngineUnavailable { attempts: 4 }));
    assert!(connector.shared.borrow().calls.is_empty());
}

#[test]
fn version_fallback_stops_at_first_working_version() {
    let mut connector = FakeConnector::new(vec![ConnectStrategy::Create(30)]);

    let session = acquire(&mut connector, &connection_plan(&[31, 30, 29])).unwrap();

    assert!(session.source().to_string().contains("version 30"));
    assert_eq!(
        connector.attempts,
        vec![
            ConnectStrategy::Attach,
            ConnectStrategy::Create(31),
            ConnectStrategy::Create(30)
        ]
    );
}

#[test]
fn settings_survive_between_runs() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::new(dir.path().join("sldprt2stl.json"));

    assert_eq!(store.load(), Settings::new("", ""));
    store.save(&Settings::new("/a", "/b"));

    let next_run = SettingsStore::new(dir.path().join("sldprt2stl.json"));
    assert_eq!(next_run.load(), Settings::new("/a", "/b"));
}
