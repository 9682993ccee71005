mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{DISK, FlakyDisk, Op};
use resilient_move::{
    ArtifactGenerator, AttemptError, Backoff, BreakerConfig, CircuitState, EntryKind, ExtensionFilter,
    FileMover, GeneratedArtifact, ResilientFsError, Storage,
};

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

#[test]
fn retries_copy_then_succeeds_with_one_ledger_entry() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "hello");
    disk.fail(Op::Copy, 2);
    let breaker = common::breaker();
    let mut mover = common::mover(breaker.clone(), disk.clone());

    let dest = mover.move_file(DISK, "a/f.txt", "b", 3).unwrap();

    assert_eq!(dest, p("b/f.txt"));
    assert_eq!(disk.inner.read("b/f.txt").unwrap(), b"hello");
    assert!(disk.inner.read("a/f.txt").is_none());
    assert_eq!(disk.calls(Op::Copy), 3);
    assert_eq!(mover.ledger().len(), 1);
    let entry = &mover.ledger().entries()[0];
    assert_eq!(entry.source, p("a/f.txt"));
    assert_eq!(entry.destination, p("b/f.txt"));
    assert_eq!(breaker.stats().unwrap().failure_count, 0);
}

#[test]
fn exhaustion_with_empty_ledger_raises_move_failure() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "hello");
    disk.fail(Op::Copy, 10);
    let breaker = common::breaker();
    let mut mover = common::mover(breaker.clone(), disk.clone());

    match mover.move_file(DISK, "a/f.txt", "b", 3) {
        Err(ResilientFsError::MoveFailure {
            attempts,
            rolled_back,
            cause: AttemptError::Io(e),
            ..
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(rolled_back, 0);
            assert!(e.to_string().contains("injected"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(mover.ledger().is_empty());
    assert_eq!(disk.inner.files(), vec![p("a/f.txt")]);
    assert_eq!(breaker.stats().unwrap().failure_count, 1);
}

#[test]
fn second_file_failure_rolls_back_first_move() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/one.txt", "1");
    disk.inner.put("a/two.txt", "2");
    disk.fail_on(Op::Copy, "a/two.txt", 10);
    let mut mover = common::mover(common::breaker(), disk.clone());

    assert_eq!(mover.move_file(DISK, "a/one.txt", "b", 2).unwrap(), p("b/one.txt"));
    match mover.move_file(DISK, "a/two.txt", "b", 2) {
        Err(ResilientFsError::MoveFailure { rolled_back, .. }) => assert_eq!(rolled_back, 1),
        other => panic!("unexpected: {other:?}"),
    }

    assert!(mover.ledger().is_empty());
    assert_eq!(disk.inner.files(), vec![p("a/one.txt"), p("a/two.txt")]);
    assert_eq!(disk.inner.read("a/one.txt").unwrap(), b"1");
}

#[test]
fn failed_undo_surfaces_rollback_failure() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/one.txt", "1");
    disk.inner.put("a/two.txt", "2");
    disk.fail_on(Op::Copy, "a/two.txt", 10);
    // Undo copies b/one.txt back to a/one.txt; make that fail for good.
    disk.fail_on(Op::Copy, "b/one.txt", 10);
    let breaker = common::breaker();
    let mut mover = common::mover(breaker.clone(), disk.clone());

    mover.move_file(DISK, "a/one.txt", "b", 2).unwrap();
    match mover.move_file(DISK, "a/two.txt", "b", 2) {
        Err(ResilientFsError::RollbackFailure {
            unresolved,
            restored,
            ..
        }) => {
            assert_eq!(restored, 0);
            assert_eq!(unresolved.len(), 1);
            assert_eq!(unresolved[0].destination, p("b/one.txt"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    // The unresolved entry stays for a later retry; the file was not lost.
    assert_eq!(mover.ledger().len(), 1);
    assert_eq!(disk.inner.read("b/one.txt").unwrap(), b"1");
    // One failure for the exhausted move, one for the failed rollback.
    assert_eq!(breaker.stats().unwrap().failure_count, 2);
}

#[test]
fn occupied_name_gets_numeric_suffix() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "new");
    disk.inner.put("b/f.txt", "old");
    let mut mover = common::mover(common::breaker(), disk.clone());

    let dest = mover.move_file(DISK, "a/f.txt", "b", 3).unwrap();
    assert_eq!(dest, p("b/f_1.txt"));
    assert_eq!(disk.inner.read("b/f.txt").unwrap(), b"old");
    assert_eq!(disk.inner.read("b/f_1.txt").unwrap(), b"new");
}

#[test]
fn zero_byte_copy_is_rejected_and_cleaned_up() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "data");
    disk.truncate_copies(10);
    let mut mover = common::mover(common::breaker(), disk.clone());

    match mover.move_file(DISK, "a/f.txt", "b", 2) {
        Err(ResilientFsError::MoveFailure {
            cause: AttemptError::CopyValidation(path),
            ..
        }) => assert_eq!(path, p("b/f.txt")),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(disk.inner.files(), vec![p("a/f.txt")]);
}

#[test]
fn source_delete_refusal_is_retried() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "data");
    disk.refuse(Op::Delete, "a/f.txt", 1);
    let mut mover = common::mover(common::breaker(), disk.clone());

    let dest = mover.move_file(DISK, "a/f.txt", "b", 3).unwrap();
    // Second attempt reuses the name instead of choosing b/f_1.txt.
    assert_eq!(dest, p("b/f.txt"));
    assert_eq!(disk.inner.files(), vec![p("b/f.txt")]);
}

struct Thumbnailer {
    disk: Arc<FlakyDisk>,
}

impl ArtifactGenerator for Thumbnailer {
    fn generate(&self, _disk: &str, destination: &Path) -> GeneratedArtifact {
        let thumb = destination.with_extension("thumb.png");
        self.disk.inner.put(&thumb, "thumb");
        GeneratedArtifact::produced(thumb)
    }
}

struct Broken;

impl ArtifactGenerator for Broken {
    fn generate(&self, _disk: &str, _destination: &Path) -> GeneratedArtifact {
        GeneratedArtifact::failed("decoder crashed")
    }
}

#[test]
fn derived_artifact_is_tracked_and_rolled_back() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/pic.jpg", "jpeg");
    disk.inner.put("a/notes.txt", "text");
    let generator = ExtensionFilter::new(Arc::new(Thumbnailer { disk: disk.clone() }), ["jpg"]);
    let mut mover =
        common::mover(common::breaker(), disk.clone()).with_generator(Arc::new(generator));

    mover.move_file(DISK, "a/pic.jpg", "b", 2).unwrap();
    mover.move_file(DISK, "a/notes.txt", "b", 2).unwrap();

    let kinds: Vec<_> = mover
        .ledger()
        .entries()
        .iter()
        .map(|e| (e.source.clone(), e.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (p("a/pic.jpg"), EntryKind::Moved),
            (p("b/pic.jpg_derived"), EntryKind::Derived),
            (p("a/notes.txt"), EntryKind::Moved),
        ]
    );
    assert!(disk.inner.read("b/pic.thumb.png").is_some());

    assert_eq!(mover.rollback(2).unwrap(), 3);
    assert!(mover.ledger().is_empty());
    assert_eq!(disk.inner.files(), vec![p("a/notes.txt"), p("a/pic.jpg")]);
}

#[test]
fn artifact_failure_does_not_fail_the_move() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/pic.jpg", "jpeg");
    let mut mover =
        common::mover(common::breaker(), disk.clone()).with_generator(Arc::new(Broken));

    assert_eq!(mover.move_file(DISK, "a/pic.jpg", "b", 1).unwrap(), p("b/pic.jpg"));
    assert_eq!(mover.ledger().len(), 1);
}

#[test]
fn open_breaker_refuses_before_any_io() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "data");
    let (breaker, _) = common::breaker_with(BreakerConfig {
        failure_threshold: 1,
        ..BreakerConfig::default()
    });
    breaker.record_failure();
    assert_eq!(breaker.state().unwrap(), CircuitState::Open);
    let mut mover = common::mover(breaker, disk.clone());

    assert!(matches!(
        mover.move_file(DISK, "a/f.txt", "b", 3),
        Err(ResilientFsError::CircuitOpen { .. })
    ));
    assert_eq!(disk.calls(Op::Copy), 0);
}

#[test]
fn exhausted_move_trips_breaker_for_the_next_call() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "data");
    disk.fail(Op::Copy, 1);
    let (breaker, _) = common::breaker_with(BreakerConfig {
        failure_threshold: 1,
        ..BreakerConfig::default()
    });
    let mut mover = common::mover(breaker.clone(), disk.clone());

    let err = mover.move_file(DISK, "a/f.txt", "b", 1).unwrap_err();
    assert!(matches!(err, ResilientFsError::MoveFailure { attempts: 1, .. }));
    assert_eq!(breaker.state().unwrap(), CircuitState::Open);

    // The fault is spent, but the open breaker keeps the disk untouched.
    let err = mover.move_file(DISK, "a/f.txt", "b", 5).unwrap_err();
    assert!(matches!(err, ResilientFsError::CircuitOpen { .. }));
    assert_eq!(disk.calls(Op::Copy), 1);
}

#[test]
fn batch_stops_and_restores_on_failure() {
    let disk = FlakyDisk::new();
    for name in ["a/1.txt", "a/2.txt", "a/3.txt"] {
        disk.inner.put(name, name);
    }
    disk.fail_on(Op::Copy, "a/3.txt", 10);
    let mut mover = common::mover(common::breaker(), disk.clone());

    let err = mover
        .move_all(DISK, &["a/1.txt", "a/2.txt", "a/3.txt"], "b", 2)
        .unwrap_err();
    assert!(matches!(err, ResilientFsError::MoveFailure { rolled_back: 2, .. }));
    assert_eq!(
        disk.inner.files(),
        vec![p("a/1.txt"), p("a/2.txt"), p("a/3.txt")]
    );
}

#[test]
fn commit_accepts_the_batch() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/1.txt", "1");
    let mut mover = common::mover(common::breaker(), disk.clone());

    let moved = mover.move_all(DISK, &["a/1.txt"], "b", 1).unwrap();
    assert_eq!(moved, vec![p("b/1.txt")]);
    assert_eq!(mover.commit().len(), 1);
    assert_eq!(mover.rollback(1).unwrap(), 0);
    assert_eq!(disk.inner.files(), vec![p("b/1.txt")]);
}

#[test]
fn rejects_bad_arguments() {
    let mut mover = common::mover(common::breaker(), FlakyDisk::new());
    assert!(matches!(
        mover.move_file(DISK, "a/f.txt", "b", 0),
        Err(ResilientFsError::Validation(_))
    ));
    assert!(matches!(
        mover.move_file("nope", "a/f.txt", "b", 1),
        Err(ResilientFsError::UnknownDisk(_))
    ));
    assert!(matches!(
        mover.move_file(DISK, "..", "b", 1),
        Err(ResilientFsError::Validation(_))
    ));
}

#[test]
fn undo_of_an_already_removed_destination_is_a_no_op() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "data");
    let mut mover = common::mover(common::breaker(), disk.clone());
    mover.move_file(DISK, "a/f.txt", "b", 1).unwrap();

    disk.inner.delete(Path::new("b/f.txt")).unwrap();
    assert_eq!(mover.rollback(1).unwrap(), 1);
    assert!(disk.inner.files().is_empty());
}

#[test]
fn failed_move_leaves_another_writers_file_alone() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "mine");
    disk.fail(Op::Copy, 10);
    // Another worker lands b/f.txt right after our name check.
    disk.on_call(|op, _, inner| {
        if op == Op::Copy && inner.read("b/f.txt").is_none() {
            inner.put("b/f.txt", "theirs");
        }
    });
    let mut mover = common::mover(common::breaker(), disk.clone());

    let err = mover.move_file(DISK, "a/f.txt", "b", 2).unwrap_err();
    assert!(matches!(err, ResilientFsError::MoveFailure { attempts: 2, .. }));
    assert_eq!(disk.inner.read("b/f.txt").unwrap(), b"theirs");
    assert_eq!(disk.inner.files(), vec![p("a/f.txt"), p("b/f.txt")]);
}

#[test]
fn retry_picks_a_new_name_when_the_reserved_one_was_taken() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/f.txt", "mine");
    disk.fail(Op::Copy, 1);
    disk.on_call(|op, _, inner| {
        if op == Op::Copy && inner.read("b/f.txt").is_none() {
            inner.put("b/f.txt", "theirs");
        }
    });
    let mut mover = common::mover(common::breaker(), disk.clone());

    let dest = mover.move_file(DISK, "a/f.txt", "b", 2).unwrap();
    assert_eq!(dest, p("b/f_1.txt"));
    assert_eq!(disk.inner.read("b/f.txt").unwrap(), b"theirs");
    assert_eq!(disk.inner.read("b/f_1.txt").unwrap(), b"mine");
}

#[test]
fn breaker_opened_by_another_worker_stops_retries_and_rolls_back() {
    let disk = FlakyDisk::new();
    disk.inner.put("a/one.txt", "1");
    disk.inner.put("a/two.txt", "2");
    disk.fail_on(Op::Copy, "a/two.txt", 10);
    let (breaker, other) = common::shared_breakers(BreakerConfig {
        failure_threshold: 1,
        ..BreakerConfig::default()
    });
    disk.on_call(move |op, path, _| {
        if op == Op::Copy && path == Path::new("a/two.txt") {
            other.record_failure();
        }
    });
    let mut mover = FileMover::new(breaker.clone(), common::registry(disk.clone()))
        .with_backoff(Backoff::fixed(Duration::from_secs(30)));

    mover.move_file(DISK, "a/one.txt", "b", 5).unwrap();
    let started = Instant::now();
    match mover.move_file(DISK, "a/two.txt", "b", 5) {
        Err(ResilientFsError::MoveFailure {
            attempts,
            rolled_back,
            ..
        }) => {
            assert_eq!(attempts, 1);
            assert_eq!(rolled_back, 1);
        }
        other => panic!("unexpected: {other:?}"),
    }
    // A backoff sleep would have taken 30s.
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(mover.ledger().is_empty());
    assert_eq!(disk.inner.files(), vec![p("a/one.txt"), p("a/two.txt")]);
    assert_eq!(breaker.state().unwrap(), CircuitState::Open);
}
