use backsync_core::{
    BackupMode, BackupTask, CopyOutcome, ExcessiveErrors, ExclusionFilter, RunState, Settings,
};
use eyre::Result;
use filetime::FileTime;
use std::fs;

mod common;
use common::{fast_limits, mtime, write_file, Scratch, ScriptedDecider};
#[cfg(unix)]
use common::{running_as_root, set_mode};

fn copy_settings(scratch: &Scratch) -> Settings {
    Settings::new(
        BackupMode::Copy,
        scratch.target.clone(),
        vec![scratch.source.clone()],
    )
    .with_limits(fast_limits())
}

#[test]
fn copies_tree_into_empty_target() -> Result<()> {
    let scratch = Scratch::new();
    write_file(&scratch.source.join("a.txt"), b"a", 100);
    write_file(&scratch.source.join("sub").join("b.txt"), b"b", 200);

    let mut task = BackupTask::new();
    let copied = task.run(&copy_settings(&scratch))?;

    assert_eq!(copied, 2);
    assert_eq!(task.error_count(), 0);
    assert!(task.completed_without_error());
    assert_eq!(task.state(), RunState::Idle);

    let mirror = scratch.mirrored(&scratch.source);
    assert_eq!(fs::read(mirror.join("a.txt"))?, b"a");
    assert_eq!(fs::read(mirror.join("sub").join("b.txt"))?, b"b");
    assert_eq!(
        mtime(&mirror.join("sub").join("b.txt")),
        FileTime::from_unix_time(200, 0)
    );
    Ok(())
}

#[test]
fn second_run_copies_nothing() -> Result<()> {
    let scratch = Scratch::new();
    write_file(&scratch.source.join("a.txt"), b"a", 100);
    write_file(&scratch.source.join("sub").join("b.txt"), b"b", 200);
    let settings = copy_settings(&scratch);

    let mut task = BackupTask::new();
    assert_eq!(task.run(&settings)?, 2);
    assert_eq!(task.run(&settings)?, 0);
    assert!(task.completed_without_error());
    Ok(())
}

#[test]
fn copy_mode_never_deletes() -> Result<()> {
    let scratch = Scratch::new();
    write_file(&scratch.source.join("a.txt"), b"a", 100);
    let stale = scratch.mirrored(&scratch.source).join("stale.txt");
    write_file(&stale, b"old", 50);

    let mut task = BackupTask::new();
    task.run(&copy_settings(&scratch))?;

    assert!(stale.exists());
    assert_eq!(task.summary().deleted_files, 0);
    Ok(())
}

#[test]
fn exclusions_are_honoured() -> Result<()> {
    let scratch = Scratch::new();
    write_file(&scratch.source.join("keep.txt"), b"k", 100);
    write_file(&scratch.source.join("scratch.TMP"), b"t", 100);
    write_file(&scratch.source.join("Thumbs.db"), b"t", 100);
    write_file(&scratch.source.join("cache").join("blob.bin"), b"c", 100);
    write_file(&scratch.source.join("docs").join("cache").join("x.txt"), b"x", 100);

    let filter = ExclusionFilter::new(
        vec!["Cache".into()],
        vec!["tmp".into()],
        vec!["thumbs.db".into()],
    );
    let settings = copy_settings(&scratch).with_filter(filter);

    let mut task = BackupTask::new();
    assert_eq!(task.run(&settings)?, 1);

    let mirror = scratch.mirrored(&scratch.source);
    assert!(mirror.join("keep.txt").exists());
    assert!(!mirror.join("scratch.TMP").exists());
    assert!(!mirror.join("Thumbs.db").exists());
    assert!(!mirror.join("cache").exists());
    assert!(!mirror.join("docs").join("cache").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn hidden_directory_hides_its_subtree() -> Result<()> {
    let scratch = Scratch::new();
    write_file(&scratch.source.join(".git").join("config"), b"c", 100);
    write_file(&scratch.source.join(".git").join("objects").join("o"), b"o", 100);
    write_file(&scratch.source.join("visible.txt"), b"v", 100);

    let mut task = BackupTask::new();
    assert_eq!(task.run(&copy_settings(&scratch).with_ignore_hidden(true))?, 1);
    assert!(!scratch.mirrored(&scratch.source).join(".git").exists());

    let mut task = BackupTask::new();
    assert_eq!(
        task.run(&copy_settings(&scratch).with_ignore_hidden(false))?,
        2
    );
    assert!(scratch
        .mirrored(&scratch.source)
        .join(".git")
        .join("objects")
        .join("o")
        .exists());
    Ok(())
}

#[test]
fn multiple_roots_are_mirrored_under_their_own_paths() -> Result<()> {
    let scratch = Scratch::new();
    let photos = scratch.extra_root("photos");
    write_file(&scratch.source.join("a.txt"), b"a", 100);
    write_file(&photos.join("p.jpg"), b"p", 100);

    let settings = Settings::new(
        BackupMode::Copy,
        scratch.target.clone(),
        vec![scratch.source.clone(), photos.clone()],
    )
    .with_limits(fast_limits());

    let mut task = BackupTask::new();
    assert_eq!(task.run(&settings)?, 2);
    assert!(scratch.mirrored(&scratch.source).join("a.txt").exists());
    assert!(scratch.mirrored(&photos).join("p.jpg").exists());
    Ok(())
}

#[test]
fn four_permanent_errors_in_one_directory_abort() {
    let scratch = Scratch::new();
    for name in ["1", "2", "3", "4"] {
        write_file(&scratch.source.join(name), b"x", 100);
    }
    let decider = ScriptedDecider::new()
        .script("1", &[CopyOutcome::PathTooLong])
        .script("2", &[CopyOutcome::PathTooLong])
        .script("3", &[CopyOutcome::FatalError])
        .script("4", &[CopyOutcome::PathTooLong]);

    let mut task = BackupTask::new();
    let err = task
        .run_with(&copy_settings(&scratch), &decider)
        .expect_err("run should abort");

    let abort = err
        .downcast_ref::<ExcessiveErrors>()
        .expect("excessive errors");
    assert_eq!(abort.errors, 4);
    assert_eq!(abort.directory, scratch.source);
    assert!(task.summary().aborted());
    assert!(!task.completed_without_error());
    assert_eq!(task.state(), RunState::Idle);
}

#[test]
fn aborted_run_still_counts_files_already_copied() {
    let scratch = Scratch::new();
    write_file(&scratch.source.join("a.txt"), b"a", 100);
    let mut decider = ScriptedDecider::new();
    for name in ["1", "2", "3", "4"] {
        write_file(&scratch.source.join("sub").join(name), b"x", 100);
        decider = decider.script(name, &[CopyOutcome::PathTooLong]);
    }

    let mut task = BackupTask::new();
    let err = task
        .run_with(&copy_settings(&scratch), &decider)
        .expect_err("run should abort");

    assert!(err.downcast_ref::<ExcessiveErrors>().is_some());
    assert_eq!(decider.calls_for("a.txt"), 1);
    assert!(task.summary().aborted());
    assert_eq!(task.summary().files_copied, 1);
    assert_eq!(task.error_count(), 4);
}

#[test]
fn three_permanent_errors_do_not_abort() -> Result<()> {
    let scratch = Scratch::new();
    for name in ["1", "2", "3", "ok"] {
        write_file(&scratch.source.join(name), b"x", 100);
    }
    let decider = ScriptedDecider::new()
        .script("1", &[CopyOutcome::PathTooLong])
        .script("2", &[CopyOutcome::PathTooLong])
        .script("3", &[CopyOutcome::FatalError]);

    let mut task = BackupTask::new();
    assert_eq!(task.run_with(&copy_settings(&scratch), &decider)?, 1);
    assert_eq!(task.error_count(), 3);

    let groups = task.errors_by_outcome();
    assert_eq!(groups[&CopyOutcome::PathTooLong].len(), 2);
    assert_eq!(groups[&CopyOutcome::FatalError].len(), 1);
    Ok(())
}

#[test]
fn error_threshold_resets_per_directory() -> Result<()> {
    let scratch = Scratch::new();
    let mut decider = ScriptedDecider::new();
    for dir in ["one", "two"] {
        for name in ["a", "b", "c"] {
            let file = format!("{dir}-{name}");
            write_file(&scratch.source.join(dir).join(&file), b"x", 100);
            decider = decider.script(&file, &[CopyOutcome::PathTooLong]);
        }
    }

    let mut task = BackupTask::new();
    assert_eq!(task.run_with(&copy_settings(&scratch), &decider)?, 0);
    assert_eq!(task.error_count(), 6);
    Ok(())
}

#[test]
fn transient_errors_do_not_count_towards_abort() -> Result<()> {
    let scratch = Scratch::new();
    let mut decider = ScriptedDecider::new();
    for name in ["1", "2", "3", "4", "5"] {
        write_file(&scratch.source.join(name), b"x", 100);
        decider = decider.script(name, &[CopyOutcome::TransientIOError]);
    }

    let mut task = BackupTask::new();
    assert_eq!(task.run_with(&copy_settings(&scratch), &decider)?, 0);
    assert_eq!(task.error_count(), 5);
    assert!(task
        .errors()
        .iter()
        .all(|e| e.outcome == CopyOutcome::TransientIOError));
    Ok(())
}

#[test]
fn invalid_settings_report_zero_without_running() -> Result<()> {
    let scratch = Scratch::new();
    let settings = Settings::new(
        BackupMode::Copy,
        scratch.target.clone(),
        vec![scratch.source.join("missing")],
    );

    let mut task = BackupTask::new();
    assert_eq!(task.run(&settings)?, 0);
    assert_eq!(task.error_count(), 0);
    assert!(!task.summary().settings_valid());
    assert!(!task.completed_without_error());
    assert!(!scratch.target.exists());
    Ok(())
}

#[test]
fn run_emits_progress_events() -> Result<()> {
    let scratch = Scratch::new();
    write_file(&scratch.source.join("a.txt"), b"a", 100);

    let mut task = BackupTask::new();
    let rx = task.subscribe();
    task.run(&copy_settings(&scratch))?;

    let events: Vec<_> = rx.try_iter().collect();
    let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages.first(), Some(&"Running backup"));
    assert!(messages.contains(&"Target DIR"));
    assert!(messages.contains(&"Source DIR"));
    assert!(messages.contains(&"Backing up DIR"));
    assert!(messages.contains(&"Backing up file"));

    let last = events.last().expect("events");
    assert_eq!(last.message, "COMPLETE");
    assert_eq!(last.detail, "Backed up 1 files");
    Ok(())
}

#[cfg(unix)]
#[test]
fn unreadable_directory_is_reported_and_siblings_are_copied() -> Result<()> {
    if running_as_root() {
        return Ok(());
    }
    let scratch = Scratch::new();
    write_file(&scratch.source.join("a.txt"), b"a", 100);
    write_file(&scratch.source.join("locked").join("secret.txt"), b"s", 100);
    write_file(&scratch.source.join("open").join("b.txt"), b"b", 100);
    let locked = scratch.source.join("locked");
    set_mode(&locked, 0o000);

    let mut task = BackupTask::new();
    let rx = task.subscribe();
    let copied = task.run(&copy_settings(&scratch));
    set_mode(&locked, 0o755);

    assert_eq!(copied?, 2);
    let mirror = scratch.mirrored(&scratch.source);
    assert!(mirror.join("a.txt").exists());
    assert!(mirror.join("open").join("b.txt").exists());
    assert!(!mirror.join("locked").exists());

    let summary = task.summary();
    assert_eq!(summary.directory_errors.len(), 1);
    assert_eq!(summary.directory_errors[0].path, locked);
    assert_eq!(task.error_count(), 0);
    assert!(!task.completed_without_error());
    assert!(rx.try_iter().any(|e| e.message == "ACCESS ERROR"));
    Ok(())
}
