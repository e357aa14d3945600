use backsync_core::config::{default_config_path, ConfigDocument};
use backsync_core::{BackupTask, ExcessiveErrors, RunSummary, Settings};
use eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cli::{CheckArgs, RunArgs};
use crate::render::{self, EventPrinter, EventStyle};

/// Process outcome, mapped onto the exit code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Clean = 0,
    Incomplete = 1,
    InvalidConfig = 2,
    Aborted = 3,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        ExitCode::from(status as u8)
    }
}

impl Status {
    fn of(summary: &RunSummary) -> Self {
        if !summary.settings_valid() {
            Status::InvalidConfig
        } else if summary.aborted() {
            Status::Aborted
        } else if summary.completed_without_error() {
            Status::Clean
        } else {
            Status::Incomplete
        }
    }
}

pub fn run_backup(args: &RunArgs) -> Result<Status> {
    let path = resolve_config_path(args.config.as_deref())?;
    let mut settings = match load_settings(&path) {
        Ok(settings) => settings,
        Err(err) => {
            render::config_error(&path, &err);
            return Ok(Status::InvalidConfig);
        }
    };
    if let Some(mode) = args.mode {
        settings = settings.with_mode(mode.into());
    }

    let style = if args.quiet {
        EventStyle::Silent
    } else if args.progress {
        EventStyle::Spinner
    } else {
        EventStyle::Stream {
            to_stderr: args.json,
        }
    };

    let mut task = BackupTask::new();
    let printer = EventPrinter::spawn(task.subscribe(), style);
    let result = task.run(&settings);
    let summary = task.summary().clone();
    // Closes the event channel so the printer drains and exits
    drop(task);
    printer.finish();

    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        render::print_summary(&summary);
    }

    match result {
        Ok(_) => Ok(Status::of(&summary)),
        Err(report) => {
            // Excessive errors are already explained by the summary
            if report.downcast_ref::<ExcessiveErrors>().is_none() {
                render::run_error(&report);
            }
            Ok(Status::Aborted)
        }
    }
}

pub fn run_check(args: &CheckArgs) -> Result<Status> {
    let path = resolve_config_path(args.config.as_deref())?;
    let settings = match load_settings(&path) {
        Ok(settings) => settings,
        Err(err) => {
            render::config_error(&path, &err);
            return Ok(Status::InvalidConfig);
        }
    };

    let invalid = settings.invalid_settings();
    render::print_check(&path, &settings, &invalid);
    if invalid.is_empty() {
        Ok(Status::Clean)
    } else {
        Ok(Status::InvalidConfig)
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path().wrap_err("cannot locate default configuration file"),
    }
}

fn load_settings(path: &Path) -> Result<Settings> {
    let document = ConfigDocument::load(path)?;
    Ok(Settings::from_document(&document))
}
