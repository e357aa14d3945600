use backsync_core::{InvalidSetting, LogEvent, RunSummary, Settings};
use chrono::Local;
use crossbeam_channel::Receiver;
use indicatif::{ProgressBar, ProgressStyle};
use log::Level;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How engine events are shown while a run is in progress.
#[derive(Copy, Clone, Debug)]
pub enum EventStyle {
    Stream { to_stderr: bool },
    Spinner,
    Silent,
}

/// Background thread draining the event channel of a running task.
///
/// The thread exits once every sender is gone, i.e. after the task is dropped.
pub struct EventPrinter {
    handle: Option<JoinHandle<()>>,
}

impl EventPrinter {
    pub fn spawn(events: Receiver<LogEvent>, style: EventStyle) -> Self {
        let handle = match style {
            EventStyle::Silent => None,
            EventStyle::Stream { to_stderr } => Some(thread::spawn(move || {
                let color = if to_stderr {
                    std::io::stderr().is_terminal()
                } else {
                    std::io::stdout().is_terminal()
                };
                for event in events.iter() {
                    let line = format_event(&event, color);
                    if to_stderr {
                        eprintln!("{line}");
                    } else {
                        println!("{line}");
                    }
                }
            })),
            EventStyle::Spinner => {
                let pb = spinner();
                Some(thread::spawn(move || {
                    for event in events.iter() {
                        pb.set_message(event.to_string());
                    }
                    pb.finish_and_clear();
                }))
            }
        };
        Self { handle }
    }

    pub fn finish(self) {
        if let Some(handle) = self.handle {
            if handle.join().is_err() {
                log::warn!("event printer thread panicked");
            }
        }
    }
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["-", "\\", "|", "/"]);
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn format_event(event: &LogEvent, color: bool) -> String {
    let stamp = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let line = format!("[{stamp}] {event}");
    if !color {
        return line;
    }
    match event.level {
        Level::Error | Level::Warn => line.yellow().to_string(),
        Level::Debug | Level::Trace => line.dimmed().to_string(),
        Level::Info => line,
    }
}

pub fn config_error(path: &Path, err: &eyre::Report) {
    let color = std::io::stderr().is_terminal();
    let label = "Invalid configuration";
    if color {
        eprintln!("{}: {}", label.red().bold(), path.display());
    } else {
        eprintln!("{label}: {}", path.display());
    }
    eprintln!("  {err:#}");
}

pub fn run_error(err: &eyre::Report) {
    if std::io::stderr().is_terminal() {
        eprintln!("{}: {err:#}", "Backup failed".red().bold());
    } else {
        eprintln!("Backup failed: {err:#}");
    }
}

pub fn print_check(path: &Path, settings: &Settings, invalid: &[InvalidSetting]) {
    println!("Configuration: {}", path.display());
    if !invalid.is_empty() {
        println!("Invalid settings:");
        for problem in invalid {
            println!("  • {problem}");
        }
        return;
    }

    println!("Mode: {}", settings.mode);
    println!("Target: {}", settings.target_root.display());
    for source in &settings.source_roots {
        println!("Source: {}", source.display());
    }
    println!(
        "Hidden files: {}",
        if settings.ignore_hidden {
            "ignored"
        } else {
            "included"
        }
    );
    println!("Configuration is valid.");
}

pub fn print_summary(summary: &RunSummary) {
    let color = std::io::stdout().is_terminal();

    if !summary.settings_valid() {
        println!("Backup not started, invalid settings:");
        for problem in &summary.invalid_settings {
            println!("  • {problem}");
        }
        return;
    }

    let headline = format!(
        "Backup ({}) {}: {} files in {:.2?}",
        summary.mode,
        if summary.aborted() {
            "aborted"
        } else {
            "complete"
        },
        summary.files_copied,
        Duration::from_millis(summary.duration_ms)
    );
    if !color {
        println!("{headline}");
    } else if summary.completed_without_error() {
        println!("{}", headline.green());
    } else {
        println!("{}", headline.yellow());
    }

    if summary.files_retried > 0 {
        println!("• Copied on retry: {} file(s)", summary.files_retried);
    }
    if summary.deleted_files > 0 || summary.deleted_dirs > 0 {
        println!(
            "• Deleted: {} file(s), {} dir(s)",
            summary.deleted_files, summary.deleted_dirs
        );
    }

    for (outcome, records) in summary.grouped_errors() {
        println!("• Unable to backup ({outcome}): {}", records.len());
        for record in records {
            println!("    {}", record.source_file.display());
        }
    }

    if !summary.directory_errors.is_empty() {
        println!(
            "• Unreadable directories: {}",
            summary.directory_errors.len()
        );
        for dir in &summary.directory_errors {
            println!("    {}: {}", dir.path.display(), dir.message);
        }
    }

    if let Some(reason) = &summary.abort_reason {
        if color {
            println!("{} {reason}", "• Aborted:".red());
        } else {
            println!("• Aborted: {reason}");
        }
    }
}
