//! The closed `MirrorLog` level set (spec §7, §9 REDESIGN FLAGS): the
//! original colored logger has nine levels interleaved with Python's
//! numeric registry, which `tracing`'s five don't have room for. Each
//! `MirrorLog` call prints a colored console line and also feeds the
//! nearest `tracing` level into the rotating daily log file.

use camino::Utf8Path;
use owo_colors::OwoColorize;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorLog {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Success,
    Get,
    Update,
    Remove,
}

impl MirrorLog {
    pub fn emit(self, message: &str) {
        match self {
            MirrorLog::Debug => {
                debug!("{message}");
                eprintln!("{}", message.dimmed());
            }
            MirrorLog::Info => {
                info!("{message}");
                println!("{message}");
            }
            MirrorLog::Warning => {
                warn!("{message}");
                println!("{}", message.yellow());
            }
            MirrorLog::Error => {
                error!("{message}");
                eprintln!("{}", message.red());
            }
            MirrorLog::Critical => {
                error!("{message}");
                eprintln!("{}", message.red().bold());
            }
            MirrorLog::Success => {
                info!("{message}");
                println!("{}", message.green());
            }
            MirrorLog::Get => {
                info!("{message}");
                println!("{}", message.cyan());
            }
            MirrorLog::Update => {
                info!("{message}");
                println!("{}", message.blue());
            }
            MirrorLog::Remove => {
                info!("{message}");
                println!("{}", message.magenta());
            }
        }
    }
}

/// Rotating daily log, seven-day retention (spec §7's "Update runs
/// additionally write a rotating daily log with seven-day retention").
/// The returned guard must be held for the process lifetime or buffered
/// lines are dropped on exit.
pub fn init(log_dir: &Utf8Path) -> WorkerGuard {
    let _ = std::fs::create_dir_all(log_dir.as_std_path());
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("mirror")
        .filename_suffix("log")
        .max_log_files(7)
        .build(log_dir.as_std_path())
        .expect("log directory is writable");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    guard
}
