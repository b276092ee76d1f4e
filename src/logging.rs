// src/logging.rs
//
// Timestamped stderr logging, optionally mirrored into a log file.

use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Name of the symlink that always points at the newest log file
pub const LATEST_LOG: &str = "labtap.log";

/// Global log file handle. When `Some`, `tlog!` writes to both stderr and this file.
pub static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);

fn stamp() -> impl fmt::Display {
    chrono::Local::now().format("%H:%M:%S%.3f")
}

/// Write one timestamped line to stderr and, when enabled, the log file.
/// Use through `tlog!`.
pub fn emit(args: fmt::Arguments<'_>) {
    let line = format!("{} {}", stamp(), args);
    eprintln!("{}", line);
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(f) = guard.as_mut() {
            let _ = writeln!(f, "{}", line);
        }
    }
}

/// Start mirroring the log into a new timestamped file under `log_dir`.
pub fn init_file_logging(log_dir: &Path) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(log_dir)?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-labtap.log")
        .to_string();
    let log_path = log_dir.join(&filename);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Windows symlinks need elevated privileges
    #[cfg(unix)]
    {
        let latest = log_dir.join(LATEST_LOG);
        let _ = std::fs::remove_file(&latest);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &latest) {
            emit(format_args!("[logging] Failed to point {} at the new log: {}", LATEST_LOG, e));
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }
    emit(format_args!("[logging] File logging started: {}", log_path.display()));

    Ok(log_path)
}

/// Stop mirroring and close the log file.
pub fn stop_file_logging() {
    let closed = LOG_FILE
        .lock()
        .map(|mut guard| guard.take().is_some())
        .unwrap_or(false);
    if closed {
        emit(format_args!("[logging] File logging stopped"));
    }
}

/// Timestamped logging macro.
/// Prepends `HH:MM:SS.mmm` local time to every message written to stderr.
/// Also writes to the log file when file logging is enabled.
#[macro_export]
macro_rules! tlog {
    ($($arg:tt)*) => {
        $crate::logging::emit(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_mirrors_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_file_logging(dir.path()).unwrap();

        crate::tlog!("[test] hello {}", 42);
        stop_file_logging();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[test] hello 42"));

        #[cfg(unix)]
        assert!(dir.path().join(LATEST_LOG).exists());
    }
}
