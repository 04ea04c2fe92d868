//! Log writer module
//!
//! Thread-safe log writing to files or stdout/stderr. Log files can be
//! reopened at runtime (SIGUSR1) so external rotation works.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// Global log writer instance
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

/// Log output target
enum LogTarget {
    Stdout,
    Stderr,
    File(File),
}

/// Thread-safe log writer
pub struct LogWriter {
    access: Mutex<LogTarget>,
    error: Mutex<LogTarget>,
}

impl LogWriter {
    fn new(access_log_file: Option<&str>, error_log_file: Option<&str>) -> io::Result<Self> {
        Ok(Self {
            access: Mutex::new(open_target(access_log_file, LogTarget::Stdout)?),
            error: Mutex::new(open_target(error_log_file, LogTarget::Stderr)?),
        })
    }

    /// Write to access log (also used for info lines)
    pub fn write_access(&self, message: &str) {
        write_to_target(&mut lock(&self.access), message);
    }

    /// Write to error log
    pub fn write_error(&self, message: &str) {
        write_to_target(&mut lock(&self.error), message);
    }

    /// Reopen both targets, e.g. after logrotate moved the files away
    pub fn reopen(&self, access_log_file: Option<&str>, error_log_file: Option<&str>) -> io::Result<()> {
        let access = open_target(access_log_file, LogTarget::Stdout)?;
        let error = open_target(error_log_file, LogTarget::Stderr)?;
        *lock(&self.access) = access;
        *lock(&self.error) = error;
        Ok(())
    }
}

fn lock(target: &Mutex<LogTarget>) -> MutexGuard<'_, LogTarget> {
    target.lock().unwrap_or_else(PoisonError::into_inner)
}

fn open_target(path: Option<&str>, fallback: LogTarget) -> io::Result<LogTarget> {
    match path {
        Some(p) => open_log_file(p).map(LogTarget::File),
        None => Ok(fallback),
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

fn write_to_target(target: &mut LogTarget, message: &str) {
    match target {
        LogTarget::Stdout => println!("{message}"),
        LogTarget::Stderr => eprintln!("{message}"),
        LogTarget::File(file) => {
            // nowhere left to report a failed log write
            let _ = writeln!(file, "{message}");
        }
    }
}

/// Initialize the global log writer
///
/// Returns error if log files cannot be opened or the writer already exists.
pub fn init(access_log_file: Option<&str>, error_log_file: Option<&str>) -> io::Result<()> {
    let writer = LogWriter::new(access_log_file, error_log_file)?;
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// Global log writer, if `init()` has run
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(name: &str) -> String {
        let dir = std::env::temp_dir().join(format!("portal-mux-{}-{name}", std::process::id()));
        dir.join("logs").join("out.log").to_string_lossy().into_owned()
    }

    #[test]
    fn test_file_target_appends() {
        let path = temp_path("append");
        let writer = LogWriter::new(Some(&path), None).unwrap();
        writer.write_access("first");
        writer.write_access("second");
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
        let _ = fs::remove_dir_all(Path::new(&path).parent().unwrap().parent().unwrap());
    }

    #[test]
    fn test_reopen_switches_target() {
        let first = temp_path("reopen-a");
        let second = temp_path("reopen-b");
        let writer = LogWriter::new(Some(&first), None).unwrap();
        writer.write_access("before");
        writer.reopen(Some(&second), None).unwrap();
        writer.write_access("after");
        assert_eq!(fs::read_to_string(&first).unwrap(), "before\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "after\n");
        for p in [first, second] {
            let _ = fs::remove_dir_all(Path::new(&p).parent().unwrap().parent().unwrap());
        }
    }
}
