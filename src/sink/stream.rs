use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

enum LogTarget {
    Stderr,
    File(File),
    Writer(Box<dyn Write + Send>),
}

impl LogTarget {
    fn open(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return LogTarget::Stderr;
        };
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => LogTarget::File(file),
            Err(e) => {
                log::warn!(
                    "Cannot open provenance log {}: {e}; using stderr",
                    path.display()
                );
                LogTarget::Stderr
            }
        }
    }

    fn write_record(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            LogTarget::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(bytes)?;
                err.flush()
            }
            LogTarget::File(file) => {
                file.write_all(bytes)?;
                file.flush()
            }
            LogTarget::Writer(writer) => {
                writer.write_all(bytes)?;
                writer.flush()
            }
        }
    }
}

/// Destination of the JSON records, opened on first use and kept for the
/// lifetime of the runtime.
pub struct LogStream {
    path: Option<PathBuf>,
    target: Mutex<Option<LogTarget>>,
}

impl LogStream {
    /// `None` writes to standard error.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            target: Mutex::new(None),
        }
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            path: None,
            target: Mutex::new(Some(LogTarget::Writer(writer))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write one whole record and flush. Records from concurrent callers never
    /// interleave.
    pub fn write_record(&self, bytes: &[u8]) -> bool {
        let mut guard = match self.target.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let target = guard.get_or_insert_with(|| LogTarget::open(self.path.as_deref()));
        match target.write_record(bytes) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("provenance record write failed: {e}");
                false
            }
        }
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream").field("path", &self.path).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::SharedBuffer;
    use super::*;

    #[test]
    fn test_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prov.log");
        std::fs::write(&path, "existing\n").unwrap();

        let stream = LogStream::new(Some(path.clone()));
        assert!(stream.write_record(b"one\n"));
        assert!(stream.write_record(b"two\n"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\none\ntwo\n");
    }

    #[test]
    fn test_unopenable_path_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("prov.log");
        let stream = LogStream::new(Some(path.clone()));
        assert!(stream.write_record(b""));
        assert!(!path.exists());
    }

    #[test]
    fn test_writer_target() {
        let buffer = SharedBuffer::default();
        let stream = LogStream::with_writer(Box::new(buffer.clone()));
        assert!(stream.write_record(b"{}\n"));
        assert_eq!(buffer.contents(), "{}\n");
    }
}
