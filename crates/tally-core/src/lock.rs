use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Default wait before giving up on a contended workspace lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Advisory lock errors for the workspace lock file.
#[derive(Debug)]
pub enum LockError {
    Timeout { path: PathBuf, waited: Duration },
    IoError(io::Error),
}

impl From<io::Error> for LockError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::IoError(_) => ErrorCode::StorageUnavailable,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { path, waited } => write!(
                f,
                "{}: lock timed out after {:?} at {}",
                self.code().code(),
                waited,
                path.display()
            ),
            Self::IoError(err) => write!(f, "{}: {}", self.code().code(), err),
        }
    }
}

impl std::error::Error for LockError {}

#[derive(Clone, Copy)]
enum LockKind {
    Shared,
    Exclusive,
}

#[derive(Debug)]
struct FileGuard {
    file: File,
    path: PathBuf,
}

impl FileGuard {
    fn acquire(path: &Path, timeout: Duration, kind: LockKind) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            let acquired = match kind {
                LockKind::Shared => file.try_lock_shared().is_ok(),
                LockKind::Exclusive => file.try_lock_exclusive().is_ok(),
            };
            if acquired {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Exclusive lock held for the whole read-modify-write of a mutating
/// command, so two processes never interleave `get` and `put` on the same
/// workspace.
#[derive(Debug)]
pub struct WorkspaceLock {
    guard: FileGuard,
}

impl WorkspaceLock {
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if another writer or reader holds the
    /// lock for longer than `timeout`.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Ok(Self {
            guard: FileGuard::acquire(path, timeout, LockKind::Exclusive)?,
        })
    }

    /// Release early. Dropping the guard also releases.
    pub fn release(self) {
        drop(self);
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.guard.path
    }
}

/// Shared lock for read-only commands; compatible with other readers.
#[derive(Debug)]
pub struct ReadLock {
    guard: FileGuard,
}

impl ReadLock {
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] while a writer holds the lock.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Ok(Self {
            guard: FileGuard::acquire(path, timeout, LockKind::Shared)?,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.guard.path
    }
}

#[cfg(test)]
mod tests {
    use super::{LockError, ReadLock, WorkspaceLock};
    use crate::error::ErrorCode;
    use std::{
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    fn lock_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        dir.path().join(".tally").join(name)
    }

    #[test]
    fn acquire_and_release() -> Result<(), LockError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = lock_path(&dir, "write.lock");
        let lock = WorkspaceLock::acquire(&path, Duration::from_millis(50))?;
        assert_eq!(lock.path(), path.as_path());
        lock.release();
        let _again = WorkspaceLock::acquire(&path, Duration::from_millis(50))?;
        Ok(())
    }

    #[test]
    fn writer_times_out_while_held() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = lock_path(&dir, "write.lock");
        let _guard = WorkspaceLock::acquire(&path, Duration::from_millis(50)).unwrap();
        let err = WorkspaceLock::acquire(&path, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(&err, LockError::Timeout { path: p, .. } if *p == path));
        assert_eq!(err.code(), ErrorCode::LockContention);
        assert!(err.hint().is_some());
    }

    #[test]
    fn readers_share() -> Result<(), LockError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = lock_path(&dir, "write.lock");
        let _first = ReadLock::acquire(&path, Duration::from_millis(50))?;
        let _second = ReadLock::acquire(&path, Duration::from_millis(50))?;
        assert!(matches!(
            WorkspaceLock::acquire(&path, Duration::from_millis(20)),
            Err(LockError::Timeout { .. })
        ));
        Ok(())
    }

    #[test]
    fn contention_resolves_after_writer_releases() -> Result<(), LockError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = lock_path(&dir, "write.lock");

        let held = Arc::new(Barrier::new(2));
        let done = Arc::new(Barrier::new(2));
        let (held_t, done_t, path_t) = (Arc::clone(&held), Arc::clone(&done), path.clone());
        let handle = thread::spawn(move || {
            let _writer = WorkspaceLock::acquire(&path_t, Duration::from_millis(200)).unwrap();
            held_t.wait();
            done_t.wait();
        });

        held.wait();
        assert!(matches!(
            ReadLock::acquire(&path, Duration::from_millis(20)),
            Err(LockError::Timeout { .. })
        ));
        done.wait();
        handle.join().unwrap();

        let _follow_up = WorkspaceLock::acquire(&path, Duration::from_millis(50))?;
        Ok(())
    }
}
