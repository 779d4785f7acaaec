//! Single-instance enforcement (§4.9): "a process-scoped named lock; if
//! already held, print an error and exit 0."
//!
//! Implemented as an exclusively-locked file under the state directory,
//! held for the process lifetime and released on drop.

use std::fs::{File, OpenOptions};
use std::path::Path;

/// Holds the lock file open for as long as this value lives.
pub struct InstanceLock(#[allow(dead_code)] File);

/// Try to acquire the single-instance lock at `path`. `Ok(None)` means
/// another instance already holds it — the caller should exit 0, not error.
pub fn acquire(path: &Path) -> std::io::Result<Option<InstanceLock>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).write(true).truncate(false).open(path)?;
    match file.try_lock() {
        Ok(()) => Ok(Some(InstanceLock(file))),
        Err(std::fs::TryLockError::WouldBlock) => Ok(None),
        Err(std::fs::TryLockError::Error(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_acquirer_gets_the_lock_second_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("ses-local.lock");

        let first = acquire(&lock_path).unwrap();
        assert!(first.is_some());

        let second = acquire(&lock_path).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let lock_path = tmp.path().join("ses-local.lock");

        {
            let first = acquire(&lock_path).unwrap();
            assert!(first.is_some());
        }

        let second = acquire(&lock_path).unwrap();
        assert!(second.is_some());
    }
}
