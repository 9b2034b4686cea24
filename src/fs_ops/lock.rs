//! Cross-process directory locks.
//! Uses a sidecar lock file so that separate processes moving entries in or out of the
//! same directory are serialized.
//!
//! Design:
//! - We lock by opening/holding `.foldersync.lock` inside the directory.
//! - `fs2` provides flock on Unix and LockFileEx on Windows.
//! - Acquisition polls with a deadline; running out of time is reported as `WouldBlock`
//!   so the coordinator can surface it as access denial.
//!
//! Notes:
//! - The lock is released when the DirLock guard is dropped. The sidecar itself stays:
//!   unlinking it while another process has it open would let that process lock an
//!   orphaned inode while a third one locks a fresh file.
//! - flock locks belong to the open file description, so a process must never try to
//!   lock the same directory twice at once; the coordinator dedupes directories first.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use super::util::LOCK_FILE_NAME;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// RAII guard held while a directory-level lock is active.
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_file_path(dir: &Path) -> PathBuf {
    dir.join(LOCK_FILE_NAME)
}

fn open_lock_file(lock_path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true).write(true).create(true);
    #[cfg(unix)]
    opts.mode(0o600);
    opts.open(lock_path)
}

/// Non-blocking attempt to lock `dir`. Returns Ok(None) if another holder has it.
pub fn try_acquire_dir_lock(dir: &Path) -> io::Result<Option<DirLock>> {
    let lock_path = lock_file_path(dir);
    let file = open_lock_file(&lock_path)?;
    match file.try_lock_exclusive() {
        Ok(()) => {
            trace!(path = %lock_path.display(), "try-lock success");
            Ok(Some(DirLock { file, path: lock_path }))
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            trace!(path = %lock_path.display(), "try-lock would block");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Lock `dir`, waiting up to `timeout`. Times out with `ErrorKind::WouldBlock`.
pub fn acquire_dir_lock(dir: &Path, timeout: Duration) -> io::Result<DirLock> {
    let start = Instant::now();
    let mut attempts: u32 = 0;
    loop {
        if let Some(lock) = try_acquire_dir_lock(dir)? {
            if attempts > 0 {
                trace!(path = %lock.path().display(), attempts, waited_ms = start.elapsed().as_millis() as u64, "lock acquired after wait");
            }
            return Ok(lock);
        }
        attempts += 1;
        if start.elapsed() >= timeout {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("timed out after {:?} waiting for lock on {}", timeout, dir.display()),
            ));
        }
        if attempts % 50 == 0 {
            warn!(path = %dir.display(), attempts, "still waiting for directory lock");
        }
        sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contended_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let _held = acquire_dir_lock(dir.path(), Duration::from_secs(1)).unwrap();
        // A second open file description contends with the first.
        let err = acquire_dir_lock(dir.path(), Duration::from_millis(60)).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn drop_releases_but_keeps_sidecar_inode() {
        let dir = tempfile::tempdir().unwrap();
        let lock = try_acquire_dir_lock(dir.path()).unwrap().unwrap();
        let sidecar = lock.path().to_path_buf();
        #[cfg(unix)]
        let inode = {
            use std::os::unix::fs::MetadataExt;
            std::fs::metadata(&sidecar).unwrap().ino()
        };
        drop(lock);
        assert!(sidecar.exists());
        let again = try_acquire_dir_lock(dir.path()).unwrap().unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            assert_eq!(std::fs::metadata(again.path()).unwrap().ino(), inode);
        }
        drop(again);
    }
}
