//! Coordinated moves.
//!
//! The coordinator is the only component that moves bytes on disk. Each move claims the
//! source and destination paths for its whole duration:
//! - In-process: a claim blocks while any overlapping path (ancestor, descendant or equal)
//!   is claimed by another operation, so moves of disjoint subtrees run in parallel and a
//!   concurrent claimant of `from` never observes a half-moved directory.
//! - Cross-process: sidecar locks on the parent directories of both paths (unless locks
//!   are disabled), taken in sorted order so two movers cannot deadlock.
//!
//! Paths are compared after resolving their parent directories, so two spellings of the
//! same entry (`t/../t/doc`, `./doc`) claim and lock the same thing.
//!
//! Failing to obtain either within the configured timeout is an access denial; everything
//! the OS rejects afterwards is a move failure.

use parking_lot::{Condvar, Mutex};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::atomic::try_atomic_move;
use super::copy::move_by_copy;
use super::lock::{DirLock, acquire_dir_lock};
use super::util::{is_cross_device, normalize_entry, path_is_occupied};
use crate::errors::{SyncError, SyncResult};

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Serializes filesystem moves that touch overlapping paths.
pub struct FileCoordinator {
    claims: Mutex<Vec<PathBuf>>,
    released: Condvar,
    timeout: Duration,
    dir_locks: bool,
}

/// Paths held by one coordinated operation; released on drop.
pub struct PathClaim<'a> {
    owner: &'a FileCoordinator,
    paths: Vec<PathBuf>,
}

impl Drop for PathClaim<'_> {
    fn drop(&mut self) {
        let mut claims = self.owner.claims.lock();
        for p in &self.paths {
            if let Some(pos) = claims.iter().position(|c| c == p) {
                claims.swap_remove(pos);
            }
        }
        drop(claims);
        self.owner.released.notify_all();
    }
}

impl PathClaim<'_> {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl FileCoordinator {
    pub fn new(timeout: Duration, dir_locks: bool) -> Self {
        Self {
            claims: Mutex::new(Vec::new()),
            released: Condvar::new(),
            timeout,
            dir_locks,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Claim `paths` in-process, waiting while any overlapping path is held elsewhere.
    /// A path whose parent cannot be resolved is claimed as spelled.
    pub fn claim(&self, paths: &[&Path]) -> SyncResult<PathClaim<'_>> {
        let wanted: Vec<PathBuf> = paths
            .iter()
            .map(|p| normalize_entry(p).unwrap_or_else(|_| p.to_path_buf()))
            .collect();
        let deadline = Instant::now() + self.timeout;
        let mut claims = self.claims.lock();
        loop {
            let blocker = claims
                .iter()
                .find(|held| wanted.iter().any(|w| overlaps(w, held)))
                .cloned();
            match blocker {
                None => break,
                Some(held) => {
                    if self.released.wait_until(&mut claims, deadline).timed_out() {
                        let still_blocked = claims.iter().any(|h| wanted.iter().any(|w| overlaps(w, h)));
                        if still_blocked {
                            return Err(SyncError::access_denied(
                                held,
                                format!("coordination not obtained within {:?}", self.timeout),
                            ));
                        }
                        break;
                    }
                }
            }
        }
        claims.extend(wanted.iter().cloned());
        Ok(PathClaim { owner: self, paths: wanted })
    }

    fn lock_parents(&self, from: &Path, to: &Path) -> SyncResult<Vec<DirLock>> {
        if !self.dir_locks {
            return Ok(Vec::new());
        }
        let mut dirs: Vec<PathBuf> = [from.parent(), to.parent()]
            .into_iter()
            .flatten()
            .map(|d| dunce::canonicalize(d).unwrap_or_else(|_| d.to_path_buf()))
            .collect();
        dirs.sort();
        dirs.dedup();

        let mut locks = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match acquire_dir_lock(&dir, self.timeout) {
                Ok(lock) => locks.push(lock),
                Err(e) => {
                    let reason = if e.kind() == io::ErrorKind::WouldBlock {
                        format!("another process holds the directory lock: {e}")
                    } else {
                        format!("cannot open directory lock: {e}")
                    };
                    return Err(SyncError::access_denied(&dir, reason));
                }
            }
        }
        Ok(locks)
    }

    /// Move `from` to `to` (file or directory) under coordination. Blocking.
    ///
    /// `to` must not exist; a destination that appeared concurrently fails the move
    /// rather than being replaced.
    pub fn coordinated_move(&self, from: &Path, to: &Path) -> SyncResult<()> {
        let move_failed = |source: io::Error| SyncError::MoveFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };
        let from = &normalize_entry(from).map_err(move_failed)?;
        let to = &normalize_entry(to).map_err(move_failed)?;

        let _claim = self.claim(&[from, to])?;
        let _locks = self.lock_parents(from, to)?;

        if !path_is_occupied(from) {
            return Err(move_failed(io::Error::new(io::ErrorKind::NotFound, "source does not exist")));
        }
        if path_is_occupied(to) {
            return Err(move_failed(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "destination appeared concurrently",
            )));
        }

        match try_atomic_move(from, to) {
            Ok(()) => {
                info!(src = %from.display(), dest = %to.display(), "coordinated rename");
                Ok(())
            }
            Err(e) if is_cross_device(&e) => {
                debug!(src = %from.display(), dest = %to.display(), "rename crosses devices; copying");
                move_by_copy(from, to).map_err(move_failed)
            }
            Err(e) => {
                warn!(src = %from.display(), dest = %to.display(), error = %e, "coordinated rename rejected");
                Err(move_failed(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn overlap_is_ancestry_not_string_prefix() {
        assert!(overlaps(Path::new("/r/A"), Path::new("/r/A/doc")));
        assert!(overlaps(Path::new("/r"), Path::new("/r/A")));
        assert!(!overlaps(Path::new("/r/A"), Path::new("/r/AB")));
    }

    #[test]
    fn disjoint_claims_do_not_block() {
        let c = FileCoordinator::new(Duration::from_millis(50), false);
        let _a = c.claim(&[Path::new("/r/A")]).unwrap();
        let b = c.claim(&[Path::new("/r/B")]);
        assert!(b.is_ok());
    }

    #[test]
    fn overlapping_claim_waits_for_release() {
        let c = Arc::new(FileCoordinator::new(Duration::from_secs(2), false));
        let held = c.claim(&[Path::new("/r/A")]).unwrap();
        let c2 = Arc::clone(&c);
        let waiter = thread::spawn(move || c2.claim(&[Path::new("/r/A/sub")]).map(|_| ()));
        thread::sleep(Duration::from_millis(50));
        drop(held);
        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn overlapping_claim_times_out_as_access_denied() {
        let c = FileCoordinator::new(Duration::from_millis(40), false);
        let _held = c.claim(&[Path::new("/r/A/sub")]).unwrap();
        let err = c.claim(&[Path::new("/r/A")]).err().unwrap();
        assert!(matches!(err, SyncError::AccessDenied { .. }));
    }
}
