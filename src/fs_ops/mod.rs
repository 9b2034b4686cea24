//! Physical filesystem operations: conflict-free naming, enumeration and coordinated moves.
//! Nothing outside this module renames or copies user data.

mod atomic;
mod conflict;
mod coordinator;
mod copy;
mod helpers;
mod lock;
mod util;
mod walk;

pub use conflict::{SuffixStyle, resolve_conflict};
pub use coordinator::{FileCoordinator, PathClaim};
pub use helpers::io_error_with_help;
pub use lock::{DirLock, acquire_dir_lock, try_acquire_dir_lock};
pub use util::{LOCK_FILE_NAME, normalize_entry, path_is_occupied};
pub(crate) use util::unique_temp_path;
pub use walk::{descendant_files, rebase};
