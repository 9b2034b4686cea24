//! Destination conflict resolution.
//!
//! Policy:
//! - If the desired path is free it is returned unchanged.
//! - Otherwise a numeric disambiguator is appended, starting at 1, and the first free
//!   candidate wins. Folders use `name_N`; files use `stem (N).ext`.
//!
//! Notes:
//! - Existence is checked at call time, never cached. Callers still hold coordination
//!   while moving so a candidate that appears concurrently fails the move instead of
//!   being overwritten.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::trace;

use super::util::path_is_occupied;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixStyle {
    /// `A` -> `A_1`, `A_2`, ... appended to the whole name (folder moves).
    Underscore,
    /// `doc.excalidraw` -> `doc (1).excalidraw`, ... inserted before the extension (file moves).
    Parenthesized,
}

impl SuffixStyle {
    fn suffix(self, n: u64) -> String {
        match self {
            SuffixStyle::Underscore => format!("_{n}"),
            SuffixStyle::Parenthesized => format!(" ({n})"),
        }
    }
}

/// Return `desired` if free, else the first free numbered sibling.
pub fn resolve_conflict(desired: &Path, style: SuffixStyle) -> PathBuf {
    if !path_is_occupied(desired) {
        return desired.to_path_buf();
    }
    let Some(name) = desired.file_name() else {
        return desired.to_path_buf();
    };
    let parent = desired.parent().unwrap_or_else(|| Path::new(""));

    let (stem, ext): (OsString, Option<OsString>) = match style {
        SuffixStyle::Underscore => (name.to_os_string(), None),
        SuffixStyle::Parenthesized => {
            let p = Path::new(name);
            (
                p.file_stem().map(OsStr::to_os_string).unwrap_or_else(|| name.to_os_string()),
                p.extension().map(OsStr::to_os_string),
            )
        }
    };

    let mut n: u64 = 1;
    loop {
        let candidate = parent.join(build_name_with_suffix(&stem, ext.as_deref(), &style.suffix(n)));
        if !path_is_occupied(&candidate) {
            if n > 1 {
                trace!(desired = %desired.display(), chosen = %candidate.display(), "conflict resolved after collisions");
            }
            return candidate;
        }
        n += 1;
    }
}

#[cfg(windows)]
const MAX_FILENAME_LEN: usize = 240;
#[cfg(not(windows))]
const MAX_FILENAME_LEN: usize = 255;

#[cfg(unix)]
fn name_len_units(s: &OsStr) -> usize {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().len()
}

#[cfg(not(unix))]
fn name_len_units(s: &OsStr) -> usize {
    s.to_string_lossy().len()
}

/// Join `stem + suffix + [.ext]`, shortening the stem so the name stays within filesystem limits.
fn build_name_with_suffix(stem: &OsStr, ext: Option<&OsStr>, suffix: &str) -> OsString {
    let mut overhead = suffix.len();
    if let Some(e) = ext {
        overhead += 1 + name_len_units(e);
    }

    let mut stem_os = stem.to_os_string();
    if name_len_units(stem) + overhead > MAX_FILENAME_LEN {
        let budget = MAX_FILENAME_LEN.saturating_sub(overhead).max(1);
        let lossy = stem.to_string_lossy();
        let mut acc = String::new();
        for ch in lossy.chars() {
            if acc.len() + ch.len_utf8() > budget {
                break;
            }
            acc.push(ch);
        }
        if acc.is_empty() {
            acc.push('f');
        }
        stem_os = OsString::from(acc);
    }

    let mut out = stem_os;
    out.push(suffix);
    if let Some(e) = ext {
        out.push(".");
        out.push(e);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_names_are_truncated_to_fit() {
        let stem = "x".repeat(300);
        let name = build_name_with_suffix(OsStr::new(&stem), Some(OsStr::new("excalidraw")), " (12)");
        assert!(name_len_units(&name) <= MAX_FILENAME_LEN);
        assert!(name.to_string_lossy().ends_with(" (12).excalidraw"));
    }

    #[test]
    fn underscore_keeps_dots_in_folder_names() {
        let td = tempfile::tempdir().unwrap();
        let desired = td.path().join("v1.2");
        std::fs::create_dir(&desired).unwrap();
        assert_eq!(resolve_conflict(&desired, SuffixStyle::Underscore), td.path().join("v1.2_1"));
    }
}
