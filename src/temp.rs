//! Base directory for fetch staging.
//!
//! Bundles are cloned into a scratch directory before the audit gate runs and
//! before anything is promoted into the store. A relative `TMPDIR` (e.g.
//! `TMPDIR=tmp`) would land that staging area inside whatever directory the
//! command happens to run from, so only absolute bases are accepted.

use std::env;
use std::path::PathBuf;

/// Absolute base path under which staging directories may be created.
///
/// Honors the platform temp dir when it resolves to an absolute path and
/// falls back to a well-known absolute location otherwise.
pub fn temp_dir_base() -> PathBuf {
    let base = env::temp_dir();
    if base.is_absolute() {
        return base;
    }

    #[cfg(windows)]
    {
        env::var("TEMP")
            .or_else(|_| env::var("TMP"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Windows\\Temp"))
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/tmp")
    }
}
