//! # Relocator Module
//!
//! Collision-safe move of a file into a destination directory.
//!
//! ## Naming
//! `img.jpg` lands as `img.jpg`, then `img(1).jpg`, `img(2).jpg`, ... when
//! the name is already taken. Probing is sequential and serialized per
//! destination directory; the chosen name is reserved with an exclusive
//! create, so workers in other processes cannot claim it either.
//!
//! ## Moving
//! `rename` first (atomic on one volume). Across volumes the file is
//! copied, the size verified, and only then the source removed.

use crate::error::RelocateError;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Moves files into destination trees without overwriting anything
#[derive(Debug, Default)]
pub struct Relocator {
    dir_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl Relocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `file` into `destination_dir` and return where it ended up
    pub fn relocate(&self, file: &Path, destination_dir: &Path) -> Result<PathBuf, RelocateError> {
        let file_name = file.file_name().ok_or_else(|| RelocateError::InvalidSource {
            path: file.to_path_buf(),
        })?;

        // create_dir_all tolerates concurrent creation of the same tree
        fs::create_dir_all(destination_dir).map_err(|e| RelocateError::CreateDirectory {
            path: destination_dir.to_path_buf(),
            source: e,
        })?;

        let target = {
            let lock = self.lock_for(destination_dir);
            let _guard = lock_ignoring_poison(&lock);
            reserve_name(destination_dir, file_name).map_err(|e| RelocateError::Move {
                from: file.to_path_buf(),
                to: destination_dir.join(file_name),
                source: e,
            })?
        };

        if let Err(e) = move_file(file, &target) {
            // Release the reserved name
            let _ = fs::remove_file(&target);
            return Err(e);
        }

        debug!(from = %file.display(), to = %target.display(), "relocated");
        Ok(target)
    }

    fn lock_for(&self, dir: &Path) -> Arc<Mutex<()>> {
        let mut locks = lock_ignoring_poison(&self.dir_locks);
        locks.entry(dir.to_path_buf()).or_default().clone()
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Name for the `attempt`-th candidate: `stem(attempt).ext`, or the
/// original name for attempt zero
pub fn disambiguated_name(file_name: &OsStr, attempt: usize) -> OsString {
    if attempt == 0 {
        return file_name.to_os_string();
    }

    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name);
    let mut name = stem.to_os_string();
    name.push(format!("({})", attempt));
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    name
}

/// Claim the first free candidate name by creating an empty placeholder
fn reserve_name(dir: &Path, file_name: &OsStr) -> std::io::Result<PathBuf> {
    let mut attempt = 0;
    loop {
        let candidate = dir.join(disambiguated_name(file_name, attempt));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Replace the placeholder at `target` with `source`
fn move_file(source: &Path, target: &Path) -> Result<(), RelocateError> {
    let move_error = |e: std::io::Error| RelocateError::Move {
        from: source.to_path_buf(),
        to: target.to_path_buf(),
        source: e,
    };

    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            let source_size = fs::metadata(source).map_err(move_error)?.len();
            fs::copy(source, target).map_err(move_error)?;

            let dest_size = fs::metadata(target).map_err(move_error)?.len();
            if dest_size != source_size {
                return Err(RelocateError::CopyVerification {
                    path: source.to_path_buf(),
                    expected: source_size,
                    actual: dest_size,
                });
            }

            fs::remove_file(source).map_err(move_error)
        }
        Err(e) => Err(move_error(e)),
    }
}
