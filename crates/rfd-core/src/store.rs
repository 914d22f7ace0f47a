//! Single-value persistent flags (one decimal integer per file).
//!
//! Every read and write, whatever the path, goes through one process-wide lock.
//! These files are rare administrative flags, not a general key-value store.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use crate::Result;

static SCALAR_IO: Mutex<()> = Mutex::new(());

fn io_lock() -> MutexGuard<'static, ()> {
    SCALAR_IO.lock().unwrap_or_else(|p| p.into_inner())
}

/// Read the integer stored at `path`.
///
/// Returns `default` when the file is absent, unreadable, or does not contain
/// only ASCII digits.
pub fn load_scalar(path: &Path, default: u64) -> u64 {
    let _guard = io_lock();
    let contents = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return default,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable scalar file");
            return default;
        }
    };
    parse_digits(&contents).unwrap_or(default)
}

/// Overwrite `path` with the decimal form of `value`.
pub fn store_scalar(path: &Path, value: u64) -> Result<()> {
    let _guard = io_lock();
    fs::write(path, value.to_string())?;
    Ok(())
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok()
}

/// Cross-restart "bot was stopped remotely" flag.
#[derive(Clone, Debug)]
pub struct StopFlag {
    path: PathBuf,
}

impl StopFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_set(&self) -> bool {
        load_scalar(&self.path, 0) != 0
    }

    pub fn set(&self) -> Result<()> {
        store_scalar(&self.path, 1)
    }

    pub fn clear(&self) -> Result<()> {
        store_scalar(&self.path, 0)
    }
}
