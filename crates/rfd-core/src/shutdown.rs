//! Remote stop: an admin command that must be confirmed, persists a stop flag
//! across restarts, and cancels the running dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::{store::StopFlag, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// First request since startup; nothing happened yet.
    Armed,
    /// Flag persisted and shutdown requested.
    Stopping,
}

pub struct RemoteStop {
    flag: StopFlag,
    armed: AtomicBool,
    cancel: CancellationToken,
}

impl RemoteStop {
    pub fn new(flag: StopFlag, cancel: CancellationToken) -> Self {
        Self {
            flag,
            armed: AtomicBool::new(false),
            cancel,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn request(&self) -> Result<StopOutcome> {
        if !self.armed.swap(true, Ordering::SeqCst) {
            return Ok(StopOutcome::Armed);
        }
        self.flag.set()?;
        self.cancel.cancel();
        Ok(StopOutcome::Stopping)
    }

    /// On startup: report whether the previous run was stopped remotely, and reset the flag.
    pub fn take_previous_stop(&self) -> Result<bool> {
        if !self.flag.is_set() {
            return Ok(false);
        }
        self.flag.clear()?;
        Ok(true)
    }
}
