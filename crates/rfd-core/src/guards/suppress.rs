use async_trait::async_trait;

use super::{BoxHandler, Handler};
use crate::{errors::ErrorKind, Result};

/// Swallows failures of exactly one [`ErrorKind`]; anything else propagates.
///
/// Meant for known-benign failures only (e.g. the transport rejecting a reply to
/// a deleted message). The swallowed error is not logged.
pub struct SuppressError<E> {
    kind: ErrorKind,
    inner: BoxHandler<E>,
}

impl<E> SuppressError<E> {
    pub fn new(kind: ErrorKind, inner: BoxHandler<E>) -> Self {
        Self { kind, inner }
    }
}

#[async_trait]
impl<E: Send + 'static> Handler<E> for SuppressError<E> {
    async fn handle(&self, event: E) -> Result<()> {
        match self.inner.handle(event).await {
            Err(e) if e.kind() == self.kind => Ok(()),
            other => other,
        }
    }
}
