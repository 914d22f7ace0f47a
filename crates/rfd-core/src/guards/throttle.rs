use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use super::{BoxHandler, Handler};
use crate::{
    audit::{AuditEvent, AuditLogger},
    clock::Clock,
    domain::Inbound,
    Result,
};

/// Handler-wide cooldown: at most one accepted call per `delay`, across all
/// users and chats.
///
/// The very first call always passes. Rejected calls run nothing, do not move
/// the cooldown, and are written to the audit log.
pub struct Throttle<E> {
    name: String,
    delay: f64,
    clock: Arc<dyn Clock>,
    audit: Arc<AuditLogger>,
    last_call: Mutex<Option<f64>>,
    inner: BoxHandler<E>,
}

impl<E> Throttle<E> {
    pub fn new(
        name: impl Into<String>,
        delay: Duration,
        clock: Arc<dyn Clock>,
        audit: Arc<AuditLogger>,
        inner: BoxHandler<E>,
    ) -> Self {
        Self {
            name: name.into(),
            delay: delay.as_secs_f64(),
            clock,
            audit,
            last_call: Mutex::new(None),
            inner,
        }
    }

    /// Accept or reject a call at `now`; on accept the cooldown restarts.
    fn admit(&self, now: f64) -> std::result::Result<(), f64> {
        let mut last = self.last_call.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(t) = *last {
            let diff = now - t;
            if diff < self.delay {
                return Err(diff);
            }
        }
        *last = Some(now);
        Ok(())
    }
}

#[async_trait]
impl<E: Inbound> Handler<E> for Throttle<E> {
    async fn handle(&self, event: E) -> Result<()> {
        if let Err(elapsed) = self.admit(self.clock.now()) {
            self.audit.record(AuditEvent::throttled(
                &event,
                &self.name,
                elapsed,
                self.delay,
            ));
            return Ok(());
        }
        self.inner.handle(event).await
    }
}
