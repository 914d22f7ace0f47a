use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use super::{BoxHandler, Handler};
use crate::{
    audit::{AuditEvent, AuditLogger},
    clock::Clock,
    domain::Callback,
    matchers::{is_callback_stale, message_age},
    messaging::port::MessagingPort,
    Result,
};

/// Short notice shown in the callback answer popup.
pub const STALE_ANSWER: &str = "This keyboard is outdated!";

/// Refuses button presses on messages older than `delay`.
///
/// A stale press gets the original message edited with a "re-issue
/// `retry_hint`" notice and the callback answered; the inner handler never
/// runs. Callbacks without an originating message cannot be aged and pass
/// through.
pub struct RejectStaleCallback {
    name: String,
    delay: f64,
    retry_hint: String,
    clock: Arc<dyn Clock>,
    messenger: Arc<dyn MessagingPort>,
    audit: Arc<AuditLogger>,
    inner: BoxHandler<Callback>,
}

impl RejectStaleCallback {
    pub fn new(
        name: impl Into<String>,
        delay: Duration,
        retry_hint: impl Into<String>,
        clock: Arc<dyn Clock>,
        messenger: Arc<dyn MessagingPort>,
        audit: Arc<AuditLogger>,
        inner: BoxHandler<Callback>,
    ) -> Self {
        Self {
            name: name.into(),
            delay: delay.as_secs_f64(),
            retry_hint: retry_hint.into(),
            clock,
            messenger,
            audit,
            inner,
        }
    }

    fn notice(&self, original: Option<&str>) -> String {
        let notice = format!("{STALE_ANSWER} Please re-issue {}.", self.retry_hint);
        match original {
            Some(text) => format!("{text}\n\n{notice}"),
            None => notice,
        }
    }
}

#[async_trait]
impl Handler<Callback> for RejectStaleCallback {
    async fn handle(&self, cb: Callback) -> Result<()> {
        let clock = self.clock.as_ref();
        let stale = cb
            .message
            .as_ref()
            .filter(|m| is_callback_stale(clock, self.delay, m))
            .map(|m| (message_age(clock, m), m.msg_ref(), self.notice(m.text())));
        let Some((age, original, notice)) = stale else {
            return self.inner.handle(cb).await;
        };

        self.audit
            .record(AuditEvent::stale_callback(&cb, &self.name, age, self.delay));
        self.messenger
            .edit_message_text(original, &notice, None)
            .await?;
        self.messenger
            .answer_callback_query(&cb.id, Some(STALE_ANSWER))
            .await?;
        Ok(())
    }
}
