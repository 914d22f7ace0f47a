//! Composable guards around bot handlers.
//!
//! A guard is a `BoxHandler<E> -> BoxHandler<E>` transform owning whatever state
//! it needs (e.g. the throttle's last accepted call). Chains are assembled once
//! at registration with [`Guarded`] and never change afterwards: the first
//! guard declared sits innermost, the last declared runs first.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    audit::AuditLogger,
    clock::Clock,
    domain::{Callback, Inbound},
    errors::ErrorKind,
    messaging::port::MessagingPort,
    Result,
};

mod access;
mod stale;
mod suppress;
mod throttle;

pub use access::{AccessList, RequireRole, Role};
pub use stale::{RejectStaleCallback, STALE_ANSWER};
pub use suppress::SuppressError;
pub use throttle::Throttle;

/// Terminal or wrapped unit of work for one inbound event.
#[async_trait]
pub trait Handler<E: Send + 'static>: Send + Sync {
    async fn handle(&self, event: E) -> Result<()>;
}

pub type BoxHandler<E> = Arc<dyn Handler<E>>;

#[async_trait]
impl<E, H> Handler<E> for Arc<H>
where
    E: Send + 'static,
    H: Handler<E> + ?Sized,
{
    async fn handle(&self, event: E) -> Result<()> {
        (**self).handle(event).await
    }
}

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F>(F);

pub fn handler_fn<F>(f: F) -> FnHandler<F> {
    FnHandler(f)
}

#[async_trait]
impl<E, F, Fut> Handler<E> for FnHandler<F>
where
    E: Send + 'static,
    F: Fn(E) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, event: E) -> Result<()> {
        (self.0)(event).await
    }
}

/// Shared collaborators guards need.
#[derive(Clone)]
pub struct GuardContext {
    pub clock: Arc<dyn Clock>,
    pub audit: Arc<AuditLogger>,
    pub access: Arc<AccessList>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Builder for a fixed guard chain around one named handler.
pub struct Guarded<E> {
    name: String,
    handler: BoxHandler<E>,
    layers: Vec<String>,
}

impl<E: Inbound> Guarded<E> {
    pub fn new(name: impl Into<String>, handler: impl Handler<E> + 'static) -> Self {
        let name = name.into();
        Self {
            layers: vec![name.clone()],
            name,
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap the chain built so far in an arbitrary guard.
    pub fn layer(
        mut self,
        label: impl Into<String>,
        wrap: impl FnOnce(BoxHandler<E>) -> BoxHandler<E>,
    ) -> Self {
        self.handler = wrap(self.handler);
        self.layers.push(label.into());
        self
    }

    pub fn suppress(self, kind: ErrorKind) -> Self {
        self.layer(format!("suppress({kind:?})"), |inner| {
            Arc::new(SuppressError::new(kind, inner))
        })
    }

    pub fn throttle(self, delay: Duration, ctx: &GuardContext) -> Self {
        let name = self.name.clone();
        let (clock, audit) = (ctx.clock.clone(), ctx.audit.clone());
        self.layer(format!("throttle({}s)", delay.as_secs_f64()), move |inner| {
            Arc::new(Throttle::new(name, delay, clock, audit, inner))
        })
    }

    pub fn admin_only(self, ctx: &GuardContext) -> Self {
        self.require(Role::Admin, ctx)
    }

    pub fn subscriber_only(self, ctx: &GuardContext) -> Self {
        self.require(Role::Subscriber, ctx)
    }

    fn require(self, role: Role, ctx: &GuardContext) -> Self {
        let access = ctx.access.clone();
        self.layer(format!("{role:?}-only").to_lowercase(), move |inner| {
            Arc::new(RequireRole::new(role, access, inner))
        })
    }

    /// Guard layers from outermost (runs first) to the terminal handler.
    pub fn describe(&self) -> String {
        self.layers
            .iter()
            .rev()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn build(self) -> BoxHandler<E> {
        tracing::debug!(chain = %self.describe(), "registered handler");
        self.handler
    }
}

impl Guarded<Callback> {
    pub fn reject_stale(
        self,
        delay: Duration,
        retry_hint: impl Into<String>,
        ctx: &GuardContext,
    ) -> Self {
        let name = self.name.clone();
        let retry_hint = retry_hint.into();
        let ctx = ctx.clone();
        self.layer(
            format!("reject_stale({}s)", delay.as_secs_f64()),
            move |inner| {
                Arc::new(RejectStaleCallback::new(
                    name,
                    delay,
                    retry_hint,
                    ctx.clock,
                    ctx.messenger,
                    ctx.audit,
                    inner,
                ))
            },
        )
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        audit::tests::tmp_log, clock::MockClock, domain::UserId,
        messaging::fake::FakeMessenger,
    };

    pub struct Fixture {
        pub clock: MockClock,
        pub messenger: Arc<FakeMessenger>,
        pub ctx: GuardContext,
    }

    pub fn fixture() -> Fixture {
        let clock = MockClock::at(0.0);
        let messenger = Arc::new(FakeMessenger::new());
        let ctx = GuardContext {
            clock: Arc::new(clock.clone()),
            audit: Arc::new(AuditLogger::new(tmp_log("rfd-guard"), true)),
            access: Arc::new(AccessList::new(
                HashSet::from([UserId(1)]),
                HashSet::from([UserId(2)]),
            )),
            messenger: messenger.clone(),
        };
        Fixture {
            clock,
            messenger,
            ctx,
        }
    }

    /// Handler that only counts its invocations.
    pub fn counter<E: Send + 'static>() -> (Arc<AtomicUsize>, impl Handler<E>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let h = handler_fn(move |_: E| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (calls, h)
    }

    pub fn audit_lines(ctx: &GuardContext) -> Vec<serde_json::Value> {
        std::fs::read_to_string(ctx.audit.path())
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::*;
    use super::*;
    use crate::{
        domain::{fixtures, Message},
        errors::Error,
    };

    #[tokio::test]
    async fn chain_runs_outermost_first() {
        let f = fixture();
        let (calls, h) = counter::<Message>();
        // Declared: throttle, then admin_only. A non-admin must be rejected
        // by admin_only before the throttle ever records a call.
        let chain = Guarded::new("stats", h)
            .throttle(Duration::from_secs(10), &f.ctx)
            .admin_only(&f.ctx);
        assert_eq!(chain.describe(), "admin-only -> throttle(10s) -> stats");
        let chain = chain.build();

        f.clock.set(100.0);
        chain.handle(fixtures::message(3, Some("/stats"))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        chain.handle(fixtures::message(1, Some("/stats"))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsuppressed_errors_propagate() {
        let f = fixture();
        let failing = handler_fn(|_: Message| async {
            Err(Error::Config("bad".to_string()))
        });
        let chain = Guarded::new("x", failing)
            .suppress(ErrorKind::External)
            .throttle(Duration::from_secs(1), &f.ctx)
            .build();
        f.clock.set(50.0);
        let err = chain.handle(fixtures::message(1, Some("/x"))).await;
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
