//! Telegram update handlers.
//!
//! Every route is a matcher plus a guard chain assembled once at startup. An
//! update is converted to the core domain type, handed to the first matching
//! route, and dropped when nothing matches.

use std::{future::Future, path::PathBuf, sync::Arc};

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message as TgMessage},
};

use rfd_core::{
    config::Config,
    domain::{Callback, Inbound, Message},
    formatting::user_info,
    guards::{handler_fn, BoxHandler, GuardContext, Guarded, Handler},
    matchers::CommandSet,
    memo::Memoized,
    shutdown::RemoteStop,
    Result,
};

use crate::{convert, router::AppState};

mod callback;
mod commands;

/// Digest file contents, cached per path.
pub type DigestLoader = Memoized<PathBuf, Arc<str>, fn(&PathBuf) -> Result<Arc<str>>>;

/// Everything route handlers share.
pub struct Services {
    pub cfg: Arc<Config>,
    pub ctx: GuardContext,
    pub digest: Arc<DigestLoader>,
    pub stop: Arc<RemoteStop>,
}

#[allow(clippy::ptr_arg)]
fn read_digest(path: &PathBuf) -> Result<Arc<str>> {
    Ok(std::fs::read_to_string(path)?.into())
}

impl Services {
    pub fn new(cfg: Arc<Config>, ctx: GuardContext, stop: Arc<RemoteStop>) -> Self {
        let digest = Arc::new(Memoized::new(
            "digest",
            cfg.cache_ttl,
            ctx.clock.clone(),
            read_digest as fn(&PathBuf) -> Result<Arc<str>>,
        ));
        Self {
            cfg,
            ctx,
            digest,
            stop,
        }
    }
}

/// Turn `async fn(Arc<Services>, E)` into a handler bound to `svc`.
fn bind<E, F, Fut>(svc: &Arc<Services>, f: F) -> impl Handler<E>
where
    E: Send + 'static,
    F: Fn(Arc<Services>, E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let svc = svc.clone();
    handler_fn(move |event: E| f(svc.clone(), event))
}

type Matcher<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

struct Route<E> {
    chain: String,
    matches: Matcher<E>,
    handler: BoxHandler<E>,
}

/// Ordered routing table; the first matching route wins.
#[derive(Default)]
pub struct Routes {
    messages: Vec<Route<Message>>,
    callbacks: Vec<Route<Callback>>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full table for this bot.
    pub fn for_bot(svc: &Arc<Services>, bot_name: &str) -> Self {
        let mut routes = Self::new();
        commands::register(&mut routes, svc, bot_name);
        callback::register(&mut routes, svc);
        routes
    }

    pub fn on_message(
        &mut self,
        matches: impl Fn(&Message) -> bool + Send + Sync + 'static,
        chain: Guarded<Message>,
    ) {
        self.messages.push(Route {
            chain: chain.describe(),
            matches: Box::new(matches),
            handler: chain.build(),
        });
    }

    pub fn on_command(&mut self, commands: CommandSet, chain: Guarded<Message>) {
        self.on_message(move |m| commands.matches(m), chain);
    }

    /// Callbacks whose data equals `data` exactly.
    pub fn on_callback(&mut self, data: &str, chain: Guarded<Callback>) {
        let data = data.to_string();
        self.callbacks.push(Route {
            chain: chain.describe(),
            matches: Box::new(move |cb: &Callback| cb.data.as_deref() == Some(data.as_str())),
            handler: chain.build(),
        });
    }

    /// Guard chains of every route, in registration order.
    pub fn describe(&self) -> Vec<String> {
        self.messages
            .iter()
            .map(|r| r.chain.clone())
            .chain(self.callbacks.iter().map(|r| r.chain.clone()))
            .collect()
    }

    /// `Ok(false)` when no route matched.
    pub async fn dispatch_message(&self, msg: Message) -> Result<bool> {
        dispatch(&self.messages, msg).await
    }

    pub async fn dispatch_callback(&self, cb: Callback) -> Result<bool> {
        dispatch(&self.callbacks, cb).await
    }
}

async fn dispatch<E: Inbound>(routes: &[Route<E>], event: E) -> Result<bool> {
    let Some(route) = routes.iter().find(|r| (r.matches)(&event)) else {
        return Ok(false);
    };
    tracing::debug!(chain = %route.chain, "dispatching");
    route.handler.handle(event).await?;
    Ok(true)
}

fn log_outcome(event: &impl Inbound, outcome: Result<bool>) {
    match outcome {
        Ok(true) => {}
        Ok(false) => tracing::trace!(user = %user_info(event.sender()), "no route matched"),
        Err(e) => tracing::error!(user = %user_info(event.sender()), error = %e, "handler failed"),
    }
}

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let cb = convert::callback(&q);
    let outcome = state.routes.dispatch_callback(cb.clone()).await;
    log_outcome(&cb, outcome);
    Ok(())
}

pub async fn handle_message(msg: TgMessage, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(msg) = convert::message(&msg) else {
        return Ok(());
    };
    let outcome = state.routes.dispatch_message(msg.clone()).await;
    log_outcome(&msg, outcome);
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use rfd_core::{
        audit::AuditLogger,
        clock::MockClock,
        domain::UserId,
        guards::{AccessList, GuardContext},
        messaging::fake::FakeMessenger,
        shutdown::RemoteStop,
        store::StopFlag,
    };

    use super::*;

    pub const ADMIN: i64 = 1;
    pub const SUBSCRIBER: i64 = 2;
    pub const STRANGER: i64 = 3;

    pub struct Harness {
        pub dir: PathBuf,
        pub clock: MockClock,
        pub messenger: Arc<FakeMessenger>,
        pub svc: Arc<Services>,
        pub routes: Routes,
        pub cancel: CancellationToken,
    }

    impl Harness {
        pub fn audit_lines(&self) -> Vec<serde_json::Value> {
            std::fs::read_to_string(self.svc.ctx.audit.path())
                .unwrap_or_default()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    pub fn harness(name: &str) -> Harness {
        let dir = std::env::temp_dir().join(format!(
            "rfd-telegram-{name}-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let cfg = Config::from_lookup(|k: &str| match k {
            "RFD_BOT_TOKEN" => Some("123:abc".to_string()),
            "RFD_ADMIN_IDS" => Some(ADMIN.to_string()),
            "RFD_SUBSCRIBER_IDS" => Some(format!("{ADMIN},{SUBSCRIBER}")),
            "RFD_DATA_DIR" => Some(dir.display().to_string()),
            "RFD_AUDIT_LOG_JSON" => Some("true".to_string()),
            _ => None,
        })
        .unwrap();

        let clock = MockClock::at(1_000.0);
        let messenger = Arc::new(FakeMessenger::new());
        let ctx = GuardContext {
            clock: Arc::new(clock.clone()),
            audit: Arc::new(AuditLogger::new(&cfg.audit_log_path, true)),
            access: Arc::new(AccessList::new(
                [UserId(ADMIN)].into(),
                [UserId(ADMIN), UserId(SUBSCRIBER)].into(),
            )),
            messenger: messenger.clone(),
        };
        let cancel = CancellationToken::new();
        let stop = Arc::new(RemoteStop::new(
            StopFlag::new(&cfg.stop_flag_file),
            cancel.clone(),
        ));
        let svc = Arc::new(Services::new(Arc::new(cfg), ctx, stop));
        let routes = Routes::for_bot(&svc, "digestbot");

        Harness {
            dir,
            clock,
            messenger,
            svc,
            routes,
            cancel,
        }
    }
}
