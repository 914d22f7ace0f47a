use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio_util::sync::CancellationToken;

use rfd_core::{
    audit::{AuditEvent, AuditLogger},
    clock::SystemClock,
    config::Config,
    domain::ChatId,
    guards::GuardContext,
    memo::CacheSweeper,
    messaging::{port::MessagingPort, types::SendOptions},
    shutdown::RemoteStop,
    store::StopFlag,
};

use crate::handlers::{self, Routes, Services};
use crate::TelegramMessenger;

pub struct AppState {
    pub routes: Routes,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    let bot_name = match &cfg.bot_name {
        Some(name) => name.clone(),
        None => bot.get_me().await?.username().to_string(),
    };
    tracing::info!(
        bot = %bot_name,
        admins = cfg.admin_ids.len(),
        subscribers = cfg.subscriber_ids.len(),
        "bot started"
    );

    let messenger: Arc<dyn MessagingPort> =
        Arc::new(TelegramMessenger::new(bot.clone(), cfg.message_limit));
    let ctx = GuardContext {
        clock: Arc::new(SystemClock),
        audit: Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        )),
        access: Arc::new(cfg.access_list()),
        messenger,
    };

    let cancel = CancellationToken::new();
    let stop = Arc::new(RemoteStop::new(
        StopFlag::new(cfg.stop_flag_file.clone()),
        cancel.clone(),
    ));
    match stop.take_previous_stop() {
        Ok(true) => announce_restart(&ctx).await,
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, "failed to reset stop flag"),
    }

    let svc = Arc::new(Services::new(cfg.clone(), ctx, stop));

    let mut sweeper = CacheSweeper::new();
    sweeper.register(svc.digest.clone());
    let sweeper_task = Arc::new(sweeper).spawn(cfg.cache_sweep_interval, cancel.clone());

    let routes = Routes::for_bot(&svc, &bot_name);
    for chain in routes.describe() {
        tracing::debug!(%chain, "route");
    }
    let state = Arc::new(AppState { routes });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    // A single distribution key: updates are handled one at a time, in order.
    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .distribution_function(|_| Some(()))
        .enable_ctrlc_handler()
        .build();

    let shutdown = dispatcher.shutdown_token();
    let stopped = cancel.clone();
    tokio::spawn(async move {
        stopped.cancelled().await;
        tracing::info!("stop requested, shutting down dispatcher");
        if let Ok(done) = shutdown.shutdown() {
            done.await;
        }
    });

    dispatcher.dispatch().await;

    cancel.cancel();
    let _ = sweeper_task.await;
    tracing::info!("bot stopped");
    Ok(())
}

/// Tell admins the bot is back after a remote stop.
async fn announce_restart(ctx: &GuardContext) {
    ctx.audit
        .record(AuditEvent::system("restarted after remote stop"));
    let text = "Bot is back online after a remote stop.";
    for admin in ctx.access.admins() {
        if let Err(e) = ctx
            .messenger
            .send_message(ChatId(admin.0), text, &SendOptions::default())
            .await
        {
            tracing::warn!(admin = admin.0, error = %e, "restart notice not delivered");
        }
    }
}
