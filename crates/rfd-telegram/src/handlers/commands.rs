use std::sync::Arc;

use chrono::{DateTime, Utc};

use rfd_core::{
    audit::AuditEvent,
    domain::{ChatId, Message},
    errors::{Error, ErrorKind},
    formatting::{bold, chat_info, code, escape_html, user_info},
    guards::Guarded,
    matchers::CommandSet,
    messaging::{
        outbound::{notify_subscribers, send_file, send_long},
        types::{InlineKeyboard, ParseMode, SendOptions},
    },
    shutdown::StopOutcome,
    Result,
};

use super::{bind, Routes, Services};

pub(super) const MENU_REFRESH: &str = "menu:refresh";

const NO_DIGEST: &str = "No digest has been published yet.";

// Chains read outer -> inner in the comments; builder calls go inner -> outer.
pub(super) fn register(routes: &mut Routes, svc: &Arc<Services>, bot_name: &str) {
    let ctx = &svc.ctx;
    let delay = svc.cfg.command_delay;
    let cmd = |names: &[&str]| CommandSet::new(names.iter().copied(), bot_name);

    // throttle -> suppress(External) -> help
    routes.on_command(
        cmd(&["start", "help"]),
        Guarded::new("help", bind(svc, help))
            .suppress(ErrorKind::External)
            .throttle(delay, ctx),
    );
    routes.on_command(cmd(&["whoami"]), Guarded::new("whoami", bind(svc, whoami)));
    // subscriber-only -> throttle -> digest
    routes.on_command(
        cmd(&["digest"]),
        Guarded::new("digest", bind(svc, digest))
            .throttle(delay, ctx)
            .subscriber_only(ctx),
    );
    routes.on_command(
        cmd(&["digestfile"]),
        Guarded::new("digestfile", bind(svc, digest_file)).subscriber_only(ctx),
    );
    routes.on_command(
        cmd(&["notify"]),
        Guarded::new("notify", bind(svc, notify)).admin_only(ctx),
    );
    routes.on_command(cmd(&["menu"]), Guarded::new("menu", bind(svc, menu)));
    routes.on_command(
        cmd(&["kill"]),
        Guarded::new("kill", bind(svc, kill)).admin_only(ctx),
    );
}

/// Text after the command token, trimmed.
fn command_args(text: &str) -> &str {
    text.split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("")
}

pub(super) fn menu_text(now: f64) -> String {
    let at = DateTime::<Utc>::from_timestamp(now as i64, 0)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    format!("Server time: {at} UTC")
}

/// Single HTML reply. Chunking could split a tag, so callers keep `html`
/// under the message limit; long plain text goes through [`send_long`].
async fn reply_html(svc: &Services, msg: &Message, html: &str) -> Result<()> {
    let opts = SendOptions::html().reply_to(msg.message_id);
    svc.ctx
        .messenger
        .send_message(msg.chat.id, html, &opts)
        .await?;
    Ok(())
}

async fn help(svc: Arc<Services>, msg: Message) -> Result<()> {
    let mut text = format!(
        "{}\n\n\
         /digest - latest digest\n\
         /digestfile - latest digest as a file\n\
         /menu - server time with a refresh button\n\
         /whoami - what the bot knows about you",
        bold("Digest bot", ParseMode::Html)
    );
    if svc.ctx.access.is_admin(msg.from.id) {
        text.push_str(
            "\n\n/notify &lt;text&gt; - message all subscribers\n\
             /kill - stop the bot (send twice)",
        );
    }
    reply_html(&svc, &msg, &text).await
}

async fn whoami(svc: Arc<Services>, msg: Message) -> Result<()> {
    let text = format!(
        "You: {}\nChat: {}",
        code(&escape_html(&user_info(&msg.from)), ParseMode::Html),
        escape_html(&chat_info(&msg.chat))
    );
    reply_html(&svc, &msg, &text).await
}

async fn digest(svc: Arc<Services>, msg: Message) -> Result<()> {
    let text = match svc.digest.call(svc.cfg.digest_file.clone()) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) | Err(Error::Io(_)) => return reply_html(&svc, &msg, NO_DIGEST).await,
        Err(e) => return Err(e),
    };
    let opts = SendOptions::default().reply_to(msg.message_id);
    send_long(svc.ctx.messenger.as_ref(), msg.chat.id, &text, &opts).await?;
    Ok(())
}

async fn digest_file(svc: Arc<Services>, msg: Message) -> Result<()> {
    let opts = SendOptions::default()
        .reply_to(msg.message_id)
        .with_caption("Latest digest");
    let sent = send_file(
        svc.ctx.messenger.as_ref(),
        msg.chat.id,
        &svc.cfg.digest_file,
        &opts,
    )
    .await?;
    if sent.is_none() {
        reply_html(&svc, &msg, NO_DIGEST).await?;
    }
    Ok(())
}

async fn notify(svc: Arc<Services>, msg: Message) -> Result<()> {
    let body = command_args(msg.text().unwrap_or_default());
    if body.is_empty() {
        return reply_html(&svc, &msg, "Usage: /notify &lt;text&gt;").await;
    }

    let me = msg.chat.id;
    let recipients: Vec<ChatId> = svc
        .ctx
        .access
        .subscribers()
        .map(|u| ChatId(u.0))
        .filter(|c| *c != me)
        .collect();
    let failed = notify_subscribers(
        svc.ctx.messenger.as_ref(),
        &svc.ctx.audit,
        recipients.iter().copied(),
        &escape_html(body),
        None,
        Some(me),
    )
    .await;
    svc.ctx
        .audit
        .record(AuditEvent::user_action(&msg, "notified subscribers"));

    let delivered = recipients.len() - failed.len();
    let summary = format!(
        "Delivered to {delivered} of {} subscribers.",
        recipients.len()
    );
    reply_html(&svc, &msg, &summary).await
}

async fn menu(svc: Arc<Services>, msg: Message) -> Result<()> {
    let opts = SendOptions::default()
        .reply_to(msg.message_id)
        .with_keyboard(InlineKeyboard::single("Refresh", MENU_REFRESH));
    svc.ctx
        .messenger
        .send_message(msg.chat.id, &menu_text(svc.ctx.clock.now()), &opts)
        .await?;
    Ok(())
}

async fn kill(svc: Arc<Services>, msg: Message) -> Result<()> {
    match svc.stop.request()? {
        StopOutcome::Armed => {
            tracing::info!(user = %user_info(&msg.from), "remote stop armed");
            reply_html(&svc, &msg, "Send /kill again to stop the bot.").await
        }
        StopOutcome::Stopping => {
            svc.ctx
                .audit
                .record(AuditEvent::user_action(&msg, "remotely killed bot."));
            tracing::warn!(user = %user_info(&msg.from), "remote stop requested");
            reply_html(&svc, &msg, "Stopping. Bye!").await
        }
    }
}
