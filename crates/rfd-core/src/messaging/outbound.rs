//! Reply helpers layered on [`MessagingPort`].

use std::{fs, path::Path};

use crate::{
    audit::{AuditEvent, AuditLogger},
    chunking::chunk_text,
    domain::{ChatId, MessageRef},
    formatting::link,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, ParseMode, SendOptions},
    },
    Result,
};

/// Send `text` as as many messages as the transport limit requires.
///
/// Only the last chunk carries `opts.keyboard`.
pub async fn send_long(
    port: &dyn MessagingPort,
    chat_id: ChatId,
    text: &str,
    opts: &SendOptions,
) -> Result<Vec<MessageRef>> {
    let limit = port.capabilities().max_message_len;
    let chunks: Vec<&str> = chunk_text(text, limit)
        .filter(|c| !c.is_empty())
        .collect();

    let plain = SendOptions {
        keyboard: None,
        ..opts.clone()
    };
    let mut sent = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let o = if i + 1 == chunks.len() { opts } else { &plain };
        sent.push(port.send_message(chat_id, chunk, o).await?);
    }
    Ok(sent)
}

pub fn is_non_zero_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Send `path` as a document if it exists and is non-empty; `None` otherwise.
pub async fn send_file(
    port: &dyn MessagingPort,
    chat_id: ChatId,
    path: &Path,
    opts: &SendOptions,
) -> Result<Option<MessageRef>> {
    if !is_non_zero_file(path) {
        return Ok(None);
    }
    port.send_document(chat_id, path, opts).await.map(Some)
}

/// Broadcast an HTML `text` to every subscriber except `me`.
///
/// Failed deliveries are collected and returned; when `me` is given, each one
/// is also reported to `me`. A summary of failures goes to the audit log.
pub async fn notify_subscribers(
    port: &dyn MessagingPort,
    audit: &AuditLogger,
    subscribers: impl IntoIterator<Item = ChatId>,
    text: &str,
    keyboard: Option<InlineKeyboard>,
    me: Option<ChatId>,
) -> Vec<ChatId> {
    let opts = SendOptions {
        keyboard,
        ..SendOptions::html()
    };
    let mut failed = Vec::new();

    for chat_id in subscribers {
        if Some(chat_id) == me {
            continue;
        }
        if let Err(e) = port.send_message(chat_id, text, &opts).await {
            tracing::warn!(chat = chat_id.0, error = %e, "notification not delivered");
            failed.push(chat_id);
            if let Some(me) = me {
                let notice = format!(
                    "Message to {} was not delivered",
                    link("subscriber", chat_id.0, ParseMode::Html)
                );
                if let Err(e) = port.send_message(me, &notice, &SendOptions::html()).await {
                    tracing::warn!(error = %e, "failed to report undelivered notification");
                }
            }
        }
    }

    if !failed.is_empty() {
        let ids = failed
            .iter()
            .map(|c| c.0.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        audit.record(AuditEvent::system(&format!("Notifying failed for: [{ids}]")));
    }
    failed
}
