use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    domain::Inbound,
    formatting::{chat_info, user_info},
    Result,
};

const AUDIT_MAX_TEXT: usize = 500;

pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// One audit record: who did what, where, and (for throttling) how fast.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,

    pub action: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_secs: Option<f64>,
}

impl AuditEvent {
    fn base(event: &str, action: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: None,
            actor: None,
            chat: None,
            action: action.to_string(),
            handler: None,
            elapsed_secs: None,
            delay_secs: None,
        }
    }

    fn from_inbound(event: &str, inbound: &impl Inbound, action: &str) -> Self {
        let sender = inbound.sender();
        Self {
            user_id: Some(sender.id.0),
            actor: Some(user_info(sender)),
            chat: inbound.chat().map(chat_info),
            ..Self::base(event, action)
        }
    }

    /// Action without a user behind it (startup, broadcast summaries).
    pub fn system(action: &str) -> Self {
        Self::base("system", action)
    }

    /// Notable action performed by a user.
    pub fn user_action(inbound: &impl Inbound, action: &str) -> Self {
        Self::from_inbound("action", inbound, action)
    }

    pub fn throttled(inbound: &impl Inbound, handler: &str, elapsed: f64, delay: f64) -> Self {
        let action = format!(
            "called {handler} after {} sec, delay is {delay}",
            elapsed.round()
        );
        Self {
            handler: Some(handler.to_string()),
            elapsed_secs: Some(elapsed),
            delay_secs: Some(delay),
            ..Self::from_inbound("throttled", inbound, &action)
        }
    }

    pub fn stale_callback(inbound: &impl Inbound, handler: &str, age: f64, delay: f64) -> Self {
        let action = format!("pressed a {}s old button of {handler}", age.round());
        Self {
            handler: Some(handler.to_string()),
            elapsed_secs: Some(age),
            delay_secs: Some(delay),
            ..Self::from_inbound("stale_callback", inbound, &action)
        }
    }

    /// Separator line, then one `key: value` line per present field.
    fn plain_block(&self) -> String {
        let mut fields = vec![
            ("timestamp", self.timestamp.clone()),
            ("event", self.event.clone()),
        ];
        if let Some(id) = self.user_id {
            fields.push(("user_id", id.to_string()));
        }
        if let Some(actor) = &self.actor {
            fields.push(("actor", actor.clone()));
        }
        if let Some(chat) = &self.chat {
            fields.push(("chat", chat.clone()));
        }
        fields.push(("action", self.action.clone()));
        if let Some(handler) = &self.handler {
            fields.push(("handler", handler.clone()));
        }
        if let Some(elapsed) = self.elapsed_secs {
            fields.push(("elapsed_secs", format!("{elapsed:.1}")));
        }
        if let Some(delay) = self.delay_secs {
            fields.push(("delay_secs", delay.to_string()));
        }

        let mut out = format!("\n{}", "=".repeat(60));
        for (key, value) in fields {
            out.push_str(&format!("\n{key}: {value}"));
        }
        out.push('\n');
        out
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort: mirror to tracing, append to the audit file, log write failures.
    pub fn record(&self, event: AuditEvent) {
        tracing::info!(
            event = %event.event,
            actor = event.actor.as_deref().unwrap_or("-"),
            chat = event.chat.as_deref().unwrap_or("-"),
            "{}",
            event.action
        );
        if let Err(e) = self.write(event) {
            tracing::error!(path = %self.path.display(), error = %e, "failed to write audit event");
        }
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        event.action = truncate_text(&event.action, AUDIT_MAX_TEXT);

        let record = if self.json {
            let mut line = serde_json::to_string(&event)?;
            line.push('\n');
            line
        } else {
            event.plain_block()
        };

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(record.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::fixtures;

    pub(crate) fn tmp_log(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("{prefix}-{pid}-{ts}.log"))
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), AUDIT_MAX_TEXT + 3);
    }

    #[test]
    fn throttled_event_carries_context() {
        let msg = fixtures::message(5, Some("/help"));
        let ev = AuditEvent::throttled(&msg, "help", 4.6, 10.0);
        assert_eq!(ev.user_id, Some(5));
        assert_eq!(ev.actor.as_deref(), Some("5 (Ann)"));
        assert_eq!(ev.chat.as_deref(), Some("private"));
        assert_eq!(ev.action, "called help after 5 sec, delay is 10");
    }

    #[test]
    fn json_lines_are_appended() {
        let path = tmp_log("rfd-audit-json");
        let log = AuditLogger::new(&path, true);
        log.write(AuditEvent::system("started")).unwrap();
        log.write(AuditEvent::system(&"x".repeat(AUDIT_MAX_TEXT + 1)))
            .unwrap();

        let txt = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = txt.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "system");
        assert!(first.get("actor").is_none());
        assert!(lines[1].contains("..."));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn plain_format_lists_fields() {
        let path = tmp_log("rfd-audit-plain");
        let log = AuditLogger::new(&path, false);
        let msg = fixtures::message(9, Some("/kill"));
        log.write(AuditEvent::user_action(&msg, "remotely killed bot."))
            .unwrap();
        let txt = std::fs::read_to_string(&path).unwrap();
        assert!(txt.contains("action: remotely killed bot."));
        assert!(txt.contains("actor: 9 (Ann)"));
        let _ = std::fs::remove_file(&path);
    }
}
