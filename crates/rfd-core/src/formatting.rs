//! Presentation helpers: user/chat descriptions and inline markup.

use crate::{
    domain::{Chat, ChatKind, User, UserId},
    messaging::types::ParseMode,
};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Display name: first name, plus last name when present.
pub fn user_name(user: &User) -> String {
    match &user.last_name {
        Some(last) => format!("{} {last}", user.first_name),
        None => user.first_name.clone(),
    }
}

/// `id (First Last, @username, lang)`, omitting absent optional parts.
pub fn user_info(user: &User) -> String {
    let mut out = format!("{} ({}", user.id.0, user_name(user));
    if let Some(username) = &user.username {
        out.push_str(", @");
        out.push_str(username);
    }
    if let Some(lang) = &user.language_code {
        out.push_str(", ");
        out.push_str(lang);
    }
    out.push(')');
    out
}

/// `private`, or `type: title (id)` for group-like chats.
pub fn chat_info(chat: &Chat) -> String {
    if chat.kind == ChatKind::Private {
        return "private".to_string();
    }
    format!(
        "{}: {} ({})",
        chat.kind.as_str(),
        chat.title.as_deref().unwrap_or(""),
        chat.id.0
    )
}

pub fn bold(text: &str, mode: ParseMode) -> String {
    match mode {
        ParseMode::Html => format!("<b>{text}</b>"),
        ParseMode::Markdown => format!("*{text}*"),
    }
}

pub fn code(text: &str, mode: ParseMode) -> String {
    match mode {
        ParseMode::Html => format!("<code>{text}</code>"),
        ParseMode::Markdown => format!("`{text}`"),
    }
}

/// Mention link to a user or chat id.
pub fn link(text: &str, id: i64, mode: ParseMode) -> String {
    match mode {
        ParseMode::Html => format!("<a href='tg://user?id={id}'>{text}</a>"),
        ParseMode::Markdown => format!("[{text}](tg://user?id={id})"),
    }
}

pub fn link_user(user: &User, mode: ParseMode) -> String {
    let UserId(id) = user.id;
    link(&user_name(user), id, mode)
}
