//! teloxide update types -> `rfd-core` domain types.

use teloxide::types as tg;

use rfd_core::domain::{Callback, Chat, ChatId, ChatKind, Message, MessageId, User, UserId};

pub fn user(u: &tg::User) -> User {
    User {
        id: UserId(u.id.0 as i64),
        first_name: u.first_name.clone(),
        last_name: u.last_name.clone(),
        username: u.username.clone(),
        language_code: u.language_code.clone(),
    }
}

pub fn chat(c: &tg::Chat) -> Chat {
    let kind = if c.is_private() {
        ChatKind::Private
    } else if c.is_supergroup() {
        ChatKind::Supergroup
    } else if c.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    };
    Chat {
        id: ChatId(c.id.0),
        kind,
        title: c.title().map(str::to_string),
    }
}

/// `None` for messages without a sender (channel posts).
pub fn message(m: &tg::Message) -> Option<Message> {
    let from = m.from()?;
    Some(Message {
        message_id: MessageId(m.id.0),
        chat: chat(&m.chat),
        from: user(from),
        text: m.text().map(str::to_string),
        date: m.date,
    })
}

pub fn callback(q: &tg::CallbackQuery) -> Callback {
    Callback {
        id: q.id.clone(),
        from: user(&q.from),
        message: q.message.as_ref().and_then(message),
        data: q.data.clone(),
    }
}
