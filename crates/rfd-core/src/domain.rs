use chrono::{DateTime, Utc};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Private => "private",
            ChatKind::Group => "group",
            ChatKind::Supergroup => "supergroup",
            ChatKind::Channel => "channel",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
}

/// Inbound text message as delivered by the transport.
#[derive(Clone, Debug)]
pub struct Message {
    pub message_id: MessageId,
    pub chat: Chat,
    pub from: User,
    pub text: Option<String>,
    pub date: DateTime<Utc>,
}

impl Message {
    pub fn msg_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat.id,
            message_id: self.message_id,
        }
    }

    /// Text with `None` and `""` collapsed together.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Inline-button press. `message` is the message carrying the keyboard.
#[derive(Clone, Debug)]
pub struct Callback {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Anything a guard can attribute to a sender and (optionally) a chat.
pub trait Inbound: Clone + Send + Sync + 'static {
    fn sender(&self) -> &User;
    fn chat(&self) -> Option<&Chat>;
}

impl Inbound for Message {
    fn sender(&self) -> &User {
        &self.from
    }

    fn chat(&self) -> Option<&Chat> {
        Some(&self.chat)
    }
}

impl Inbound for Callback {
    fn sender(&self) -> &User {
        &self.from
    }

    fn chat(&self) -> Option<&Chat> {
        self.message.as_ref().map(|m| &m.chat)
    }
}

/// Ready-made inbound values for tests.
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures {
    use super::*;

    pub fn user(id: i64) -> User {
        User {
            id: UserId(id),
            first_name: "Ann".to_string(),
            last_name: None,
            username: None,
            language_code: None,
        }
    }

    pub fn private_chat(id: i64) -> Chat {
        Chat {
            id: ChatId(id),
            kind: ChatKind::Private,
            title: None,
        }
    }

    pub fn message(from: i64, text: Option<&str>) -> Message {
        Message {
            message_id: MessageId(1),
            chat: private_chat(from),
            from: user(from),
            text: text.map(|s| s.to_string()),
            date: Utc::now(),
        }
    }

    pub fn message_at(from: i64, text: &str, unix_secs: i64) -> Message {
        Message {
            date: DateTime::<Utc>::from_timestamp(unix_secs, 0).unwrap_or_default(),
            ..message(from, Some(text))
        }
    }

    pub fn callback(from: i64, message: Message, data: &str) -> Callback {
        Callback {
            id: "cb-1".to_string(),
            from: user(from),
            message: Some(message),
            data: Some(data.to_string()),
        }
    }
}
