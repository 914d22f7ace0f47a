use crate::domain::MessageId;

/// Markup flavour for outgoing text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    Markdown,
}

/// Inline keyboard (buttons) attached to an outgoing message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    /// Convenience for a keyboard with a single button.
    pub fn single(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            rows: vec![vec![InlineButton {
                label: label.into(),
                callback_data: callback_data.into(),
            }]],
        }
    }
}

/// Optional knobs shared by `send_message` and `send_document`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub parse_mode: Option<ParseMode>,
    pub reply_to: Option<MessageId>,
    pub keyboard: Option<InlineKeyboard>,
    /// Only meaningful for documents.
    pub caption: Option<String>,
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            ..Default::default()
        }
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_html: bool,
    pub supports_edit: bool,
    pub max_message_len: usize,
}
