//! Telegram adapter (teloxide).
//!
//! This crate implements the `rfd-core` MessagingPort over the Telegram Bot API
//! and wires the bot's routes into a teloxide dispatcher.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile},
};

use tokio::time::sleep;

pub mod convert;
pub mod handlers;
pub mod router;

use rfd_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities, ParseMode, SendOptions},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    max_message_len: usize,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, max_message_len: usize) -> Self {
        Self {
            bot,
            max_message_len,
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    #[allow(deprecated)]
    fn tg_parse_mode(mode: ParseMode) -> teloxide::types::ParseMode {
        match mode {
            ParseMode::Html => teloxide::types::ParseMode::Html,
            ParseMode::Markdown => teloxide::types::ParseMode::Markdown,
        }
    }

    fn tg_markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
                .collect::<Vec<_>>()
        }))
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::debug!(wait = ?d, "flood control, retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_html: true,
            supports_edit: true,
            max_message_len: self.max_message_len,
        }
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: &SendOptions,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let mut req = self.bot.send_message(Self::tg_chat(chat_id), text.to_string());
                if let Some(mode) = opts.parse_mode {
                    req = req.parse_mode(Self::tg_parse_mode(mode));
                }
                if let Some(reply_to) = opts.reply_to {
                    req = req.reply_to_message_id(Self::tg_msg_id(reply_to));
                }
                if let Some(keyboard) = &opts.keyboard {
                    req = req.reply_markup(Self::tg_markup(keyboard));
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        opts: &SendOptions,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_document(Self::tg_chat(chat_id), InputFile::file(path.to_path_buf()));
                if let Some(caption) = &opts.caption {
                    req = req.caption(caption.clone());
                }
                if let Some(mode) = opts.parse_mode {
                    req = req.parse_mode(Self::tg_parse_mode(mode));
                }
                if let Some(reply_to) = opts.reply_to {
                    req = req.reply_to_message_id(Self::tg_msg_id(reply_to));
                }
                if let Some(keyboard) = &opts.keyboard {
                    req = req.reply_markup(Self::tg_markup(keyboard));
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_message_text(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.edit_message_text(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
                text.to_string(),
            );
            if let Some(keyboard) = keyboard {
                req = req.reply_markup(Self::tg_markup(keyboard));
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rfd_core::messaging::types::InlineButton;

    use super::*;

    #[test]
    fn keyboard_rows_map_to_callback_buttons() {
        let keyboard = InlineKeyboard {
            rows: vec![
                vec![
                    InlineButton {
                        label: "A".to_string(),
                        callback_data: "a".to_string(),
                    },
                    InlineButton {
                        label: "B".to_string(),
                        callback_data: "b".to_string(),
                    },
                ],
                vec![InlineButton {
                    label: "C".to_string(),
                    callback_data: "c".to_string(),
                }],
            ],
        };
        let markup = TelegramMessenger::tg_markup(&keyboard);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "C");
    }
}
