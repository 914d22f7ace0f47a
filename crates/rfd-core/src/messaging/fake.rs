//! In-memory [`MessagingPort`] for tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities, SendOptions},
    },
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
    pub chat_id: ChatId,
    pub text: String,
    pub opts: SendOptions,
}

/// In-memory messenger that records every call.
#[derive(Default)]
pub struct FakeMessenger {
    pub max_message_len: usize,
    pub fail_chats: Vec<i64>,
    pub next_id: Mutex<i32>,
    pub sends: Mutex<Vec<Sent>>,
    pub documents: Mutex<Vec<(ChatId, PathBuf, SendOptions)>>,
    pub edits: Mutex<Vec<(MessageRef, String, Option<InlineKeyboard>)>>,
    pub answers: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            max_message_len: 4096,
            ..Default::default()
        }
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.text.clone())
            .collect()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
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
        if self.fail_chats.contains(&chat_id.0) {
            return Err(Error::External("chat not found".to_string()));
        }
        self.sends.lock().unwrap().push(Sent {
            chat_id,
            text: text.to_string(),
            opts: opts.clone(),
        });
        Ok(self.alloc(chat_id))
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        opts: &SendOptions,
    ) -> Result<MessageRef> {
        self.documents
            .lock()
            .unwrap()
            .push((chat_id, path.to_path_buf(), opts.clone()));
        Ok(self.alloc(chat_id))
    }

    async fn edit_message_text(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        self.edits
            .lock()
            .unwrap()
            .push((msg, text.to_string(), keyboard.cloned()));
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(|t| t.to_string())));
        Ok(())
    }
}
