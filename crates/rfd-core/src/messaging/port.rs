use std::path::Path;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{InlineKeyboard, MessagingCapabilities, SendOptions},
    Result,
};

/// Outbound operations of the messaging transport.
///
/// The core only ever calls these; transport semantics (retries, flood control,
/// wire format) belong to the adapter implementing the trait.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: &SendOptions,
    ) -> Result<MessageRef>;

    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        opts: &SendOptions,
    ) -> Result<MessageRef>;

    /// Replace the text of `msg`; the inline keyboard is dropped unless given again.
    async fn edit_message_text(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
