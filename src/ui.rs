use anyhow::Result;
use async_trait::async_trait;

use crate::navigator::Action;

/// One conversation with one operator. Telegram chats map onto this directly.
pub type ConversationId = i64;

/// A pressable control attached to a message. The transport decides how the
/// action is encoded on the wire; the navigator only sees typed `Action`s.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub label: String,
    pub action: Action,
}

impl Control {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Outbound half of the chat transport, as seen by the navigator.
#[async_trait]
pub trait ConversationalUi: Send + Sync {
    async fn send_text(&self, conv: ConversationId, text: &str, controls: &[Control])
        -> Result<()>;

    /// Edit the last text message this bot sent in the conversation, falling
    /// back to a fresh message when there is nothing to edit.
    async fn edit_last_text(
        &self,
        conv: ConversationId,
        text: &str,
        controls: &[Control],
    ) -> Result<()>;

    async fn send_image(
        &self,
        conv: ConversationId,
        bytes: Vec<u8>,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<()>;

    async fn send_file(&self, conv: ConversationId, bytes: Vec<u8>, filename: &str) -> Result<()>;
}
