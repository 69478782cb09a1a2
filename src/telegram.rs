use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use teloxide::{
    dispatching::UpdateFilterExt,
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId},
};
use tracing::{error, warn};

use crate::navigator::{Action, Navigator};
use crate::store::HttpReportStore;
use crate::ui::{Control, ConversationalUi, ConversationId};

pub type Nav = Navigator<HttpReportStore, TelegramUi>;

/// Encode a typed action as callback data (64-byte budget on the wire).
pub fn encode_action(action: &Action) -> String {
    match action {
        Action::MainMenu => "menu".to_string(),
        Action::BrowseByDate => "choose_date".to_string(),
        Action::BrowseByMonth => "choose_month".to_string(),
        Action::ListAll => "all_reports".to_string(),
        Action::ViewByDate(date) => format!("view_date:{}", date),
        Action::ViewByMonth(month) => format!("view_month:{}", month),
        Action::EnterDate => "enter_date".to_string(),
        Action::EnterMonth => "enter_month".to_string(),
        Action::ViewReport(id) => format!("view_report:{}", id),
    }
}

/// Decode callback data back into an action. Unknown tokens are dropped at
/// this boundary; the navigator only ever sees the typed set.
pub fn decode_action(data: &str) -> Option<Action> {
    match data {
        "menu" => return Some(Action::MainMenu),
        "choose_date" => return Some(Action::BrowseByDate),
        "choose_month" => return Some(Action::BrowseByMonth),
        "all_reports" => return Some(Action::ListAll),
        "enter_date" => return Some(Action::EnterDate),
        "enter_month" => return Some(Action::EnterMonth),
        _ => {}
    }
    let (kind, payload) = data.split_once(':')?;
    match kind {
        "view_date" => Some(Action::ViewByDate(payload.to_string())),
        "view_month" => Some(Action::ViewByMonth(payload.to_string())),
        "view_report" => Some(Action::ViewReport(payload.parse().ok()?)),
        _ => None,
    }
}

/// Telegram-backed chat transport. Tracks the last text message per chat so
/// menu transitions edit in place the way the bot API expects.
pub struct TelegramUi {
    bot: Bot,
    last_text: Mutex<HashMap<ConversationId, MessageId>>,
}

impl TelegramUi {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            last_text: Mutex::new(HashMap::new()),
        }
    }

    fn markup(controls: &[Control]) -> Option<InlineKeyboardMarkup> {
        if controls.is_empty() {
            return None;
        }
        let rows: Vec<Vec<InlineKeyboardButton>> = controls
            .iter()
            .map(|c| {
                vec![InlineKeyboardButton::callback(
                    c.label.clone(),
                    encode_action(&c.action),
                )]
            })
            .collect();
        Some(InlineKeyboardMarkup::new(rows))
    }

    fn remember(&self, conv: ConversationId, id: MessageId) {
        self.last_text.lock().unwrap().insert(conv, id);
    }
}

#[async_trait]
impl ConversationalUi for TelegramUi {
    async fn send_text(
        &self,
        conv: ConversationId,
        text: &str,
        controls: &[Control],
    ) -> Result<()> {
        let mut req = self.bot.send_message(ChatId(conv), text);
        if let Some(markup) = Self::markup(controls) {
            req = req.reply_markup(markup);
        }
        let sent = req.await.context("sending message")?;
        self.remember(conv, sent.id);
        Ok(())
    }

    async fn edit_last_text(
        &self,
        conv: ConversationId,
        text: &str,
        controls: &[Control],
    ) -> Result<()> {
        let last = self.last_text.lock().unwrap().get(&conv).copied();
        if let Some(id) = last {
            let mut req = self.bot.edit_message_text(ChatId(conv), id, text);
            if let Some(markup) = Self::markup(controls) {
                req = req.reply_markup(markup);
            }
            match req.await {
                Ok(_) => return Ok(()),
                Err(e) => warn!("edit failed, sending a new message instead: {}", e),
            }
        }
        self.send_text(conv, text, controls).await
    }

    async fn send_image(
        &self,
        conv: ConversationId,
        bytes: Vec<u8>,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        let photo = InputFile::memory(bytes).file_name(filename.to_string());
        let mut req = self.bot.send_photo(ChatId(conv), photo);
        if let Some(caption) = caption {
            req = req.caption(caption.to_string());
        }
        req.await.context("sending photo")?;
        Ok(())
    }

    async fn send_file(&self, conv: ConversationId, bytes: Vec<u8>, filename: &str) -> Result<()> {
        let document = InputFile::memory(bytes).file_name(filename.to_string());
        self.bot
            .send_document(ChatId(conv), document)
            .await
            .context("sending document")?;
        Ok(())
    }
}

/// Run the long-polling dispatcher until shutdown.
pub async fn run(bot: Bot, nav: Arc<Nav>) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![nav])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn on_message(msg: Message, nav: Arc<Nav>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let conv = msg.chat.id.0;
    let result = match text.trim() {
        "/start" => nav.show_menu(conv).await,
        "/cancel" => nav.handle_cancel(conv).await,
        other => nav.handle_text(conv, other).await,
    };
    if let Err(e) = result {
        error!(conv, "message handling failed: {:#}", e);
    }
    Ok(())
}

async fn on_callback(bot: Bot, query: CallbackQuery, nav: Arc<Nav>) -> ResponseResult<()> {
    bot.answer_callback_query(&query.id).await?;

    let Some(data) = query.data.as_deref() else {
        return Ok(());
    };
    let Some(conv) = query.message.as_ref().map(|m| m.chat().id.0) else {
        return Ok(());
    };
    let Some(action) = decode_action(data) else {
        warn!(conv, data, "unknown callback data");
        return Ok(());
    };
    if let Err(e) = nav.handle_action(conv, action).await {
        error!(conv, "action handling failed: {:#}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_round_trip_through_callback_data() {
        let actions = [
            Action::MainMenu,
            Action::BrowseByDate,
            Action::BrowseByMonth,
            Action::ListAll,
            Action::ViewByDate("2025-09-25".into()),
            Action::ViewByMonth("2025-09".into()),
            Action::EnterDate,
            Action::EnterMonth,
            Action::ViewReport(42),
        ];
        for action in actions {
            let data = encode_action(&action);
            assert!(data.len() <= 64, "callback data too long: {}", data);
            assert_eq!(decode_action(&data), Some(action));
        }
    }

    #[test]
    fn junk_callback_data_is_dropped() {
        assert_eq!(decode_action(""), None);
        assert_eq!(decode_action("drop_tables"), None);
        assert_eq!(decode_action("view_report:abc"), None);
        assert_eq!(decode_action("view_report"), None);
    }
}
