use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::render::{self, Artifact, RenderError};
use crate::store::{Report, ReportStore, StoreError};
use crate::ui::{Control, ConversationalUi, ConversationId};

pub mod input;

/// Closed set of menu actions. The transport decodes its wire tokens into
/// these before anything reaches the navigator; date and month payloads stay
/// raw strings because validating them is this module's job.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    MainMenu,
    BrowseByDate,
    BrowseByMonth,
    ListAll,
    ViewByDate(String),
    ViewByMonth(String),
    EnterDate,
    EnterMonth,
    ViewReport(i64),
}

/// Per-conversation suspend mode. Anything other than `Idle` means the next
/// free-text message is consumed here instead of being ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    AwaitingDateInput,
    AwaitingMonthInput,
}

/// Unfiltered listing shows at most this many reports.
const MAX_LIST_ITEMS: usize = 20;

/// The menu state machine. Owns per-conversation state; the store and the
/// chat transport are injected collaborators.
pub struct Navigator<S, U> {
    store: S,
    ui: U,
    sessions: Mutex<HashMap<ConversationId, Mode>>,
}

impl<S: ReportStore, U: ConversationalUi> Navigator<S, U> {
    pub fn new(store: S, ui: U) -> Self {
        Self {
            store,
            ui,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    pub fn mode(&self, conv: ConversationId) -> Mode {
        self.sessions
            .lock()
            .unwrap()
            .get(&conv)
            .copied()
            .unwrap_or_default()
    }

    /// Idle sessions are evicted rather than kept around.
    fn set_mode(&self, conv: ConversationId, mode: Mode) {
        let mut sessions = self.sessions.lock().unwrap();
        if mode == Mode::Idle {
            sessions.remove(&conv);
        } else {
            sessions.insert(conv, mode);
        }
    }

    fn main_menu_controls() -> Vec<Control> {
        vec![
            Control::new("📅 Reports by date", Action::BrowseByDate),
            Control::new("🗓 Reports by month", Action::BrowseByMonth),
            Control::new("📋 All reports", Action::ListAll),
        ]
    }

    /// Greeting + main menu, as a fresh message. Used for /start and after a
    /// cancel.
    pub async fn show_menu(&self, conv: ConversationId) -> Result<()> {
        self.ui
            .send_text(
                conv,
                "👋 Hi! I browse stored reports.\n\nPick an option below ⬇️",
                &Self::main_menu_controls(),
            )
            .await
    }

    /// One button press. Every outcome resolves to a user-visible message;
    /// only transport failures propagate.
    pub async fn handle_action(&self, conv: ConversationId, action: Action) -> Result<()> {
        debug!(conv, ?action, "navigator action");
        match action {
            Action::MainMenu => {
                self.set_mode(conv, Mode::Idle);
                self.ui
                    .edit_last_text(
                        conv,
                        "👋 Pick an option below ⬇️",
                        &Self::main_menu_controls(),
                    )
                    .await
            }
            Action::BrowseByDate => {
                let today = Utc::now().format("%Y-%m-%d").to_string();
                let controls = vec![
                    Control::new("📅 Today", Action::ViewByDate(today)),
                    Control::new("🔍 Enter a date (YYYY-MM-DD)", Action::EnterDate),
                    Control::new("🔙 Back", Action::MainMenu),
                ];
                self.ui
                    .edit_last_text(conv, "📆 Pick a date:", &controls)
                    .await
            }
            Action::BrowseByMonth => {
                let current = Utc::now().format("%Y-%m").to_string();
                let controls = vec![
                    Control::new("🗓 Current month", Action::ViewByMonth(current)),
                    Control::new("🔍 Enter a month (YYYY-MM)", Action::EnterMonth),
                    Control::new("🔙 Back", Action::MainMenu),
                ];
                self.ui
                    .edit_last_text(conv, "🗓 Pick a month:", &controls)
                    .await
            }
            Action::ListAll => {
                let reports = self.store.all().await?;
                if reports.is_empty() {
                    return self
                        .ui
                        .edit_last_text(conv, "❌ No reports in the store.", &[])
                        .await;
                }
                let shown = &reports[..reports.len().min(MAX_LIST_ITEMS)];
                let controls = Self::report_list_controls(shown, Action::MainMenu);
                self.ui
                    .edit_last_text(conv, "📋 Available reports:", &controls)
                    .await
            }
            Action::ViewByDate(raw) => {
                let Some(date) = input::parse_date(&raw) else {
                    warn!(conv, %raw, "invalid date payload");
                    return self
                        .ui
                        .edit_last_text(conv, "⚠️ Invalid date format. Expected YYYY-MM-DD.", &[])
                        .await;
                };
                let reports = self.store.by_date(date).await?;
                if reports.is_empty() {
                    return self
                        .ui
                        .edit_last_text(conv, &format!("❌ No reports for {}.", date), &[])
                        .await;
                }
                let controls = Self::report_list_controls(&reports, Action::MainMenu);
                self.ui
                    .edit_last_text(conv, &format!("📊 Reports for {}:", date), &controls)
                    .await
            }
            Action::ViewByMonth(raw) => {
                let Some((year, month)) = input::parse_month(&raw) else {
                    warn!(conv, %raw, "invalid month payload");
                    return self
                        .ui
                        .edit_last_text(conv, "⚠️ Invalid month format. Expected YYYY-MM.", &[])
                        .await;
                };
                self.show_month_reports(conv, year, month, true).await
            }
            Action::EnterDate => {
                self.set_mode(conv, Mode::AwaitingDateInput);
                self.ui
                    .edit_last_text(
                        conv,
                        "🔍 Enter a date as YYYY-MM-DD (for example 2025-09-25).\n\
                         Or send /cancel to abort.",
                        &[],
                    )
                    .await
            }
            Action::EnterMonth => {
                self.set_mode(conv, Mode::AwaitingMonthInput);
                self.ui
                    .edit_last_text(
                        conv,
                        "🔍 Enter a month as YYYY-MM (for example 2025-09).\n\
                         Or send /cancel to abort.",
                        &[],
                    )
                    .await
            }
            Action::ViewReport(id) => self.view_report(conv, id).await,
        }
    }

    /// Free-text intake gate: text only means something while a suspend mode
    /// is active, otherwise it is ignored.
    pub async fn handle_text(&self, conv: ConversationId, text: &str) -> Result<()> {
        let text = text.trim();
        match self.mode(conv) {
            Mode::Idle => {
                debug!(conv, "ignoring free text outside input mode");
                Ok(())
            }
            Mode::AwaitingMonthInput => {
                if text.is_empty() {
                    return self
                        .ui
                        .send_text(
                            conv,
                            "⚠️ Empty message. Enter a month as YYYY-MM or send /cancel.",
                            &[],
                        )
                        .await;
                }
                if input::is_cancel(text) {
                    self.set_mode(conv, Mode::Idle);
                    self.ui.send_text(conv, "❌ Action cancelled.", &[]).await?;
                    return self.show_menu(conv).await;
                }
                let Some((year, month)) = input::parse_month(text) else {
                    // Re-prompt and keep waiting.
                    return self
                        .ui
                        .send_text(
                            conv,
                            "⚠️ Invalid format. Enter a month as YYYY-MM, \
                             for example 2025-09, or send /cancel.",
                            &[],
                        )
                        .await;
                };
                self.set_mode(conv, Mode::Idle);
                self.show_month_reports(conv, year, month, false).await
            }
            Mode::AwaitingDateInput => {
                if text.is_empty() {
                    return self
                        .ui
                        .send_text(
                            conv,
                            "⚠️ Empty message. Enter a date as YYYY-MM-DD or send /cancel.",
                            &[],
                        )
                        .await;
                }
                if input::is_cancel(text) {
                    self.set_mode(conv, Mode::Idle);
                    self.ui.send_text(conv, "❌ Action cancelled.", &[]).await?;
                    return self.show_menu(conv).await;
                }
                let Some(date) = input::parse_date(text) else {
                    return self
                        .ui
                        .send_text(
                            conv,
                            "⚠️ Invalid format. Enter a date as YYYY-MM-DD, \
                             for example 2025-09-25, or send /cancel.",
                            &[],
                        )
                        .await;
                };
                self.set_mode(conv, Mode::Idle);
                let reports = self.store.by_date(date).await?;
                if reports.is_empty() {
                    return self
                        .ui
                        .send_text(conv, &format!("❌ No reports for {}.", date), &[])
                        .await;
                }
                let controls = Self::report_list_controls(&reports, Action::BrowseByDate);
                self.ui
                    .send_text(conv, &format!("📊 Reports for {}:", date), &controls)
                    .await
            }
        }
    }

    /// The global /cancel command.
    pub async fn handle_cancel(&self, conv: ConversationId) -> Result<()> {
        if self.mode(conv) == Mode::Idle {
            return self
                .ui
                .send_text(conv, "Nothing to cancel.", &[])
                .await;
        }
        self.set_mode(conv, Mode::Idle);
        self.ui.send_text(conv, "❌ Action cancelled.", &[]).await?;
        self.show_menu(conv).await
    }

    async fn show_month_reports(
        &self,
        conv: ConversationId,
        year: i32,
        month: u32,
        edit: bool,
    ) -> Result<()> {
        let reports = self.store.by_month(year, month).await?;
        let label = format!("{:04}-{:02}", year, month);
        if reports.is_empty() {
            let text = format!("❌ No reports for {}.", label);
            return if edit {
                self.ui.edit_last_text(conv, &text, &[]).await
            } else {
                self.ui.send_text(conv, &text, &[]).await
            };
        }
        // A month list leads back to the month chooser, not the main menu.
        let controls = Self::report_list_controls(&reports, Action::BrowseByMonth);
        let text = format!("📊 Reports for {}:", label);
        if edit {
            self.ui.edit_last_text(conv, &text, &controls).await
        } else {
            self.ui.send_text(conv, &text, &controls).await
        }
    }

    fn report_list_controls(reports: &[Report], back: Action) -> Vec<Control> {
        let mut controls: Vec<Control> = reports
            .iter()
            .map(|r| {
                Control::new(
                    format!("📄 {} | 📆 {}", r.name, r.created_date()),
                    Action::ViewReport(r.id),
                )
            })
            .collect();
        controls.push(Control::new("🔙 Back", back));
        controls
    }

    async fn view_report(&self, conv: ConversationId, id: i64) -> Result<()> {
        let report = match self.store.get(id).await {
            Ok(report) => report,
            Err(StoreError::NotFound(_)) => {
                return self
                    .ui
                    .edit_last_text(conv, "❌ Report not found.", &[])
                    .await;
            }
            Err(e) => return Err(e.into()),
        };

        info!(conv, id, name = %report.name, "rendering report");
        let name = report.name.clone();
        let content = report.content.clone();
        let created_at = report.created_at;
        // Image synthesis is CPU-bound; keep it off the message loop.
        let rendered = tokio::task::spawn_blocking(move || {
            render::render_report(&name, &content, created_at)
        })
        .await
        .context("render task panicked")?;

        match rendered {
            Ok(artifacts) => {
                for artifact in artifacts {
                    match artifact {
                        Artifact::Image {
                            bytes,
                            filename,
                            caption,
                        } => {
                            self.ui
                                .send_image(conv, bytes, &filename, caption.as_deref())
                                .await?;
                        }
                        Artifact::File { bytes, filename } => {
                            self.ui.send_file(conv, bytes, &filename).await?;
                        }
                        Artifact::Notice(text) => {
                            self.ui.send_text(conv, &text, &[]).await?;
                        }
                    }
                }
            }
            Err(RenderError::Parse(reason)) => {
                warn!(conv, id, %reason, "report content failed to parse");
                self.ui
                    .send_text(
                        conv,
                        &format!("⚠️ Report {} could not be rendered: {}", report.name, reason),
                        &[],
                    )
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }

        let controls = vec![
            Control::new("🏠 To main menu", Action::MainMenu),
            Control::new("🔙 Back to list", Action::ListAll),
        ];
        self.ui
            .send_text(conv, "⬆️ Pick the next action:", &controls)
            .await
    }
}
