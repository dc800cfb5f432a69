//! Application state: the quest board, its mutators, and the generation gateway.
//!
//! `QuestBoard` is the plain state object (quests + UI flags) with synchronous
//! operations and derived values. `AppState` shares one board behind a lock and
//! drives regeneration through the gateway without holding the lock across the
//! network call.
//!
//! Regeneration policy:
//!   - only one generation may be in flight; overlapping calls are rejected
//!   - every attempt carries a ticket; a completion with a stale ticket is dropped
//!   - failures are logged and never stored on the board
//!   - `loading` is released on every exit path, including cancellation

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_quest_config_from_env, QuestConfig};
use crate::domain::{GeneratedQuestCandidate, QuestItem};
use crate::gateway::{GenerationError, OpenAiGateway, QuestGateway};

/// Identifies one generation attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationTicket(u64);

/// What happened to a `regenerate_quests` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegenerateOutcome {
    /// The board now holds `count` fresh quests.
    Replaced { count: usize },
    /// Generation failed; the board is unchanged. `reason` is diagnostic only.
    Failed { reason: String },
    /// Another generation was already running; nothing was requested.
    AlreadyInFlight,
    /// A newer attempt superseded this one; its result was dropped.
    Stale,
}

/// Read-only view handed to the presentation layer.
#[derive(Clone, Debug, Serialize)]
pub struct BoardView {
    pub quests: Vec<QuestItem>,
    pub loading: bool,
    pub alert_visible: bool,
    pub alert_text: String,
    pub score: u64,
    pub progress: f64,
    pub progress_percent: f64,
    pub completed_count: usize,
    pub total_count: usize,
    pub all_completed: bool,
}

#[derive(Clone, Debug)]
pub struct QuestBoard {
    quests: Vec<QuestItem>,
    loading: bool,
    alert_visible: bool,
    alert_text: String,
    last_ticket: u64,
    in_flight: Option<GenerationTicket>,
}

impl QuestBoard {
    pub fn new(quests: Vec<QuestItem>, alert_text: impl Into<String>) -> Self {
        Self {
            quests,
            loading: false,
            alert_visible: true,
            alert_text: alert_text.into(),
            last_ticket: 0,
            in_flight: None,
        }
    }

    pub fn quests(&self) -> &[QuestItem] {
        &self.quests
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn alert_visible(&self) -> bool {
        self.alert_visible
    }

    /// Claim the generation slot. Returns None if a generation is already running.
    pub fn begin_regenerate(&mut self) -> Option<GenerationTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        self.last_ticket += 1;
        let ticket = GenerationTicket(self.last_ticket);
        self.in_flight = Some(ticket);
        self.loading = true;
        Some(ticket)
    }

    /// Apply the gateway result for `ticket` and release the slot.
    ///
    /// Candidates become fresh quests with `difficulty = position + 1`; whatever
    /// difficulty the model reported is ignored.
    pub fn complete_regenerate(
        &mut self,
        ticket: GenerationTicket,
        result: Result<Vec<GeneratedQuestCandidate>, GenerationError>,
    ) -> RegenerateOutcome {
        if self.in_flight != Some(ticket) {
            warn!(target: "quest", ?ticket, "Dropping result of superseded generation");
            return RegenerateOutcome::Stale;
        }
        self.in_flight = None;
        self.loading = false;

        match result {
            Ok(candidates) => {
                self.quests = candidates
                    .into_iter()
                    .enumerate()
                    .map(|(idx, c)| {
                        debug!(target: "quest", position = idx, label = %c.difficulty, "Ignoring model difficulty label");
                        QuestItem {
                            id: Uuid::new_v4().to_string(),
                            title: c.title,
                            content: c.content,
                            difficulty: idx as u32 + 1,
                            completed: false,
                        }
                    })
                    .collect();
                info!(target: "quest", count = self.quests.len(), "Quest list replaced");
                RegenerateOutcome::Replaced { count: self.quests.len() }
            }
            Err(e) => {
                error!(target: "quest", error = %e, "Quest generation failed; keeping current quests");
                RegenerateOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    /// Release the slot without touching the list. No-op for a stale ticket.
    pub fn abandon_regenerate(&mut self, ticket: GenerationTicket) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
            self.loading = false;
            warn!(target: "quest", ?ticket, "Quest generation abandoned before completion");
        }
    }

    /// Flip `completed` on the quest with `id`. Unknown ids are ignored.
    pub fn toggle_complete(&mut self, id: &str) -> bool {
        match self.quests.iter_mut().find(|q| q.id == id) {
            Some(q) => {
                q.completed = !q.completed;
                true
            }
            None => false,
        }
    }

    pub fn dismiss_alert(&mut self) {
        self.alert_visible = false;
    }

    pub fn completed_count(&self) -> usize {
        self.quests.iter().filter(|q| q.completed).count()
    }

    /// Completed / total; 0.0 when there are no quests.
    pub fn progress_ratio(&self) -> f64 {
        if self.quests.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / self.quests.len() as f64
    }

    pub fn total_score(&self) -> u64 {
        self.quests
            .iter()
            .filter(|q| q.completed)
            .map(QuestItem::points)
            .fold(0, u64::saturating_add)
    }

    pub fn all_completed(&self) -> bool {
        !self.quests.is_empty() && self.quests.iter().all(|q| q.completed)
    }

    pub fn snapshot(&self) -> BoardView {
        let progress = self.progress_ratio();
        BoardView {
            quests: self.quests().to_vec(),
            loading: self.loading(),
            alert_visible: self.alert_visible(),
            alert_text: self.alert_text.clone(),
            score: self.total_score(),
            progress,
            progress_percent: progress * 100.0,
            completed_count: self.completed_count(),
            total_count: self.quests.len(),
            all_completed: self.all_completed(),
        }
    }
}

/// Releases the generation slot if the owning future is dropped mid-flight.
struct InFlightGuard {
    board: Arc<RwLock<QuestBoard>>,
    ticket: Option<GenerationTicket>,
}

impl InFlightGuard {
    fn disarm(&mut self) {
        self.ticket = None;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else { return };
        if let Ok(mut board) = self.board.try_write() {
            board.abandon_regenerate(ticket);
            return;
        }
        // Lock is busy; release from a task once it frees up.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let board = self.board.clone();
            handle.spawn(async move { board.write().await.abandon_regenerate(ticket) });
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub board: Arc<RwLock<QuestBoard>>,
    pub gateway: Option<Arc<dyn QuestGateway>>,
    pub config: QuestConfig,
}

impl AppState {
    /// Build state from env: load config, seed the board, init the gateway.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_quest_config_from_env();

        let gateway = OpenAiGateway::from_env(config.prompts.clone(), config.quest_count);
        if let Some(gw) = &gateway {
            info!(target: "homequest_backend", base_url = %gw.base_url, model = %gw.model, "Quest generation enabled.");
        } else {
            info!(target: "homequest_backend", "Quest generation disabled (no OPENAI_API_KEY). Serving seed quests only.");
        }

        Self::with_gateway(config, gateway.map(|gw| Arc::new(gw) as Arc<dyn QuestGateway>))
    }

    pub fn with_gateway(config: QuestConfig, gateway: Option<Arc<dyn QuestGateway>>) -> Self {
        let quests = config.resolve_seed_quests();
        info!(target: "quest", count = quests.len(), "Startup quest board seeded");
        let board = QuestBoard::new(quests, config.alert_text.clone());
        Self { board: Arc::new(RwLock::new(board)), gateway, config }
    }

    pub async fn snapshot(&self) -> BoardView {
        self.board.read().await.snapshot()
    }

    /// Ask the gateway for a new batch and replace the board on success.
    #[instrument(level = "info", skip(self), fields(batch = self.config.quest_count))]
    pub async fn regenerate_quests(&self) -> RegenerateOutcome {
        let ticket = { self.board.write().await.begin_regenerate() };
        let Some(ticket) = ticket else {
            warn!(target: "quest", "Generation already in flight; ignoring request");
            return RegenerateOutcome::AlreadyInFlight;
        };
        let mut guard = InFlightGuard { board: self.board.clone(), ticket: Some(ticket) };

        let result = match &self.gateway {
            Some(gw) => gw.fetch_daily_quests().await,
            None => Err(GenerationError::Disabled),
        };

        let mut board = self.board.write().await;
        guard.disarm();
        board.complete_regenerate(ticket, result)
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn toggle_complete(&self, id: &str) -> bool {
        let matched = self.board.write().await.toggle_complete(id);
        if !matched {
            debug!(target: "quest", %id, "Toggle for unknown quest id ignored");
        }
        matched
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn dismiss_alert(&self) {
        self.board.write().await.dismiss_alert();
    }
}
