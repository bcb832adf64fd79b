//! The aggregate game state and the records it holds.
//!
//! [`GameState`] is a plain value. Every operation in this crate takes the
//! prior state by reference and produces the next one, so a host can keep
//! old states around for inspection or undo. The catalog is shared behind an
//! [`Arc`] so that cloning a state does not copy the records.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, JobRecord, MessageAction, MessageType};
use crate::config::SimConfig;

/// Lifecycle of an assigned job.
///
/// Reachable transitions: Running→Error, Running→Completed, Error→Running,
/// Error→Failed. Completed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Error,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self → next` is a legal lifecycle step (or no change).
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        self == next
            || matches!(
                (self, next),
                (Running, Error) | (Running, Completed) | (Error, Running) | (Error, Failed)
            )
    }
}

/// An error raised when progress crossed `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub threshold: f32,
}

/// A job occupying a slot.
///
/// Rates, duration and rewards are copied from the catalog at assignment so
/// later catalog changes never reach in-flight work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    pub title: String,
    pub assigned_slot: u32,
    /// Fraction complete, in [0, 1].
    pub progress: f32,
    pub baseline_duration: f32,
    pub base_error_rate: f32,
    pub base_resolution_success_rate: f32,
    pub reward: u32,
    pub reputation_reward: u32,
    pub error_history: Vec<ErrorRecord>,
    pub status: JobStatus,
}

impl JobState {
    pub fn assign(record: &JobRecord, slot: u32) -> Self {
        Self {
            job_id: record.id.clone(),
            title: record.title.clone(),
            assigned_slot: slot,
            progress: 0.0,
            baseline_duration: record.baseline_duration,
            base_error_rate: record.error_rate,
            base_resolution_success_rate: record.resolution_rate,
            reward: record.reward,
            reputation_reward: record.reputation_reward,
            error_history: Vec::new(),
            status: JobStatus::Running,
        }
    }

    /// Whether an error has already fired at this threshold.
    pub fn has_errored_at(&self, threshold: f32) -> bool {
        self.error_history
            .iter()
            .any(|e| (e.threshold - threshold).abs() < f32::EPSILON)
    }
}

/// When something happened, in game time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameStamp {
    pub day: u32,
    /// Blocks already used on `day` at the time of the stamp.
    pub block: u32,
}

/// A message instantiated from a [`crate::catalog::MessageTemplate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    pub id: u64,
    pub template_id: String,
    pub message_type: MessageType,
    pub title: String,
    pub body: String,
    pub action: Option<MessageAction>,
    pub linked_job: Option<String>,
    pub created_at: GameStamp,
    pub read: bool,
}

/// Purchasable item categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Hardware,
    AiModel,
    Prompt,
}

/// The whole simulation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Current day, starting at 1.
    pub day: u32,
    pub time_blocks_remaining: u32,
    pub credits: u32,
    pub reputation: u32,
    /// Player health, 0–100.
    pub health: u8,
    /// Fraction of the current block elapsed under a real-time driver.
    pub block_progress: f32,

    pub catalog: Arc<Catalog>,

    // Ownership sets, in purchase order.
    pub owned_hardware: Vec<String>,
    pub owned_models: Vec<String>,
    pub owned_prompts: Vec<String>,

    pub active_jobs: Vec<JobState>,
    pub completed_job_ids: BTreeSet<String>,
    pub available_job_offers: Vec<JobRecord>,

    /// Most recent first.
    pub active_feed_messages: Vec<FeedMessage>,
    /// Most recent first.
    pub archived_feed_messages: Vec<FeedMessage>,
    /// Day each template was last instantiated.
    pub template_last_shown: BTreeMap<String, u32>,
    pub next_message_id: u64,
}

impl GameState {
    /// Fresh day-1 state seeded with the simplest catalog jobs as offers.
    pub fn new(catalog: Catalog, config: &SimConfig) -> Self {
        let mut starters: Vec<&JobRecord> = catalog.jobs.iter().collect();
        starters.sort_by(|a, b| a.complexity.total_cmp(&b.complexity));
        let available_job_offers = starters
            .into_iter()
            .take(config.initial_offer_count)
            .cloned()
            .collect();

        Self {
            day: 1,
            time_blocks_remaining: config.blocks_per_day,
            credits: config.starting_credits,
            reputation: config.starting_reputation,
            health: config.starting_health.min(100),
            block_progress: 0.0,
            catalog: Arc::new(catalog),
            owned_hardware: Vec::new(),
            owned_models: Vec::new(),
            owned_prompts: Vec::new(),
            active_jobs: Vec::new(),
            completed_job_ids: BTreeSet::new(),
            available_job_offers,
            active_feed_messages: Vec::new(),
            archived_feed_messages: Vec::new(),
            template_last_shown: BTreeMap::new(),
            next_message_id: 1,
        }
    }

    pub fn owned(&self, kind: ItemKind) -> &[String] {
        match kind {
            ItemKind::Hardware => &self.owned_hardware,
            ItemKind::AiModel => &self.owned_models,
            ItemKind::Prompt => &self.owned_prompts,
        }
    }

    pub fn owns(&self, kind: ItemKind, id: &str) -> bool {
        self.owned(kind).iter().any(|owned| owned == id)
    }

    /// Whether `id` is owned under any item kind.
    pub fn owns_any(&self, id: &str) -> bool {
        [ItemKind::Hardware, ItemKind::AiModel, ItemKind::Prompt]
            .into_iter()
            .any(|kind| self.owns(kind, id))
    }

    pub fn job(&self, job_id: &str) -> Option<&JobState> {
        self.active_jobs.iter().find(|j| j.job_id == job_id)
    }

    pub fn job_in_slot(&self, slot: u32) -> Option<&JobState> {
        self.active_jobs.iter().find(|j| j.assigned_slot == slot)
    }

    pub fn is_offered(&self, job_id: &str) -> bool {
        self.available_job_offers.iter().any(|j| j.id == job_id)
    }

    /// Offered, running, or finished: the job should not be offered again.
    pub fn is_job_taken(&self, job_id: &str) -> bool {
        self.is_offered(job_id)
            || self.job(job_id).is_some()
            || self.completed_job_ids.contains(job_id)
    }

    /// Current time as a stamp.
    pub fn stamp(&self, blocks_per_day: u32) -> GameStamp {
        GameStamp {
            day: self.day,
            block: blocks_per_day.saturating_sub(self.time_blocks_remaining),
        }
    }

    pub fn message(&self, id: u64) -> Option<&FeedMessage> {
        self.active_feed_messages.iter().find(|m| m.id == id)
    }

    pub fn apply_health_loss(&mut self, amount: u8) {
        self.health = self.health.saturating_sub(amount);
    }
}
