//! The command surface exposed to the UI, and the shared diagnostic type.
//!
//! Every player action and time step is a [`Command`]. [`apply_command`]
//! maps the prior state to the next one or returns a [`CommandError`]; in the
//! error case the caller keeps the prior state, so an invalid command is a
//! no-op with a diagnostic, never a crash.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SimConfig;
use crate::feed::{self, FeedAction};
use crate::jobs;
use crate::resolution::{self, ResolutionOutcome};
use crate::state::{GameState, ItemKind, JobStatus};
use crate::time;

/// Why a command was rejected. The state is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown job '{0}'")]
    UnknownJob(String),
    #[error("job '{0}' is already running")]
    JobAlreadyActive(String),
    #[error("slot {slot} does not exist (slots are 1..={total})")]
    InvalidSlot { slot: u32, total: u32 },
    #[error("slot {slot} is occupied by '{job_id}'")]
    SlotOccupied { slot: u32, job_id: String },
    #[error("unknown {kind:?} item '{id}'")]
    UnknownItem { kind: ItemKind, id: String },
    #[error("item '{0}' is already owned")]
    AlreadyOwned(String),
    #[error("insufficient credits: need {needed}, have {available}")]
    InsufficientCredits { needed: u32, available: u32 },
    #[error("job '{job_id}' is {status:?}, not in error")]
    JobNotErrored { job_id: String, status: JobStatus },
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("tool '{0}' is not owned")]
    ToolNotOwned(String),
    #[error("unknown feed message {0}")]
    UnknownMessage(u64),
    #[error("message {message_id} does not offer {action:?}")]
    ActionNotOffered { message_id: u64, action: FeedAction },
    #[error("job '{0}' is already on offer")]
    DuplicateOffer(String),
}

/// A request to change the game state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    AdvanceTime { blocks: u32 },
    /// Real-time driver input: a fraction of a block elapsed.
    AdvanceProgress { fraction: f32 },
    AssignJob { job_id: String, slot: u32 },
    Purchase { item_id: String, kind: ItemKind },
    QuickResolve { job_id: String },
    GuidedResolve { job_id: String, tool_id: String },
    Feed { message_id: u64, action: FeedAction },
}

/// What an accepted command did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEffect {
    TimeAdvanced { day: u32, blocks_remaining: u32 },
    JobAssigned { job_id: String, slot: u32 },
    Purchased { item_id: String, cost: u32 },
    Resolution { job_id: String, outcome: ResolutionOutcome },
    FeedUpdated { message_id: u64, action: FeedAction },
}

/// Buy a catalog item. Ownership is a set: buying twice is rejected.
pub fn purchase_item(
    state: &GameState,
    item_id: &str,
    kind: ItemKind,
) -> Result<GameState, CommandError> {
    let catalog = &state.catalog;
    let cost = match kind {
        ItemKind::Hardware => catalog.hardware(item_id).map(|r| r.cost),
        ItemKind::AiModel => catalog.ai_model(item_id).map(|r| r.cost),
        ItemKind::Prompt => catalog.prompt(item_id).map(|r| r.cost),
    }
    .ok_or_else(|| CommandError::UnknownItem {
        kind,
        id: item_id.to_string(),
    })?;

    if state.owns(kind, item_id) {
        return Err(CommandError::AlreadyOwned(item_id.to_string()));
    }
    if state.credits < cost {
        return Err(CommandError::InsufficientCredits {
            needed: cost,
            available: state.credits,
        });
    }

    let mut next = state.clone();
    next.credits -= cost;
    let owned = match kind {
        ItemKind::Hardware => &mut next.owned_hardware,
        ItemKind::AiModel => &mut next.owned_models,
        ItemKind::Prompt => &mut next.owned_prompts,
    };
    owned.push(item_id.to_string());
    log::info!("purchased {:?} '{}' for {} credits", kind, item_id, cost);
    Ok(next)
}

/// Apply one command to `state`, producing the next state.
pub fn apply_command(
    state: &GameState,
    command: &Command,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Result<(GameState, CommandEffect), CommandError> {
    match command {
        Command::AdvanceTime { blocks } => {
            let next = time::advance_time(state, *blocks, config, rng);
            let effect = CommandEffect::TimeAdvanced {
                day: next.day,
                blocks_remaining: next.time_blocks_remaining,
            };
            Ok((next, effect))
        }
        Command::AdvanceProgress { fraction } => {
            let next = time::advance_progress(state, *fraction, config, rng);
            let effect = CommandEffect::TimeAdvanced {
                day: next.day,
                blocks_remaining: next.time_blocks_remaining,
            };
            Ok((next, effect))
        }
        Command::AssignJob { job_id, slot } => {
            let next = jobs::assign_job_to_slot(state, job_id, *slot, config)?;
            Ok((
                next,
                CommandEffect::JobAssigned {
                    job_id: job_id.clone(),
                    slot: *slot,
                },
            ))
        }
        Command::Purchase { item_id, kind } => {
            let next = purchase_item(state, item_id, *kind)?;
            let cost = state.credits - next.credits;
            Ok((
                next,
                CommandEffect::Purchased {
                    item_id: item_id.clone(),
                    cost,
                },
            ))
        }
        Command::QuickResolve { job_id } => {
            let (next, outcome) =
                resolution::attempt_quick_resolution(state, job_id, config, rng)?;
            Ok((
                next,
                CommandEffect::Resolution {
                    job_id: job_id.clone(),
                    outcome,
                },
            ))
        }
        Command::GuidedResolve { job_id, tool_id } => {
            let (next, outcome) =
                resolution::attempt_guided_resolution(state, job_id, tool_id, config, rng)?;
            Ok((
                next,
                CommandEffect::Resolution {
                    job_id: job_id.clone(),
                    outcome,
                },
            ))
        }
        Command::Feed { message_id, action } => {
            let next = feed::resolve_feed_action(state, *message_id, *action, config)?;
            Ok((
                next,
                CommandEffect::FeedUpdated {
                    message_id: *message_id,
                    action: *action,
                },
            ))
        }
    }
}
