//! Feed generation and player actions on feed messages.
//!
//! # Generation
//!
//! At each day rollover every template is checked in catalog order:
//!
//! 1. **Cooldown**: a template shown on day `d` is unavailable until day
//!    `d + cooldown_days`.
//! 2. **Context**: [`effective_probability`] drops to zero when the
//!    advertised item is already owned or the linked job is already offered,
//!    running or done, and is boosted for high-complexity jobs later in the
//!    game.
//! 3. **Draw**: one independent uniform draw against that probability.
//!
//! From the templates that pass, up to `max_new_per_day` (and never more
//! than the free room in the active queue) are picked: first one per
//! [`MessageType`] when available, then the rest at random. New messages go
//! to the front of the active queue.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{MessageAction, MessageTemplate, MessageType};
use crate::commands::CommandError;
use crate::config::SimConfig;
use crate::state::{FeedMessage, GameState};

/// What the player does with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedAction {
    /// Take the linked job offer.
    Accept,
    /// Mark as read; the message stays in the active queue.
    Open,
    Dismiss,
    Archive,
}

/// Whether `template` is still inside its cooldown window.
pub fn is_cooling_down(template: &MessageTemplate, state: &GameState, config: &SimConfig) -> bool {
    state
        .template_last_shown
        .get(&template.id)
        .is_some_and(|&shown| state.day < shown.saturating_add(config.cooldown_days))
}

/// Template probability after contextual gates, in [0, 1].
pub fn effective_probability(
    template: &MessageTemplate,
    state: &GameState,
    config: &SimConfig,
) -> f32 {
    if let Some(item) = &template.advertises {
        if state.owns_any(item) {
            return 0.0;
        }
    }

    let mut probability = template.probability;
    if let Some(job_id) = &template.linked_job {
        let Some(job) = state.catalog.job(job_id) else {
            return 0.0;
        };
        if state.is_job_taken(job_id) {
            return 0.0;
        }
        if state.day >= config.high_complexity_day && job.complexity >= config.high_complexity_min
        {
            probability *= config.high_complexity_boost.max(0.0);
        }
    }
    probability.clamp(0.0, 1.0)
}

/// Templates that pass cooldown, context and their draw this rollover.
///
/// At most one template per linked job makes it through.
pub fn eligible_templates<'a>(
    state: &'a GameState,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Vec<&'a MessageTemplate> {
    let mut linked: HashSet<&str> = HashSet::new();
    let mut eligible = Vec::new();
    for template in &state.catalog.templates {
        if is_cooling_down(template, state, config) {
            continue;
        }
        let p = effective_probability(template, state, config);
        if p <= 0.0 || rng.gen::<f32>() >= p {
            continue;
        }
        if let Some(job_id) = template.linked_job.as_deref() {
            if !linked.insert(job_id) {
                continue;
            }
        }
        eligible.push(template);
    }
    eligible
}

fn pick_diverse<'a>(
    mut pool: Vec<&'a MessageTemplate>,
    limit: usize,
    rng: &mut impl Rng,
) -> Vec<&'a MessageTemplate> {
    let mut picked = Vec::with_capacity(limit);
    for message_type in MessageType::ALL {
        if picked.len() >= limit {
            return picked;
        }
        let candidates: Vec<usize> = pool
            .iter()
            .enumerate()
            .filter(|(_, t)| t.message_type == message_type)
            .map(|(i, _)| i)
            .collect();
        if let Some(&index) = candidates.choose(rng) {
            picked.push(pool.remove(index));
        }
    }
    pool.shuffle(rng);
    picked.extend(pool.into_iter().take(limit - picked.len()));
    picked
}

fn instantiate(
    template: &MessageTemplate,
    id: u64,
    state: &GameState,
    config: &SimConfig,
) -> FeedMessage {
    let job_title = template
        .linked_job
        .as_deref()
        .and_then(|job_id| state.catalog.job(job_id))
        .map(|job| job.title.as_str());
    let body = match job_title {
        Some(title) => template.body.replace("{job}", title),
        None => template.body.clone(),
    };
    FeedMessage {
        id,
        template_id: template.id.clone(),
        message_type: template.message_type,
        title: template.title.clone(),
        body,
        action: template.action,
        linked_job: template.linked_job.clone(),
        created_at: state.stamp(config.blocks_per_day),
        read: false,
    }
}

/// End-of-day feed generation.
pub fn generate_offers(state: &GameState, config: &SimConfig, rng: &mut impl Rng) -> GameState {
    let capacity = config
        .max_active_messages
        .saturating_sub(state.active_feed_messages.len());
    let limit = config.max_new_per_day.min(capacity);
    let mut next = state.clone();
    if limit == 0 {
        log::debug!("feed full, no new messages on day {}", state.day);
        return next;
    }

    let eligible = eligible_templates(state, config, rng);
    let eligible_count = eligible.len();
    let picked = pick_diverse(eligible, limit, rng);

    let mut fresh = Vec::with_capacity(picked.len());
    for template in picked {
        let message = instantiate(template, next.next_message_id, state, config);
        next.next_message_id += 1;
        next.template_last_shown.insert(template.id.clone(), state.day);
        fresh.push(message);
    }
    log::debug!(
        "day {}: {} of {} eligible templates posted",
        state.day,
        fresh.len(),
        eligible_count
    );

    fresh.append(&mut next.active_feed_messages);
    fresh.truncate(config.max_active_messages);
    next.active_feed_messages = fresh;
    next
}

fn archive(state: &mut GameState, message: FeedMessage, max: usize) {
    state.archived_feed_messages.insert(0, message);
    state.archived_feed_messages.truncate(max);
}

/// Apply a player action to an active message.
pub fn resolve_feed_action(
    state: &GameState,
    message_id: u64,
    action: FeedAction,
    config: &SimConfig,
) -> Result<GameState, CommandError> {
    let index = state
        .active_feed_messages
        .iter()
        .position(|m| m.id == message_id)
        .ok_or(CommandError::UnknownMessage(message_id))?;
    let message = &state.active_feed_messages[index];

    match action {
        FeedAction::Dismiss | FeedAction::Archive => {
            let mut next = state.clone();
            let message = next.active_feed_messages.remove(index);
            archive(&mut next, message, config.max_archived_messages);
            Ok(next)
        }
        FeedAction::Open => {
            let mut next = state.clone();
            next.active_feed_messages[index].read = true;
            Ok(next)
        }
        FeedAction::Accept => {
            let job_id = match (&message.action, &message.linked_job) {
                (Some(MessageAction::AcceptJob), Some(job_id)) => job_id,
                _ => {
                    return Err(CommandError::ActionNotOffered { message_id, action });
                }
            };
            let record = state
                .catalog
                .job(job_id)
                .ok_or_else(|| CommandError::UnknownJob(job_id.clone()))?;
            if state.is_offered(job_id) {
                log::warn!("offer '{}' from message {} already available", job_id, message_id);
                return Err(CommandError::DuplicateOffer(job_id.clone()));
            }
            if state.job(job_id).is_some() {
                return Err(CommandError::JobAlreadyActive(job_id.clone()));
            }

            let mut next = state.clone();
            next.available_job_offers.push(record.clone());
            next.active_feed_messages.remove(index);
            log::info!("accepted offer '{}' from message {}", job_id, message_id);
            Ok(next)
        }
    }
}
