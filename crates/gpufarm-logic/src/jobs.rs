//! Job lifecycle: assignment, progress ticks, error thresholds, payout.
//!
//! # Progress
//!
//! Each tick a running job advances by
//! `blocks_elapsed / baseline_duration × speed_multiplier`, clamped to
//! [0, 1]. Every configured threshold the job passes for the first time gets
//! one error roll. The first roll that hits stops the tick: the job enters
//! [`JobStatus::Error`] with its progress held at the threshold, so the
//! remaining thresholds still get their rolls once the error is resolved.
//!
//! ```
//! use gpufarm_logic::jobs::tick_job;
//! use gpufarm_logic::modifiers::Modifiers;
//! use gpufarm_logic::state::{JobState, JobStatus};
//! # use gpufarm_logic::catalog::JobRecord;
//! # let record = JobRecord {
//! #     id: "render".into(), title: "Render".into(), description: String::new(),
//! #     cost: 0, complexity: 1.0, baseline_duration: 4.0, error_rate: 0.0,
//! #     resolution_rate: 0.5, reward: 50, reputation_reward: 1,
//! # };
//! let mut rng = rand::thread_rng();
//! let mut job = JobState::assign(&record, 1);
//! for _ in 0..4 {
//!     job = tick_job(&job, 1, &Modifiers::NEUTRAL, &[0.25, 0.5, 0.75], &mut rng);
//! }
//! assert_eq!(job.progress, 1.0);
//! assert_eq!(job.status, JobStatus::Completed);
//! ```

use rand::Rng;

use crate::commands::CommandError;
use crate::config::SimConfig;
use crate::modifiers::Modifiers;
use crate::state::{ErrorRecord, GameState, JobState, JobStatus};

/// Progress this close to 1.0 counts as done (absorbs float drift from
/// durations like 3 blocks).
const COMPLETION_EPSILON: f32 = 1e-4;

/// Roll for an error at a threshold crossing.
pub fn roll_error(job: &JobState, modifiers: &Modifiers, rng: &mut impl Rng) -> bool {
    let rate = (job.base_error_rate * modifiers.error_multiplier).clamp(0.0, 1.0);
    rng.gen::<f32>() < rate
}

/// Advance one job by `blocks_elapsed` blocks. Non-running jobs are returned unchanged.
pub fn tick_job(
    job: &JobState,
    blocks_elapsed: u32,
    modifiers: &Modifiers,
    thresholds: &[f32],
    rng: &mut impl Rng,
) -> JobState {
    let mut next = job.clone();
    if job.status != JobStatus::Running || blocks_elapsed == 0 {
        return next;
    }

    let increment =
        blocks_elapsed as f32 / job.baseline_duration.max(f32::EPSILON) * modifiers.speed_multiplier;
    let before = job.progress;
    let mut after = (before + increment).clamp(before, 1.0);
    if after >= 1.0 - COMPLETION_EPSILON {
        after = 1.0;
    }
    next.progress = after;

    for &threshold in thresholds {
        let crossed = before < threshold && after >= threshold;
        if crossed && !job.has_errored_at(threshold) && roll_error(job, modifiers, rng) {
            next.status = JobStatus::Error;
            next.progress = threshold;
            next.error_history.push(ErrorRecord { threshold });
            return next;
        }
    }

    if next.progress >= 1.0 {
        next.status = JobStatus::Completed;
    }
    next
}

/// Put an offered job into a free slot.
pub fn assign_job_to_slot(
    state: &GameState,
    job_id: &str,
    slot: u32,
    config: &SimConfig,
) -> Result<GameState, CommandError> {
    if slot == 0 || slot > config.total_slots {
        return Err(CommandError::InvalidSlot {
            slot,
            total: config.total_slots,
        });
    }
    if let Some(occupant) = state.job_in_slot(slot) {
        return Err(CommandError::SlotOccupied {
            slot,
            job_id: occupant.job_id.clone(),
        });
    }
    if state.job(job_id).is_some() {
        return Err(CommandError::JobAlreadyActive(job_id.to_string()));
    }
    let index = state
        .available_job_offers
        .iter()
        .position(|j| j.id == job_id)
        .ok_or_else(|| CommandError::UnknownJob(job_id.to_string()))?;

    let cost = state.available_job_offers[index].cost;
    if state.credits < cost {
        return Err(CommandError::InsufficientCredits {
            needed: cost,
            available: state.credits,
        });
    }

    let mut next = state.clone();
    let record = next.available_job_offers.remove(index);
    next.credits -= cost;
    next.active_jobs.push(JobState::assign(&record, slot));
    log::info!("job '{}' assigned to slot {}", record.id, slot);
    Ok(next)
}

/// A completed job that was paid out and removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Payout {
    pub job_id: String,
    pub credits: u32,
    pub reputation: u32,
}

/// Pay out and remove every completed job, recording its id.
pub fn settle_completed(state: &mut GameState) -> Vec<Payout> {
    let (done, remaining): (Vec<JobState>, Vec<JobState>) = std::mem::take(&mut state.active_jobs)
        .into_iter()
        .partition(|j| j.status == JobStatus::Completed);
    state.active_jobs = remaining;

    done.into_iter()
        .map(|job| {
            state.credits = state.credits.saturating_add(job.reward);
            state.reputation = state.reputation.saturating_add(job.reputation_reward);
            state.completed_job_ids.insert(job.job_id.clone());
            log::info!(
                "job '{}' completed: +{} credits, +{} reputation",
                job.job_id,
                job.reward,
                job.reputation_reward
            );
            Payout {
                job_id: job.job_id,
                credits: job.reward,
                reputation: job.reputation_reward,
            }
        })
        .collect()
}
