//! Clearing a job's error state.
//!
//! Two paths, both only valid for a job in [`JobStatus::Error`]:
//!
//! - **Quick ("YOLO")**: free, odds are the job's base resolution rate scaled
//!   by the equipment resolution multiplier. Losing the gamble fails the job
//!   outright and costs reputation and health.
//! - **Guided**: uses an owned prompt. Odds come from the prompt's mean
//!   quality against `prompt_quality_max`, capped by
//!   `guided_success_ceiling`, and ignore equipment. Every attempt costs
//!   health; a success also burns a time block. A failed attempt leaves the
//!   job in error so the player can try again.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::PromptRecord;
use crate::commands::CommandError;
use crate::config::SimConfig;
use crate::modifiers::{compute_modifiers, Modifiers};
use crate::state::{GameState, ItemKind, JobState, JobStatus};
use crate::time;

/// Result of a resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionOutcome {
    /// The job is running again.
    Resolved,
    /// The job failed and was removed.
    Failed,
    /// Guided attempt missed; the job is still in error.
    StillErrored,
}

/// Quick-resolution success probability.
pub fn quick_success_rate(job: &JobState, modifiers: &Modifiers) -> f32 {
    (job.base_resolution_success_rate * modifiers.resolution_multiplier).clamp(0.0, 1.0)
}

/// Guided-resolution success probability for a prompt.
pub fn guided_success_rate(prompt: &PromptRecord, config: &SimConfig) -> f32 {
    let quality = (prompt.quality() / config.prompt_quality_max).clamp(0.0, 1.0);
    (quality * config.guided_success_ceiling).clamp(0.0, 1.0)
}

fn errored_job<'a>(state: &'a GameState, job_id: &str) -> Result<&'a JobState, CommandError> {
    let job = state
        .job(job_id)
        .ok_or_else(|| CommandError::UnknownJob(job_id.to_string()))?;
    if job.status != JobStatus::Error {
        return Err(CommandError::JobNotErrored {
            job_id: job_id.to_string(),
            status: job.status,
        });
    }
    Ok(job)
}

fn resume(state: &mut GameState, job_id: &str) {
    if let Some(job) = state.active_jobs.iter_mut().find(|j| j.job_id == job_id) {
        job.status = JobStatus::Running;
        job.error_history.pop();
    }
}

/// Gamble on clearing the error for free.
pub fn attempt_quick_resolution(
    state: &GameState,
    job_id: &str,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Result<(GameState, ResolutionOutcome), CommandError> {
    let job = errored_job(state, job_id)?;
    let rate = quick_success_rate(job, &compute_modifiers(state, config));
    let mut next = state.clone();

    if rng.gen::<f32>() < rate {
        resume(&mut next, job_id);
        log::info!("quick fix on '{}' succeeded (p={:.2})", job_id, rate);
        return Ok((next, ResolutionOutcome::Resolved));
    }

    next.active_jobs.retain(|j| j.job_id != job_id);
    next.reputation = next
        .reputation
        .saturating_sub(config.quick_fail_reputation_penalty);
    next.apply_health_loss(config.quick_fail_health_penalty);
    log::info!(
        "quick fix on '{}' failed (p={:.2}); job lost, -{} reputation",
        job_id,
        rate,
        config.quick_fail_reputation_penalty
    );
    Ok((next, ResolutionOutcome::Failed))
}

/// Work through the error with an owned prompt.
pub fn attempt_guided_resolution(
    state: &GameState,
    job_id: &str,
    tool_id: &str,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Result<(GameState, ResolutionOutcome), CommandError> {
    errored_job(state, job_id)?;
    let prompt = state
        .catalog
        .prompt(tool_id)
        .ok_or_else(|| CommandError::UnknownTool(tool_id.to_string()))?;
    if !state.owns(ItemKind::Prompt, tool_id) {
        return Err(CommandError::ToolNotOwned(tool_id.to_string()));
    }

    let rate = guided_success_rate(prompt, config);
    let mut next = state.clone();
    next.apply_health_loss(config.guided_health_cost);

    if rng.gen::<f32>() < rate {
        resume(&mut next, job_id);
        next = time::consume_block(&next, config, rng);
        log::info!(
            "guided fix on '{}' with '{}' succeeded (p={:.2})",
            job_id,
            tool_id,
            rate
        );
        Ok((next, ResolutionOutcome::Resolved))
    } else {
        log::info!(
            "guided fix on '{}' with '{}' missed (p={:.2})",
            job_id,
            tool_id,
            rate
        );
        Ok((next, ResolutionOutcome::StillErrored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, HardwareRecord, JobRecord};
    use crate::state::ErrorRecord;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn prompt(id: &str, quality: f32) -> PromptRecord {
        PromptRecord {
            id: id.into(),
            name: id.into(),
            cost: 10,
            clarity: quality,
            specificity: quality,
            adaptability: quality,
        }
    }

    fn errored_state(resolution_rate: f32) -> GameState {
        let record = JobRecord {
            id: "train".into(),
            title: "Train".into(),
            description: String::new(),
            cost: 0,
            complexity: 3.0,
            baseline_duration: 4.0,
            error_rate: 0.5,
            resolution_rate,
            reward: 200,
            reputation_reward: 5,
        };
        let catalog = Catalog {
            hardware: vec![HardwareRecord {
                id: "eff".into(),
                name: "Efficient".into(),
                cost: 0,
                power: 0.0,
                memory: 0.0,
                efficiency: 100.0,
            }],
            prompts: vec![prompt("perfect", 10.0), prompt("useless", 0.0)],
            ..Catalog::default()
        };
        let mut state = GameState::new(catalog, &SimConfig::default());
        state.reputation = 50;
        let mut job = JobState::assign(&record, 1);
        job.progress = 0.25;
        job.status = JobStatus::Error;
        job.error_history.push(ErrorRecord { threshold: 0.25 });
        state.active_jobs.push(job);
        state
    }

    #[test]
    fn test_quick_rate_zero_always_fails() {
        let config = SimConfig::default();
        for seed in 0..50 {
            let state = errored_state(0.0);
            let mut rng = StdRng::seed_from_u64(seed);
            let (next, outcome) =
                attempt_quick_resolution(&state, "train", &config, &mut rng).unwrap();
            assert_eq!(outcome, ResolutionOutcome::Failed);
            assert!(next.job("train").is_none());
            assert_eq!(next.reputation, 50 - config.quick_fail_reputation_penalty);
            assert_eq!(next.health, 100 - config.quick_fail_health_penalty);
        }
    }

    #[test]
    fn test_quick_success_resumes_and_pops_history() {
        let state = errored_state(1.0);
        let mut rng = StdRng::seed_from_u64(9);
        let (next, outcome) =
            attempt_quick_resolution(&state, "train", &SimConfig::default(), &mut rng).unwrap();
        assert_eq!(outcome, ResolutionOutcome::Resolved);
        let job = next.job("train").unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.error_history.is_empty());
        assert_eq!(job.progress, 0.25);
        // No time cost.
        assert_eq!(next.time_blocks_remaining, state.time_blocks_remaining);
    }

    #[test]
    fn test_quick_rate_uses_resolution_multiplier() {
        let mut state = errored_state(0.5);
        state.owned_hardware.push("eff".into());
        let config = SimConfig::default();
        let job = state.job("train").unwrap();
        let rate = quick_success_rate(job, &compute_modifiers(&state, &config));
        // 0.5 * (1 + 100 * 0.03) clamps to 1.
        assert_eq!(rate, 1.0);
    }

    #[test]
    fn test_quick_on_running_job_rejected() {
        let mut state = errored_state(1.0);
        state.active_jobs[0].status = JobStatus::Running;
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            attempt_quick_resolution(&state, "train", &SimConfig::default(), &mut rng),
            Err(CommandError::JobNotErrored {
                job_id: "train".into(),
                status: JobStatus::Running
            })
        );
    }

    #[test]
    fn test_guided_requires_owned_prompt() {
        let state = errored_state(0.5);
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            attempt_guided_resolution(&state, "train", "perfect", &config, &mut rng),
            Err(CommandError::ToolNotOwned("perfect".into()))
        );
        assert_eq!(
            attempt_guided_resolution(&state, "train", "nope", &config, &mut rng),
            Err(CommandError::UnknownTool("nope".into()))
        );
    }

    #[test]
    fn test_guided_success_costs_block_and_health() {
        let config = SimConfig {
            guided_success_ceiling: 1.0,
            ..SimConfig::default()
        };
        let mut state = errored_state(0.0);
        state.owned_prompts.push("perfect".into());
        let mut rng = StdRng::seed_from_u64(5);
        let (next, outcome) =
            attempt_guided_resolution(&state, "train", "perfect", &config, &mut rng).unwrap();
        assert_eq!(outcome, ResolutionOutcome::Resolved);
        assert_eq!(next.job("train").unwrap().status, JobStatus::Running);
        assert_eq!(next.time_blocks_remaining, state.time_blocks_remaining - 1);
        assert_eq!(next.health, state.health - config.guided_health_cost);
    }

    #[test]
    fn test_guided_miss_keeps_error_and_block() {
        let config = SimConfig::default();
        let mut state = errored_state(1.0);
        state.owned_prompts.push("useless".into());
        let mut rng = StdRng::seed_from_u64(5);
        let (next, outcome) =
            attempt_guided_resolution(&state, "train", "useless", &config, &mut rng).unwrap();
        assert_eq!(outcome, ResolutionOutcome::StillErrored);
        let job = next.job("train").unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error_history.len(), 1);
        assert_eq!(next.time_blocks_remaining, state.time_blocks_remaining);
        assert_eq!(next.health, state.health - config.guided_health_cost);
    }

    #[test]
    fn test_guided_rate_scales_with_quality() {
        let config = SimConfig::default();
        let half = guided_success_rate(&prompt("half", 5.0), &config);
        let full = guided_success_rate(&prompt("full", 10.0), &config);
        let over = guided_success_rate(&prompt("over", 40.0), &config);
        assert!((half - 0.5 * config.guided_success_ceiling).abs() < 1e-6);
        assert!((full - config.guided_success_ceiling).abs() < 1e-6);
        assert_eq!(full, over);
    }
}
