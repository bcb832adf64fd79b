//! Day and block progression.
//!
//! A day has `blocks_per_day` blocks. Spending a block decrements
//! `time_blocks_remaining`; when it reaches zero the day rolls over:
//!
//! 1. `day += 1` and the block counter resets
//! 2. health decays by `daily_health_decay`
//! 3. upkeep is charged per owned GPU
//! 4. the feed is refilled via [`feed::generate_offers`]
//!
//! Then every running job ticks by one block and completed jobs are paid out.
//! Multi-block advances are always processed one block at a time so
//! rollovers and error rolls happen in the same order no matter how the
//! caller batches time.

use rand::Rng;

use crate::config::SimConfig;
use crate::feed;
use crate::jobs::{self, tick_job};
use crate::modifiers::compute_modifiers;
use crate::state::{GameState, JobStatus};

fn roll_over_day(state: &GameState, config: &SimConfig, rng: &mut impl Rng) -> GameState {
    let mut next = state.clone();
    next.day += 1;
    next.time_blocks_remaining = config.blocks_per_day;
    next.apply_health_loss(config.daily_health_decay);

    let upkeep = config
        .upkeep_per_hardware
        .saturating_mul(next.owned_hardware.len() as u32);
    next.credits = next.credits.saturating_sub(upkeep);

    log::info!(
        "day {} begins: health {}, credits {} (upkeep {})",
        next.day,
        next.health,
        next.credits,
        upkeep
    );
    feed::generate_offers(&next, config, rng)
}

/// Spend one block of the day without ticking jobs, rolling the day over
/// when the counter hits zero.
pub fn consume_block(state: &GameState, config: &SimConfig, rng: &mut impl Rng) -> GameState {
    let mut next = state.clone();
    next.time_blocks_remaining = next.time_blocks_remaining.saturating_sub(1);
    if next.time_blocks_remaining == 0 {
        next = roll_over_day(&next, config, rng);
    }
    next
}

/// One full block: consume it, then tick running jobs and settle completions.
pub fn advance_block(state: &GameState, config: &SimConfig, rng: &mut impl Rng) -> GameState {
    let mut next = consume_block(state, config, rng);
    let modifiers = compute_modifiers(&next, config);

    let mut ticked = Vec::with_capacity(next.active_jobs.len());
    for job in &next.active_jobs {
        let after = tick_job(job, 1, &modifiers, &config.error_thresholds, rng);
        if job.status == JobStatus::Running && after.status == JobStatus::Error {
            log::warn!(
                "job '{}' in slot {} hit an error at {:.0}%",
                after.job_id,
                after.assigned_slot,
                after.progress * 100.0
            );
        }
        ticked.push(after);
    }
    next.active_jobs = ticked;
    jobs::settle_completed(&mut next);
    next
}

/// Advance `blocks` whole blocks.
pub fn advance_time(
    state: &GameState,
    blocks: u32,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> GameState {
    let mut next = state.clone();
    for _ in 0..blocks {
        next = advance_block(&next, config, rng);
    }
    next
}

/// Real-time driver input: accumulate a fraction of a block and process
/// every whole block it completes. Negative or non-finite input is ignored.
pub fn advance_progress(
    state: &GameState,
    fraction: f32,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> GameState {
    if !fraction.is_finite() || fraction <= 0.0 {
        return state.clone();
    }
    let total = state.block_progress + fraction;
    let whole = total.floor();
    let mut next = advance_time(state, whole as u32, config, rng);
    next.block_progress = total - whole;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, HardwareRecord, JobRecord};
    use crate::state::JobState;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quiet_job(id: &str, duration: f32) -> JobRecord {
        JobRecord {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            cost: 0,
            complexity: 1.0,
            baseline_duration: duration,
            error_rate: 0.0,
            resolution_rate: 0.5,
            reward: 120,
            reputation_reward: 4,
        }
    }

    fn fresh(config: &SimConfig) -> GameState {
        let catalog = Catalog {
            hardware: vec![HardwareRecord {
                id: "gpu".into(),
                name: "GPU".into(),
                cost: 100,
                power: 0.0,
                memory: 0.0,
                efficiency: 0.0,
            }],
            ..Catalog::default()
        };
        GameState::new(catalog, config)
    }

    #[test]
    fn test_single_block_decrements() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let state = fresh(&config);
        let next = advance_block(&state, &config, &mut rng);
        assert_eq!(next.time_blocks_remaining, config.blocks_per_day - 1);
        assert_eq!(next.day, 1);
    }

    #[test]
    fn test_rollover_applies_decay_once() {
        let config = SimConfig {
            blocks_per_day: 4,
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = fresh(&config);
        state.time_blocks_remaining = 1;
        state.health = 80;

        let next = advance_time(&state, 1, &config, &mut rng);
        assert_eq!(next.day, 2);
        assert_eq!(next.time_blocks_remaining, 4);
        assert_eq!(next.health, 80 - config.daily_health_decay);
    }

    #[test]
    fn test_full_day_in_one_call() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let state = fresh(&config);
        let next = advance_time(&state, config.blocks_per_day * 2, &config, &mut rng);
        assert_eq!(next.day, 3);
        assert_eq!(next.time_blocks_remaining, config.blocks_per_day);
        assert_eq!(next.health, 100 - 2 * config.daily_health_decay);
    }

    #[test]
    fn test_upkeep_per_owned_gpu() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = fresh(&config);
        state.owned_hardware.push("gpu".into());
        state.time_blocks_remaining = 1;
        let next = advance_block(&state, &config, &mut rng);
        assert_eq!(next.credits, state.credits - config.upkeep_per_hardware);
    }

    #[test]
    fn test_upkeep_saturates() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = fresh(&config);
        state.owned_hardware.push("gpu".into());
        state.credits = 3;
        state.time_blocks_remaining = 1;
        assert_eq!(advance_block(&state, &config, &mut rng).credits, 0);
    }

    #[test]
    fn test_job_completes_and_pays() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = fresh(&config);
        state.active_jobs.push(JobState::assign(&quiet_job("j", 2.0), 1));
        let credits = state.credits;

        let mid = advance_block(&state, &config, &mut rng);
        assert_eq!(mid.job("j").map(|j| j.progress), Some(0.5));

        let done = advance_block(&mid, &config, &mut rng);
        assert!(done.job("j").is_none());
        assert!(done.completed_job_ids.contains("j"));
        assert_eq!(done.credits, credits + 120);
        assert_eq!(done.reputation, 4);
    }

    #[test]
    fn test_consume_block_does_not_tick() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = fresh(&config);
        state.active_jobs.push(JobState::assign(&quiet_job("j", 2.0), 1));
        let next = consume_block(&state, &config, &mut rng);
        assert_eq!(next.job("j").map(|j| j.progress), Some(0.0));
        assert_eq!(next.time_blocks_remaining, config.blocks_per_day - 1);
    }

    #[test]
    fn test_zero_blocks_is_noop() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let state = fresh(&config);
        assert_eq!(advance_time(&state, 0, &config, &mut rng), state);
    }

    #[test]
    fn test_progress_accumulates_fractions() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let state = fresh(&config);

        let a = advance_progress(&state, 0.5, &config, &mut rng);
        assert_eq!(a.time_blocks_remaining, config.blocks_per_day);
        assert_eq!(a.block_progress, 0.5);

        let b = advance_progress(&a, 0.75, &config, &mut rng);
        assert_eq!(b.time_blocks_remaining, config.blocks_per_day - 1);
        assert!((b.block_progress - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_progress_ignores_bad_input() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let state = fresh(&config);
        for bad in [-1.0, f32::NAN, f32::INFINITY, 0.0] {
            assert_eq!(advance_progress(&state, bad, &config, &mut rng), state);
        }
    }
}
