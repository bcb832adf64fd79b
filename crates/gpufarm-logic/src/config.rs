//! Tunable simulation parameters.
//!
//! Everything that is game balance rather than contract lives here: block
//! quotas, penalties, modifier coefficients, feed capacities. The defaults
//! give a playable game; hosts can override any subset from JSON since every
//! field falls back to its default when absent.
//!
//! ```
//! use gpufarm_logic::config::SimConfig;
//!
//! let config = SimConfig::from_json(r#"{ "blocks_per_day": 6 }"#).unwrap();
//! assert_eq!(config.blocks_per_day, 6);
//! assert_eq!(config.total_slots, SimConfig::default().total_slots);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coefficients for the linear equipment formulas in [`crate::modifiers`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierCoefficients {
    /// Speed gained per point of hardware power.
    pub speed_per_power: f32,
    /// Error reduction per point of hardware memory.
    pub error_per_memory: f32,
    /// Resolution bonus per point of hardware efficiency.
    pub resolution_per_efficiency: f32,
    /// Error reduction per point of AI model accuracy.
    pub error_per_accuracy: f32,
    /// Speed gained per point of AI model speed.
    pub speed_per_model_speed: f32,
    /// Resolution bonus per point of AI model accuracy.
    pub resolution_per_accuracy: f32,
}

impl Default for ModifierCoefficients {
    fn default() -> Self {
        Self {
            speed_per_power: 0.1,
            error_per_memory: 0.05,
            resolution_per_efficiency: 0.03,
            error_per_accuracy: 0.08,
            speed_per_model_speed: 0.05,
            resolution_per_accuracy: 0.05,
        }
    }
}

/// Full simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Time blocks in one in-game day.
    pub blocks_per_day: u32,
    /// Number of processing slots; valid slot ids are `1..=total_slots`.
    pub total_slots: u32,

    pub starting_credits: u32,
    pub starting_reputation: u32,
    pub starting_health: u8,
    /// Catalog jobs offered before the first rollover, cheapest complexity first.
    pub initial_offer_count: usize,

    /// Health lost at every day rollover.
    pub daily_health_decay: u8,
    /// Credits charged per owned hardware item at every day rollover.
    pub upkeep_per_hardware: u32,

    /// Progress fractions at which an error roll happens, ascending.
    pub error_thresholds: Vec<f32>,
    pub modifiers: ModifierCoefficients,
    /// Lower bound for the error multiplier; must be > 0.
    pub error_multiplier_floor: f32,

    /// Reputation lost when a quick resolution fails the job.
    pub quick_fail_reputation_penalty: u32,
    /// Health lost when a quick resolution fails the job.
    pub quick_fail_health_penalty: u8,

    /// Health spent on every guided resolution attempt.
    pub guided_health_cost: u8,
    /// Maximum value of a prompt quality attribute.
    pub prompt_quality_max: f32,
    /// Success probability of a guided resolution with a perfect prompt.
    pub guided_success_ceiling: f32,

    pub max_active_messages: usize,
    pub max_archived_messages: usize,
    /// Days a template stays unavailable after being shown.
    pub cooldown_days: u32,
    /// Upper bound on messages generated by one rollover.
    pub max_new_per_day: usize,
    /// From this day on, templates linking high-complexity jobs are boosted.
    pub high_complexity_day: u32,
    /// Job complexity at or above which a linked template counts as high-complexity.
    pub high_complexity_min: f32,
    /// Probability multiplier for boosted templates.
    pub high_complexity_boost: f32,

    /// Seed for the dispatcher's random source.
    pub seed: u64,
    /// Prior states retained by the dispatcher for inspection.
    pub history_depth: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            blocks_per_day: 8,
            total_slots: 4,
            starting_credits: 1000,
            starting_reputation: 0,
            starting_health: 100,
            initial_offer_count: 2,
            daily_health_decay: 5,
            upkeep_per_hardware: 10,
            error_thresholds: vec![0.25, 0.5, 0.75],
            modifiers: ModifierCoefficients::default(),
            error_multiplier_floor: 0.1,
            quick_fail_reputation_penalty: 10,
            quick_fail_health_penalty: 5,
            guided_health_cost: 2,
            prompt_quality_max: 10.0,
            guided_success_ceiling: 0.95,
            max_active_messages: 10,
            max_archived_messages: 25,
            cooldown_days: 3,
            max_new_per_day: 3,
            high_complexity_day: 5,
            high_complexity_min: 7.0,
            high_complexity_boost: 1.5,
            seed: 42,
            history_depth: 32,
        }
    }
}

/// Configuration values that would break simulation invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Parse(String),
    #[error("blocks_per_day must be at least 1")]
    NoBlocksPerDay,
    #[error("total_slots must be at least 1")]
    NoSlots,
    #[error("error threshold {0} must lie strictly between 0 and 1")]
    ThresholdOutOfRange(f32),
    #[error("error thresholds must be strictly ascending")]
    ThresholdsUnsorted,
    #[error("error_multiplier_floor must be > 0 (got {0})")]
    NonPositiveFloor(f32),
    #[error("prompt_quality_max must be > 0 (got {0})")]
    NonPositiveQualityMax(f32),
    #[error("guided_success_ceiling must be within [0, 1] (got {0})")]
    CeilingOutOfRange(f32),
    #[error("starting_health must be at most 100 (got {0})")]
    HealthOutOfRange(u8),
}

impl SimConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the simulation relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blocks_per_day == 0 {
            return Err(ConfigError::NoBlocksPerDay);
        }
        if self.total_slots == 0 {
            return Err(ConfigError::NoSlots);
        }
        for &t in &self.error_thresholds {
            if !(t > 0.0 && t < 1.0) {
                return Err(ConfigError::ThresholdOutOfRange(t));
            }
        }
        if self.error_thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::ThresholdsUnsorted);
        }
        if !(self.error_multiplier_floor > 0.0) {
            return Err(ConfigError::NonPositiveFloor(self.error_multiplier_floor));
        }
        if !(self.prompt_quality_max > 0.0) {
            return Err(ConfigError::NonPositiveQualityMax(self.prompt_quality_max));
        }
        if !(0.0..=1.0).contains(&self.guided_success_ceiling) {
            return Err(ConfigError::CeilingOutOfRange(self.guided_success_ceiling));
        }
        if self.starting_health > 100 {
            return Err(ConfigError::HealthOutOfRange(self.starting_health));
        }
        Ok(())
    }
}
