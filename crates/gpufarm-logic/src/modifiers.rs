//! Equipment-derived multipliers.
//!
//! Only the best piece of each category counts: the owned GPU with the most
//! power and the owned AI model with the best accuracy. Each contributes a
//! linear factor per attribute. Error factors are applied as `1 / (1 + x·k)`
//! so they shrink monotonically without ever crossing zero, and the product
//! is then floored at `error_multiplier_floor`.
//!
//! Modifiers are never stored; callers recompute them whenever they need
//! them, so they always reflect current ownership.

use serde::{Deserialize, Serialize};

use crate::catalog::{AiModelRecord, HardwareRecord};
use crate::config::SimConfig;
use crate::state::GameState;

/// Multipliers applied to job speed, error chance, and quick-resolution odds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    pub speed_multiplier: f32,
    pub error_multiplier: f32,
    pub resolution_multiplier: f32,
}

impl Modifiers {
    /// No equipment: everything at 1.0.
    pub const NEUTRAL: Modifiers = Modifiers {
        speed_multiplier: 1.0,
        error_multiplier: 1.0,
        resolution_multiplier: 1.0,
    };
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Owned hardware with the highest power. Ties go to the earliest purchase.
pub fn active_hardware(state: &GameState) -> Option<&HardwareRecord> {
    let mut best: Option<&HardwareRecord> = None;
    for hw in state
        .owned_hardware
        .iter()
        .filter_map(|id| state.catalog.hardware(id))
    {
        if best.map_or(true, |b| hw.power > b.power) {
            best = Some(hw);
        }
    }
    best
}

/// Owned AI model with the highest accuracy. Ties go to the earliest purchase.
pub fn active_model(state: &GameState) -> Option<&AiModelRecord> {
    let mut best: Option<&AiModelRecord> = None;
    for model in state
        .owned_models
        .iter()
        .filter_map(|id| state.catalog.ai_model(id))
    {
        if best.map_or(true, |b| model.accuracy > b.accuracy) {
            best = Some(model);
        }
    }
    best
}

fn boost(attribute: f32, coefficient: f32) -> f32 {
    1.0 + attribute.max(0.0) * coefficient.max(0.0)
}

fn damp(attribute: f32, coefficient: f32) -> f32 {
    1.0 / boost(attribute, coefficient)
}

/// Derive the current multipliers from owned equipment.
pub fn compute_modifiers(state: &GameState, config: &SimConfig) -> Modifiers {
    let k = &config.modifiers;
    let mut m = Modifiers::NEUTRAL;

    if let Some(hw) = active_hardware(state) {
        m.speed_multiplier *= boost(hw.power, k.speed_per_power);
        m.error_multiplier *= damp(hw.memory, k.error_per_memory);
        m.resolution_multiplier *= boost(hw.efficiency, k.resolution_per_efficiency);
    }

    if let Some(model) = active_model(state) {
        m.speed_multiplier *= boost(model.speed, k.speed_per_model_speed);
        m.error_multiplier *= damp(model.accuracy, k.error_per_accuracy);
        m.resolution_multiplier *= boost(model.accuracy, k.resolution_per_accuracy);
    }

    m.error_multiplier = m.error_multiplier.max(config.error_multiplier_floor);
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn gpu(id: &str, power: f32, memory: f32, efficiency: f32) -> HardwareRecord {
        HardwareRecord {
            id: id.into(),
            name: id.into(),
            cost: 100,
            power,
            memory,
            efficiency,
        }
    }

    fn model(id: &str, accuracy: f32, speed: f32) -> AiModelRecord {
        AiModelRecord {
            id: id.into(),
            name: id.into(),
            cost: 100,
            accuracy,
            speed,
        }
    }

    fn state_with(hardware: Vec<HardwareRecord>, models: Vec<AiModelRecord>) -> GameState {
        let catalog = Catalog {
            hardware,
            ai_models: models,
            ..Catalog::default()
        };
        GameState::new(catalog, &SimConfig::default())
    }

    #[test]
    fn test_neutral_without_equipment() {
        let state = state_with(vec![gpu("a", 5.0, 5.0, 5.0)], vec![]);
        assert_eq!(compute_modifiers(&state, &SimConfig::default()), Modifiers::NEUTRAL);
    }

    #[test]
    fn test_highest_power_is_active() {
        let mut state = state_with(
            vec![gpu("slow", 2.0, 9.0, 0.0), gpu("fast", 8.0, 1.0, 0.0)],
            vec![],
        );
        state.owned_hardware = vec!["slow".into(), "fast".into()];
        assert_eq!(active_hardware(&state).map(|h| h.id.as_str()), Some("fast"));
    }

    #[test]
    fn test_power_tie_prefers_first_owned() {
        let mut state = state_with(
            vec![gpu("a", 4.0, 1.0, 0.0), gpu("b", 4.0, 9.0, 0.0)],
            vec![],
        );
        state.owned_hardware = vec!["b".into(), "a".into()];
        assert_eq!(active_hardware(&state).map(|h| h.id.as_str()), Some("b"));
    }

    #[test]
    fn test_unknown_owned_ids_ignored() {
        let mut state = state_with(vec![], vec![]);
        state.owned_hardware = vec!["ghost".into()];
        assert_eq!(compute_modifiers(&state, &SimConfig::default()), Modifiers::NEUTRAL);
    }

    #[test]
    fn test_hardware_contribution() {
        let mut state = state_with(vec![gpu("g", 10.0, 4.0, 10.0)], vec![]);
        state.owned_hardware = vec!["g".into()];
        let m = compute_modifiers(&state, &SimConfig::default());
        // 1 + 10 * 0.1
        assert!((m.speed_multiplier - 2.0).abs() < 1e-5);
        // 1 / (1 + 4 * 0.05)
        assert!((m.error_multiplier - 1.0 / 1.2).abs() < 1e-5);
        // 1 + 10 * 0.03
        assert!((m.resolution_multiplier - 1.3).abs() < 1e-5);
    }

    #[test]
    fn test_model_contribution_stacks() {
        let mut state = state_with(vec![gpu("g", 10.0, 0.0, 0.0)], vec![model("m", 5.0, 4.0)]);
        state.owned_hardware = vec!["g".into()];
        state.owned_models = vec!["m".into()];
        let m = compute_modifiers(&state, &SimConfig::default());
        // (1 + 10*0.1) * (1 + 4*0.05)
        assert!((m.speed_multiplier - 2.4).abs() < 1e-5);
        // 1 / (1 + 5*0.08)
        assert!((m.error_multiplier - 1.0 / 1.4).abs() < 1e-5);
    }

    #[test]
    fn test_error_multiplier_floor() {
        let mut state = state_with(vec![gpu("g", 0.0, 1000.0, 0.0)], vec![model("m", 1000.0, 0.0)]);
        state.owned_hardware = vec!["g".into()];
        state.owned_models = vec!["m".into()];
        let config = SimConfig::default();
        let m = compute_modifiers(&state, &config);
        assert_eq!(m.error_multiplier, config.error_multiplier_floor);
        assert!(m.error_multiplier > 0.0);
    }

    #[test]
    fn test_better_hardware_never_hurts() {
        let config = SimConfig::default();
        let mut state = state_with(
            vec![gpu("basic", 2.0, 2.0, 2.0), gpu("pro", 6.0, 6.0, 6.0)],
            vec![],
        );
        state.owned_hardware = vec!["basic".into()];
        let before = compute_modifiers(&state, &config);
        state.owned_hardware.push("pro".into());
        let after = compute_modifiers(&state, &config);
        assert!(after.speed_multiplier > before.speed_multiplier);
        assert!(after.error_multiplier < before.error_multiplier);
        assert!(after.resolution_multiplier > before.resolution_multiplier);
    }

    #[test]
    fn test_deterministic() {
        let mut state = state_with(vec![gpu("g", 3.0, 3.0, 3.0)], vec![model("m", 3.0, 3.0)]);
        state.owned_hardware = vec!["g".into()];
        state.owned_models = vec!["m".into()];
        let config = SimConfig::default();
        assert_eq!(
            compute_modifiers(&state, &config),
            compute_modifiers(&state.clone(), &config)
        );
    }
}
