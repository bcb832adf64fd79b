//! Serialized command execution.
//!
//! [`Simulation`] is the single owner of the game state. Commands arrive
//! either directly through [`Simulation::submit`] or from other threads via a
//! cloned [`CommandSender`]; both land in one FIFO queue, and
//! [`Simulation::pump`] runs them to completion one at a time in arrival
//! order. A rejected command leaves the state untouched and comes back as a
//! diagnostic in its [`CommandReport`].
//!
//! ```
//! use gpufarm_logic::catalog::Catalog;
//! use gpufarm_logic::commands::Command;
//! use gpufarm_logic::config::SimConfig;
//! use gpufarm_logic::dispatcher::Simulation;
//!
//! let mut sim = Simulation::new(Catalog::default(), SimConfig::default()).unwrap();
//! let ticker = sim.sender();
//! ticker.send(Command::AdvanceTime { blocks: 2 }).unwrap();
//! sim.submit(Command::AssignJob { job_id: "nope".into(), slot: 1 });
//!
//! let reports = sim.pump();
//! assert_eq!(reports.len(), 2);
//! assert!(reports[0].is_accepted());
//! assert!(!reports[1].is_accepted());
//! assert_eq!(sim.state().time_blocks_remaining, 6);
//! ```

use std::collections::VecDeque;
use std::sync::mpsc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::commands::{apply_command, Command, CommandEffect, CommandError};
use crate::config::{ConfigError, SimConfig};
use crate::modifiers::{compute_modifiers, Modifiers};
use crate::state::GameState;

/// The simulation went away before the command could be queued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("simulation is no longer accepting commands")]
    Closed(Command),
}

/// Cloneable handle for queueing commands from another thread or a timer.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
}

impl CommandSender {
    pub fn send(&self, command: Command) -> Result<(), DispatchError> {
        self.tx
            .send(command)
            .map_err(|mpsc::SendError(command)| DispatchError::Closed(command))
    }
}

/// Outcome of one dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReport {
    /// Execution order, starting at 1.
    pub seq: u64,
    pub command: Command,
    pub result: Result<CommandEffect, CommandError>,
}

impl CommandReport {
    pub fn is_accepted(&self) -> bool {
        self.result.is_ok()
    }
}

/// Owns the state and runs commands against it one at a time.
pub struct Simulation<R: Rng = ChaCha8Rng> {
    config: SimConfig,
    state: GameState,
    rng: R,
    history: VecDeque<GameState>,
    queue: VecDeque<Command>,
    inbox: mpsc::Receiver<Command>,
    outbox: mpsc::Sender<Command>,
    next_seq: u64,
    unclaimed: Vec<CommandReport>,
}

impl Simulation<ChaCha8Rng> {
    /// New day-1 simulation seeded from `config.seed`.
    pub fn new(catalog: Catalog, config: SimConfig) -> Result<Self, ConfigError> {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::with_rng(catalog, config, rng)
    }
}

impl<R: Rng> Simulation<R> {
    pub fn with_rng(catalog: Catalog, config: SimConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = GameState::new(catalog, &config);
        let (outbox, inbox) = mpsc::channel();
        log::info!(
            "simulation started: {} jobs offered, {} credits",
            state.available_job_offers.len(),
            state.credits
        );
        Ok(Self {
            config,
            state,
            rng,
            history: VecDeque::new(),
            queue: VecDeque::new(),
            inbox,
            outbox,
            next_seq: 1,
            unclaimed: Vec::new(),
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current equipment multipliers, computed fresh.
    pub fn modifiers(&self) -> Modifiers {
        compute_modifiers(&self.state, &self.config)
    }

    /// Prior states, oldest first, bounded by `history_depth`.
    pub fn history(&self) -> &VecDeque<GameState> {
        &self.history
    }

    pub fn sender(&self) -> CommandSender {
        CommandSender {
            tx: self.outbox.clone(),
        }
    }

    /// Queue a command behind everything already waiting.
    pub fn submit(&mut self, command: Command) {
        self.drain_inbox();
        self.queue.push_back(command);
    }

    /// Commands waiting to run.
    pub fn pending(&mut self) -> usize {
        self.drain_inbox();
        self.queue.len()
    }

    /// Run every queued command in arrival order.
    pub fn pump(&mut self) -> Vec<CommandReport> {
        self.drain_inbox();
        let mut reports = std::mem::take(&mut self.unclaimed);
        while let Some(command) = self.queue.pop_front() {
            reports.push(self.run(command));
        }
        reports
    }

    /// Run `command` after everything already queued and return its report.
    ///
    /// Reports for commands that were waiting ahead of it are kept for
    /// [`Simulation::take_unclaimed`] (or the next [`Simulation::pump`]).
    pub fn execute(&mut self, command: Command) -> CommandReport {
        self.drain_inbox();
        while let Some(queued) = self.queue.pop_front() {
            let report = self.run(queued);
            self.unclaimed.push(report);
        }
        self.run(command)
    }

    pub fn take_unclaimed(&mut self) -> Vec<CommandReport> {
        std::mem::take(&mut self.unclaimed)
    }

    fn drain_inbox(&mut self) {
        while let Ok(command) = self.inbox.try_recv() {
            self.queue.push_back(command);
        }
    }

    fn run(&mut self, command: Command) -> CommandReport {
        let seq = self.next_seq;
        self.next_seq += 1;

        let result = match apply_command(&self.state, &command, &self.config, &mut self.rng) {
            Ok((next, effect)) => {
                let prior = std::mem::replace(&mut self.state, next);
                self.remember(prior);
                Ok(effect)
            }
            Err(err) => {
                log::warn!("command #{} rejected: {}", seq, err);
                Err(err)
            }
        };
        CommandReport {
            seq,
            command,
            result,
        }
    }

    fn remember(&mut self, prior: GameState) {
        if self.config.history_depth == 0 {
            return;
        }
        self.history.push_back(prior);
        while self.history.len() > self.config.history_depth {
            self.history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HardwareRecord, JobRecord};
    use crate::state::ItemKind;
    use std::thread;

    fn catalog() -> Catalog {
        Catalog {
            hardware: vec![HardwareRecord {
                id: "rtx".into(),
                name: "RTX".into(),
                cost: 300,
                power: 10.0,
                memory: 4.0,
                efficiency: 2.0,
            }],
            jobs: vec![JobRecord {
                id: "label".into(),
                title: "Label images".into(),
                description: String::new(),
                cost: 0,
                complexity: 1.0,
                baseline_duration: 4.0,
                error_rate: 0.0,
                resolution_rate: 0.5,
                reward: 80,
                reputation_reward: 2,
            }],
            ..Catalog::default()
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            total_slots: 0,
            ..SimConfig::default()
        };
        assert!(matches!(
            Simulation::new(catalog(), config),
            Err(ConfigError::NoSlots)
        ));
    }

    #[test]
    fn test_rejected_command_keeps_state() {
        let mut sim = Simulation::new(catalog(), SimConfig::default()).unwrap();
        let before = sim.state().clone();
        let report = sim.execute(Command::AssignJob {
            job_id: "label".into(),
            slot: 99,
        });
        assert!(!report.is_accepted());
        assert_eq!(sim.state(), &before);
        assert!(sim.history().is_empty());
    }

    #[test]
    fn test_fifo_order_across_sources() {
        let mut sim = Simulation::new(catalog(), SimConfig::default()).unwrap();
        let sender = sim.sender();
        sender
            .send(Command::AssignJob {
                job_id: "label".into(),
                slot: 1,
            })
            .unwrap();
        sim.submit(Command::AdvanceTime { blocks: 1 });
        let reports = sim.pump();
        assert_eq!(reports.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert!(reports.iter().all(CommandReport::is_accepted));
        assert_eq!(sim.state().job("label").map(|j| j.progress), Some(0.25));
    }

    #[test]
    fn test_ticks_from_other_thread_are_queued() {
        let mut sim = Simulation::new(catalog(), SimConfig::default()).unwrap();
        let sender = sim.sender();
        let handle = thread::spawn(move || {
            for _ in 0..5 {
                sender.send(Command::AdvanceTime { blocks: 1 }).unwrap();
            }
        });
        handle.join().unwrap();
        assert_eq!(sim.pending(), 5);
        let reports = sim.pump();
        assert_eq!(reports.len(), 5);
        assert_eq!(sim.pending(), 0);
        assert_eq!(
            sim.state().time_blocks_remaining,
            sim.config().blocks_per_day - 5
        );
    }

    #[test]
    fn test_execute_runs_queue_first() {
        let mut sim = Simulation::new(catalog(), SimConfig::default()).unwrap();
        sim.submit(Command::Purchase {
            item_id: "rtx".into(),
            kind: ItemKind::Hardware,
        });
        let report = sim.execute(Command::Purchase {
            item_id: "rtx".into(),
            kind: ItemKind::Hardware,
        });
        assert_eq!(report.seq, 2);
        assert_eq!(report.result, Err(CommandError::AlreadyOwned("rtx".into())));
        let earlier = sim.take_unclaimed();
        assert_eq!(earlier.len(), 1);
        assert!(earlier[0].is_accepted());
    }

    #[test]
    fn test_history_bounded() {
        let config = SimConfig {
            history_depth: 3,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(catalog(), config).unwrap();
        for _ in 0..10 {
            sim.execute(Command::AdvanceTime { blocks: 1 });
        }
        assert_eq!(sim.history().len(), 3);
        let newest = sim.history().back().unwrap();
        assert_eq!(
            newest.time_blocks_remaining,
            sim.state().time_blocks_remaining + 1
        );
    }

    #[test]
    fn test_modifiers_follow_purchases() {
        let mut sim = Simulation::new(catalog(), SimConfig::default()).unwrap();
        assert_eq!(sim.modifiers(), Modifiers::NEUTRAL);
        sim.execute(Command::Purchase {
            item_id: "rtx".into(),
            kind: ItemKind::Hardware,
        });
        assert!(sim.modifiers().speed_multiplier > 1.0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            let mut sim = Simulation::new(catalog(), SimConfig::default()).unwrap();
            sim.execute(Command::AssignJob {
                job_id: "label".into(),
                slot: 1,
            });
            sim.execute(Command::AdvanceTime { blocks: 30 });
            sim.state().clone()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_send_after_drop_fails() {
        let sim = Simulation::new(catalog(), SimConfig::default()).unwrap();
        let sender = sim.sender();
        drop(sim);
        let command = Command::AdvanceTime { blocks: 1 };
        assert_eq!(
            sender.send(command.clone()),
            Err(DispatchError::Closed(command))
        );
    }
}
