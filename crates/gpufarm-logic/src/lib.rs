//! Pure simulation logic for GPU Farm.
//!
//! This crate contains the whole game core and nothing else: no rendering,
//! no input handling, no file I/O. Every operation takes the prior
//! [`state::GameState`] and returns the next one, with randomness passed in
//! explicitly, so a seeded run is fully reproducible and any host (UI,
//! headless harness, tests) can drive it.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Tolerant parsing of the five JSON record sources |
//! | [`commands`] | Command surface, purchases, and the `CommandError` diagnostic |
//! | [`config`] | Tunable parameters (`SimConfig`) with validation |
//! | [`dispatcher`] | Single-owner command queue with seeded RNG and state history |
//! | [`feed`] | Message generation under cooldown/context gates, feed actions |
//! | [`jobs`] | Slot assignment, progress ticks, threshold errors, payouts |
//! | [`modifiers`] | Speed/error/resolution multipliers from owned equipment |
//! | [`resolution`] | Quick and guided error resolution |
//! | [`state`] | `GameState`, `JobState`, feed messages |
//! | [`time`] | Block/day progression, upkeep, rollover |

pub mod catalog;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod feed;
pub mod jobs;
pub mod modifiers;
pub mod resolution;
pub mod state;
pub mod time;
