//! GPU Farm Headless Simulation Harness
//!
//! Validates the bundled catalog data and the pure simulation logic, then
//! plays seeded multi-day games with a simple scripted player while checking
//! state invariants after every command.
//! Runs entirely in-process with no UI and no file access.
//!
//! Usage:
//!   cargo run -p gpufarm-simtest
//!   cargo run -p gpufarm-simtest -- --verbose --seed 7 --days 60

use gpufarm_logic::catalog::{load_catalog, Catalog, CatalogSources, JobRecord};
use gpufarm_logic::commands::{Command, CommandEffect, CommandError};
use gpufarm_logic::config::SimConfig;
use gpufarm_logic::dispatcher::Simulation;
use gpufarm_logic::feed::FeedAction;
use gpufarm_logic::jobs::tick_job;
use gpufarm_logic::modifiers::{compute_modifiers, Modifiers};
use gpufarm_logic::resolution::{guided_success_rate, ResolutionOutcome};
use gpufarm_logic::state::{GameState, ItemKind, JobState, JobStatus};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

// ── Catalog data (same JSON a host would ship) ──────────────────────────
const HARDWARE_JSON: &str = include_str!("../../../data/catalog/hardware.json");
const AI_MODELS_JSON: &str = include_str!("../../../data/catalog/ai_models.json");
const PROMPTS_JSON: &str = include_str!("../../../data/catalog/prompts.json");
const JOBS_JSON: &str = include_str!("../../../data/catalog/jobs.json");
const TEMPLATES_JSON: &str = include_str!("../../../data/catalog/message_templates.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

struct Options {
    verbose: bool,
    seed: u64,
    days: u32,
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_options() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let defaults = SimConfig::default();
    Options {
        verbose: args.iter().any(|a| a == "--verbose"),
        seed: arg_value(&args, "--seed")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.seed),
        days: arg_value(&args, "--days")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
    }
}

fn main() {
    let options = parse_options();
    println!("=== GPU Farm Simulation Harness ===");
    println!("seed {}, {} days\n", options.seed, options.days);

    let mut results = Vec::new();

    // 1. Catalog data validation
    let catalog = validate_catalog(&mut results);

    // 2. Job lifecycle sweep
    results.extend(validate_job_lifecycle(options.verbose));

    // 3. Equipment modifiers over the bundled hardware
    results.extend(validate_modifiers(&catalog, options.verbose));

    // 4. Guided resolution odds per prompt
    results.extend(validate_prompts(&catalog, options.verbose));

    // 5. Seeded playthrough
    results.extend(validate_playthrough(&catalog, &options));

    // 6. Reproducibility
    results.extend(validate_determinism(&catalog, &options));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || options.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Catalog ──────────────────────────────────────────────────────────

fn validate_catalog(results: &mut Vec<TestResult>) -> Catalog {
    println!("--- Catalog ---");
    let load = load_catalog(&CatalogSources {
        hardware: Some(HARDWARE_JSON),
        ai_models: Some(AI_MODELS_JSON),
        prompts: Some(PROMPTS_JSON),
        jobs: Some(JOBS_JSON),
        templates: Some(TEMPLATES_JSON),
    });

    results.push(TestResult {
        name: "catalog_no_diagnostics".into(),
        passed: load.diagnostics.is_empty(),
        detail: if load.diagnostics.is_empty() {
            "all five sources parsed cleanly".into()
        } else {
            load.diagnostics
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        },
    });

    let catalog = load.catalog;
    results.push(TestResult {
        name: "catalog_not_empty".into(),
        passed: !catalog.hardware.is_empty()
            && !catalog.ai_models.is_empty()
            && !catalog.prompts.is_empty()
            && !catalog.jobs.is_empty()
            && !catalog.templates.is_empty(),
        detail: format!(
            "{} hardware, {} models, {} prompts, {} jobs, {} templates",
            catalog.hardware.len(),
            catalog.ai_models.len(),
            catalog.prompts.len(),
            catalog.jobs.len(),
            catalog.templates.len()
        ),
    });

    // Every linked job and advertised item must exist
    let dangling: Vec<String> = catalog
        .templates
        .iter()
        .filter(|t| {
            t.linked_job
                .as_deref()
                .is_some_and(|j| catalog.job(j).is_none())
                || t.advertises.as_deref().is_some_and(|item| {
                    catalog.hardware(item).is_none()
                        && catalog.ai_model(item).is_none()
                        && catalog.prompt(item).is_none()
                })
        })
        .map(|t| t.id.clone())
        .collect();
    results.push(TestResult {
        name: "catalog_template_references".into(),
        passed: dangling.is_empty(),
        detail: if dangling.is_empty() {
            "all template references resolve".into()
        } else {
            format!("dangling references in: {}", dangling.join(", "))
        },
    });

    // Enough cheap work to start a game
    let config = SimConfig::default();
    let starters = catalog
        .jobs
        .iter()
        .filter(|j| j.cost <= config.starting_credits)
        .count();
    results.push(TestResult {
        name: "catalog_affordable_starters".into(),
        passed: starters >= config.initial_offer_count,
        detail: format!("{} jobs affordable on day 1", starters),
    });

    results.push(TestResult {
        name: "config_default_valid".into(),
        passed: config.validate().is_ok(),
        detail: format!("{:?}", config.validate()),
    });

    catalog
}

// ── 2. Job lifecycle ────────────────────────────────────────────────────

fn validate_job_lifecycle(verbose: bool) -> Vec<TestResult> {
    println!("--- Job Lifecycle ---");
    let mut results = Vec::new();
    let config = SimConfig::default();
    // Only zero or certain error rates below, so the seed does not matter.
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    // Error-free job of duration 4 advances in quarters
    let record = JobRecord {
        id: "probe".into(),
        title: "Probe".into(),
        description: String::new(),
        cost: 0,
        complexity: 1.0,
        baseline_duration: 4.0,
        error_rate: 0.0,
        resolution_rate: 0.5,
        reward: 1,
        reputation_reward: 0,
    };
    let mut job = JobState::assign(&record, 1);
    let mut trace = Vec::new();
    for _ in 0..4 {
        job = tick_job(
            &job,
            1,
            &Modifiers::NEUTRAL,
            &config.error_thresholds,
            &mut rng,
        );
        trace.push(job.progress);
    }
    if verbose {
        println!("  progress trace: {:?}", trace);
    }
    results.push(TestResult {
        name: "job_quarter_steps".into(),
        passed: trace == vec![0.25, 0.5, 0.75, 1.0] && job.status == JobStatus::Completed,
        detail: format!("trace {:?}, status {:?}", trace, job.status),
    });

    // Certain errors fire once per threshold
    let always = JobRecord {
        error_rate: 1.0,
        ..record
    };
    let mut job = JobState::assign(&always, 1);
    for _ in 0..20 {
        job = tick_job(
            &job,
            1,
            &Modifiers::NEUTRAL,
            &config.error_thresholds,
            &mut rng,
        );
        if job.status == JobStatus::Error {
            job.status = JobStatus::Running;
        }
    }
    let fired: Vec<f32> = job.error_history.iter().map(|e| e.threshold).collect();
    results.push(TestResult {
        name: "job_threshold_once_each".into(),
        passed: fired == config.error_thresholds && job.status == JobStatus::Completed,
        detail: format!("errors at {:?}", fired),
    });

    results
}

// ── 3. Modifiers ────────────────────────────────────────────────────────

fn validate_modifiers(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Modifiers ---");
    let mut results = Vec::new();
    let config = SimConfig::default();

    let mut by_power: Vec<_> = catalog.hardware.iter().collect();
    by_power.sort_by(|a, b| a.power.total_cmp(&b.power));

    let mut state = GameState::new(catalog.clone(), &config);
    let mut previous = compute_modifiers(&state, &config);
    let mut monotone = true;
    for hw in by_power {
        state.owned_hardware.push(hw.id.clone());
        let m = compute_modifiers(&state, &config);
        if verbose {
            println!(
                "  {:<12} speed {:.2} error {:.2} resolution {:.2}",
                hw.id, m.speed_multiplier, m.error_multiplier, m.resolution_multiplier
            );
        }
        monotone &= m.speed_multiplier >= previous.speed_multiplier;
        previous = m;
    }
    results.push(TestResult {
        name: "modifiers_speed_monotone".into(),
        passed: monotone,
        detail: "owning faster hardware never slows jobs".into(),
    });

    for model in &catalog.ai_models {
        state.owned_models.push(model.id.clone());
    }
    let all = compute_modifiers(&state, &config);
    results.push(TestResult {
        name: "modifiers_error_floor".into(),
        passed: all.error_multiplier >= config.error_multiplier_floor
            && all.error_multiplier <= 1.0,
        detail: format!("error multiplier with everything owned: {:.3}", all.error_multiplier),
    });

    results
}

// ── 4. Prompts ──────────────────────────────────────────────────────────

fn validate_prompts(catalog: &Catalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Prompts ---");
    let config = SimConfig::default();
    let rates: Vec<(String, f32)> = catalog
        .prompts
        .iter()
        .map(|p| (p.id.clone(), guided_success_rate(p, &config)))
        .collect();
    if verbose {
        for (id, rate) in &rates {
            println!("  {:<18} guided odds {:.0}%", id, rate * 100.0);
        }
    }
    let in_range = rates
        .iter()
        .all(|(_, r)| (0.0..=config.guided_success_ceiling).contains(r));
    let useful = rates.iter().any(|(_, r)| *r >= 0.5);
    vec![
        TestResult {
            name: "prompts_odds_in_range".into(),
            passed: in_range,
            detail: format!("{} prompts within [0, {}]", rates.len(), config.guided_success_ceiling),
        },
        TestResult {
            name: "prompts_one_useful".into(),
            passed: useful,
            detail: "at least one prompt gives even odds or better".into(),
        },
    ]
}

// ── 5. Playthrough ──────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
struct RunSummary {
    day: u32,
    credits: u32,
    reputation: u32,
    health: u8,
    jobs_completed: usize,
    jobs_failed: usize,
    commands: usize,
    rejected: usize,
    hardware: Vec<String>,
    prompts: Vec<String>,
}

/// Next command for the scripted player, or a time step when idle.
fn choose_command(state: &GameState, config: &SimConfig) -> Command {
    // Deal with errors first: guided with the best owned prompt, else gamble.
    if let Some(job) = state.active_jobs.iter().find(|j| j.status == JobStatus::Error) {
        let best_prompt = state
            .owned_prompts
            .iter()
            .filter_map(|id| state.catalog.prompt(id))
            .max_by(|a, b| a.quality().total_cmp(&b.quality()));
        return match best_prompt {
            Some(prompt) if state.health > 20 => Command::GuidedResolve {
                job_id: job.job_id.clone(),
                tool_id: prompt.id.clone(),
            },
            _ => Command::QuickResolve {
                job_id: job.job_id.clone(),
            },
        };
    }

    // Take job offers from the feed, clear out everything else.
    if let Some(message) = state.active_feed_messages.first() {
        let action = match &message.linked_job {
            Some(job_id) if !state.is_offered(job_id) && state.job(job_id).is_none() => {
                FeedAction::Accept
            }
            _ if message.read => FeedAction::Archive,
            _ => FeedAction::Open,
        };
        return Command::Feed {
            message_id: message.id,
            action,
        };
    }

    // Fill free slots with affordable offers.
    let free_slot = (1..=config.total_slots).find(|s| state.job_in_slot(*s).is_none());
    if let Some(slot) = free_slot {
        if let Some(offer) = state
            .available_job_offers
            .iter()
            .find(|j| j.cost <= state.credits)
        {
            return Command::AssignJob {
                job_id: offer.id.clone(),
                slot,
            };
        }
    }

    // Buy the first prompt, then the next GPU up when there is a cushion.
    if state.owned_prompts.is_empty() {
        if let Some(prompt) = state.catalog.prompts.iter().find(|p| p.cost <= state.credits) {
            return Command::Purchase {
                item_id: prompt.id.clone(),
                kind: ItemKind::Prompt,
            };
        }
    }
    let cushion = 200;
    if let Some(hw) = state
        .catalog
        .hardware
        .iter()
        .find(|h| !state.owns(ItemKind::Hardware, &h.id) && h.cost + cushion <= state.credits)
    {
        return Command::Purchase {
            item_id: hw.id.clone(),
            kind: ItemKind::Hardware,
        };
    }

    Command::AdvanceTime { blocks: 1 }
}

fn check_invariants(state: &GameState, config: &SimConfig) -> Result<(), String> {
    if state.day < 1 {
        return Err("day dropped below 1".into());
    }
    if state.time_blocks_remaining == 0 || state.time_blocks_remaining > config.blocks_per_day {
        return Err(format!("blocks remaining {}", state.time_blocks_remaining));
    }
    if state.health > 100 {
        return Err(format!("health {}", state.health));
    }
    let mut slots: Vec<u32> = state.active_jobs.iter().map(|j| j.assigned_slot).collect();
    slots.sort_unstable();
    slots.dedup();
    if slots.len() != state.active_jobs.len() {
        return Err("two jobs share a slot".into());
    }
    if let Some(job) = state
        .active_jobs
        .iter()
        .find(|j| !(0.0..=1.0).contains(&j.progress) || j.status.is_terminal())
    {
        return Err(format!("job '{}' in bad shape: {:?}", job.job_id, job));
    }
    if state.active_feed_messages.len() > config.max_active_messages
        || state.archived_feed_messages.len() > config.max_archived_messages
    {
        return Err("feed queue over capacity".into());
    }
    Ok(())
}

fn play(catalog: &Catalog, options: &Options) -> (RunSummary, Result<(), String>, GameState) {
    let config = SimConfig {
        seed: options.seed,
        ..SimConfig::default()
    };
    let mut summary = RunSummary::default();
    let mut sim = match Simulation::new(catalog.clone(), config.clone()) {
        Ok(sim) => sim,
        Err(e) => {
            let state = GameState::new(catalog.clone(), &config);
            return (summary, Err(format!("config rejected: {}", e)), state);
        }
    };

    let last_day = 1 + options.days;
    // Hard stop in case the scripted player stalls without advancing time.
    let budget = (options.days as usize + 1) * config.blocks_per_day as usize * 20;
    let mut verdict = Ok(());

    while sim.state().day < last_day && summary.commands < budget {
        let previous_day = sim.state().day;
        let command = choose_command(sim.state(), &config);
        let report = sim.execute(command);
        summary.commands += 1;

        match &report.result {
            Ok(_) => {}
            Err(CommandError::InsufficientCredits { .. }) | Err(CommandError::DuplicateOffer(_)) => {
                summary.rejected += 1;
            }
            Err(e) => {
                summary.rejected += 1;
                if options.verbose {
                    println!("  rejected #{}: {}", report.seq, e);
                }
            }
        }
        if let Ok(CommandEffect::Resolution {
            outcome: ResolutionOutcome::Failed,
            ..
        }) = &report.result
        {
            summary.jobs_failed += 1;
        }

        let day = sim.state().day;
        if day != previous_day && day != previous_day + 1 {
            verdict = Err(format!("day jumped {} -> {}", previous_day, day));
            break;
        }
        if let Err(e) = check_invariants(sim.state(), &config) {
            verdict = Err(format!("after command #{}: {}", report.seq, e));
            break;
        }
    }

    if verdict.is_ok() && sim.state().day < last_day {
        verdict = Err(format!(
            "stalled on day {} after {} commands",
            sim.state().day,
            summary.commands
        ));
    }

    let state = sim.state().clone();
    summary.day = state.day;
    summary.credits = state.credits;
    summary.reputation = state.reputation;
    summary.health = state.health;
    summary.jobs_completed = state.completed_job_ids.len();
    summary.hardware = state.owned_hardware.clone();
    summary.prompts = state.owned_prompts.clone();
    (summary, verdict, state)
}

fn validate_playthrough(catalog: &Catalog, options: &Options) -> Vec<TestResult> {
    println!("--- Playthrough ---");
    let mut results = Vec::new();
    let (summary, verdict, state) = play(catalog, options);

    if options.verbose {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("  (summary not serializable: {})", e),
        }
    }

    results.push(TestResult {
        name: "playthrough_invariants".into(),
        passed: verdict.is_ok(),
        detail: match &verdict {
            Ok(()) => format!(
                "{} commands over {} days, {} rejected",
                summary.commands, options.days, summary.rejected
            ),
            Err(e) => e.clone(),
        },
    });

    results.push(TestResult {
        name: "playthrough_made_progress".into(),
        passed: options.days < 3 || summary.jobs_completed > 0,
        detail: format!(
            "{} jobs completed, {} failed, {} credits, {} reputation",
            summary.jobs_completed, summary.jobs_failed, summary.credits, summary.reputation
        ),
    });

    // Nothing restores health, so it is capped by the decay of every rollover.
    let decay = SimConfig::default().daily_health_decay as u32;
    let ceiling = 100u32.saturating_sub((state.day - 1).saturating_mul(decay));
    results.push(TestResult {
        name: "playthrough_health_decays".into(),
        passed: state.health as u32 <= ceiling,
        detail: format!("health {} on day {} (at most {})", state.health, state.day, ceiling),
    });

    let offers_unique = {
        let mut ids: Vec<&str> = state
            .available_job_offers
            .iter()
            .map(|j| j.id.as_str())
            .collect();
        ids.sort_unstable();
        ids.windows(2).all(|w| w[0] != w[1])
    };
    results.push(TestResult {
        name: "playthrough_offers_unique".into(),
        passed: offers_unique,
        detail: format!("{} offers open", state.available_job_offers.len()),
    });

    results
}

// ── 6. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(catalog: &Catalog, options: &Options) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let short = Options {
        verbose: false,
        seed: options.seed,
        days: options.days.min(10),
    };
    let (_, _, first) = play(catalog, &short);
    let (_, _, second) = play(catalog, &short);
    vec![TestResult {
        name: "same_seed_same_state".into(),
        passed: first == second,
        detail: format!(
            "day {}, {} credits, {} messages archived",
            first.day,
            first.credits,
            first.archived_feed_messages.len()
        ),
    }]
}
