//! main.rs — combat-sim entry point
//!
//! A scripted scenario generator for manual verification and demos
//! (§1 "Determinism & replay tooling"). Advances a two-fighter state
//! machine tick by tick under a chosen `ScenarioConfig` and writes the
//! resulting `RawCvInput`/`JudgeEventInput` stream as NDJSON, one
//! tagged line per event, in emission order. It depends only on
//! `combat-types` — it has no way to call into `combat-core`'s
//! pipeline stages directly (that binary exposes no library target),
//! so the output here is meant to be piped into whatever external
//! harness feeds a running core's ingress contracts.

mod fighter_sim;
mod noise;
mod scenarios;

use std::io::Write as _;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use combat_types::{FighterId, JudgeEventInput, RawCvInput};
use fighter_sim::BoutSim;
use noise::apply_operator_lag;

#[derive(Parser, Debug)]
#[command(name = "combat-sim", about = "Scripted combat-event scenario generator")]
struct Args {
    /// Scenario preset: dominant-round, close-round, knockdown-finish, control-heavy, noisy-low-confidence
    #[arg(short, long, default_value = "close-round")]
    scenario: String,
    /// Bout identifier stamped onto every emitted event
    #[arg(long, default_value = "demo-bout")]
    bout_id: String,
    /// Fighter favoured by scenarios that have one
    #[arg(long, default_value = "red")]
    favoured: String,
    /// Number of rounds to generate
    #[arg(long, default_value = "3")]
    rounds: u32,
    /// RNG seed, for reproducible runs
    #[arg(long, default_value = "1")]
    seed: u64,
    /// Output file; defaults to stdout
    #[arg(short, long)]
    out: Option<String>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum SimLine<'a> {
    RawCvInput(&'a RawCvInput),
    JudgeEventInput(&'a JudgeEventInput),
}

fn parse_favoured(raw: &str) -> FighterId {
    match raw {
        "blue" => FighterId::Blue,
        _ => FighterId::Red,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("combat_sim=info"))
        .init();

    let args = Args::parse();
    let favoured = parse_favoured(&args.favoured);
    let Some(scenario) = scenarios::by_name(&args.scenario, favoured) else {
        eprintln!("unknown scenario {:?}; see --help for valid presets", args.scenario);
        std::process::exit(1);
    };

    info!(scenario = args.scenario, bout_id = args.bout_id, rounds = args.rounds, seed = args.seed, "generating scripted bout");

    let ticks_per_round = scenario.ticks_per_round;
    let mut sim = BoutSim::new(args.bout_id.clone(), scenario, StdRng::seed_from_u64(args.seed));
    let mut lag_rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));

    let mut writer: Box<dyn std::io::Write> = match &args.out {
        Some(path) => Box::new(std::fs::File::create(path).unwrap_or_else(|e| {
            eprintln!("failed to create {path}: {e}");
            std::process::exit(1);
        })),
        None => Box::new(std::io::stdout()),
    };

    let mut total_lines = 0usize;
    for _round in 0..args.rounds {
        for _ in 0..ticks_per_round {
            for cv in sim.tick() {
                write_line(&mut writer, &SimLine::RawCvInput(&cv));
                total_lines += 1;
            }
            for mut judge in sim.take_judge_events() {
                judge.ts_ms = apply_operator_lag(&mut lag_rng, judge.ts_ms);
                write_line(&mut writer, &SimLine::JudgeEventInput(&judge));
                total_lines += 1;
            }
        }
        sim.advance_round();
    }

    info!(total_lines, "generation complete");
}

fn write_line(writer: &mut dyn std::io::Write, line: &SimLine) {
    let json = serde_json::to_string(line).expect("SimLine always serialises");
    let _ = writeln!(writer, "{json}");
}
