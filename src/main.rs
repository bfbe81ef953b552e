use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rocket_flight::io::{csv, json};
use rocket_flight::sim::{
    self, BatchStatistics, FlightDataBranch, FlightDataType, SimulationOptions, SimulationResult,
};
use rocket_flight::vehicle::presets;

#[derive(Parser, Debug)]
#[command(name = "rocket-flight")]
#[command(about = "Model rocket 6-DoF flight simulator")]
#[command(version)]
struct Cli {
    /// Built-in rocket: alpha, two-stage
    #[arg(short, long, default_value = "alpha")]
    preset: String,

    /// Simulation options as JSON; defaults when absent
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Write every flight data branch as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write a JSON flight summary
    #[arg(long)]
    json: Option<PathBuf>,

    /// Monte-Carlo runs in addition to the nominal flight
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Random seed; overrides the options file
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let mut options = match &cli.options {
        Some(path) => SimulationOptions::from_file(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => SimulationOptions::default(),
    };
    if let Some(seed) = cli.seed {
        options.seed = seed;
    }

    let configuration = presets::by_name(&cli.preset).context("building rocket")?;
    let rocket = configuration.rocket().name().to_string();
    let conditions = options.to_conditions(configuration).context("invalid simulation options")?;

    // -----------------------------------------------------------------------
    // Nominal flight
    // -----------------------------------------------------------------------
    let result = sim::simulate(conditions.clone());
    print_report(&rocket, &result);

    // -----------------------------------------------------------------------
    // Monte-Carlo batch
    // -----------------------------------------------------------------------
    let batch = (cli.runs > 1).then(|| {
        let results = sim::run_batch(&conditions, cli.runs, options.seed);
        BatchStatistics::from_results(&results)
    });
    if let Some(stats) = &batch {
        print_batch(stats);
    }

    // -----------------------------------------------------------------------
    // Output files
    // -----------------------------------------------------------------------
    if let Some(path) = &cli.csv {
        csv::write_branches_file(path, &result.branches)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "flight data written");
    }
    if let Some(path) = &cli.json {
        let mut summary = json::FlightSummary::from_result(rocket.as_str(), &result);
        if let Some(stats) = batch {
            summary = summary.with_batch(stats);
        }
        json::write_summary_file(path, &summary).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "summary written");
    }

    if let Some(e) = result.outcome.error() {
        bail!("flight of {} failed: {}", rocket, e);
    }
    Ok(())
}

fn print_report(rocket: &str, result: &SimulationResult) {
    println!();
    println!("====================================================================");
    println!("  ROCKET FLIGHT SIMULATION: {}", rocket);
    println!("====================================================================");

    for branch in &result.branches {
        print_branch(branch);
    }

    if !result.warnings.is_empty() {
        println!();
        println!("  Warnings");
        println!("  ──────────────────────────────────────────────────────────────────");
        for w in result.warnings.iter() {
            println!("  - {}", w);
        }
    }

    println!();
    match result.outcome.error() {
        Some(e) => println!("  Outcome: FAILED ({})", e),
        None if result.outcome.is_success() => println!("  Outcome: completed"),
        None => println!("  Outcome: cancelled"),
    }
    println!("====================================================================");
    println!();
}

fn print_branch(branch: &FlightDataBranch) {
    println!();
    println!("  {}  ({} samples)", branch.name(), branch.len());
    println!("  ──────────────────────────────────────────────────────────────────");

    for e in branch.events().iter().filter(|e| e.kind.is_logged()) {
        let alt = branch.value_at(FlightDataType::Altitude, e.time).unwrap_or(f64::NAN);
        let vel = branch.value_at(FlightDataType::VelocityTotal, e.time).unwrap_or(f64::NAN);
        println!(
            "  {:<20} t={:>7.2}s   alt={:>8.1}m   vel={:>7.1}m/s",
            e.kind.to_string(),
            e.time,
            alt,
            vel
        );
    }

    let s = branch.summary();
    println!();
    println!("  Max altitude:  {:>8.1} m     Time to apogee: {:>7.2} s", s.max_altitude, s.time_to_apogee);
    println!("  Max velocity:  {:>8.1} m/s   Max Mach:       {:>7.3}", s.max_velocity, s.max_mach);
    println!(
        "  Max accel:     {:>8.1} m/s^2 ({:.1} g)",
        s.max_acceleration,
        s.max_acceleration / rocket_flight::dynamics::G0
    );
    println!("  Rod exit:      {:>8.1} m/s   Deployment:     {:>7.1} m/s", s.launch_rod_velocity, s.deployment_velocity);
    println!("  Ground hit:    {:>8.1} m/s   Flight time:    {:>7.1} s", s.ground_hit_velocity, s.flight_time);
    println!("  Optimum delay: {:>8.2} s     (altitude {:.1} m)", s.optimum_delay, s.optimum_altitude);
}

fn print_batch(stats: &BatchStatistics) {
    println!("  Monte-Carlo ({} runs, {} succeeded)", stats.runs, stats.succeeded);
    println!("  ──────────────────────────────────────────────────────────────────");
    println!(
        "  Apogee:  {:.1} m  ± {:.1} m   [{:.1} .. {:.1}]",
        stats.mean_altitude, stats.std_dev_altitude, stats.min_altitude, stats.max_altitude
    );
    println!();
}
