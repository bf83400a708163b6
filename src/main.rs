//! votequeue CLI
//!
//! Run polling-place queue simulations: a full parameter sweep, a batch of trials for one configuration, or a
//! per-voter trace of a few simulated days.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use votequeue::sweep::worker_pool;
use votequeue::{
    report, trace_days, ArrivalGenerator, HourlyRateProfile, PollingPlace, Sweep, SweepConfig, TrialRunner,
};

/// Polling-place wait time simulator
#[derive(Parser, Debug)]
#[command(name = "votequeue")]
#[command(about = "Estimate polling-place wait times by Monte Carlo simulation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep a grid of service times, machine counts, and turnouts
    Sweep(SweepArgs),
    /// Run a batch of trials for a single configuration
    Trials(TrialsArgs),
    /// Dump per-voter arrival and wait times for a few simulated days
    Trace(TraceArgs),
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
struct CommonArgs {
    /// Master seed for the random streams
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Hourly arrival rates as fractions of the mean turnout (default: 13-hour profile)
    #[arg(long, value_delimiter = ',')]
    rates: Option<Vec<f64>>,
}

impl CommonArgs {
    fn profile(&self) -> votequeue::Result<HourlyRateProfile> {
        match &self.rates {
            Some(rates) => HourlyRateProfile::new(rates.clone()),
            None => Ok(HourlyRateProfile::default()),
        }
    }
}

#[derive(Args, Debug)]
struct SweepArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Trials per grid cell
    #[arg(short = 'n', long, default_value = "10000")]
    trials: usize,

    /// Minutes per voter at a machine
    #[arg(long, value_delimiter = ',', default_value = "2,5,7,10,15")]
    service_times: Vec<f64>,

    /// Machine counts
    #[arg(long, value_delimiter = ',', default_value = "2,5,10,15,20")]
    machines: Vec<usize>,

    /// Mean turnouts per machine
    #[arg(long, value_delimiter = ',', default_value = "50,100,150,200,300")]
    voters_per_machine: Vec<u32>,

    /// Wait thresholds in minutes
    #[arg(long, value_delimiter = ',', default_value = "15,30,60,90,120")]
    thresholds: Vec<f64>,

    /// Worker threads (0 = one per core)
    #[arg(short, long, default_value = "0")]
    threads: usize,

    /// Run cells one after another on the main thread
    #[arg(long)]
    serial: bool,

    /// Directory receiving the cell files and the summary table
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct TrialsArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of trials
    #[arg(short = 'n', long, default_value = "10000")]
    trials: usize,

    /// Number of machines
    #[arg(short, long, default_value = "10")]
    machines: usize,

    /// Minutes per voter at a machine
    #[arg(short = 'd', long, default_value = "5")]
    service_time: f64,

    /// Mean turnout for the whole day
    #[arg(long, default_value = "1500")]
    mean_voters: f64,

    /// Wait thresholds in minutes
    #[arg(long, value_delimiter = ',', default_value = "15,30,60,90,120")]
    thresholds: Vec<f64>,

    /// Worker threads (0 = one per core)
    #[arg(short, long, default_value = "0")]
    threads: usize,

    /// Write one `max_wait<TAB>last_departure` row per trial to this file
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TraceArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of simulated days
    #[arg(short, long, default_value = "5")]
    runs: usize,

    /// Number of machines
    #[arg(short, long, default_value = "10")]
    machines: usize,

    /// Minutes per voter at a machine
    #[arg(short = 'd', long, default_value = "5")]
    service_time: f64,

    /// Mean turnout for the whole day
    #[arg(long, default_value = "1500")]
    mean_voters: f64,

    /// Output file (default: standard output)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = log_filter(cli.verbose, std::env::var("RUST_LOG").ok().as_deref());
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    match cli.command {
        Command::Sweep(args) => run_sweep(args),
        Command::Trials(args) => run_trials(args),
        Command::Trace(args) => run_trace(args),
    }
}

/// `RUST_LOG` directives when set, otherwise everything at `info` or at `debug` with `--verbose`.
fn log_filter(verbose: bool, directives: Option<&str>) -> EnvFilter {
    match directives {
        Some(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(if verbose { "debug" } else { "info" }),
    }
}

fn run_sweep(args: SweepArgs) -> anyhow::Result<()> {
    let config = SweepConfig {
        num_trials: args.trials,
        service_times: args.service_times,
        machine_counts: args.machines,
        voters_per_machine: args.voters_per_machine,
        thresholds: args.thresholds,
        profile: args.common.profile()?,
        seed: args.common.seed,
    };
    let sweep = Sweep::new(config).context("invalid sweep configuration")?;

    info!(
        "Sweeping {} cells of {} trials (seed={})",
        sweep.config().cell_count(),
        sweep.config().num_trials,
        sweep.config().seed
    );
    let started = Instant::now();

    // cell files are saved as soon as each cell finishes
    report::create_output_dir(&args.out)?;
    let save_cell = |cell: &votequeue::SweepCell| report::write_cell(&args.out, cell).map(drop);
    let result = if args.serial {
        sweep.run_with(save_cell)
    } else {
        worker_pool(args.threads)?.install(|| sweep.par_run_with(save_cell))
    }
    .with_context(|| format!("failed to save sweep results to {}", args.out.display()))?;

    report::write_summary(&args.out, &result)
        .with_context(|| format!("failed to save sweep summary to {}", args.out.display()))?;
    info!(
        "Wrote {} cell files and {} to {}",
        result.cells.len(),
        report::SUMMARY_FILE_NAME,
        args.out.display()
    );
    info!("Total computer time: {:.3}s", started.elapsed().as_secs_f64());

    Ok(())
}

fn run_trials(args: TrialsArgs) -> anyhow::Result<()> {
    let runner = build_runner(&args.common, args.trials, args.machines, args.service_time, args.mean_voters)?;
    let batch = worker_pool(args.threads)?.install(|| runner.par_run(args.common.seed));

    if let Some(path) = &args.out {
        report::write_batch(path, &batch).with_context(|| format!("failed to save trials to {}", path.display()))?;
        info!("Wrote {} trials to {}", batch.len(), path.display());
    }

    let mut stdout = std::io::stdout().lock();
    for (threshold, fraction) in args.thresholds.iter().zip(batch.exceedance_fractions(&args.thresholds)) {
        writeln!(stdout, ">{}\t{}", report::format_g(*threshold), report::format_g(fraction))?;
    }

    Ok(())
}

fn run_trace(args: TraceArgs) -> anyhow::Result<()> {
    let (place, generator) = build_place(&args.common, args.machines, args.service_time, args.mean_voters)?;
    let runs = trace_days(&place, &generator, args.common.seed, args.runs);

    match &args.out {
        Some(path) => {
            report::write_trace(path, &runs).with_context(|| format!("failed to save trace to {}", path.display()))?;
            info!("Wrote {} traced days to {}", runs.len(), path.display());
        },
        None => report::write_trace_rows(&mut std::io::stdout().lock(), &runs)?,
    }

    Ok(())
}

fn build_runner(
    common: &CommonArgs,
    trials: usize,
    machines: usize,
    service_time: f64,
    mean_voters: f64,
) -> anyhow::Result<TrialRunner> {
    let (place, generator) = build_place(common, machines, service_time, mean_voters)?;
    Ok(TrialRunner::new(trials, place, generator)?)
}

fn build_place(
    common: &CommonArgs,
    machines: usize,
    service_time: f64,
    mean_voters: f64,
) -> anyhow::Result<(PollingPlace, ArrivalGenerator)> {
    let place = PollingPlace::new(machines, service_time)?;
    let generator = ArrivalGenerator::new(mean_voters, common.profile()?)?;
    Ok((place, generator))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(verbose: bool, env: Option<&str>) -> String {
        log_filter(verbose, env).to_string().to_lowercase()
    }

    #[test]
    fn verbosity_picks_the_default_level() {
        assert_eq!("info", directives(false, None));
        assert_eq!("debug", directives(true, None));
        assert_eq!("info", directives(false, Some("  ")));
    }

    #[test]
    fn rust_log_overrides_verbosity() {
        assert_eq!("votequeue=trace", directives(false, Some("votequeue=trace")));
        assert_eq!("warn", directives(true, Some("warn")));
    }

    #[test]
    fn zero_traced_days_are_allowed() {
        let cli = Cli::try_parse_from(["votequeue", "trace", "--runs", "0"]).unwrap();
        let Command::Trace(args) = cli.command else {
            panic!("expected the trace subcommand");
        };
        let (place, generator) = build_place(&args.common, args.machines, args.service_time, args.mean_voters).unwrap();
        assert!(trace_days(&place, &generator, args.common.seed, args.runs).is_empty());
    }
}
