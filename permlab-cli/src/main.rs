//! PermLab CLI — permutation-based strategy validation.
//!
//! Commands:
//! - `validate` — run the four-stage protocol on a CSV series or synthetic data
//! - `permute` — write a batch of permuted in-sample / out-of-sample segments
//! - `synth` — write a synthetic random-walk series as CSV

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use permlab_core::{segment_permutations, Series};
use permlab_runner::report::{export_json, generate_summary, save_artifacts};
use permlab_runner::{
    load_series_csv, run_protocol, synthetic_series, write_series_csv, CancelToken,
    ProtocolConfig, ProtocolReport,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "permlab",
    about = "PermLab CLI — Monte Carlo permutation tests for trading strategies"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in-sample and walk-forward permutation tests.
    Validate {
        /// CSV series (timestamp,open,high,low,close,volume).
        #[arg(long, conflicts_with = "synthetic")]
        data: Option<PathBuf>,

        /// Use a synthetic random walk of this many bars instead of --data.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Protocol TOML ([test], [strategy], [params]).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the master RNG seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Override the number of permutation trials.
        #[arg(long)]
        trials: Option<usize>,

        /// Run trials on one thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the JSON report to stdout instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Permute the last N bars as an in-sample and an out-of-sample segment.
    Permute {
        /// CSV series to permute.
        #[arg(long)]
        data: PathBuf,

        /// Number of most recent bars to use.
        #[arg(long, default_value_t = 2000)]
        last_n: usize,

        /// Fraction of the bars that forms the in-sample segment.
        #[arg(long, default_value_t = 0.8)]
        ratio: f64,

        /// Permutations per segment.
        #[arg(long, default_value_t = 50)]
        count: usize,

        /// Master seed; the out-of-sample batch uses seed + 1.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output root; writes `in/permNNN.csv` and `out/permNNN.csv`.
        #[arg(long, default_value = "permutations")]
        output_dir: PathBuf,
    },
    /// Write a synthetic random-walk series.
    Synth {
        #[arg(long, default_value_t = 2000)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate {
            data,
            synthetic,
            config,
            seed,
            trials,
            sequential,
            output_dir,
            json,
        } => run_validate(
            data, synthetic, config, seed, trials, sequential, output_dir, json,
        ),
        Commands::Permute {
            data,
            last_n,
            ratio,
            count,
            seed,
            output_dir,
        } => run_permute(&data, last_n, ratio, count, seed, &output_dir),
        Commands::Synth {
            bars,
            seed,
            output,
        } => {
            let series = synthetic_series(bars, seed)?;
            write_series_csv(&series, &output)?;
            println!("Wrote {} bars to {}", series.len(), output.display());
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Grid used when no config (or a config without `[params]`) is given.
fn default_grid() -> BTreeMap<String, Vec<f64>> {
    let mut grid = BTreeMap::new();
    grid.insert("fast".to_string(), vec![5.0, 10.0, 20.0]);
    grid.insert("slow".to_string(), vec![50.0, 100.0, 200.0]);
    grid
}

#[allow(clippy::too_many_arguments)]
fn run_validate(
    data: Option<PathBuf>,
    synthetic: Option<usize>,
    config_path: Option<PathBuf>,
    seed: Option<u64>,
    trials: Option<usize>,
    sequential: bool,
    output_dir: PathBuf,
    json: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => ProtocolConfig::from_file(&path)?,
        None => ProtocolConfig::default(),
    };
    if config.params.is_empty() {
        config.params = default_grid();
    }
    if let Some(seed) = seed {
        config.test.rng_seed = seed;
    }
    if let Some(trials) = trials {
        config.test.trial_count = trials;
    }
    if sequential {
        config.test.parallel = false;
    }
    config.test.validate()?;

    let series = match (data, synthetic) {
        (Some(path), None) => load_series_csv(&path)?,
        (None, Some(n)) => synthetic_series(n, config.test.rng_seed)?,
        (None, None) => bail!("one of --data or --synthetic is required"),
        (Some(_), Some(_)) => bail!("--data and --synthetic are mutually exclusive"),
    };

    let strategy = config.strategy.build();
    let space = config.param_space();
    let run_id = config.run_id();
    info!(run_id = %run_id, bars = series.len(), params = space.len(), "validation run");

    let report = run_protocol(
        strategy.as_ref(),
        &series,
        &space,
        &config.test,
        &CancelToken::new(),
    )?;

    if json {
        println!("{}", export_json(&report)?);
    } else {
        print_summary(&report);
    }

    let run_dir = save_artifacts(&report, &run_id, &output_dir)?;
    eprintln!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn print_summary(report: &ProtocolReport) {
    print!("{}", generate_summary(report));
}

/// In-sample and out-of-sample ranges inside the last `last_n` bars of a
/// series of `len` bars. The in-sample share is `ratio` of the window, rounded.
fn segment_bounds(
    len: usize,
    last_n: usize,
    ratio: f64,
) -> Result<(Range<usize>, Range<usize>)> {
    if !(ratio > 0.0 && ratio < 1.0) {
        bail!("--ratio must be in (0, 1), got {ratio}");
    }
    if last_n == 0 || last_n > len {
        bail!("--last-n must be in [1, {len}], got {last_n}");
    }
    let window_start = len - last_n;
    let split = window_start + (last_n as f64 * ratio).round() as usize;
    if split == window_start || split >= len {
        bail!("ratio {ratio} of {last_n} bars leaves an empty segment");
    }
    Ok((window_start..split, split..len))
}

/// Write `count` permutations of the in-sample and out-of-sample segments of
/// the last `last_n` bars. Each file is the whole series with only its segment
/// permuted; the unpermuted series is `perm000`.
fn run_permute(
    data: &Path,
    last_n: usize,
    ratio: f64,
    count: usize,
    seed: u64,
    output_dir: &Path,
) -> Result<()> {
    let series = load_series_csv(data)?;
    let (in_range, out_range) = segment_bounds(series.len(), last_n, ratio)?;

    info!(
        bars = series.len(),
        in_sample = ?in_range,
        out_of_sample = ?out_range,
        count,
        "permuting segments"
    );
    write_batch(&series, in_range.clone(), count, seed, &output_dir.join("in"))?;
    write_batch(
        &series,
        out_range.clone(),
        count,
        seed.wrapping_add(1),
        &output_dir.join("out"),
    )?;
    println!(
        "Wrote {} permutations of [{}, {}) and [{}, {}) to {}",
        count,
        in_range.start,
        in_range.end,
        out_range.start,
        out_range.end,
        output_dir.display()
    );
    Ok(())
}

fn write_batch(
    series: &Series,
    range: Range<usize>,
    count: usize,
    seed: u64,
    dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    write_series_csv(series, &dir.join("perm000.csv"))?;
    let permuted = segment_permutations(series, range, count, seed)?;
    for (i, p) in permuted.iter().enumerate() {
        write_series_csv(p, &dir.join(format!("perm{:03}.csv", i + 1)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_sit_in_the_last_bars_of_the_series() {
        let (in_range, out_range) = segment_bounds(3000, 2000, 0.8).unwrap();
        assert_eq!(in_range, 1000..2600);
        assert_eq!(out_range, 2600..3000);
    }

    #[test]
    fn split_is_rounded() {
        let (in_range, out_range) = segment_bounds(10, 10, 0.75).unwrap();
        assert_eq!(in_range, 0..8);
        assert_eq!(out_range, 8..10);
        let (in_range, _) = segment_bounds(100, 7, 0.7).unwrap();
        assert_eq!(in_range, 93..98);
    }

    #[test]
    fn rejects_bad_window_or_ratio() {
        assert!(segment_bounds(100, 0, 0.5).is_err());
        assert!(segment_bounds(100, 101, 0.5).is_err());
        assert!(segment_bounds(100, 50, 1.0).is_err());
        assert!(segment_bounds(100, 50, 0.0).is_err());
        assert!(segment_bounds(100, 2, 0.1).is_err());
    }

    #[test]
    fn permuted_files_keep_bars_outside_their_segment() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("series.csv");
        let series = synthetic_series(300, 3).unwrap();
        write_series_csv(&series, &data).unwrap();

        let out = dir.path().join("perms");
        run_permute(&data, 100, 0.8, 2, 11, &out).unwrap();

        let rows = |path: PathBuf| -> Vec<String> {
            std::fs::read_to_string(path)
                .unwrap()
                .lines()
                .skip(1)
                .map(str::to_string)
                .collect()
        };
        let original = rows(data);

        let permuted = rows(out.join("in").join("perm001.csv"));
        assert_eq!(permuted.len(), 300);
        assert_eq!(permuted[..200], original[..200]);
        assert_ne!(permuted[200..280], original[200..280]);
        assert_eq!(permuted[280..], original[280..]);

        let permuted = rows(out.join("out").join("perm002.csv"));
        assert_eq!(permuted[..280], original[..280]);
        assert_eq!(rows(out.join("out").join("perm000.csv")), original);
    }
}
