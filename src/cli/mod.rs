//! Lasso Sweep CLI Module
//!
//! Command-line interface for running sweeps and inspecting data and grids.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{SweepConfig, DEFAULT_CV_BINS, DEFAULT_SPLIT_BINS};
use crate::data::{load_frame, FrameSummary};
use crate::optimizer::{HyperparameterGrid, SelectionRule};
use crate::pipeline::{SweepPipeline, SweepReport};
use crate::training::Metric;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "lasso-sweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cross-validated lasso penalty sweep")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split, cross-validate a penalty grid, refit the winner and score it on held-out rows
    Run(RunArgs),

    /// Print the penalties a grid would contain
    Grid {
        /// Smallest penalty
        #[arg(long, default_value = "0.001")]
        min: f64,

        /// Largest penalty
        #[arg(long, default_value = "1.0")]
        max: f64,

        /// Number of penalties
        #[arg(short, long, default_value = "10")]
        count: usize,
    },

    /// Show data information
    Info {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,
    },
}

/// Options for `run`; anything left unset comes from `--config` or the defaults
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Input data file (CSV, JSON, or Parquet)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Target column name
    #[arg(short, long)]
    pub target: String,

    /// JSON sweep configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seed for the split and fold assignment
    #[arg(long)]
    pub seed: Option<u64>,

    /// Share of rows used for training
    #[arg(long)]
    pub train_fraction: Option<f64>,

    /// Number of cross-validation folds
    #[arg(long)]
    pub folds: Option<usize>,

    /// Number of grid points
    #[arg(long)]
    pub grid_count: Option<usize>,

    /// Metric (rmse, mae, rsq, accuracy, roc_auc)
    #[arg(short, long)]
    pub metric: Option<Metric>,

    /// Selection rule (best, one_std_err)
    #[arg(long)]
    pub selection: Option<SelectionRule>,

    /// Worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Stratify the split and the folds on the target
    #[arg(long)]
    pub stratify: bool,

    /// Write the JSON report here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RunArgs {
    /// Config file (or defaults) with command-line overrides applied
    pub fn to_config(&self) -> anyhow::Result<SweepConfig> {
        let mut config = match &self.config {
            Some(path) => SweepConfig::from_json_file(path)?,
            None => SweepConfig::default(),
        };
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(fraction) = self.train_fraction {
            config = config.with_train_fraction(fraction);
        }
        if let Some(folds) = self.folds {
            config = config.with_folds(folds);
        }
        if let Some(count) = self.grid_count {
            config.grid_count = count;
        }
        if let Some(metric) = self.metric {
            config = config.with_metric(metric);
        }
        if let Some(selection) = self.selection {
            config = config.with_selection(selection);
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if self.stratify {
            config = config
                .with_split_strata(self.target.clone(), DEFAULT_SPLIT_BINS)
                .with_cv_strata(self.target.clone(), DEFAULT_CV_BINS);
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(args: &RunArgs) -> anyhow::Result<SweepReport> {
    section("Sweep");

    let config = args.to_config()?;

    step_run("Loading data");
    let start = Instant::now();
    let df = load_frame(&args.data)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    step_run(&format!(
        "Sweeping {} penalties × {} folds on {} workers",
        config.grid_count,
        config.fold_count * config.fold_repeats,
        config.worker_count
    ));
    let start = Instant::now();
    let report = SweepPipeline::new(config)?.run_frame(&df, &args.target)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_report(&report);

    if let Some(path) = &args.output {
        step_run(&format!("Saving report → {}", path.display()));
        report.save(path)?;
        step_done("");
    }

    println!();
    Ok(report)
}

fn print_report(report: &SweepReport) {
    let metric = report.metric.name();
    let chosen = report.selected.point.index;

    println!();
    println!(
        "  {:<4} {:>12} {:>12} {:>10} {:>6}",
        muted("#"),
        muted("Penalty"),
        muted(&format!("Mean {}", metric)),
        muted("Std err"),
        muted("Folds")
    );
    println!("  {}", dim(&"─".repeat(48)));
    for agg in &report.aggregates {
        let line = format!(
            "{:<4} {:>12.6} {:>12.4} {:>10.4} {:>6}",
            agg.point.index, agg.point.penalty, agg.cv.mean, agg.cv.std_err, agg.cv.n_folds
        );
        if agg.point.index == chosen {
            println!("  {} {}", line.white().bold(), ok("◀"));
        } else {
            println!("  {}", line);
        }
    }
    for excluded in &report.excluded {
        println!(
            "  {:<4} {:>12.6} {}",
            excluded.point.index,
            excluded.point.penalty,
            "excluded".yellow()
        );
    }
    if !report.failures.is_empty() {
        println!("  {} {}", "!".yellow(), muted(&format!("{} fold fits failed", report.failures.len())));
    }

    println!();
    println!("  {:<16} {}", muted("Penalty"), format!("{:.6}", report.selected.penalty()).white().bold());
    println!("  {:<16} {}", muted("Intercept"), format!("{:.4}", report.selected.fit.intercept()).white());
    println!(
        "  {:<16} {}",
        muted(&format!("Test {}", metric)),
        format!("{:.4}", report.test_score).white().bold()
    );
    println!(
        "  {:<16} {} of {}",
        muted("Non-zero"),
        report.selected.fit.non_zero_count(),
        report.selected.fit.feature_names().len()
    );

    let top: Vec<_> = report.importance.iter().filter(|f| f.importance > 0.0).take(10).collect();
    if !top.is_empty() {
        println!();
        println!("  {:<24} {:>10}", muted("Feature"), muted("Importance"));
        println!("  {}", dim(&"─".repeat(36)));
        for f in top {
            let sign = if f.sign < 0.0 { "-".red() } else { "+".green() };
            println!("  {:<24} {:>9.4}{}", f.feature, f.importance, sign);
        }
    }
}

pub fn cmd_grid(min: f64, max: f64, count: usize) -> anyhow::Result<()> {
    section("Penalty Grid");

    let grid = HyperparameterGrid::log_space(min, max, count)?;
    for point in grid.points() {
        println!("  {:<4} {}", muted(&point.index.to_string()), format!("{:.6e}", point.penalty).white());
    }

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = load_frame(data_path)?;
    let summary = FrameSummary::of(&df);

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), summary.n_rows);
    println!("  {:<12} {}", muted("Columns"), summary.n_cols);
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<20} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(42)));

    for col in &summary.columns {
        println!(
            "  {:<20} {:<12} {:>6}",
            col.name,
            col.dtype.truecolor(140, 140, 140),
            col.null_count
        );
    }

    println!();
    Ok(())
}
