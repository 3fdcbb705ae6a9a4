use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humansize::{format_size, DECIMAL};
use log::{error, info, warn};
use dubmerge::{
    classifier, pairing,
    FfmpegTools, InMemoryJobStore, Job, JobMode, JobRunner, JobStatus, MatchedPair, MergeConfig,
    PairingOptions, Pipeline, Sandbox,
};

/// Merge dubbed Spanish audio into original-language video files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find VO/ES pairs and print them
    Search {
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Search, merge every pair, validate and delete the sources
    Full {
        #[command(flatten)]
        search: SearchArgs,
        /// Output directory (default: next to each VO file)
        #[arg(long)]
        destination: Option<PathBuf>,
        /// Library kind: tv or movie
        #[arg(long, default_value = "tv")]
        mode: JobMode,
        /// Print the final job as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the normalized form of file names
    Normalize {
        #[arg(long, num_args = 1.., required = true)]
        files: Vec<PathBuf>,
    },
    /// Remux files into MKV containers
    Convert {
        #[arg(long, num_args = 1.., required = true)]
        files: Vec<PathBuf>,
    },
    /// Merge one ES file into one VO file
    Merge {
        #[arg(long)]
        vo: PathBuf,
        #[arg(long)]
        es: PathBuf,
        #[arg(long)]
        destination: Option<PathBuf>,
    },
    /// Validate a merged file and delete its sources
    Cleanup {
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        es: PathBuf,
        #[arg(long)]
        vo: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// Directories to search (must be inside the media root)
    #[arg(long, num_args = 1.., required = true)]
    paths: Vec<PathBuf>,
    /// Series name filter
    #[arg(long)]
    series: Option<String>,
    /// Season number filter
    #[arg(long)]
    season: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG still wins over the default level
    let level = if args.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let mut cfg = MergeConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    cfg.apply_env_overrides();
    cfg.validate().context("Invalid configuration")?;

    info!("Media root: {}", cfg.media_root.display());
    if !cfg.media_root.exists() {
        warn!("Media root does not exist: {}", cfg.media_root.display());
    }
    let sandbox = Sandbox::new(&cfg.media_root);

    match args.command {
        Command::Search { search } => {
            let pairs = find_pairs(&cfg, &sandbox, &search)?;
            for (key, pair) in &pairs {
                println!("{}:", key);
                println!("  VO: {}", pair.vo_path.display());
                println!("  ES: {}", pair.es_path.display());
            }
        }
        Command::Full { search, destination, mode, json } => {
            FfmpegTools::detect(&cfg).await?;
            let pairs = find_pairs(&cfg, &sandbox, &search)?;
            let destination = destination.or_else(|| cfg.destination.clone());
            let job = run_batch(&cfg, sandbox, pairs, mode, destination).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&job)?);
            } else {
                print_results(&job);
            }

            if job.status == JobStatus::Failed {
                anyhow::bail!("Job {} failed: {}", job.id, job.error.unwrap_or_default());
            }
            let failed = job.file_count - job.succeeded_count();
            if failed > 0 {
                anyhow::bail!("{} of {} pair(s) failed", failed, job.file_count);
            }
        }
        Command::Normalize { files } => {
            for file in files {
                let name = file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
                println!("{} -> {}", file.display(), classifier::normalize_filename(&name));
            }
        }
        Command::Convert { files } => {
            FfmpegTools::detect(&cfg).await?;
            let pipeline = Pipeline::from_config(&cfg);
            let mut failures = 0;
            for file in files {
                let converted = match sandbox.check(&file) {
                    Ok(()) => pipeline.normalize(&file).await,
                    Err(e) => Err(e),
                };
                match converted {
                    Ok(mkv) => println!("Converted: {}", mkv.display()),
                    Err(e) => {
                        error!("❌ {}", e);
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{} file(s) could not be converted", failures);
            }
        }
        Command::Merge { vo, es, destination } => {
            FfmpegTools::detect(&cfg).await?;
            let key = vo.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
            let mut pairs = BTreeMap::new();
            pairs.insert(key.clone(), MatchedPair { key, vo_path: vo, es_path: es });

            let destination = destination.or_else(|| cfg.destination.clone());
            let job = run_batch(&cfg, sandbox, pairs, JobMode::Movie, destination).await?;
            let result = job.results.first().context("Merge produced no result")?;
            if !result.success {
                anyhow::bail!("{}", result.message);
            }
            if let Some(output) = &result.output_path {
                println!("Merged audio tracks: {}", output.display());
            }
        }
        Command::Cleanup { output, es, vo } => {
            FfmpegTools::detect(&cfg).await?;
            for path in [Some(&output), Some(&es), vo.as_ref()].into_iter().flatten() {
                sandbox.check(path)?;
            }
            let pipeline = Pipeline::from_config(&cfg);
            pipeline
                .finalize(&output, &es, vo.as_deref())
                .await
                .with_context(|| format!("Cleanup failed for {}", output.display()))?;
            println!("Validated and cleaned up: {}", output.display());
        }
    }

    Ok(())
}

fn find_pairs(cfg: &MergeConfig, sandbox: &Sandbox, search: &SearchArgs) -> Result<BTreeMap<String, MatchedPair>> {
    let roots = sandbox.filter_roots(&search.paths)?;
    let pairs = pairing::pair(&roots, search.series.as_deref(), search.season, PairingOptions::from(cfg))
        .context("Invalid search filter")?;
    if pairs.is_empty() {
        anyhow::bail!("No matching file pairs found");
    }
    Ok(pairs)
}

/// Submit one batch and report progress until it finishes
async fn run_batch(
    cfg: &MergeConfig,
    sandbox: Sandbox,
    pairs: BTreeMap<String, MatchedPair>,
    mode: JobMode,
    destination: Option<PathBuf>,
) -> Result<Job> {
    let runner = JobRunner::new(Arc::new(InMemoryJobStore::new()), Pipeline::from_config(cfg), sandbox);
    let submitted = runner.submit(pairs.into_values().collect(), mode, destination)?;
    let id = submitted.id.clone();

    let mut last_processed = None;
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let Some(job) = runner.get(&id) else { break };
        if last_processed != Some(job.processed_count) {
            info!("[{}] {} {}/{} ({:.0}%)", id, job.status, job.processed_count, job.file_count, job.progress_percent);
            last_processed = Some(job.processed_count);
        }
        if job.status.is_terminal() {
            break;
        }
    }

    submitted.wait().await.context("Job disappeared from the store")
}

fn print_results(job: &Job) {
    for result in &job.results {
        if result.success {
            let output = result.output_path.as_deref().unwrap_or(Path::new(""));
            let size = std::fs::metadata(output).map(|m| format_size(m.len(), DECIMAL)).unwrap_or_default();
            println!("✅ {} -> {} ({})", result.vo_path.display(), output.display(), size);
        } else {
            println!("❌ {}: {}", result.vo_path.display(), result.message);
        }
    }
    println!(
        "Successfully processed {} out of {} file pairs",
        job.succeeded_count(),
        job.file_count
    );
}
