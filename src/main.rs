//! Seed Harvester
//!
//! Drives a target program through its seeds, reads the proposals it shows
//! for each one, and turns the harvested observations into a deduplicated
//! master dataset with statistics and a static seed finder page.

mod analysis;
mod automation;
mod capture;
mod config;
mod observation;
mod ocr;
mod paths;
mod proposals;
mod seed;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::HarvesterConfig;
use crate::ocr::OcrEngine;
use crate::paths::HarvestPaths;
use crate::proposals::{ProposalExtractor, PROPOSALS_PER_SEED};
use crate::seed::{index_lossy, Seed, SEED_SPACE};

#[derive(Parser, Debug)]
#[command(name = "seed-harvester")]
#[command(about = "Harvest and analyse per-seed proposal sets")]
#[command(version)]
struct Args {
    /// Base directory holding config.json, output/, data/ and frontend/
    #[arg(short, long, global = true)]
    base_dir: Option<PathBuf>,

    /// Config file; <base-dir>/config.json by default
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the harvest loop against the target program
    Harvest {
        /// Seeds to finish before stopping
        #[arg(short = 'n', long)]
        iterations: Option<u32>,
    },
    /// Merge the raw log into the master dataset and refresh derived files
    Process {
        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Print coverage statistics for the master dataset
    Stats {
        /// List every missing combination
        #[arg(long)]
        missing: bool,
    },
    /// Rebuild the seed finder page from the template
    Frontend,
    /// Extract proposals from text, a text file or a screenshot
    Extract {
        text: Option<String>,
        #[arg(long, conflicts_with_all = ["text", "image"])]
        file: Option<PathBuf>,
        /// Run OCR on this image first
        #[arg(long, conflicts_with = "text")]
        image: Option<PathBuf>,
    },
    /// Convert between a seed and its index
    Seed {
        seed: Option<String>,
        #[arg(long, conflicts_with = "seed")]
        index: Option<u64>,
    },
}

fn init_logging(paths: &HarvestPaths) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths.log_file())
        .context(format!("Failed to open log file: {}", paths.log_file().display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let base = args.base_dir.clone().unwrap_or_else(paths::get_exe_dir);
    let paths = HarvestPaths::new(base);
    paths
        .ensure_directories()
        .context(format!("Failed to create directories under {}", paths.base().display()))?;
    init_logging(&paths)?;

    std::panic::set_hook(Box::new(|panic_info| {
        error!("[PANIC] {}", panic_info);
    }));

    let config_path = args.config.clone().unwrap_or_else(|| paths.config_file());
    let config = HarvesterConfig::load(&config_path);
    let catalog = config.load_catalog(paths.base())?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    match args.command {
        Command::Harvest { iterations } => {
            info!("=== Harvest ===");
            if let Err(e) = ocr::ensure_tesseract(config.ocr.tesseract_path.as_deref()) {
                warn!("Tesseract check failed: {:#}", e);
                return Err(e);
            }
            let extractor = ProposalExtractor::new(config.load_patterns(paths.base(), &catalog)?);
            let session = automation::start_harvest(&paths, &config, &extractor, iterations)?;
            info!(
                "Harvest finished: {} seeds done, last seed {}",
                session.seeds_done(),
                session
                    .last_seed
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
        Command::Process { dry_run } => {
            info!("=== Process ===");
            match analysis::run_pipeline(&paths, &catalog, dry_run, &stamp)? {
                Some(summary) => info!(
                    "Added {} new seeds, {} excluded, master now covers {:.4}% of combinations",
                    summary.report.added,
                    summary.report.excluded(),
                    summary.stats.coverage_percent
                ),
                None => info!("Nothing to process"),
            }
        }
        Command::Stats { missing } => {
            let stats = analysis::load_stats(&paths, &catalog)?;
            println!("Seeds:        {}", stats.total_seeds);
            println!(
                "Combinations: {} / {} ({:.4}%)",
                stats.combinations_found, stats.total_combinations, stats.coverage_percent
            );
            println!();
            println!("{:<32} {:>8} {:>8}   slots", "proposal", "count", "rate");
            for p in &stats.proposals {
                println!(
                    "{:<32} {:>8} {:>7.2}%   {:?}",
                    p.name,
                    p.count,
                    p.rate * 100.0,
                    p.slots
                );
            }
            if missing {
                println!();
                println!("Missing combinations ({}):", stats.missing_combinations.len());
                for combo in &stats.missing_combinations {
                    println!("  {}", combo.join(", "));
                }
            }
        }
        Command::Frontend => {
            let count = analysis::regenerate_frontend(&paths, &catalog)?;
            info!(
                "Wrote {} with {} seeds",
                paths.frontend_file().display(),
                count
            );
        }
        Command::Extract { text, file, image } => {
            let text = match (text, file, image.as_ref()) {
                (Some(text), _, _) => text,
                (None, Some(file), _) => fs::read_to_string(&file)
                    .context(format!("Failed to read {}", file.display()))?,
                (None, None, Some(image_path)) => {
                    let img = image::open(image_path)
                        .context(format!("Failed to open {}", image_path.display()))?
                        .to_rgba8();
                    let prepared = ocr::prepare_for_ocr(&img, config.ocr.threshold);
                    ocr::TesseractEngine::new(&config.ocr)?.recognize(&prepared)?
                }
                (None, None, None) => return Err(anyhow!("Pass TEXT, --file or --image")),
            };
            let extractor = ProposalExtractor::new(config.load_patterns(paths.base(), &catalog)?);
            let found = extractor.extract(&text);
            for name in found.found() {
                println!("{}", name);
            }
            if !found.is_complete() {
                warn!(
                    "Only {} of {} proposals recognised",
                    found.len(),
                    PROPOSALS_PER_SEED
                );
            }
        }
        Command::Seed { seed, index } => match (seed, index) {
            (Some(text), _) => match Seed::parse(&text) {
                Ok(seed) => println!("{} -> {}", seed, seed.index()),
                Err(e) => {
                    warn!("{}: {}", text, e);
                    println!("{} -> {} (lossy)", text, index_lossy(&text));
                }
            },
            (None, Some(index)) => {
                let seed = Seed::from_index(index)?;
                println!("{} -> {}", index, seed);
            }
            (None, None) => println!("Seed space: {} seeds (00000..ZZZZZ)", SEED_SPACE),
        },
    }

    Ok(())
}
