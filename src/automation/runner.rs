//! Automation runner - main entry point for the harvest loop.
//!
//! Builds the concrete target, capture and OCR implementations from config and
//! drives the trial state machine until it completes or fails.

use anyhow::{anyhow, Context, Result};
use tracing::{error, info};

use crate::automation::csv_writer::ObservationLog;
use crate::automation::diagnostics::DiagnosticsLog;
use crate::automation::state::{HarvestContext, HarvestParts, HarvestSession, TrialState};
use crate::automation::target::{CommandTarget, TargetProcess};
use crate::capture::{CommandCapture, ScreenCapture};
use crate::config::HarvesterConfig;
use crate::ocr::{OcrEngine, TesseractEngine};
use crate::paths::HarvestPaths;
use crate::proposals::{ProposalExtractor, PROPOSALS_PER_SEED};
use crate::seed::SeedSequencer;

/// Runs a harvest with the configured command target, command capture and Tesseract.
///
/// `iterations` is the number of seeds to finish; the config default when `None`.
pub fn start_harvest(
    paths: &HarvestPaths,
    config: &HarvesterConfig,
    extractor: &ProposalExtractor,
    iterations: Option<u32>,
) -> Result<HarvestSession> {
    let mut target = CommandTarget::new(config.automation.target.clone());
    let mut capture =
        CommandCapture::new(config.automation.capture_command.clone(), &paths.captures_dir())?;
    let mut ocr = TesseractEngine::new(&config.ocr)?;
    info!("Using Tesseract: {}", ocr.executable().display());

    let max_seeds = iterations.unwrap_or(config.automation.default_iterations);
    run_harvest(
        paths,
        config,
        extractor,
        &mut target,
        &mut capture,
        &mut ocr,
        Some(max_seeds),
    )
}

/// Runs the trial state machine with the given collaborators.
pub fn run_harvest(
    paths: &HarvestPaths,
    config: &HarvesterConfig,
    extractor: &ProposalExtractor,
    target: &mut dyn TargetProcess,
    capture: &mut dyn ScreenCapture,
    ocr: &mut dyn OcrEngine,
    max_seeds: Option<u32>,
) -> Result<HarvestSession> {
    let regions = config.automation.regions.len();
    if regions != 1 && regions != PROPOSALS_PER_SEED {
        return Err(anyhow!(
            "Expected 1 or {} capture regions, got {}",
            PROPOSALS_PER_SEED,
            regions
        ));
    }

    std::fs::create_dir_all(paths.data_dir()).context("Failed to create data directory")?;
    let mut sequencer = SeedSequencer::open(&config.sequencer, &paths.resume_file());
    let log = ObservationLog::open(&paths.raw_log()).context("Failed to open observation log")?;
    let diagnostics = DiagnosticsLog::new(&paths.diagnostics_file());

    info!("Observation log: {}", log.path().display());
    info!("Resume file: {}", paths.resume_file().display());

    let mut ctx = HarvestContext::new(
        HarvestParts {
            config: &config.automation,
            ocr_threshold: config.ocr.threshold,
            extractor,
            sequencer: &mut sequencer,
            log: &log,
            diagnostics: &diagnostics,
            target,
            capture,
            ocr,
        },
        max_seeds,
    );

    loop {
        match ctx.step() {
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) => {
                error!("Harvest stopped: {:#}", e);
                return Err(e);
            }
        }
    }

    let state = ctx.state.clone();
    let session = ctx.into_session();
    info!(
        "Trials: {}, complete: {}, incomplete: {}, failed: {}, skipped: {}, recoveries: {}",
        session.trials,
        session.complete,
        session.incomplete,
        session.failed,
        session.skipped,
        session.recoveries
    );
    let position = sequencer.state();
    info!(
        "Sequencer ({:?}) will resume at position {}",
        position.mode, position.next_index
    );

    match state {
        TrialState::Error(msg) => Err(anyhow!("Harvest failed: {}", msg)),
        _ => Ok(session),
    }
}
