//! Trial state machine for seed harvesting.
//!
//! The state machine sequences through:
//! CheckingTarget → EnteringSeed → Capturing → Recognizing → Recording → CheckingLoop
//! and back to CheckingTarget for the next seed. The target is checked before every
//! trial and after every failed step, and relaunched when it is gone.

use anyhow::{Context, Result};
use image::RgbaImage;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::automation::config::AutomationConfig;
use crate::automation::csv_writer::ObservationLog;
use crate::automation::diagnostics::{DiagnosticEntry, DiagnosticsLog};
use crate::automation::target::TargetProcess;
use crate::capture::ScreenCapture;
use crate::observation::Observation;
use crate::ocr::{prepare_for_ocr, OcrEngine};
use crate::proposals::{ProposalExtractor, PROPOSALS_PER_SEED, UNKNOWN_PROPOSAL};
use crate::seed::{Seed, SeedSequencer};

/// Trial state machine states.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialState {
    /// Waiting to start (initial state)
    Idle,
    /// Making sure the target is running, relaunching it if not
    CheckingTarget,
    /// Typing the seed and starting a game
    EnteringSeed,
    /// Capturing the proposal region(s)
    Capturing,
    /// Running OCR on the captured region(s)
    Recognizing,
    /// Extracting proposals and appending the observation
    Recording,
    /// Returning to seed entry and checking if we should continue
    CheckingLoop,
    /// Iteration limit reached or seed space exhausted
    Complete,
    /// Unrecoverable error
    Error(String),
}

impl std::fmt::Display for TrialState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrialState::Idle => write!(f, "Idle"),
            TrialState::CheckingTarget => write!(f, "Checking target"),
            TrialState::EnteringSeed => write!(f, "Entering seed"),
            TrialState::Capturing => write!(f, "Capturing"),
            TrialState::Recognizing => write!(f, "Recognizing"),
            TrialState::Recording => write!(f, "Recording"),
            TrialState::CheckingLoop => write!(f, "Checking loop"),
            TrialState::Complete => write!(f, "Complete"),
            TrialState::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Counters for one harvest run, returned as its summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSession {
    /// Trial attempts, including retries
    pub trials: u32,
    /// Observations with 3 recognized proposals
    pub complete: u32,
    /// Observations recorded with `UNKNOWN` slots
    pub incomplete: u32,
    /// Trial attempts that failed before recording
    pub failed: u32,
    /// Seeds given up on after exhausting retries
    pub skipped: u32,
    /// Target relaunches
    pub recoveries: u32,
    pub last_seed: Option<Seed>,
}

impl HarvestSession {
    /// Seeds that reached a final outcome (recorded or skipped).
    pub fn seeds_done(&self) -> u32 {
        self.complete + self.incomplete + self.skipped
    }
}

/// Everything a harvest run reads from and writes to.
pub struct HarvestParts<'a> {
    pub config: &'a AutomationConfig,
    pub ocr_threshold: Option<u8>,
    pub extractor: &'a ProposalExtractor,
    pub sequencer: &'a mut SeedSequencer,
    pub log: &'a ObservationLog,
    pub diagnostics: &'a DiagnosticsLog,
    pub target: &'a mut dyn TargetProcess,
    pub capture: &'a mut dyn ScreenCapture,
    pub ocr: &'a mut dyn OcrEngine,
}

/// Harvest context holding state, collaborators and progress.
pub struct HarvestContext<'a> {
    /// Current state
    pub state: TrialState,
    parts: HarvestParts<'a>,
    /// Seeds to finish before stopping; `None` runs until the space is exhausted
    max_seeds: Option<u32>,
    session: HarvestSession,
    /// Seed of the trial in progress
    seed: Option<Seed>,
    /// Failed attempts on the current seed
    attempt: u32,
    /// Relaunches since the last recorded trial
    consecutive_recoveries: u32,
    images: Vec<RgbaImage>,
    texts: Vec<String>,
    start_time: Instant,
}

impl<'a> HarvestContext<'a> {
    pub fn new(parts: HarvestParts<'a>, max_seeds: Option<u32>) -> Self {
        Self {
            state: TrialState::Idle,
            parts,
            max_seeds,
            session: HarvestSession::default(),
            seed: None,
            attempt: 0,
            consecutive_recoveries: 0,
            images: Vec::new(),
            texts: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn session(&self) -> &HarvestSession {
        &self.session
    }

    pub fn into_session(self) -> HarvestSession {
        self.session
    }

    /// Advances the state machine by one step.
    ///
    /// Returns `Ok(true)` if harvesting should continue, `Ok(false)` once complete or
    /// in error. `Err` means the observation log or resume file could not be written.
    pub fn step(&mut self) -> Result<bool> {
        match &self.state {
            TrialState::Idle => {
                info!(
                    "Starting harvest: {}",
                    match self.max_seeds {
                        Some(n) => format!("{} seeds", n),
                        None => "until the seed space is exhausted".to_string(),
                    }
                );
                self.state = TrialState::CheckingTarget;
                Ok(true)
            }

            TrialState::CheckingTarget => self.check_target(),

            TrialState::EnteringSeed => {
                let Some(seed) = self.seed else {
                    self.state = TrialState::CheckingTarget;
                    return Ok(true);
                };

                self.session.trials += 1;
                info!("{}: Entering seed {}", self.progress_string(), seed);

                if let Err(e) = self.parts.target.enter_seed(&seed) {
                    self.trial_failed(&format!("Failed to enter seed: {:#}", e));
                    return Ok(true);
                }

                std::thread::sleep(Duration::from_millis(self.parts.config.capture_delay_ms));
                self.state = TrialState::Capturing;
                Ok(true)
            }

            TrialState::Capturing => {
                let config = self.parts.config;
                self.images.clear();
                for region in &config.regions {
                    match self.parts.capture.capture(region) {
                        Ok(img) => self.images.push(img),
                        Err(e) => {
                            self.trial_failed(&format!("Failed to capture: {:#}", e));
                            return Ok(true);
                        }
                    }
                }

                self.state = TrialState::Recognizing;
                Ok(true)
            }

            TrialState::Recognizing => {
                let images = std::mem::take(&mut self.images);
                self.texts.clear();
                for img in &images {
                    let prepared = prepare_for_ocr(img, self.parts.ocr_threshold);
                    match self.parts.ocr.recognize(&prepared) {
                        Ok(text) => self.texts.push(text),
                        Err(e) => {
                            self.trial_failed(&format!("OCR failed: {:#}", e));
                            return Ok(true);
                        }
                    }
                }
                debug!("Recognized text: {:?}", self.texts);

                self.state = TrialState::Recording;
                Ok(true)
            }

            TrialState::Recording => {
                let Some(seed) = self.seed else {
                    self.state = TrialState::CheckingTarget;
                    return Ok(true);
                };

                let (proposals, partial) = self.extract_proposals();
                let observation = Observation::now(seed, proposals, self.texts.join("\n"));

                self.parts
                    .log
                    .record(&observation)
                    .context("Failed to record observation")?;

                if observation.is_complete() {
                    self.session.complete += 1;
                    info!(
                        "{}: {} -> {}",
                        self.progress_string(),
                        seed,
                        observation.proposals.join(", ")
                    );
                } else {
                    self.session.incomplete += 1;
                    warn!(
                        "{}: {} recognized only {:?}",
                        self.progress_string(),
                        seed,
                        partial
                    );
                    if let Err(e) = self
                        .parts
                        .diagnostics
                        .append(&DiagnosticEntry::from_observation(&observation, &partial))
                    {
                        warn!("Failed to write diagnostics entry: {:#}", e);
                    }
                }

                self.session.last_seed = Some(seed);
                self.consecutive_recoveries = 0;
                self.state = TrialState::CheckingLoop;
                Ok(true)
            }

            TrialState::CheckingLoop => {
                self.seed = None;
                self.attempt = 0;

                if let Err(e) = self.parts.target.finish_trial() {
                    // The next target check will relaunch if the target is gone.
                    warn!("Failed to return to seed entry: {:#}", e);
                }

                if self.limit_reached() {
                    self.finish();
                    return Ok(false);
                }

                self.state = TrialState::CheckingTarget;
                Ok(true)
            }

            TrialState::Complete | TrialState::Error(_) => Ok(false),
        }
    }

    fn check_target(&mut self) -> Result<bool> {
        if !self.parts.target.is_alive() {
            let max = self.parts.config.max_recovery_attempts;
            if self.consecutive_recoveries >= max {
                error!("Target did not recover after {} relaunches", max);
                self.state = TrialState::Error(format!(
                    "Target did not recover after {} relaunches",
                    max
                ));
                return Ok(false);
            }

            self.consecutive_recoveries += 1;
            self.session.recoveries += 1;
            warn!(
                "Target is not running, relaunching ({}/{})",
                self.consecutive_recoveries, max
            );
            if let Err(e) = self.parts.target.launch() {
                warn!("Relaunch failed: {:#}", e);
            }
            // Re-check on the next step.
            return Ok(true);
        }

        if self.seed.is_none() {
            match self.parts.sequencer.next_seed()? {
                Some(seed) => {
                    self.seed = Some(seed);
                    self.attempt = 0;
                }
                None => {
                    info!("Seed space exhausted");
                    self.finish();
                    return Ok(false);
                }
            }
        }

        self.state = TrialState::EnteringSeed;
        Ok(true)
    }

    /// Handles a failed trial step: retry the same seed, or skip it once retries run out.
    fn trial_failed(&mut self, reason: &str) {
        self.session.failed += 1;
        self.attempt += 1;

        let seed = self.seed.map(|s| s.to_string()).unwrap_or_default();
        if self.attempt > self.parts.config.max_trial_retries {
            warn!(
                "{}: {} (giving up on seed {} after {} attempts)",
                self.progress_string(),
                reason,
                seed,
                self.attempt
            );
            self.session.skipped += 1;
            self.seed = None;
            self.attempt = 0;

            if self.limit_reached() {
                self.finish();
                return;
            }
        } else {
            warn!(
                "{}: {} (retrying seed {}, attempt {}/{})",
                self.progress_string(),
                reason,
                seed,
                self.attempt + 1,
                self.parts.config.max_trial_retries + 1
            );
        }

        self.state = TrialState::CheckingTarget;
    }

    /// Slot order when each proposal has its own region, discovery order otherwise.
    fn extract_proposals(&self) -> ([String; PROPOSALS_PER_SEED], Vec<String>) {
        let extractor = self.parts.extractor;

        if self.texts.len() == PROPOSALS_PER_SEED {
            let slots: Vec<Option<String>> =
                self.texts.iter().map(|t| extractor.extract_one(t)).collect();
            let partial = slots.iter().flatten().cloned().collect();
            let proposals = std::array::from_fn(|i| {
                slots[i]
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_PROPOSAL.to_string())
            });
            (proposals, partial)
        } else {
            let set = extractor.extract(&self.texts.join("\n"));
            (set.padded(), set.found().to_vec())
        }
    }

    fn limit_reached(&self) -> bool {
        self.max_seeds
            .is_some_and(|max| self.session.seeds_done() >= max)
    }

    fn finish(&mut self) {
        info!(
            "Harvest complete: {} seeds in {:.1}s",
            self.session.seeds_done(),
            self.start_time.elapsed().as_secs_f32()
        );
        self.state = TrialState::Complete;
    }

    /// Returns a progress string for log lines (e.g. "3/100").
    pub fn progress_string(&self) -> String {
        let current = self.session.seeds_done() + 1;
        match self.max_seeds {
            Some(max) => format!("{}/{}", current, max),
            None => format!("#{}", current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PixelRect;
    use crate::proposals::{PatternTable, ProposalCatalog};
    use crate::seed::{SequencerConfig, SequencerMode};
    use anyhow::anyhow;
    use image::GrayImage;
    use std::collections::VecDeque;
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct FakeTarget {
        /// Scripted answers for is_alive; true once exhausted
        alive: VecDeque<bool>,
        always_dead: bool,
        enter_failures: u32,
        launches: u32,
        entered: Vec<Seed>,
        finished: u32,
    }

    impl TargetProcess for FakeTarget {
        fn is_alive(&mut self) -> bool {
            !self.always_dead && self.alive.pop_front().unwrap_or(true)
        }

        fn launch(&mut self) -> Result<()> {
            self.launches += 1;
            Ok(())
        }

        fn enter_seed(&mut self, seed: &Seed) -> Result<()> {
            self.entered.push(*seed);
            if self.enter_failures > 0 {
                self.enter_failures -= 1;
                return Err(anyhow!("input rejected"));
            }
            Ok(())
        }

        fn finish_trial(&mut self) -> Result<()> {
            self.finished += 1;
            Ok(())
        }
    }

    struct FakeCapture;

    impl ScreenCapture for FakeCapture {
        fn capture(&mut self, region: &PixelRect) -> Result<RgbaImage> {
            Ok(RgbaImage::new(region.width.min(8), region.height.min(8)))
        }
    }

    /// Returns scripted texts in order, then repeats the last one.
    struct FakeOcr {
        texts: VecDeque<String>,
        last: String,
    }

    impl FakeOcr {
        fn new(texts: &[&str]) -> Self {
            Self {
                texts: texts.iter().map(|t| t.to_string()).collect(),
                last: String::new(),
            }
        }
    }

    impl OcrEngine for FakeOcr {
        fn recognize(&mut self, _img: &GrayImage) -> Result<String> {
            if let Some(text) = self.texts.pop_front() {
                self.last = text;
            }
            Ok(self.last.clone())
        }
    }

    struct Fixture {
        dir: TempDir,
        config: AutomationConfig,
        extractor: ProposalExtractor,
        sequencer: SeedSequencer,
        log: ObservationLog,
        diagnostics: DiagnosticsLog,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let catalog = ProposalCatalog::builtin().unwrap();
            let extractor = ProposalExtractor::new(PatternTable::builtin(&catalog).unwrap());
            let sequencer = SeedSequencer::open(
                &SequencerConfig {
                    mode: SequencerMode::Systematic,
                    ..SequencerConfig::default()
                },
                &dir.path().join("last-seed.txt"),
            );
            let log = ObservationLog::open(&dir.path().join("seed-log.csv")).unwrap();
            let diagnostics = DiagnosticsLog::new(&dir.path().join("unknown-seeds.jsonl"));
            let config = AutomationConfig {
                capture_delay_ms: 0,
                ..AutomationConfig::default()
            };

            Self {
                dir,
                config,
                extractor,
                sequencer,
                log,
                diagnostics,
            }
        }

        fn run(
            &mut self,
            target: &mut FakeTarget,
            ocr: &mut FakeOcr,
            max_seeds: u32,
        ) -> (TrialState, HarvestSession) {
            let mut capture = FakeCapture;
            let mut ctx = HarvestContext::new(
                HarvestParts {
                    config: &self.config,
                    ocr_threshold: None,
                    extractor: &self.extractor,
                    sequencer: &mut self.sequencer,
                    log: &self.log,
                    diagnostics: &self.diagnostics,
                    target,
                    capture: &mut capture,
                    ocr,
                },
                Some(max_seeds),
            );
            while ctx.step().unwrap() {}
            let state = ctx.state.clone();
            (state, ctx.into_session())
        }

        fn log_lines(&self) -> Vec<String> {
            std::fs::read_to_string(self.log.path())
                .unwrap()
                .lines()
                .skip(1)
                .map(String::from)
                .collect()
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", TrialState::Idle), "Idle");
        assert_eq!(format!("{}", TrialState::EnteringSeed), "Entering seed");
        assert_eq!(
            format!("{}", TrialState::Error("test".to_string())),
            "Error: test"
        );
    }

    #[test]
    fn test_complete_trials_are_recorded() {
        let mut fx = Fixture::new();
        let mut target = FakeTarget::default();
        let mut ocr = FakeOcr::new(&["PADU\nPOEMS DB\nSECOND MONITOR"]);

        let (state, session) = fx.run(&mut target, &mut ocr, 3);

        assert_eq!(state, TrialState::Complete);
        assert_eq!(session.complete, 3);
        assert_eq!(session.trials, 3);
        assert_eq!(target.finished, 3);

        let lines = fx.log_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("00000,Second Monitor,Poems DB,PADU,"));
        assert!(lines[2].starts_with("00002,"));
    }

    #[test]
    fn test_incomplete_trial_goes_to_diagnostics() {
        let mut fx = Fixture::new();
        let mut target = FakeTarget::default();
        let mut ocr = FakeOcr::new(&["PADU POEMS DB ???"]);

        let (_, session) = fx.run(&mut target, &mut ocr, 1);

        assert_eq!(session.incomplete, 1);
        assert_eq!(session.complete, 0);
        assert!(fx.log_lines()[0].contains("UNKNOWN"));

        let diagnostics = std::fs::read_to_string(fx.diagnostics.path()).unwrap();
        let entry: DiagnosticEntry = serde_json::from_str(diagnostics.trim()).unwrap();
        assert_eq!(entry.seed, "00000");
        assert_eq!(entry.partial, vec!["Poems DB".to_string(), "PADU".to_string()]);
    }

    #[test]
    fn test_dead_target_is_relaunched() {
        let mut fx = Fixture::new();
        let mut target = FakeTarget {
            alive: VecDeque::from(vec![true, false]),
            ..FakeTarget::default()
        };
        let mut ocr = FakeOcr::new(&["FUSION PLANT LEAN ADMIN REMOTE BACKUPS"]);

        let (state, session) = fx.run(&mut target, &mut ocr, 2);

        assert_eq!(state, TrialState::Complete);
        assert_eq!(target.launches, 1);
        assert_eq!(session.recoveries, 1);
        assert_eq!(session.complete, 2);
    }

    #[test]
    fn test_recovery_is_bounded() {
        let mut fx = Fixture::new();
        fx.config.max_recovery_attempts = 2;
        let mut target = FakeTarget {
            always_dead: true,
            ..FakeTarget::default()
        };
        let mut ocr = FakeOcr::new(&["PADU"]);

        let (state, session) = fx.run(&mut target, &mut ocr, 5);

        assert!(matches!(state, TrialState::Error(_)));
        assert_eq!(target.launches, 2);
        assert_eq!(session.recoveries, 2);
        assert!(fx.log_lines().is_empty());
    }

    #[test]
    fn test_failed_trial_retries_then_skips() {
        let mut fx = Fixture::new();
        fx.config.max_trial_retries = 1;
        let mut target = FakeTarget {
            enter_failures: 2,
            ..FakeTarget::default()
        };
        let mut ocr = FakeOcr::new(&["PADU POEMS DB FUSION PLANT"]);

        let (state, session) = fx.run(&mut target, &mut ocr, 2);

        assert_eq!(state, TrialState::Complete);
        assert_eq!(session.failed, 2);
        assert_eq!(session.skipped, 1);
        assert_eq!(session.complete, 1);

        // First seed tried twice, then the stream moved on.
        let entered: Vec<String> = target.entered.iter().map(|s| s.to_string()).collect();
        assert_eq!(entered, vec!["00000", "00000", "00001"]);
        assert!(fx.log_lines()[0].starts_with("00001,"));
    }

    #[test]
    fn test_three_regions_keep_slot_order() {
        let mut fx = Fixture::new();
        fx.config.regions = vec![PixelRect::default(); 3];
        let mut target = FakeTarget::default();
        let mut ocr = FakeOcr::new(&["PADU", "SCANNING EXPLOIT", "smudge"]);

        let (_, session) = fx.run(&mut target, &mut ocr, 1);

        assert_eq!(session.incomplete, 1);
        assert!(fx.log_lines()[0].starts_with("00000,PADU,Scanning Exploit,UNKNOWN,"));
        assert!(fx.dir.path().join("unknown-seeds.jsonl").exists());
    }
}
