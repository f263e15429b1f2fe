//! Harvest automation around the target process.
//!
//! This module provides:
//! - Macro-driven control of the target process
//! - The trial state machine with crash detection and bounded recovery
//! - The append-only observation log and the diagnostics channel

pub mod config;
pub mod csv_writer;
pub mod diagnostics;
pub mod runner;
pub mod state;
pub mod target;

pub use config::{AutomationConfig, MacroStep, TargetConfig};
pub use csv_writer::ObservationLog;
pub use diagnostics::{DiagnosticEntry, DiagnosticsLog};
pub use runner::{run_harvest, start_harvest};
pub use state::{HarvestContext, HarvestParts, HarvestSession, TrialState};
pub use target::{CommandTarget, TargetProcess};
