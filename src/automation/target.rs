//! The process being harvested and how input reaches it.

use anyhow::{anyhow, Context, Result};
use std::process::Command;
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::config::{MacroStep, TargetConfig};
use crate::seed::Seed;

const SEED_PLACEHOLDER: &str = "{seed}";

/// Control over the target process for one harvest run.
pub trait TargetProcess {
    /// True while the target is running and able to accept input.
    fn is_alive(&mut self) -> bool;
    /// Starts (or restarts) the target and brings it to the seed entry screen.
    fn launch(&mut self) -> Result<()>;
    /// Enters `seed` and starts a game so the proposals are shown.
    fn enter_seed(&mut self, seed: &Seed) -> Result<()>;
    /// Returns from the proposal screen to the seed entry screen.
    fn finish_trial(&mut self) -> Result<()>;
}

/// Drives the target through configured command macros.
pub struct CommandTarget {
    config: TargetConfig,
}

impl CommandTarget {
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }
}

impl TargetProcess for CommandTarget {
    fn is_alive(&mut self) -> bool {
        let Some(argv) = &self.config.alive_check else {
            return true;
        };
        let Some((program, args)) = argv.split_first() else {
            return true;
        };

        match Command::new(program).args(args).output() {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!("Alive check {:?} failed to run: {}", program, e);
                false
            }
        }
    }

    fn launch(&mut self) -> Result<()> {
        run_macro(&self.config.launch, None).context("Launch macro failed")
    }

    fn enter_seed(&mut self, seed: &Seed) -> Result<()> {
        run_macro(&self.config.enter_seed, Some(seed)).context("Seed entry macro failed")
    }

    fn finish_trial(&mut self) -> Result<()> {
        run_macro(&self.config.finish_trial, None).context("Finish macro failed")
    }
}

/// Runs macro steps in order, stopping at the first failing command.
pub fn run_macro(steps: &[MacroStep], seed: Option<&Seed>) -> Result<()> {
    for step in steps {
        match step {
            MacroStep::Wait { ms } => thread::sleep(Duration::from_millis(*ms)),
            MacroStep::Run { argv } => {
                let args = substitute(argv, seed);
                let Some((program, rest)) = args.split_first() else {
                    continue;
                };

                debug!("Running macro step: {:?}", args);
                let status = Command::new(program)
                    .args(rest)
                    .status()
                    .context(format!("Failed to run {:?}", program))?;
                if !status.success() {
                    return Err(anyhow!("{:?} exited with {}", program, status));
                }
            }
        }
    }
    Ok(())
}

fn substitute(argv: &[String], seed: Option<&Seed>) -> Vec<String> {
    match seed {
        Some(seed) => argv
            .iter()
            .map(|a| a.replace(SEED_PLACEHOLDER, seed.as_str()))
            .collect(),
        None => argv.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_seed() {
        let seed = Seed::parse("ABC12").unwrap();
        let argv = vec!["xdotool".to_string(), "type".to_string(), "{seed}".to_string()];
        assert_eq!(substitute(&argv, Some(&seed))[2], "ABC12");
        assert_eq!(substitute(&argv, None)[2], "{seed}");
    }

    #[test]
    fn test_no_alive_check_means_alive() {
        let mut target = CommandTarget::new(TargetConfig::default());
        assert!(target.is_alive());
    }

    #[cfg(unix)]
    #[test]
    fn test_macro_stops_on_failure() {
        let steps = vec![
            MacroStep::Wait { ms: 1 },
            MacroStep::Run { argv: vec!["false".to_string()] },
            MacroStep::Run { argv: vec!["true".to_string()] },
        ];
        assert!(run_macro(&steps, None).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_alive_check_uses_exit_status() {
        let mut alive = CommandTarget::new(TargetConfig {
            alive_check: Some(vec!["true".to_string()]),
            ..TargetConfig::default()
        });
        let mut dead = CommandTarget::new(TargetConfig {
            alive_check: Some(vec!["false".to_string()]),
            ..TargetConfig::default()
        });
        assert!(alive.is_alive());
        assert!(!dead.is_alive());
    }
}
