//! Configuration types for automation.
//!
//! Describes how to drive the target process (macro steps), where to capture the
//! proposal text on screen, and the recovery limits.

use serde::{Deserialize, Serialize};

use crate::capture::PixelRect;

/// One step of an input macro.
///
/// `run` executes an argv list, with `{seed}` replaced by the current seed
/// (e.g. `["xdotool", "type", "{seed}"]`). `wait` sleeps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MacroStep {
    Run { argv: Vec<String> },
    Wait { ms: u64 },
}

/// How to launch, probe and drive the target process.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Steps that start the target and bring it to the seed entry screen
    pub launch: Vec<MacroStep>,
    /// Command whose success means the target is running (e.g. `["pgrep", "-x", "game"]`).
    /// The target is assumed alive when unset.
    pub alive_check: Option<Vec<String>>,
    /// Steps that type the seed and start a new game
    pub enter_seed: Vec<MacroStep>,
    /// Steps that return from the proposal screen to the seed entry screen
    pub finish_trial: Vec<MacroStep>,
}

/// Complete automation configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub target: TargetConfig,
    /// Screenshot command; `{path}` is replaced with the PNG to write
    pub capture_command: Vec<String>,
    /// One region covering all proposals, or three regions in slot order
    pub regions: Vec<PixelRect>,
    /// Delay after entering a seed before capturing (milliseconds)
    pub capture_delay_ms: u64,
    /// Consecutive relaunches allowed before the run stops
    pub max_recovery_attempts: u32,
    /// Extra attempts for a failed trial before its seed is skipped
    pub max_trial_retries: u32,
    /// Trials per `harvest` run when no iteration count is given
    pub default_iterations: u32,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            capture_command: vec!["scrot".to_string(), "-o".to_string(), "{path}".to_string()],
            regions: vec![PixelRect {
                x: 560,
                y: 300,
                width: 800,
                height: 480,
            }],
            capture_delay_ms: 1500,
            max_recovery_attempts: 3,
            max_trial_retries: 2,
            default_iterations: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_steps_from_json() {
        let json = r#"[
            {"action": "run", "argv": ["xdotool", "type", "{seed}"]},
            {"action": "wait", "ms": 250}
        ]"#;
        let steps: Vec<MacroStep> = serde_json::from_str(json).unwrap();

        assert_eq!(
            steps,
            vec![
                MacroStep::Run {
                    argv: vec!["xdotool".into(), "type".into(), "{seed}".into()]
                },
                MacroStep::Wait { ms: 250 },
            ]
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AutomationConfig =
            serde_json::from_str(r#"{"max_trial_retries": 5}"#).unwrap();
        assert_eq!(config.max_trial_retries, 5);
        assert_eq!(config.max_recovery_attempts, 3);
        assert_eq!(config.regions.len(), 1);
    }
}
