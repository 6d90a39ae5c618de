//! Runtime configuration, loadable from a TOML file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name looked up next to the analysed project.
pub const CONFIG_FILE: &str = "perfmap.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub timeout: TimeoutConfig,
    pub judge: JudgeConfig,
    pub analysis: AnalysisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: TimeoutConfig::default(),
            judge: JudgeConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Which timeout estimator the run uses and its tuning knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    pub strategy: TimeoutStrategy,
    /// Budget for the `fixed` strategy.
    pub fixed_budget_ms: u64,
    /// Sliding-window width for the `regression` strategy.
    pub regression_window: usize,
    /// Acceptable extrapolated phase duration for `regression`.
    pub regression_tolerance_ms: u64,
    /// Smoothing weight kept on the old estimate for `ageing`.
    pub ageing_factor: f64,
    /// Initial phase-duration estimate for `ageing`.
    pub ageing_seed_ms: u64,
    pub ageing_multiplicative_slack: f64,
    pub ageing_additive_slack_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            strategy: TimeoutStrategy::Regression,
            fixed_budget_ms: 60 * 60 * 1000,
            regression_window: 10,
            regression_tolerance_ms: 30_000,
            ageing_factor: 0.5,
            ageing_seed_ms: 60 * 60 * 1000,
            ageing_multiplicative_slack: 0.5,
            ageing_additive_slack_ms: 5_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutStrategy {
    None,
    Fixed,
    Regression,
    Ageing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JudgeConfig {
    /// Fitness-history window inspected for a plateau.
    pub plateau_window: usize,
    /// Relative improvement below which the window counts as flat.
    pub plateau_threshold: f64,
    /// Hard wall-clock ceiling for the whole campaign.
    pub ceiling_hours: i64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            plateau_window: 5,
            plateau_threshold: 0.05,
            ceiling_hours: 72,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Upper bound on measurement rounds.
    pub max_rounds: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { max_rounds: 100 }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Serialize the defaults, for `init` scaffolding.
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("failed to serialize default config")
    }

    pub fn fixed_budget(&self) -> Duration {
        Duration::from_millis(self.timeout.fixed_budget_ms)
    }

    pub fn regression_tolerance(&self) -> Duration {
        Duration::from_millis(self.timeout.regression_tolerance_ms)
    }

    pub fn ageing_seed(&self) -> Duration {
        Duration::from_millis(self.timeout.ageing_seed_ms)
    }

    pub fn ageing_additive_slack(&self) -> Duration {
        Duration::from_millis(self.timeout.ageing_additive_slack_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_omitted_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[timeout]\nstrategy = \"ageing\"\nageing_factor = 0.8\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout.strategy, TimeoutStrategy::Ageing);
        assert_eq!(config.timeout.ageing_factor, 0.8);
        assert_eq!(config.judge, JudgeConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[timeout]\nno_such_knob = 1\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn default_toml_round_trips() {
        let rendered = Config::default_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
