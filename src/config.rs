use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::features;
use crate::forest::ForestParams;
use crate::record::Metric;
use crate::rolling::DEFAULT_WINDOW;

const CACHE_DIR: &str = "matchform";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub window: usize,
    pub cutoff: NaiveDate,
    pub tracked: Vec<Metric>,
    pub safe_predictors: Vec<String>,
    pub forest: ForestParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            cutoff: default_cutoff(),
            tracked: Metric::ALL.to_vec(),
            safe_predictors: features::default_safe_predictors(),
            forest: ForestParams::default(),
        }
    }
}

fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default()
}

impl PipelineConfig {
    /// Defaults, then `MATCHFORM_CONFIG` (a JSON file), then individual
    /// `MATCHFORM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var("MATCHFORM_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_json_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = serde_json::from_str(&raw).map_err(|err| {
            PipelineError::InvalidConfig(format!("config {}: {err}", path.display()))
        })?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<(), PipelineError> {
        if let Some(raw) = env_value("MATCHFORM_CUTOFF") {
            self.cutoff = parse_cutoff("MATCHFORM_CUTOFF", &raw)?;
        }
        if let Some(raw) = env_value("MATCHFORM_WINDOW") {
            self.window = parse_setting("MATCHFORM_WINDOW", &raw)?;
        }
        if let Some(raw) = env_value("MATCHFORM_TREES") {
            self.forest.n_estimators = parse_setting("MATCHFORM_TREES", &raw)?;
        }
        if let Some(raw) = env_value("MATCHFORM_SEED") {
            self.forest.seed = parse_setting("MATCHFORM_SEED", &raw)?;
        }
        Ok(())
    }

    /// Overrides from `--cutoff`, `--window`, `--trees`, `--seed`,
    /// `--min-samples-split`, `--tracked` and `--predictors` flags, in either
    /// `--flag value` or `--flag=value` form.
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), PipelineError> {
        if let Some(raw) = arg_value(args, "--cutoff") {
            self.cutoff = parse_cutoff("--cutoff", &raw)?;
        }
        if let Some(raw) = arg_value(args, "--window") {
            self.window = parse_setting("--window", &raw)?;
        }
        if let Some(raw) = arg_value(args, "--trees") {
            self.forest.n_estimators = parse_setting("--trees", &raw)?;
        }
        if let Some(raw) = arg_value(args, "--seed") {
            self.forest.seed = parse_setting("--seed", &raw)?;
        }
        if let Some(raw) = arg_value(args, "--min-samples-split") {
            self.forest.min_samples_split = parse_setting("--min-samples-split", &raw)?;
        }
        if let Some(raw) = arg_value(args, "--tracked") {
            let mut tracked = Vec::new();
            for part in split_list(&raw) {
                let metric = Metric::from_column(part).ok_or_else(|| {
                    PipelineError::InvalidConfig(format!(
                        "--tracked: unknown metric column `{part}`"
                    ))
                })?;
                tracked.push(metric);
            }
            self.tracked = tracked;
        }
        if let Some(raw) = arg_value(args, "--predictors") {
            self.safe_predictors = split_list(&raw).map(str::to_string).collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.window == 0 {
            return Err(PipelineError::InvalidConfig(
                "window must be at least 1".to_string(),
            ));
        }
        if self.tracked.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "no tracked metrics".to_string(),
            ));
        }
        self.forest
            .validate()
            .map_err(|err| PipelineError::InvalidConfig(err.to_string()))?;
        features::resolve_predictors(&self.safe_predictors, &self.tracked)?;
        Ok(())
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .with_context(|| format!("invalid date `{}` (expected YYYY-MM-DD)", raw.trim()))
}

/// `$XDG_CACHE_HOME/matchform`, falling back to `~/.cache/matchform`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

fn parse_setting<T>(name: &str, raw: &str) -> Result<T, PipelineError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| PipelineError::InvalidConfig(format!("{name} `{raw}`: {err}")))
}

fn parse_cutoff(name: &str, raw: &str) -> Result<NaiveDate, PipelineError> {
    parse_date(raw).map_err(|err| PipelineError::InvalidConfig(format!("{name}: {err:#}")))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cli_args_override_defaults() {
        let mut cfg = PipelineConfig::default();
        cfg.apply_args(&args(&[
            "--cutoff=2023-08-01",
            "--window",
            "3",
            "--trees",
            "7",
            "--tracked",
            "GF, GA",
            "--predictors=GF_rolling,GA_rolling,venue_code",
        ]))
        .expect("args should apply");
        assert_eq!(cfg.cutoff, NaiveDate::from_ymd_opt(2023, 8, 1).unwrap());
        assert_eq!(cfg.window, 3);
        assert_eq!(cfg.forest.n_estimators, 7);
        assert_eq!(cfg.tracked, vec![Metric::GoalsFor, Metric::GoalsAgainst]);
        assert_eq!(cfg.safe_predictors.len(), 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bad_cutoff_is_rejected() {
        let mut cfg = PipelineConfig::default();
        let err = cfg
            .apply_args(&args(&["--cutoff", "01/06/2024"]))
            .expect_err("day-first dates are rejected");
        assert!(err.is_configuration());
    }

    #[test]
    fn malformed_numbers_are_configuration_errors() {
        for bad in [
            &["--window", "five"][..],
            &["--trees=-3"][..],
            &["--seed", "1.5"][..],
            &["--tracked", "GF,possession"][..],
        ] {
            let mut cfg = PipelineConfig::default();
            let err = cfg.apply_args(&args(bad)).expect_err("value should not parse");
            assert!(matches!(err, PipelineError::InvalidConfig(_)), "{bad:?}: {err}");
            // The binary sees these through anyhow.
            let wrapped = anyhow::Error::from(err);
            assert!(
                wrapped
                    .downcast_ref::<PipelineError>()
                    .is_some_and(PipelineError::is_configuration)
            );
        }
    }

    #[test]
    fn malformed_json_config_is_a_configuration_error() {
        let path = std::env::temp_dir().join(format!(
            "matchform-config-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{"window": "wide"}"#).expect("write temp config");
        let err = PipelineConfig::from_json_file(&path).expect_err("window must be a number");
        fs::remove_file(&path).ok();
        assert!(
            err.downcast_ref::<PipelineError>()
                .is_some_and(PipelineError::is_configuration)
        );
    }

    #[test]
    fn predictor_outside_tracked_metrics_fails_validation() {
        let cfg = PipelineConfig {
            tracked: vec![Metric::GoalsFor],
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"cutoff":"2022-01-15","tracked":["GF","xG"]}"#)
                .expect("config should parse");
        assert_eq!(cfg.window, DEFAULT_WINDOW);
        assert_eq!(cfg.tracked, vec![Metric::GoalsFor, Metric::ExpectedGoals]);
        assert_eq!(cfg.forest, ForestParams::default());
    }
}
