use crate::chart::ChartPlan;
use crate::refresh::{RefreshConfig, DEFAULT_MAX_CONSECUTIVE_ERRORS};
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder value shipped in the sample config; refusing it catches the
/// classic "ran with the template" mistake before the first fetch.
const PLACEHOLDER_SPREADSHEET_ID: &str = "your-spreadsheet-id-here";

fn default_worksheet() -> String {
    crate::fetch::DEFAULT_WORKSHEET.to_string()
}

fn default_interval() -> u64 {
    30
}

fn default_duration() -> u64 {
    60
}

fn default_max_errors() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_ERRORS
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("charts")
}

/// Runtime configuration, loaded from YAML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Spreadsheet id from the sheet URL.
    pub spreadsheet_id: String,
    /// Worksheet holding the form responses.
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    /// File containing the bearer token; re-read on every fetch.
    pub token_file: PathBuf,
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_duration")]
    pub duration_minutes: u64,
    /// Stop early after this many seconds without a new response.
    #[serde(default)]
    pub idle_stop_after_seconds: Option<u64>,
    #[serde(default = "default_max_errors")]
    pub max_consecutive_errors: u32,
    /// Directory the chart PNGs are written into.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default)]
    pub charts: ChartPlan,
}

impl Config {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("could not read config `{}`", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("invalid config `{}`", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.spreadsheet_id.is_empty(), "spreadsheet_id is empty");
        ensure!(
            self.spreadsheet_id != PLACEHOLDER_SPREADSHEET_ID,
            "spreadsheet_id still has the placeholder value"
        );
        ensure!(self.interval_seconds > 0, "interval_seconds must be > 0");
        ensure!(self.duration_minutes > 0, "duration_minutes must be > 0");
        ensure!(
            self.max_consecutive_errors > 0,
            "max_consecutive_errors must be > 0"
        );
        Ok(())
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            interval: Duration::from_secs(self.interval_seconds),
            duration: Duration::from_secs(self.duration_minutes * 60),
            idle_stop_after: self.idle_stop_after_seconds.map(Duration::from_secs),
            max_consecutive_errors: self.max_consecutive_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
spreadsheet_id: "1AbCdEf"
worksheet: "Form Responses 1"
token_file: "/run/secrets/sheets-token"
interval_seconds: 15
duration_minutes: 45
idle_stop_after_seconds: 300
max_consecutive_errors: 5
out_dir: "dashboard"
charts:
  category: "experience"
  breakdown: "technologies"
  rating: "rate today's session"
  multi_select:
    - "What technologies are you most interested in? (Select all that apply)"
"#;

    #[test]
    fn parses_full_config() {
        let config = Config::from_yaml(FULL).unwrap();
        assert_eq!(config.spreadsheet_id, "1AbCdEf");
        assert_eq!(config.interval_seconds, 15);
        assert_eq!(config.charts.multi_select.len(), 1);

        let rc = config.refresh_config();
        assert_eq!(rc.interval, Duration::from_secs(15));
        assert_eq!(rc.duration, Duration::from_secs(45 * 60));
        assert_eq!(rc.idle_stop_after, Some(Duration::from_secs(300)));
        assert_eq!(rc.max_consecutive_errors, 5);
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_yaml(
            "spreadsheet_id: \"1AbCdEf\"\ntoken_file: \"/tmp/token\"\n",
        )
        .unwrap();
        assert_eq!(config.worksheet, "Form Responses 1");
        assert_eq!(config.interval_seconds, 30);
        assert_eq!(config.duration_minutes, 60);
        assert_eq!(config.idle_stop_after_seconds, None);
        assert_eq!(config.max_consecutive_errors, 3);
        assert_eq!(config.out_dir, PathBuf::from("charts"));
        assert_eq!(config.charts.category, "experience");
    }

    #[test]
    fn rejects_placeholder_and_zero_intervals() {
        let placeholder =
            "spreadsheet_id: \"your-spreadsheet-id-here\"\ntoken_file: \"/tmp/token\"\n";
        assert!(Config::from_yaml(placeholder).is_err());

        let zero =
            "spreadsheet_id: \"abc\"\ntoken_file: \"/tmp/token\"\ninterval_seconds: 0\n";
        assert!(Config::from_yaml(zero).is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        let extra = "spreadsheet_id: \"abc\"\ntoken_file: \"/tmp/t\"\nrefresh: 30\n";
        assert!(Config::from_yaml(extra).is_err());
    }

    #[test]
    fn from_yaml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheetpulse.yaml");
        fs::write(&path, FULL).unwrap();
        assert!(Config::from_yaml_file(&path).is_ok());
        assert!(Config::from_yaml_file(dir.path().join("missing.yaml")).is_err());
    }
}
