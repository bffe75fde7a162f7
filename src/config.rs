use std::path::Path;

use anyhow::Context;
use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_UTC_OFFSET: &str = "+09:00";
pub const MAX_WINDOW_DAYS: i64 = 3660;

/// Boundaries of the two production shifts. A missing boundary leaves both
/// shifts without data rather than guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSchedule {
    pub day_start: Option<NaiveTime>,
    pub night_start: Option<NaiveTime>,
}

impl Default for ShiftSchedule {
    fn default() -> Self {
        Self {
            day_start: NaiveTime::from_hms_opt(7, 30, 0),
            night_start: NaiveTime::from_hms_opt(19, 30, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub delay_window_days: i64,
    pub defect_alert_critical_quantity: u64,
    pub kpi_window_days: i64,
    pub kpi_defect_rate: f64,
    pub kpi_defect_rate_critical: f64,
    pub kpi_efficiency: f64,
    pub kpi_efficiency_high: f64,
    pub kpi_min_inspections: usize,
    pub shift_defect_rate: f64,
    pub shift_defect_rate_critical: f64,
    pub shift_efficiency: f64,
    pub shift_efficiency_medium_above: f64,
    pub shift_gap: f64,
    pub shift_min_inspections: usize,
    pub shift_change_tolerance_minutes: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            delay_window_days: 7,
            defect_alert_critical_quantity: 10,
            kpi_window_days: 30,
            kpi_defect_rate: 0.02,
            kpi_defect_rate_critical: 2.0,
            kpi_efficiency: 95.0,
            kpi_efficiency_high: 80.0,
            kpi_min_inspections: 30,
            shift_defect_rate: 0.02,
            shift_defect_rate_critical: 0.1,
            shift_efficiency: 95.0,
            shift_efficiency_medium_above: 90.0,
            shift_gap: 0.05,
            shift_min_inspections: 10,
            shift_change_tolerance_minutes: 5,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, days) in [
            ("delay_window_days", self.delay_window_days),
            ("kpi_window_days", self.kpi_window_days),
        ] {
            anyhow::ensure!(
                (1..=MAX_WINDOW_DAYS).contains(&days),
                "{name} must be between 1 and {MAX_WINDOW_DAYS}, got {days}"
            );
        }
        anyhow::ensure!(
            (0..24 * 60).contains(&self.shift_change_tolerance_minutes),
            "shift_change_tolerance_minutes must be between 0 and 1439, got {}",
            self.shift_change_tolerance_minutes
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    shift_schedule: Option<ShiftSchedule>,
    thresholds: Thresholds,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub utc_offset: FixedOffset,
    pub shift_schedule: ShiftSchedule,
    pub thresholds: Thresholds,
}

impl AppConfig {
    /// Reads `DATABASE_URL` and `QC_UTC_OFFSET`, then layers the optional JSON file on top.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let offset_raw =
            std::env::var("QC_UTC_OFFSET").unwrap_or_else(|_| DEFAULT_UTC_OFFSET.to_string());
        let utc_offset = parse_offset(&offset_raw)?;

        let file = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config from {}", path.display()))?;
                parse_file(&contents)
                    .with_context(|| format!("invalid config in {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        Ok(Self {
            database_url,
            utc_offset,
            shift_schedule: file.shift_schedule.unwrap_or_default(),
            thresholds: file.thresholds,
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn parse_file(contents: &str) -> anyhow::Result<FileConfig> {
    let file: FileConfig = serde_json::from_str(contents)?;
    file.thresholds.validate()?;
    Ok(file)
}

pub fn parse_offset(raw: &str) -> anyhow::Result<FixedOffset> {
    raw.trim()
        .parse::<FixedOffset>()
        .with_context(|| format!("invalid UTC offset {raw:?}, expected e.g. +09:00"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rule_table() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.kpi_window_days, 30);
        assert_eq!(thresholds.kpi_defect_rate, 0.02);
        assert_eq!(thresholds.shift_gap, 0.05);
        assert_eq!(thresholds.shift_min_inspections, 10);
    }

    #[test]
    fn file_overrides_only_named_fields() {
        let file = parse_file(r#"{"thresholds": {"kpi_min_inspections": 50}}"#).unwrap();
        assert_eq!(file.thresholds.kpi_min_inspections, 50);
        assert_eq!(file.thresholds.kpi_efficiency, 95.0);
        assert!(file.shift_schedule.is_none());
    }

    #[test]
    fn out_of_range_windows_are_rejected() {
        let err = parse_file(r#"{"thresholds": {"kpi_window_days": 1000000000}}"#).unwrap_err();
        assert!(err.to_string().contains("kpi_window_days"));
        assert!(parse_file(r#"{"thresholds": {"delay_window_days": 0}}"#).is_err());
        assert!(parse_file(r#"{"thresholds": {"shift_change_tolerance_minutes": -1}}"#).is_err());
        assert!(Thresholds::default().validate().is_ok());
    }

    #[test]
    fn null_boundary_is_kept_as_missing() {
        let file =
            parse_file(r#"{"shift_schedule": {"day_start": "08:00:00", "night_start": null}}"#)
                .unwrap();
        let schedule = file.shift_schedule.unwrap();
        assert_eq!(schedule.day_start, NaiveTime::from_hms_opt(8, 0, 0));
        assert!(schedule.night_start.is_none());
    }

    #[test]
    fn offset_parses_signed_hours() {
        assert_eq!(parse_offset("+09:00").unwrap().local_minus_utc(), 9 * 3600);
        assert_eq!(parse_offset("-05:00").unwrap().local_minus_utc(), -5 * 3600);
        assert!(parse_offset("KST").is_err());
    }
}
