use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InspectionResult {
    Pass,
    Fail,
}

impl InspectionResult {
    /// Parses a stored result string. Unknown values fall back on the defect count.
    pub fn parse_or_infer(raw: &str, defect_quantity: u32) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            _ if defect_quantity > 0 => Self::Fail,
            _ => Self::Pass,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub inspector_ref: String,
    pub model_ref: String,
    pub process: String,
    pub total_inspected: u32,
    pub defect_quantity: u32,
    pub result: InspectionResult,
    pub notes: String,
    /// Entry time in the plant zone; rows entered without one carry only a date.
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefectRecord {
    pub inspection_ref: Uuid,
    pub defect_type: String,
    pub defect_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Inspectors,
    Models,
    DefectTypes,
}

impl ReferenceKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Inspectors => "qc_dashboard.inspectors",
            Self::Models => "qc_dashboard.product_models",
            Self::DefectTypes => "qc_dashboard.defect_types",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRow {
    pub id: Uuid,
    pub kind: ReferenceKind,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStatus {
    Success,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub defect_rate: f64,
    pub inspection_efficiency: f64,
    pub total_inspections: usize,
    pub data_status: DataStatus,
}

impl KpiSnapshot {
    pub fn empty() -> Self {
        Self {
            defect_rate: 0.0,
            inspection_efficiency: 0.0,
            total_inspections: 0,
            data_status: DataStatus::NoData,
        }
    }

    pub fn has_data(&self) -> bool {
        self.data_status == DataStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    Day,
    Night,
}

impl Shift {
    pub const ALL: [Shift; 2] = [Shift::Day, Shift::Night];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Night => "night",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Day => "Day shift",
            Self::Night => "Night shift",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftAnalysis {
    pub defect_rate_diff: f64,
    pub better_defect_rate: Shift,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftComparison {
    pub work_date: NaiveDate,
    pub day_shift: KpiSnapshot,
    pub night_shift: KpiSnapshot,
    pub analysis: ShiftAnalysis,
}

impl ShiftComparison {
    pub fn snapshot(&self, shift: Shift) -> &KpiSnapshot {
        match shift {
            Shift::Day => &self.day_shift,
            Shift::Night => &self.night_shift,
        }
    }
}

/// Alert severity. Declaration order is the display order, critical first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    InspectionDelay,
    DailyMissing,
    DefectAlert,
    KpiDefectRate,
    KpiEfficiency,
    KpiInspections,
    ShiftDefectDay,
    ShiftDefectNight,
    ShiftEfficiencyDay,
    ShiftEfficiencyNight,
    ShiftGap,
    ShiftVolumeDay,
    ShiftVolumeNight,
    ShiftChange,
    SystemError,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InspectionDelay => "inspection_delay",
            Self::DailyMissing => "daily_missing",
            Self::DefectAlert => "defect_alert",
            Self::KpiDefectRate => "kpi_defect_rate",
            Self::KpiEfficiency => "kpi_efficiency",
            Self::KpiInspections => "kpi_inspections",
            Self::ShiftDefectDay => "shift_defect_day",
            Self::ShiftDefectNight => "shift_defect_night",
            Self::ShiftEfficiencyDay => "shift_efficiency_day",
            Self::ShiftEfficiencyNight => "shift_efficiency_night",
            Self::ShiftGap => "shift_gap",
            Self::ShiftVolumeDay => "shift_volume_day",
            Self::ShiftVolumeNight => "shift_volume_night",
            Self::ShiftChange => "shift_change",
            Self::SystemError => "system_error",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::InspectionDelay | Self::DailyMissing => "⏰",
            Self::DefectAlert => "🚨",
            Self::KpiDefectRate | Self::KpiEfficiency | Self::KpiInspections => "📉",
            Self::ShiftDefectDay | Self::ShiftDefectNight => "⚠️",
            Self::ShiftEfficiencyDay | Self::ShiftEfficiencyNight => "📊",
            Self::ShiftGap => "⚖️",
            Self::ShiftVolumeDay | Self::ShiftVolumeNight => "📦",
            Self::ShiftChange => "🔄",
            Self::SystemError => "🛠️",
        }
    }

    pub fn shift_defect(shift: Shift) -> Self {
        match shift {
            Shift::Day => Self::ShiftDefectDay,
            Shift::Night => Self::ShiftDefectNight,
        }
    }

    pub fn shift_efficiency(shift: Shift) -> Self {
        match shift {
            Shift::Day => Self::ShiftEfficiencyDay,
            Shift::Night => Self::ShiftEfficiencyNight,
        }
    }

    pub fn shift_volume(shift: Shift) -> Self {
        match shift {
            Shift::Day => Self::ShiftVolumeDay,
            Shift::Night => Self::ShiftVolumeNight,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub action: String,
    pub icon: String,
    pub timestamp: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertStats {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone)]
pub struct DefectTypeSummary {
    pub defect_type: String,
    pub occurrences: usize,
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_puts_critical_first() {
        let mut values = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        values.sort();
        assert_eq!(
            values,
            vec![Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
        );
        assert_eq!(Priority::Critical.rank(), 0);
        assert_eq!(Priority::Low.rank(), 3);
    }

    #[test]
    fn unknown_result_strings_fall_back_on_defects() {
        assert_eq!(InspectionResult::parse_or_infer("pass", 3), InspectionResult::Pass);
        assert_eq!(InspectionResult::parse_or_infer(" Fail ", 0), InspectionResult::Fail);
        assert_eq!(InspectionResult::parse_or_infer("", 2), InspectionResult::Fail);
        assert_eq!(InspectionResult::parse_or_infer("n/a", 0), InspectionResult::Pass);
    }

    #[test]
    fn alert_serializes_type_in_snake_case() {
        let alert = Alert {
            id: "kpi_efficiency_2026-02-02".to_string(),
            alert_type: AlertType::KpiEfficiency,
            priority: Priority::Medium,
            title: "t".to_string(),
            message: "m".to_string(),
            action: "a".to_string(),
            icon: AlertType::KpiEfficiency.icon().to_string(),
            timestamp: NaiveDate::from_ymd_opt(2026, 2, 2)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .unwrap(),
            shift_info: None,
            data: None,
        };
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "kpi_efficiency");
        assert_eq!(value["priority"], "medium");
        assert!(value.get("shift_info").is_none());
    }
}
