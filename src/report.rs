use std::fmt::Write;

use crate::models::{
    Alert, AlertStats, DefectRecord, DefectTypeSummary, KpiSnapshot, Priority, Shift,
    ShiftComparison,
};
use crate::source::DateRange;

pub fn alert_stats(alerts: &[Alert]) -> AlertStats {
    let mut stats = AlertStats {
        total: alerts.len(),
        ..AlertStats::default()
    };

    for alert in alerts {
        match alert.priority {
            Priority::Critical => stats.critical += 1,
            Priority::High => stats.high += 1,
            Priority::Medium => stats.medium += 1,
            Priority::Low => stats.low += 1,
        }
    }

    stats
}

/// Compact lines for a sidebar: the first `limit` alerts plus an overflow note.
pub fn sidebar_summary(alerts: &[Alert], limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = alerts
        .iter()
        .take(limit)
        .map(|alert| format!("{} [{}] {}", alert.icon, alert.priority.as_str(), alert.title))
        .collect();

    if alerts.len() > limit {
        lines.push(format!("+{} more", alerts.len() - limit));
    }

    lines
}

pub fn summarize_defects(defects: &[DefectRecord]) -> Vec<DefectTypeSummary> {
    let mut map: std::collections::HashMap<String, (usize, u64)> =
        std::collections::HashMap::new();

    for defect in defects {
        let entry = map.entry(defect.defect_type.clone()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += u64::from(defect.defect_count);
    }

    let mut summaries: Vec<DefectTypeSummary> = map
        .into_iter()
        .map(|(defect_type, (occurrences, total_count))| DefectTypeSummary {
            defect_type,
            occurrences,
            total_count,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.total_count
            .cmp(&a.total_count)
            .then_with(|| a.defect_type.cmp(&b.defect_type))
    });
    summaries
}

fn write_kpis(output: &mut String, kpis: &KpiSnapshot) {
    if !kpis.has_data() {
        let _ = writeln!(output, "No inspections recorded for this window.");
        return;
    }

    let _ = writeln!(output, "- Defect rate: {:.2}%", kpis.defect_rate);
    let _ = writeln!(
        output,
        "- Inspection efficiency: {:.1}%",
        kpis.inspection_efficiency
    );
    let _ = writeln!(output, "- Inspections: {}", kpis.total_inspections);
}

pub fn build_report(
    window: DateRange,
    kpis: &KpiSnapshot,
    shifts: Option<&ShiftComparison>,
    defects: &[DefectRecord],
    alerts: &[Alert],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Quality KPI Report");
    let _ = writeln!(output, "Inspections from {} to {}", window.start, window.end);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Window KPIs");
    write_kpis(&mut output, kpis);

    if let Some(comparison) = shifts {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Shift Comparison ({})", comparison.work_date);
        for shift in Shift::ALL {
            let snapshot = comparison.snapshot(shift);
            if snapshot.has_data() {
                let _ = writeln!(
                    output,
                    "- {}: defect rate {:.2}%, efficiency {:.1}%, {} inspections",
                    shift,
                    snapshot.defect_rate,
                    snapshot.inspection_efficiency,
                    snapshot.total_inspections
                );
            } else {
                let _ = writeln!(output, "- {}: no data", shift);
            }
        }
        if comparison.day_shift.has_data() && comparison.night_shift.has_data() {
            let _ = writeln!(
                output,
                "- Lower defect rate: {} (gap {:.2}%p)",
                comparison.analysis.better_defect_rate, comparison.analysis.defect_rate_diff
            );
        }
    }

    let summaries = summarize_defects(defects);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Defect Types");

    if summaries.is_empty() {
        let _ = writeln!(output, "No defects recorded for this window.");
    } else {
        for summary in summaries.iter().take(5) {
            let _ = writeln!(
                output,
                "- {}: {} units across {} records",
                summary.defect_type, summary.total_count, summary.occurrences
            );
        }
    }

    let stats = alert_stats(alerts);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");
    let _ = writeln!(
        output,
        "{} total ({} critical, {} high, {} medium, {} low)",
        stats.total, stats.critical, stats.high, stats.medium, stats.low
    );

    for alert in alerts {
        let _ = writeln!(
            output,
            "- {} **{}** [{}]: {} Action: {}",
            alert.icon,
            alert.title,
            alert.priority.as_str(),
            alert.message,
            alert.action
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::{AlertType, DataStatus};

    fn alert(priority: Priority, title: &str) -> Alert {
        Alert {
            id: format!("test_{title}"),
            alert_type: AlertType::KpiInspections,
            priority,
            title: title.to_string(),
            message: "message".to_string(),
            action: "action".to_string(),
            icon: "📉".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2026, 2, 10)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .unwrap(),
            shift_info: None,
            data: None,
        }
    }

    fn defect(defect_type: &str, count: u32) -> DefectRecord {
        DefectRecord {
            inspection_ref: Uuid::new_v4(),
            defect_type: defect_type.to_string(),
            defect_count: count,
        }
    }

    #[test]
    fn stats_count_each_priority() {
        let alerts = vec![
            alert(Priority::Critical, "a"),
            alert(Priority::High, "b"),
            alert(Priority::High, "c"),
            alert(Priority::Low, "d"),
        ];
        let stats = alert_stats(&alerts);
        assert_eq!(
            stats,
            AlertStats {
                total: 4,
                critical: 1,
                high: 2,
                medium: 0,
                low: 1,
            }
        );
    }

    #[test]
    fn sidebar_truncates_with_overflow_note() {
        let alerts = vec![
            alert(Priority::High, "first"),
            alert(Priority::Medium, "second"),
            alert(Priority::Low, "third"),
        ];
        let lines = sidebar_summary(&alerts, 2);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "📉 [high] first");
        assert_eq!(lines[2], "+1 more");
    }

    #[test]
    fn defects_rank_by_units() {
        let summaries = summarize_defects(&[
            defect("scratch", 2),
            defect("dent", 5),
            defect("scratch", 1),
        ]);
        assert_eq!(summaries[0].defect_type, "dent");
        assert_eq!(summaries[1].total_count, 3);
        assert_eq!(summaries[1].occurrences, 2);
    }

    #[test]
    fn report_lists_sections() {
        let window = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        );
        let kpis = KpiSnapshot {
            defect_rate: 0.125,
            inspection_efficiency: 96.0,
            total_inspections: 50,
            data_status: DataStatus::Success,
        };
        let report = build_report(
            window,
            &kpis,
            None,
            &[defect("burr", 4)],
            &[alert(Priority::Medium, "Low inspection volume")],
        );

        assert!(report.contains("Inspections from 2026-01-12 to 2026-02-10"));
        assert!(report.contains("- Defect rate: 0.13%") || report.contains("- Defect rate: 0.12%"));
        assert!(report.contains("- burr: 4 units across 1 records"));
        assert!(report.contains("1 total (0 critical, 0 high, 1 medium, 0 low)"));
    }
}
