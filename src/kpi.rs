use crate::clock::Clock;
use crate::error::DataError;
use crate::models::{DataStatus, InspectionRecord, InspectionResult, KpiSnapshot};
use crate::source::{DateRange, InspectionFilter, InspectionSource};

pub fn compute_kpis(rows: &[InspectionRecord]) -> KpiSnapshot {
    if rows.is_empty() {
        return KpiSnapshot::empty();
    }

    let total_inspected: u64 = rows.iter().map(|row| u64::from(row.total_inspected)).sum();
    let total_defects: u64 = rows.iter().map(|row| u64::from(row.defect_quantity)).sum();
    let passed = rows
        .iter()
        .filter(|row| row.result == InspectionResult::Pass)
        .count();

    KpiSnapshot {
        defect_rate: percentage(total_defects as f64, total_inspected as f64),
        inspection_efficiency: percentage(passed as f64, rows.len() as f64),
        total_inspections: rows.len(),
        data_status: DataStatus::Success,
    }
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// Window ending today, `days` long.
pub fn trailing_window(clock: &impl Clock, days: i64) -> Result<DateRange, DataError> {
    let start = clock
        .days_ago(days.max(1) - 1)
        .ok_or(DataError::InvalidWindow { days })?;
    Ok(DateRange::new(start, clock.today()))
}

pub async fn window_kpis<S: InspectionSource + ?Sized>(
    source: &S,
    clock: &impl Clock,
    days: i64,
    filter: &InspectionFilter,
) -> Result<KpiSnapshot, DataError> {
    let range = trailing_window(clock, days)?;
    let rows = source.fetch_inspections(range, filter).await?;
    tracing::debug!(rows = rows.len(), days = range.days(), end = %range.end, "computed window kpis");
    Ok(compute_kpis(&rows))
}
