use chrono::{NaiveDate, NaiveDateTime};

use crate::config::ShiftSchedule;
use crate::error::DataError;
use crate::kpi::compute_kpis;
use crate::models::{InspectionRecord, Shift, ShiftAnalysis, ShiftComparison};
use crate::source::{DateRange, InspectionFilter, InspectionSource};

impl ShiftSchedule {
    pub fn is_complete(&self) -> bool {
        matches!((self.day_start, self.night_start), (Some(day), Some(night)) if day < night)
    }

    /// Maps a timestamp to its shift and work-date. Night hours after midnight
    /// belong to the previous work-date.
    pub fn resolve(&self, at: NaiveDateTime) -> Option<(Shift, NaiveDate)> {
        let (day_start, night_start) = match (self.day_start, self.night_start) {
            (Some(day), Some(night)) if day < night => (day, night),
            _ => return None,
        };

        let time = at.time();
        let date = at.date();
        if time < day_start {
            date.pred_opt().map(|previous| (Shift::Night, previous))
        } else if time < night_start {
            Some((Shift::Day, date))
        } else {
            Some((Shift::Night, date))
        }
    }
}

pub fn compare_partitions(
    work_date: NaiveDate,
    day_rows: &[InspectionRecord],
    night_rows: &[InspectionRecord],
) -> ShiftComparison {
    let day_shift = compute_kpis(day_rows);
    let night_shift = compute_kpis(night_rows);
    let better_defect_rate = if day_shift.defect_rate <= night_shift.defect_rate {
        Shift::Day
    } else {
        Shift::Night
    };

    ShiftComparison {
        work_date,
        analysis: ShiftAnalysis {
            defect_rate_diff: (day_shift.defect_rate - night_shift.defect_rate).abs(),
            better_defect_rate,
        },
        day_shift,
        night_shift,
    }
}

/// Rows without an entry time cannot be placed on a shift and are left out.
pub fn partition_rows(
    schedule: &ShiftSchedule,
    work_date: NaiveDate,
    rows: Vec<InspectionRecord>,
) -> (Vec<InspectionRecord>, Vec<InspectionRecord>) {
    let mut day = Vec::new();
    let mut night = Vec::new();
    let mut untimed = 0usize;

    for row in rows {
        let Some(created_at) = row.created_at else {
            untimed += 1;
            continue;
        };
        match schedule.resolve(created_at) {
            Some((Shift::Day, date)) if date == work_date => day.push(row),
            Some((Shift::Night, date)) if date == work_date => night.push(row),
            _ => {}
        }
    }

    if untimed > 0 {
        tracing::info!(%work_date, untimed, "skipped inspection rows without created_at");
    }

    (day, night)
}

pub async fn compare_shifts<S: InspectionSource + ?Sized>(
    source: &S,
    schedule: &ShiftSchedule,
    work_date: NaiveDate,
) -> Result<ShiftComparison, DataError> {
    if !schedule.is_complete() {
        tracing::warn!(%work_date, "shift boundaries are not configured, reporting no data");
        return Ok(compare_partitions(work_date, &[], &[]));
    }

    // Night shift spills past midnight onto the next calendar date.
    let range = DateRange::new(work_date, work_date.succ_opt().unwrap_or(work_date));
    let rows = source
        .fetch_inspections(range, &InspectionFilter::default())
        .await?;
    let (day, night) = partition_rows(schedule, work_date, rows);
    tracing::debug!(%work_date, day = day.len(), night = night.len(), "partitioned shift rows");

    Ok(compare_partitions(work_date, &day, &night))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;
    use uuid::Uuid;

    use super::*;
    use crate::models::{DataStatus, InspectionResult};
    use crate::source::MemorySource;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        date(day).and_hms_opt(hour, minute, 0).unwrap()
    }

    fn row(created_at: NaiveDateTime, inspected: u32, defects: u32) -> InspectionRecord {
        InspectionRecord {
            id: Uuid::new_v4(),
            date: created_at.date(),
            inspector_ref: "INS-02".to_string(),
            model_ref: "MDL-B".to_string(),
            process: "assembly".to_string(),
            total_inspected: inspected,
            defect_quantity: defects,
            result: if defects > 0 {
                InspectionResult::Fail
            } else {
                InspectionResult::Pass
            },
            notes: String::new(),
            created_at: Some(created_at),
        }
    }

    #[test]
    fn resolve_assigns_boundaries() {
        let schedule = ShiftSchedule::default();
        assert_eq!(schedule.resolve(at(10, 7, 30)), Some((Shift::Day, date(10))));
        assert_eq!(schedule.resolve(at(10, 19, 29)), Some((Shift::Day, date(10))));
        assert_eq!(schedule.resolve(at(10, 19, 30)), Some((Shift::Night, date(10))));
        assert_eq!(schedule.resolve(at(11, 2, 0)), Some((Shift::Night, date(10))));
        assert_eq!(schedule.resolve(at(11, 7, 29)), Some((Shift::Night, date(10))));
    }

    #[test]
    fn resolve_needs_both_boundaries() {
        let schedule = ShiftSchedule {
            day_start: NaiveTime::from_hms_opt(7, 30, 0),
            night_start: None,
        };
        assert!(schedule.resolve(at(10, 9, 0)).is_none());
        assert!(!schedule.is_complete());
    }

    #[test]
    fn lower_defect_rate_wins() {
        let day = vec![row(at(10, 9, 0), 10_000, 3)];
        let night = vec![row(at(10, 22, 0), 10_000, 9)];
        let comparison = compare_partitions(date(10), &day, &night);
        assert_eq!(comparison.analysis.better_defect_rate, Shift::Day);
        assert!((comparison.analysis.defect_rate_diff - 0.06).abs() < 1e-9);
    }

    #[test]
    fn ties_favour_day_shift() {
        let comparison = compare_partitions(date(10), &[], &[]);
        assert_eq!(comparison.analysis.better_defect_rate, Shift::Day);
        assert_eq!(comparison.analysis.defect_rate_diff, 0.0);
        assert_eq!(comparison.day_shift.data_status, DataStatus::NoData);
    }

    #[tokio::test]
    async fn compare_shifts_collects_night_rows_after_midnight() {
        let source = MemorySource::new(vec![
            row(at(10, 6, 0), 100, 1),
            row(at(10, 8, 0), 100, 0),
            row(at(10, 20, 0), 100, 2),
            row(at(11, 3, 0), 100, 0),
            row(at(11, 8, 0), 100, 5),
        ]);

        let comparison = compare_shifts(&source, &ShiftSchedule::default(), date(10))
            .await
            .unwrap();
        assert_eq!(comparison.day_shift.total_inspections, 1);
        assert_eq!(comparison.night_shift.total_inspections, 2);
        assert_eq!(comparison.night_shift.defect_rate, 1.0);
        assert_eq!(comparison.analysis.better_defect_rate, Shift::Day);
    }

    #[tokio::test]
    async fn untimed_rows_stay_out_of_both_shifts() {
        let mut untimed = row(at(10, 9, 0), 100, 4);
        untimed.created_at = None;
        let source = MemorySource::new(vec![untimed, row(at(10, 21, 0), 100, 0)]);

        let previous = compare_shifts(&source, &ShiftSchedule::default(), date(9))
            .await
            .unwrap();
        assert!(!previous.day_shift.has_data());
        assert!(!previous.night_shift.has_data());

        let own = compare_shifts(&source, &ShiftSchedule::default(), date(10))
            .await
            .unwrap();
        assert!(!own.day_shift.has_data());
        assert_eq!(own.night_shift.total_inspections, 1);
        assert_eq!(own.night_shift.defect_rate, 0.0);
    }

    #[tokio::test]
    async fn missing_schedule_reports_no_data() {
        let source = MemorySource::new(vec![row(at(10, 9, 0), 100, 1)]);
        let schedule = ShiftSchedule {
            day_start: None,
            night_start: None,
        };
        let comparison = compare_shifts(&source, &schedule, date(10)).await.unwrap();
        assert!(!comparison.day_shift.has_data());
        assert!(!comparison.night_shift.has_data());
    }
}
