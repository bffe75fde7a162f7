use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::{ShiftSchedule, Thresholds};
use crate::error::DataError;
use crate::kpi::{trailing_window, window_kpis};
use crate::models::{Alert, AlertType, KpiSnapshot, Priority, Shift, ShiftComparison};
use crate::shift::compare_shifts;
use crate::source::{DateRange, InspectionFilter, InspectionSource};

const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckDomain {
    Delay,
    Defect,
    Kpi,
    Shift,
}

impl CheckDomain {
    fn key(&self) -> &'static str {
        match self {
            Self::Delay => "delay",
            Self::Defect => "defect",
            Self::Kpi => "kpi",
            Self::Shift => "shift",
        }
    }
}

impl Alert {
    fn raise(
        alert_type: AlertType,
        priority: Priority,
        entity: &str,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Self {
        let id = if entity.is_empty() {
            format!("{alert_type}_{date}")
        } else {
            format!("{alert_type}_{entity}_{date}")
        };

        Self {
            id,
            alert_type,
            priority,
            title: String::new(),
            message: String::new(),
            action: String::new(),
            icon: alert_type.icon().to_string(),
            timestamp: now,
            shift_info: None,
            data: None,
        }
    }

    fn text(mut self, title: impl Into<String>, message: impl Into<String>, action: &str) -> Self {
        self.title = title.into();
        self.message = message.into();
        self.action = action.to_string();
        self
    }

    fn shift_info(mut self, info: impl Into<String>) -> Self {
        self.shift_info = Some(info.into());
        self
    }

    fn data(mut self, data: &impl Serialize) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }
}

pub struct AlertEngine<'a, S: ?Sized, C> {
    source: &'a S,
    clock: &'a C,
    schedule: ShiftSchedule,
    thresholds: Thresholds,
}

impl<'a, S, C> AlertEngine<'a, S, C>
where
    S: InspectionSource + ?Sized,
    C: Clock,
{
    pub fn new(source: &'a S, clock: &'a C, schedule: ShiftSchedule, thresholds: Thresholds) -> Self {
        Self {
            source,
            clock,
            schedule,
            thresholds,
        }
    }

    /// Data failures become one low-priority `system_error` alert per domain.
    pub async fn evaluate(&self) -> Vec<Alert> {
        let now = self.clock.now();
        let mut alerts = Vec::new();
        let mut failed: Vec<CheckDomain> = Vec::new();

        let outcomes = [
            (CheckDomain::Delay, self.check_delay(now).await),
            (CheckDomain::Delay, self.check_daily_missing(now).await),
            (CheckDomain::Defect, self.check_defects(now).await),
            (CheckDomain::Kpi, self.check_kpis(now).await),
            (CheckDomain::Shift, self.check_shift_performance(now).await),
        ];

        for (domain, outcome) in outcomes {
            match outcome {
                Ok(raised) => {
                    tracing::debug!(domain = domain.key(), raised = raised.len(), "check finished");
                    alerts.extend(raised);
                }
                Err(err) => {
                    tracing::warn!(domain = domain.key(), error = %err, "check skipped");
                    if !failed.contains(&domain) {
                        failed.push(domain);
                        alerts.push(system_error(domain, &err, now));
                    }
                }
            }
        }

        alerts.extend(shift_change_alerts(
            now,
            &self.schedule,
            self.thresholds.shift_change_tolerance_minutes,
        ));

        sort_by_priority(&mut alerts);
        tracing::info!(total = alerts.len(), "alert evaluation complete");
        alerts
    }

    async fn check_delay(&self, now: NaiveDateTime) -> Result<Vec<Alert>, DataError> {
        let days = self.thresholds.delay_window_days;
        let range = trailing_window(self.clock, days)?;
        let rows = self
            .source
            .fetch_inspections(range, &InspectionFilter::default())
            .await?;
        Ok(delay_alerts(rows.len(), days, now))
    }

    async fn check_daily_missing(&self, now: NaiveDateTime) -> Result<Vec<Alert>, DataError> {
        let yesterday = self
            .clock
            .days_ago(1)
            .ok_or(DataError::InvalidWindow { days: 1 })?;
        let rows = self
            .source
            .fetch_inspections(DateRange::day(yesterday), &InspectionFilter::default())
            .await?;
        Ok(daily_missing_alerts(rows.len(), yesterday, now))
    }

    async fn check_defects(&self, now: NaiveDateTime) -> Result<Vec<Alert>, DataError> {
        let rows = self
            .source
            .fetch_inspections(DateRange::day(self.clock.today()), &InspectionFilter::failed())
            .await?;
        let quantity: u64 = rows.iter().map(|row| u64::from(row.defect_quantity)).sum();
        Ok(defect_alerts(quantity, rows.len(), &self.thresholds, now))
    }

    async fn check_kpis(&self, now: NaiveDateTime) -> Result<Vec<Alert>, DataError> {
        let kpis = window_kpis(
            self.source,
            self.clock,
            self.thresholds.kpi_window_days,
            &InspectionFilter::default(),
        )
        .await?;
        Ok(kpi_alerts(&kpis, &self.thresholds, now))
    }

    async fn check_shift_performance(&self, now: NaiveDateTime) -> Result<Vec<Alert>, DataError> {
        let work_date = self
            .schedule
            .resolve(now)
            .map_or(now.date(), |(_, work_date)| work_date);
        let comparison = compare_shifts(self.source, &self.schedule, work_date).await?;
        Ok(shift_alerts(&comparison, &self.thresholds, now))
    }
}

pub fn sort_by_priority(alerts: &mut [Alert]) {
    alerts.sort_by_key(|alert| alert.priority.rank());
}

fn system_error(domain: CheckDomain, err: &DataError, now: NaiveDateTime) -> Alert {
    Alert::raise(AlertType::SystemError, Priority::Low, domain.key(), now.date(), now).text(
        "Data check unavailable",
        format!("The {} check could not run: {err}", domain.key()),
        "Verify the database connection and configured windows; other checks are unaffected",
    )
}

pub fn delay_alerts(rows_in_window: usize, window_days: i64, now: NaiveDateTime) -> Vec<Alert> {
    if rows_in_window > 0 {
        return Vec::new();
    }

    vec![
        Alert::raise(AlertType::InspectionDelay, Priority::High, "", now.date(), now).text(
            "Inspection delay",
            format!("No inspection records have been entered in the last {window_days} days"),
            "Check inspection progress and enter pending results",
        ),
    ]
}

pub fn daily_missing_alerts(rows_yesterday: usize, yesterday: NaiveDate, now: NaiveDateTime) -> Vec<Alert> {
    if rows_yesterday > 0 {
        return Vec::new();
    }

    vec![
        Alert::raise(AlertType::DailyMissing, Priority::Medium, "", yesterday, now).text(
            "Missing daily inspection data",
            format!("No inspection records exist for {yesterday}"),
            "Enter yesterday's inspection results",
        ),
    ]
}

pub fn defect_alerts(
    defect_quantity: u64,
    failed_inspections: usize,
    thresholds: &Thresholds,
    now: NaiveDateTime,
) -> Vec<Alert> {
    if defect_quantity == 0 {
        return Vec::new();
    }

    let priority = if defect_quantity > thresholds.defect_alert_critical_quantity {
        Priority::Critical
    } else {
        Priority::High
    };

    vec![
        Alert::raise(AlertType::DefectAlert, priority, "", now.date(), now)
            .text(
                "Defects detected today",
                format!(
                    "{defect_quantity} defective units found across {failed_inspections} failed inspections today"
                ),
                "Review the failed lots and start root cause analysis",
            )
            .data(&serde_json::json!({
                "defect_quantity": defect_quantity,
                "failed_inspections": failed_inspections,
            })),
    ]
}

pub fn kpi_alerts(kpis: &KpiSnapshot, thresholds: &Thresholds, now: NaiveDateTime) -> Vec<Alert> {
    let date = now.date();
    let window = thresholds.kpi_window_days;
    let mut alerts = Vec::new();

    if kpis.has_data() && kpis.defect_rate > thresholds.kpi_defect_rate {
        let priority = if kpis.defect_rate > thresholds.kpi_defect_rate_critical {
            Priority::Critical
        } else {
            Priority::High
        };
        alerts.push(
            Alert::raise(AlertType::KpiDefectRate, priority, "", date, now)
                .text(
                    "Defect rate above target",
                    format!(
                        "{window}-day defect rate is {:.2}% (target {:.2}%)",
                        kpis.defect_rate, thresholds.kpi_defect_rate
                    ),
                    "Strengthen process controls on the worst models",
                )
                .data(kpis),
        );
    }

    if kpis.has_data() && kpis.inspection_efficiency < thresholds.kpi_efficiency {
        let priority = if kpis.inspection_efficiency < thresholds.kpi_efficiency_high {
            Priority::High
        } else {
            Priority::Medium
        };
        alerts.push(
            Alert::raise(AlertType::KpiEfficiency, priority, "", date, now)
                .text(
                    "Inspection efficiency below target",
                    format!(
                        "{window}-day inspection efficiency is {:.1}% (target {:.1}%)",
                        kpis.inspection_efficiency, thresholds.kpi_efficiency
                    ),
                    "Review failed inspections and rework flow",
                )
                .data(kpis),
        );
    }

    if kpis.total_inspections < thresholds.kpi_min_inspections {
        alerts.push(
            Alert::raise(AlertType::KpiInspections, Priority::Medium, "", date, now)
                .text(
                    "Low inspection volume",
                    format!(
                        "Only {} inspections in the last {window} days (minimum {})",
                        kpis.total_inspections, thresholds.kpi_min_inspections
                    ),
                    "Confirm inspection scheduling and data entry",
                )
                .data(kpis),
        );
    }

    alerts
}

/// Per-shift rules are written once and evaluated for both shifts.
pub fn shift_alerts(comparison: &ShiftComparison, thresholds: &Thresholds, now: NaiveDateTime) -> Vec<Alert> {
    let date = comparison.work_date;
    let mut alerts = Vec::new();

    for shift in Shift::ALL {
        let kpis = comparison.snapshot(shift);
        if !kpis.has_data() || kpis.defect_rate <= thresholds.shift_defect_rate {
            continue;
        }
        let priority = if kpis.defect_rate > thresholds.shift_defect_rate_critical {
            Priority::Critical
        } else {
            Priority::High
        };
        alerts.push(
            Alert::raise(AlertType::shift_defect(shift), priority, "", date, now)
                .text(
                    format!("{shift} defect rate above target"),
                    format!(
                        "{shift} defect rate is {:.2}% (target {:.2}%)",
                        kpis.defect_rate, thresholds.shift_defect_rate
                    ),
                    "Inspect the shift's process conditions and operators",
                )
                .shift_info(shift_info(shift, date))
                .data(kpis),
        );
    }

    for shift in Shift::ALL {
        let kpis = comparison.snapshot(shift);
        if !kpis.has_data() || kpis.inspection_efficiency >= thresholds.shift_efficiency {
            continue;
        }
        let priority = if kpis.inspection_efficiency > thresholds.shift_efficiency_medium_above {
            Priority::Medium
        } else {
            Priority::High
        };
        alerts.push(
            Alert::raise(AlertType::shift_efficiency(shift), priority, "", date, now)
                .text(
                    format!("{shift} inspection efficiency below target"),
                    format!(
                        "{shift} inspection efficiency is {:.1}% (target {:.1}%)",
                        kpis.inspection_efficiency, thresholds.shift_efficiency
                    ),
                    "Review the shift's failed inspections",
                )
                .shift_info(shift_info(shift, date))
                .data(kpis),
        );
    }

    let both_reported = comparison.day_shift.has_data() && comparison.night_shift.has_data();
    if both_reported && comparison.analysis.defect_rate_diff > thresholds.shift_gap {
        let better = comparison.analysis.better_defect_rate;
        let worse = match better {
            Shift::Day => Shift::Night,
            Shift::Night => Shift::Day,
        };
        alerts.push(
            Alert::raise(AlertType::ShiftGap, Priority::Medium, "", date, now)
                .text(
                    "Defect rate gap between shifts",
                    format!(
                        "{worse} defect rate is {:.2}%p higher than {better} ({:.2}% vs {:.2}%)",
                        comparison.analysis.defect_rate_diff,
                        comparison.snapshot(worse).defect_rate,
                        comparison.snapshot(better).defect_rate,
                    ),
                    "Share the better shift's practices with the other shift",
                )
                .shift_info(format!("better: {}, worse: {}", better.key(), worse.key()))
                .data(&comparison.analysis),
        );
    }

    for shift in Shift::ALL {
        let kpis = comparison.snapshot(shift);
        if !kpis.has_data() || kpis.total_inspections >= thresholds.shift_min_inspections {
            continue;
        }
        alerts.push(
            Alert::raise(AlertType::shift_volume(shift), Priority::Medium, "", date, now)
                .text(
                    format!("{shift} inspection volume low"),
                    format!(
                        "{shift} recorded {} inspections (minimum {})",
                        kpis.total_inspections, thresholds.shift_min_inspections
                    ),
                    "Check staffing and data entry for the shift",
                )
                .shift_info(shift_info(shift, date))
                .data(kpis),
        );
    }

    alerts
}

fn shift_info(shift: Shift, work_date: NaiveDate) -> String {
    format!("{} ({work_date})", shift.key())
}

pub fn shift_change_alerts(
    now: NaiveDateTime,
    schedule: &ShiftSchedule,
    tolerance_minutes: i64,
) -> Vec<Alert> {
    let boundaries = [(Shift::Day, schedule.day_start), (Shift::Night, schedule.night_start)];

    boundaries
        .into_iter()
        .filter_map(|(shift, start)| start.map(|start| (shift, start)))
        .filter(|(_, start)| minutes_apart(now.time(), *start) <= tolerance_minutes)
        .map(|(shift, start)| {
            Alert::raise(AlertType::ShiftChange, Priority::Low, shift.key(), now.date(), now)
                .text(
                    format!("Shift change: {shift} starting"),
                    format!("Handover to {shift} at {}", start.format("%H:%M")),
                    "Complete handover notes and confirm pending inspections",
                )
                .shift_info(format!("to {}", shift.key()))
        })
        .collect()
}

fn minutes_apart(a: NaiveTime, b: NaiveTime) -> i64 {
    let a = i64::from(a.num_seconds_from_midnight() / 60);
    let b = i64::from(b.num_seconds_from_midnight() / 60);
    let diff = (a - b).rem_euclid(MINUTES_PER_DAY);
    diff.min(MINUTES_PER_DAY - diff)
}
