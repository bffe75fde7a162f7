use std::path::Path;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::error::DataError;
use crate::models::{
    DefectRecord, InspectionRecord, InspectionResult, ReferenceKind, ReferenceRow,
};

/// Inclusive range of inspection dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct InspectionFilter {
    pub result: Option<InspectionResult>,
    pub inspector_ref: Option<String>,
    pub model_ref: Option<String>,
}

impl InspectionFilter {
    pub fn failed() -> Self {
        Self {
            result: Some(InspectionResult::Fail),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &InspectionRecord) -> bool {
        self.result.map_or(true, |result| record.result == result)
            && self
                .inspector_ref
                .as_deref()
                .map_or(true, |value| record.inspector_ref == value)
            && self
                .model_ref
                .as_deref()
                .map_or(true, |value| record.model_ref == value)
    }
}

#[async_trait]
pub trait InspectionSource: Send + Sync {
    async fn fetch_inspections(
        &self,
        range: DateRange,
        filter: &InspectionFilter,
    ) -> Result<Vec<InspectionRecord>, DataError>;

    async fn fetch_defects(&self, range: DateRange) -> Result<Vec<DefectRecord>, DataError>;

    async fn fetch_reference(&self, kind: ReferenceKind) -> Result<Vec<ReferenceRow>, DataError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub inspections: Vec<InspectionRecord>,
    pub defects: Vec<DefectRecord>,
    pub reference: Vec<ReferenceRow>,
}

impl MemorySource {
    pub fn new(inspections: Vec<InspectionRecord>) -> Self {
        Self {
            inspections,
            ..Self::default()
        }
    }

    /// Loads an offline snapshot with the same columns `import` accepts.
    pub fn from_csv(path: &Path) -> Result<Self, DataError> {
        Self::from_csv_reader(csv::Reader::from_path(path)?)
    }

    pub fn from_csv_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self, DataError> {
        let mut inspections = Vec::new();

        for result in reader.deserialize::<InspectionCsvRow>() {
            inspections.push(result?.into_record());
        }

        Ok(Self::new(inspections))
    }
}

#[async_trait]
impl InspectionSource for MemorySource {
    async fn fetch_inspections(
        &self,
        range: DateRange,
        filter: &InspectionFilter,
    ) -> Result<Vec<InspectionRecord>, DataError> {
        Ok(self
            .inspections
            .iter()
            .filter(|record| range.contains(record.date) && filter.matches(record))
            .cloned()
            .collect())
    }

    async fn fetch_defects(&self, range: DateRange) -> Result<Vec<DefectRecord>, DataError> {
        let in_range: std::collections::HashSet<Uuid> = self
            .inspections
            .iter()
            .filter(|record| range.contains(record.date))
            .map(|record| record.id)
            .collect();

        Ok(self
            .defects
            .iter()
            .filter(|defect| in_range.contains(&defect.inspection_ref))
            .cloned()
            .collect())
    }

    async fn fetch_reference(&self, kind: ReferenceKind) -> Result<Vec<ReferenceRow>, DataError> {
        Ok(self
            .reference
            .iter()
            .filter(|row| row.kind == kind)
            .cloned()
            .collect())
    }
}

/// CSV row shape shared by `import` and offline snapshots.
#[derive(Debug, serde::Deserialize)]
pub struct InspectionCsvRow {
    pub date: NaiveDate,
    #[serde(default)]
    pub inspector: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub process: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub total_inspected: Option<i64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub defect_quantity: Option<i64>,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub source_key: Option<String>,
}

impl InspectionCsvRow {
    pub fn into_record(self) -> InspectionRecord {
        normalize_record(
            Uuid::new_v4(),
            self.date,
            self.inspector,
            self.model,
            self.process,
            self.total_inspected.unwrap_or(0),
            self.defect_quantity.unwrap_or(0),
            &self.result,
            self.notes,
            self.created_at,
        )
    }
}

/// Single place where partial rows become typed records: counts clamp into
/// range, a missing timestamp stays missing.
#[allow(clippy::too_many_arguments)]
pub fn normalize_record(
    id: Uuid,
    date: NaiveDate,
    inspector_ref: String,
    model_ref: String,
    process: String,
    total_inspected: i64,
    defect_quantity: i64,
    result: &str,
    notes: String,
    created_at: Option<NaiveDateTime>,
) -> InspectionRecord {
    let total_inspected = clamp_count(total_inspected);
    let defect_quantity = clamp_count(defect_quantity).min(total_inspected);
    if created_at.is_none() {
        tracing::debug!(%id, %date, "inspection row has no created_at");
    }

    InspectionRecord {
        id,
        date,
        inspector_ref,
        model_ref,
        process,
        total_inspected,
        defect_quantity,
        result: InspectionResult::parse_or_infer(result, defect_quantity),
        notes,
        created_at,
    }
}

pub fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn record(day: u32, result: &str, defects: i64) -> InspectionRecord {
        normalize_record(
            Uuid::new_v4(),
            date(day),
            "INS-01".to_string(),
            "MDL-A".to_string(),
            "final".to_string(),
            100,
            defects,
            result,
            String::new(),
            None,
        )
    }

    #[test]
    fn normalize_clamps_counts() {
        let row = normalize_record(
            Uuid::new_v4(),
            date(1),
            String::new(),
            String::new(),
            String::new(),
            5,
            9,
            "FAIL",
            String::new(),
            None,
        );
        assert_eq!(row.total_inspected, 5);
        assert_eq!(row.defect_quantity, 5);
        assert!(row.created_at.is_none());

        assert_eq!(clamp_count(-3), 0);
    }

    #[test]
    fn range_is_inclusive() {
        let range = DateRange::new(date(1), date(7));
        assert!(range.contains(date(1)));
        assert!(range.contains(date(7)));
        assert!(!range.contains(date(8)));
        assert_eq!(range.days(), 7);
    }

    #[tokio::test]
    async fn memory_source_applies_range_and_filter() {
        let source = MemorySource::new(vec![
            record(1, "PASS", 0),
            record(2, "FAIL", 3),
            record(9, "FAIL", 1),
        ]);

        let rows = source
            .fetch_inspections(DateRange::new(date(1), date(7)), &InspectionFilter::failed())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].defect_quantity, 3);
    }

    #[tokio::test]
    async fn defects_follow_their_inspection_date() {
        let mut source = MemorySource::new(vec![record(1, "FAIL", 2), record(9, "FAIL", 1)]);
        source.defects = vec![
            DefectRecord {
                inspection_ref: source.inspections[0].id,
                defect_type: "scratch".to_string(),
                defect_count: 2,
            },
            DefectRecord {
                inspection_ref: source.inspections[1].id,
                defect_type: "dent".to_string(),
                defect_count: 1,
            },
        ];

        let defects = source
            .fetch_defects(DateRange::new(date(1), date(7)))
            .await
            .unwrap();
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].defect_type, "scratch");
    }

    #[test]
    fn blank_csv_cells_load_as_zero_or_missing() {
        let data = "\
date,inspector,model,process,total_inspected,defect_quantity,result,notes,created_at,source_key
2026-02-10,INS-01,MDL,final,100,,FAIL,,2026-02-10T09:00:00,k1
2026-02-10,INS-02,MDL,final,,3,,,,k2
";
        let source = MemorySource::from_csv_reader(csv::Reader::from_reader(data.as_bytes())).unwrap();
        assert_eq!(source.inspections.len(), 2);

        let first = &source.inspections[0];
        assert_eq!(first.total_inspected, 100);
        assert_eq!(first.defect_quantity, 0);
        assert_eq!(first.result, InspectionResult::Fail);
        assert!(first.created_at.is_some());

        let second = &source.inspections[1];
        assert_eq!(second.total_inspected, 0);
        assert_eq!(second.defect_quantity, 0);
        assert_eq!(second.result, InspectionResult::Pass);
        assert!(second.created_at.is_none());
    }
}
