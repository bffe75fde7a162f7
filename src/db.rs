use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::DataError;
use crate::models::{DefectRecord, InspectionRecord, ReferenceKind, ReferenceRow};
use crate::source::{normalize_record, DateRange, InspectionCsvRow, InspectionFilter, InspectionSource};

pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn optional_text(row: &PgRow, column: &str) -> String {
    match row.try_get::<Option<String>, _>(column) {
        Ok(value) => value.unwrap_or_default(),
        Err(err) => {
            tracing::debug!(column, error = %err, "defaulting unreadable text column");
            String::new()
        }
    }
}

fn optional_count(row: &PgRow, column: &str) -> i64 {
    match row.try_get::<Option<i32>, _>(column) {
        Ok(value) => value.map(i64::from).unwrap_or(0),
        Err(err) => {
            tracing::debug!(column, error = %err, "defaulting unreadable count column");
            0
        }
    }
}

fn row_to_inspection(row: &PgRow) -> Result<InspectionRecord, sqlx::Error> {
    let created_at: Option<NaiveDateTime> = row.try_get("created_at").ok().flatten();

    Ok(normalize_record(
        row.try_get("id")?,
        row.try_get("inspection_date")?,
        optional_text(row, "inspector_code"),
        optional_text(row, "model_code"),
        optional_text(row, "process"),
        optional_count(row, "total_inspected"),
        optional_count(row, "defect_quantity"),
        &optional_text(row, "result"),
        optional_text(row, "notes"),
        created_at,
    ))
}

#[async_trait]
impl InspectionSource for PgSource {
    async fn fetch_inspections(
        &self,
        range: DateRange,
        filter: &InspectionFilter,
    ) -> Result<Vec<InspectionRecord>, DataError> {
        let mut query = String::from(
            "SELECT id, inspection_date, inspector_code, model_code, process, \
             total_inspected, defect_quantity, result, notes, created_at \
             FROM qc_dashboard.inspections \
             WHERE inspection_date BETWEEN $1 AND $2",
        );
        let mut binds: Vec<String> = Vec::new();

        if let Some(value) = &filter.inspector_ref {
            binds.push(value.clone());
            query.push_str(&format!(" AND inspector_code = ${}", binds.len() + 2));
        }
        if let Some(value) = &filter.model_ref {
            binds.push(value.clone());
            query.push_str(&format!(" AND model_code = ${}", binds.len() + 2));
        }
        query.push_str(" ORDER BY created_at");

        let mut rows = sqlx::query(&query).bind(range.start).bind(range.end);
        for value in binds {
            rows = rows.bind(value);
        }

        let records = rows.fetch_all(&self.pool).await?;
        let mut inspections = Vec::with_capacity(records.len());

        for row in records {
            let record = row_to_inspection(&row)?;
            // Result is matched after normalizing so inferred results filter too.
            if filter.matches(&record) {
                inspections.push(record);
            }
        }

        Ok(inspections)
    }

    async fn fetch_defects(&self, range: DateRange) -> Result<Vec<DefectRecord>, DataError> {
        let records = sqlx::query(
            "SELECT d.inspection_id, d.defect_type, d.defect_count \
             FROM qc_dashboard.defects d \
             JOIN qc_dashboard.inspections i ON i.id = d.inspection_id \
             WHERE i.inspection_date BETWEEN $1 AND $2",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        let mut defects = Vec::with_capacity(records.len());
        for row in records {
            defects.push(DefectRecord {
                inspection_ref: row.try_get("inspection_id")?,
                defect_type: optional_text(&row, "defect_type"),
                defect_count: crate::source::clamp_count(optional_count(&row, "defect_count")),
            });
        }

        Ok(defects)
    }

    async fn fetch_reference(&self, kind: ReferenceKind) -> Result<Vec<ReferenceRow>, DataError> {
        let query = format!("SELECT id, code, name FROM {} ORDER BY code", kind.table());
        let records = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut rows = Vec::with_capacity(records.len());
        for row in records {
            rows.push(ReferenceRow {
                id: row.try_get("id")?,
                kind,
                code: optional_text(&row, "code"),
                name: optional_text(&row, "name"),
            });
        }

        Ok(rows)
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_reference(
    pool: &PgPool,
    kind: ReferenceKind,
    code: &str,
    name: &str,
) -> anyhow::Result<()> {
    let query = format!(
        "INSERT INTO {} (id, code, name) VALUES ($1, $2, $3) \
         ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name",
        kind.table()
    );
    sqlx::query(&query)
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

async fn insert_inspection(
    pool: &PgPool,
    record: &InspectionRecord,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO qc_dashboard.inspections
        (id, inspection_date, inspector_code, model_code, process,
         total_inspected, defect_quantity, result, notes, created_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(record.date)
    .bind(&record.inspector_ref)
    .bind(&record.model_ref)
    .bind(&record.process)
    .bind(i32::try_from(record.total_inspected).context("total_inspected out of range")?)
    .bind(i32::try_from(record.defect_quantity).context("defect_quantity out of range")?)
    .bind(record.result.as_str())
    .bind(&record.notes)
    .bind(record.created_at)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Seeds reference data and two weeks of inspections ending on `today`.
pub async fn seed(pool: &PgPool, today: NaiveDate) -> anyhow::Result<()> {
    let inspectors = [("INS-01", "Mina Park"), ("INS-02", "Daniel Cho"), ("INS-03", "Sora Kim")];
    let models = [("MDL-A100", "Housing A100"), ("MDL-B200", "Bracket B200")];
    let defect_types = [("SCRATCH", "Surface scratch"), ("DENT", "Dent"), ("BURR", "Burr")];

    for (code, name) in inspectors {
        upsert_reference(pool, ReferenceKind::Inspectors, code, name).await?;
    }
    for (code, name) in models {
        upsert_reference(pool, ReferenceKind::Models, code, name).await?;
    }
    for (code, name) in defect_types {
        upsert_reference(pool, ReferenceKind::DefectTypes, code, name).await?;
    }

    // Two day-shift and two night-shift lots per work-date.
    let lots: [(u32, u32, usize); 4] = [(9, 0, 0), (15, 30, 1), (21, 0, 2), (2, 30, 0)];

    for days_ago in 0..14i64 {
        let work_date = today - chrono::Duration::days(days_ago);

        for (index, (hour, minute, inspector)) in lots.iter().enumerate() {
            let time = NaiveTime::from_hms_opt(*hour, *minute, 0).context("invalid seed time")?;
            let created_at = if *hour < 7 {
                (work_date + chrono::Duration::days(1)).and_time(time)
            } else {
                work_date.and_time(time)
            };
            if created_at.date() > today {
                continue;
            }

            let defects = if (days_ago as usize + index) % 5 == 0 { 2 } else { 0 };
            let record = normalize_record(
                Uuid::new_v4(),
                created_at.date(),
                inspectors[*inspector].0.to_string(),
                models[index % models.len()].0.to_string(),
                "final".to_string(),
                400,
                defects,
                if defects > 0 { "FAIL" } else { "PASS" },
                String::new(),
                Some(created_at),
            );
            let source_key = format!("seed-{work_date}-{index}");

            if insert_inspection(pool, &record, &source_key).await? && defects > 0 {
                sqlx::query(
                    r#"
                    INSERT INTO qc_dashboard.defects (id, inspection_id, defect_type, defect_count)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(record.id)
                .bind(defect_types[index % defect_types.len()].0)
                .bind(defects as i32)
                .execute(pool)
                .await?;
            }
        }
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<InspectionCsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .clone()
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));
        let record = row.into_record();

        if insert_inspection(pool, &record, &source_key).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}
