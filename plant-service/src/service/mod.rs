use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use plant_client::domain::{PlantRecord, StateCode};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    error::{AppError, AppResult},
    sources::spreadsheet,
    store::{PlantStore, UpsertSummary, DEFAULT_BATCH_SIZE},
    transform,
};

pub const MAX_TOP_LIMIT: u32 = 100;

/// One plant in a ranked response with its share of the filtered total.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantShare {
    pub facility_id: i64,
    pub name: String,
    pub state: String,
    pub annual_net_generation: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPlants {
    pub total: f64,
    pub plants: Vec<PlantShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub rows_read: u64,
    pub rows_skipped: u64,
    /// Rows replaced by a later row with the same facility code.
    pub rows_superseded: u64,
    #[serde(flatten)]
    pub upsert: UpsertSummary,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

/// `generation / total * 100` rounded to two decimals; 0 when the total is 0.
pub fn percentage_of(generation: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let pct = generation / total * 100.0;
    if pct.is_finite() {
        (pct * 100.0).round() / 100.0
    } else {
        0.0
    }
}

/// Refresh and ranking over a shared plant store.
pub struct PlantAggregationService {
    store: Arc<dyn PlantStore>,
    batch_size: usize,
}

impl PlantAggregationService {
    pub fn new(store: Arc<dyn PlantStore>) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Read a workbook sheet, normalize it and upsert every plant.
    ///
    /// Errors from the reader or the store are returned as-is. A failed
    /// batch leaves earlier batches in place; running the refresh again is
    /// safe since writes are keyed by facility code.
    pub async fn refresh(&self, path: impl AsRef<Path>, sheet: &str) -> AppResult<RefreshSummary> {
        let started = Instant::now();
        let path: PathBuf = path.as_ref().to_path_buf();
        let sheet_name = sheet.to_string();

        let rows = tokio::task::spawn_blocking(move || spreadsheet::read_rows(&path, &sheet_name))
            .await
            .map_err(|e| AppError::Internal(format!("workbook reader task failed: {e}")))??;
        metrics::counter!("plant_refresh_rows_read_total").increment(rows.len() as u64);

        let records: Vec<PlantRecord> = rows.iter().filter_map(transform::normalize_row).collect();
        let rows_skipped = (rows.len() - records.len()) as u64;
        if rows_skipped > 0 {
            metrics::counter!("plant_refresh_rows_skipped_total").increment(rows_skipped);
            tracing::warn!(rows_skipped, "rows dropped during normalization");
        }

        // Duplicates are resolved in sheet order before the generation sort
        // reorders the records.
        let (mut records, superseded) = transform::dedupe_by_facility(records);
        if superseded > 0 {
            tracing::warn!(rows_superseded = superseded, "duplicate facility codes in sheet, last row kept");
        }
        transform::sort_by_generation_desc(&mut records);
        let upsert = self.store.bulk_upsert(&records, self.batch_size).await?;

        metrics::histogram!("plant_refresh_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            sheet,
            rows_read = rows.len(),
            plants = upsert.records,
            "plant data refreshed from workbook"
        );

        Ok(RefreshSummary {
            rows_read: rows.len() as u64,
            rows_skipped,
            rows_superseded: superseded as u64,
            upsert,
            completed_at: OffsetDateTime::now_utc(),
        })
    }

    /// The `limit` largest plants, optionally within one state, with their
    /// share of the same-filter total.
    pub async fn top_plants(&self, limit: u32, state: Option<&StateCode>) -> AppResult<TopPlants> {
        if !(1..=MAX_TOP_LIMIT).contains(&limit) {
            return Err(AppError::invalid(format!(
                "limit should be from 1 to {MAX_TOP_LIMIT}, got {limit}"
            )));
        }

        let (plants, totals) = tokio::try_join!(
            self.store.find_top(limit, state),
            self.store.aggregate_total(state),
        )?;

        tracing::debug!(
            limit,
            state = state.map(StateCode::as_str),
            returned = plants.len(),
            matching = totals.count,
            total = totals.total,
            "top plants query"
        );

        let plants = plants
            .into_iter()
            .map(|p| PlantShare {
                percentage: percentage_of(p.annual_net_generation, totals.total),
                facility_id: p.facility_id,
                name: p.name,
                state: p.state,
                annual_net_generation: p.annual_net_generation,
            })
            .collect();

        Ok(TopPlants {
            total: totals.total,
            plants,
        })
    }
}
