pub mod memory;
pub mod postgres;

pub use memory::MemoryPlantStore;
pub use postgres::PgPlantStore;

use std::sync::Arc;

use plant_client::{
    db::plant_queries::UpsertCounts,
    domain::{GenerationTotals, PlantRecord, StateCode},
};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;

use crate::{
    config::{AppConfig, StoreKind},
    error::{AppError, AppResult, StoreWriteError},
};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Why one batch did not fully apply.
///
/// Writes are unordered, so `applied` can be non-zero: records in the batch
/// that did not fail are already stored.
#[derive(Debug, Clone)]
pub struct BatchWriteFailure {
    pub applied: UpsertCounts,
    pub failed: usize,
    pub message: String,
}

/// Outcome of a whole `bulk_upsert` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub records: u64,
    pub batches: u64,
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
}

impl UpsertSummary {
    fn add_batch(&mut self, len: usize, counts: UpsertCounts) {
        self.records += len as u64;
        self.batches += 1;
        self.inserted += counts.inserted;
        self.updated += counts.updated;
        self.unchanged += counts.unchanged;
    }

    fn committed(&self) -> UpsertCounts {
        UpsertCounts {
            inserted: self.inserted,
            updated: self.updated,
            unchanged: self.unchanged,
        }
    }
}

/// Persistence for plant records keyed by facility code.
#[async_trait::async_trait]
pub trait PlantStore: Send + Sync {
    /// Upsert one batch by `facility_id`. One record failing must not keep
    /// the others in the batch from applying.
    async fn write_batch(&self, batch: &[PlantRecord]) -> Result<UpsertCounts, BatchWriteFailure>;

    /// Plants matching `state` (all plants when `None`), largest annual net
    /// generation first, at most `limit` of them.
    async fn find_top(&self, limit: u32, state: Option<&StateCode>) -> AppResult<Vec<PlantRecord>>;

    /// Sum and count of annual net generation over the same filter as
    /// `find_top`.
    async fn aggregate_total(&self, state: Option<&StateCode>) -> AppResult<GenerationTotals>;

    /// Write `records` in input order, `batch_size` at a time.
    ///
    /// Stops at the first failing batch. Earlier batches stay committed and
    /// later ones are never attempted.
    async fn bulk_upsert(&self, records: &[PlantRecord], batch_size: usize) -> AppResult<UpsertSummary> {
        if batch_size == 0 {
            return Err(AppError::invalid("batch size must be positive"));
        }

        let batches = records.len().div_ceil(batch_size);
        let mut summary = UpsertSummary::default();

        for (idx, batch) in records.chunks(batch_size).enumerate() {
            match self.write_batch(batch).await {
                Ok(counts) => {
                    summary.add_batch(batch.len(), counts);
                    metrics::counter!("plant_store_upserted_records_total").increment(counts.total());
                    tracing::info!(
                        batch = idx + 1,
                        batches,
                        plants = batch.len(),
                        inserted = counts.inserted,
                        updated = counts.updated,
                        unchanged = counts.unchanged,
                        "processed plant batch"
                    );
                }
                Err(failure) => {
                    metrics::counter!("plant_store_batch_errors_total").increment(1);
                    tracing::error!(
                        batch = idx + 1,
                        batches,
                        failed = failure.failed,
                        applied_in_batch = failure.applied.total(),
                        committed_records = summary.records,
                        committed_inserted = summary.inserted,
                        committed_updated = summary.updated,
                        error = %failure.message,
                        "bulk upsert failed, earlier batches remain committed"
                    );
                    return Err(StoreWriteError {
                        batch: idx + 1,
                        batches,
                        batch_len: batch.len(),
                        failed: failure.failed,
                        committed: summary.committed(),
                        message: failure.message,
                    }
                    .into());
                }
            }
        }

        tracing::info!(
            plants = summary.records,
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            "bulk upsert complete"
        );
        Ok(summary)
    }
}

/// Build the store selected by `store.kind`.
pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Arc<dyn PlantStore>> {
    match cfg.store.kind {
        StoreKind::Memory => {
            tracing::warn!("using in-memory plant store, data is lost on exit");
            Ok(Arc::new(MemoryPlantStore::new()))
        }
        StoreKind::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(cfg.database.max_connections)
                .connect(&cfg.database.uri)
                .await?;
            let store = PgPlantStore::new(pool);
            if cfg.store.apply_schema {
                store.ensure_schema().await?;
                tracing::info!("plants schema applied");
            }
            Ok(Arc::new(store))
        }
    }
}
