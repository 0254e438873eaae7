use std::{
    collections::{HashMap, HashSet},
    future::Future,
};

use plant_client::{
    db::plant_queries::{self, UpsertCounts, UpsertOutcome},
    domain::{GenerationTotals, PlantRecord, StateCode},
};
use sqlx::postgres::PgPool;

use super::{BatchWriteFailure, PlantStore};
use crate::error::AppResult;

pub struct PgPlantStore {
    pool: PgPool,
}

impl PgPlantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `plants` table and indexes if missing.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        plant_queries::ensure_schema(&self.pool).await
    }
}

/// Records the multi-row statement could not apply, with the last error seen.
#[derive(Debug, Default)]
struct Rejected {
    facilities: HashSet<i64>,
    message: Option<String>,
}

/// Apply each record on its own through `upsert` so one bad row cannot
/// block the rest of its batch.
async fn apply_each<'a, F, Fut>(batch: &'a [PlantRecord], mut upsert: F) -> (UpsertCounts, Rejected)
where
    F: FnMut(&'a PlantRecord) -> Fut,
    Fut: Future<Output = Result<UpsertOutcome, sqlx::Error>>,
{
    let mut counts = UpsertCounts::default();
    let mut rejected = Rejected::default();

    for plant in batch {
        match upsert(plant).await {
            Ok(outcome) => counts.record(outcome),
            Err(e) => {
                tracing::warn!(facility_id = plant.facility_id, error = %e, "plant upsert rejected");
                rejected.facilities.insert(plant.facility_id);
                rejected.message = Some(e.to_string());
            }
        }
    }

    (counts, rejected)
}

/// A record replaced by a later one with the same facility code in the same
/// batch, and how it compared to its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Folded {
    facility_id: i64,
    outcome: UpsertOutcome,
}

/// Keep only the last record per facility code, preserving first-seen order.
fn dedupe_last_wins(batch: &[PlantRecord]) -> (Vec<PlantRecord>, Vec<Folded>) {
    let mut position: HashMap<i64, usize> = HashMap::with_capacity(batch.len());
    let mut unique: Vec<PlantRecord> = Vec::with_capacity(batch.len());
    let mut folded = Vec::new();

    for plant in batch {
        match position.get(&plant.facility_id) {
            Some(&idx) => {
                let outcome = if unique[idx] == *plant {
                    UpsertOutcome::Unchanged
                } else {
                    UpsertOutcome::Updated
                };
                folded.push(Folded {
                    facility_id: plant.facility_id,
                    outcome,
                });
                unique[idx] = plant.clone();
            }
            None => {
                position.insert(plant.facility_id, unique.len());
                unique.push(plant.clone());
            }
        }
    }

    (unique, folded)
}

/// Merge per-record results with the folded duplicates into the batch result.
/// A folded record shares the fate of the record that replaced it.
fn settle(mut counts: UpsertCounts, folded: &[Folded], rejected: Rejected) -> Result<UpsertCounts, BatchWriteFailure> {
    let mut failed = rejected.facilities.len();
    for f in folded {
        if rejected.facilities.contains(&f.facility_id) {
            failed += 1;
        } else {
            counts.record(f.outcome);
        }
    }

    match rejected.message {
        None => Ok(counts),
        Some(message) => Err(BatchWriteFailure {
            applied: counts,
            failed,
            message,
        }),
    }
}

#[async_trait::async_trait]
impl PlantStore for PgPlantStore {
    async fn write_batch(&self, batch: &[PlantRecord]) -> Result<UpsertCounts, BatchWriteFailure> {
        if batch.is_empty() {
            return Ok(UpsertCounts::default());
        }

        let (unique, folded) = dedupe_last_wins(batch);
        let (counts, rejected) = match plant_queries::upsert_plants(&self.pool, &unique).await {
            Ok(counts) => (counts, Rejected::default()),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    plants = unique.len(),
                    "multi-row plant upsert failed, applying batch record by record"
                );
                apply_each(&unique, |plant| plant_queries::upsert_plant(&self.pool, plant)).await
            }
        };

        settle(counts, &folded, rejected)
    }

    async fn find_top(&self, limit: u32, state: Option<&StateCode>) -> AppResult<Vec<PlantRecord>> {
        Ok(plant_queries::find_top(&self.pool, limit, state).await?)
    }

    async fn aggregate_total(&self, state: Option<&StateCode>) -> AppResult<GenerationTotals> {
        Ok(plant_queries::aggregate_total(&self.pool, state).await?)
    }
}
