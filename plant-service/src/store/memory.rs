use std::collections::BTreeMap;

use plant_client::{
    db::plant_queries::{UpsertCounts, UpsertOutcome},
    domain::{GenerationTotals, PlantRecord, StateCode},
};
use tokio::sync::RwLock;

use super::{BatchWriteFailure, PlantStore};
use crate::error::AppResult;

/// In-process store keyed by facility code.
///
/// Used with `store.kind = "memory"` for local runs and as the store behind
/// the service tests.
#[derive(Default)]
pub struct MemoryPlantStore {
    plants: RwLock<BTreeMap<i64, PlantRecord>>,
}

impl MemoryPlantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.plants.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plants.read().await.is_empty()
    }

    pub async fn get(&self, facility_id: i64) -> Option<PlantRecord> {
        self.plants.read().await.get(&facility_id).cloned()
    }

    /// Every stored record ordered by facility code.
    pub async fn snapshot(&self) -> Vec<PlantRecord> {
        self.plants.read().await.values().cloned().collect()
    }
}

fn matches(record: &PlantRecord, state: Option<&StateCode>) -> bool {
    state.map_or(true, |s| s.matches(&record.state))
}

#[async_trait::async_trait]
impl PlantStore for MemoryPlantStore {
    async fn write_batch(&self, batch: &[PlantRecord]) -> Result<UpsertCounts, BatchWriteFailure> {
        let mut plants = self.plants.write().await;
        let mut counts = UpsertCounts::default();

        for record in batch {
            let outcome = match plants.get(&record.facility_id) {
                None => UpsertOutcome::Inserted,
                Some(existing) if existing == record => UpsertOutcome::Unchanged,
                Some(_) => UpsertOutcome::Updated,
            };
            if outcome != UpsertOutcome::Unchanged {
                plants.insert(record.facility_id, record.clone());
            }
            counts.record(outcome);
        }

        Ok(counts)
    }

    async fn find_top(&self, limit: u32, state: Option<&StateCode>) -> AppResult<Vec<PlantRecord>> {
        let plants = self.plants.read().await;
        let mut matching: Vec<PlantRecord> = plants
            .values()
            .filter(|p| matches(p, state))
            .cloned()
            .collect();

        crate::transform::sort_by_generation_desc(&mut matching);
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn aggregate_total(&self, state: Option<&StateCode>) -> AppResult<GenerationTotals> {
        let plants = self.plants.read().await;
        let totals = plants
            .values()
            .filter(|p| matches(p, state))
            .fold(GenerationTotals::default(), |acc, p| GenerationTotals {
                total: acc.total + p.annual_net_generation,
                count: acc.count + 1,
            });
        Ok(totals)
    }
}
