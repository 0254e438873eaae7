#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use plant_client::{
    db::plant_queries::UpsertCounts,
    domain::{GenerationTotals, PlantRecord, StateCode},
};
use plant_service::{
    store::{BatchWriteFailure, MemoryPlantStore, PlantStore},
    transform::{ANNUAL_NET_GENERATION, FACILITY_CODE, LATITUDE, LONGITUDE, PLANT_NAME, STATE_ABBREVIATION},
    AppResult,
};
use rust_xlsxwriter::Workbook;

pub const SHEET: &str = "PLNT21";

/// How the generation cell is written.
#[derive(Debug, Clone, Copy)]
pub enum Gen {
    Number(f64),
    Text(&'static str),
    Blank,
}

#[derive(Debug, Clone)]
pub struct SheetPlant {
    pub facility: i64,
    pub name: &'static str,
    pub state: &'static str,
    pub generation: Gen,
}

pub fn sheet_plant(facility: i64, state: &'static str, generation: Gen) -> SheetPlant {
    SheetPlant {
        facility,
        name: "Test Plant",
        state,
        generation,
    }
}

/// Write an eGRID-shaped workbook: label row, code row, then one row per plant.
pub fn write_workbook(dir: &Path, file_name: &str, sheet: &str, plants: &[SheetPlant]) -> PathBuf {
    let path = dir.join(file_name);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet).expect("sheet name");

    let labels = [
        "Plant file sequence number",
        STATE_ABBREVIATION,
        PLANT_NAME,
        FACILITY_CODE,
        LATITUDE,
        LONGITUDE,
        ANNUAL_NET_GENERATION,
    ];
    let codes = ["SEQPLT21", "PSTATABB", "PNAME", "ORISPL", "LAT", "LON", "PLNGENAN"];
    for (col, (label, code)) in labels.iter().zip(codes.iter()).enumerate() {
        worksheet.write_string(0, col as u16, *label).expect("label");
        worksheet.write_string(1, col as u16, *code).expect("code");
    }

    for (idx, plant) in plants.iter().enumerate() {
        let row = idx as u32 + 2;
        worksheet.write_number(row, 0, (idx + 1) as f64).expect("seq");
        worksheet.write_string(row, 1, plant.state).expect("state");
        worksheet.write_string(row, 2, plant.name).expect("name");
        worksheet.write_number(row, 3, plant.facility as f64).expect("facility");
        worksheet.write_number(row, 4, 34.5).expect("lat");
        worksheet.write_string(row, 5, "-117.25").expect("lon");
        match plant.generation {
            Gen::Number(v) => {
                worksheet.write_number(row, 6, v).expect("generation");
            }
            Gen::Text(s) => {
                worksheet.write_string(row, 6, s).expect("generation");
            }
            Gen::Blank => {}
        }
    }

    workbook.save(&path).expect("save workbook");
    path
}

pub fn record(facility_id: i64, state: &str, generation: f64) -> PlantRecord {
    PlantRecord {
        facility_id,
        name: format!("Plant {facility_id}"),
        state: state.to_string(),
        latitude: 0.0,
        longitude: 0.0,
        annual_net_generation: generation,
    }
}

/// Wraps a memory store, counts every call and can fail one batch.
#[derive(Default)]
pub struct InstrumentedStore {
    pub inner: MemoryPlantStore,
    pub fail_on_batch: Option<usize>,
    pub batch_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
}

impl InstrumentedStore {
    pub fn failing_on(batch: usize) -> Self {
        Self {
            fail_on_batch: Some(batch),
            ..Self::default()
        }
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PlantStore for InstrumentedStore {
    async fn write_batch(&self, batch: &[PlantRecord]) -> Result<UpsertCounts, BatchWriteFailure> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_batch == Some(call) {
            return Err(BatchWriteFailure {
                applied: UpsertCounts::default(),
                failed: batch.len(),
                message: "simulated write failure".to_string(),
            });
        }
        self.inner.write_batch(batch).await
    }

    async fn find_top(&self, limit: u32, state: Option<&StateCode>) -> AppResult<Vec<PlantRecord>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_top(limit, state).await
    }

    async fn aggregate_total(&self, state: Option<&StateCode>) -> AppResult<GenerationTotals> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregate_total(state).await
    }
}
