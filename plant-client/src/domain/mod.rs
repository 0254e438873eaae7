pub mod plant;

pub use plant::{GenerationTotals, InvalidStateCode, PlantRecord, StateCode};
