pub mod api;
pub mod config;
pub mod error;
pub mod metrics_server;
pub mod observability;
pub mod service;
pub mod sources;
pub mod store;
pub mod transform;

pub use error::{AppError, AppResult, ErrorKind};
pub use service::PlantAggregationService;
