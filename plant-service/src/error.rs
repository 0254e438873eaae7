use axum::http::StatusCode;
use plant_client::db::plant_queries::UpsertCounts;

use crate::sources::spreadsheet::SpreadsheetError;

pub type AppResult<T> = Result<T, AppError>;

/// Error classes surfaced at the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    StoreWrite,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::StoreWrite | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::StoreWrite => "store_write",
            ErrorKind::Internal => "internal",
        }
    }
}

/// A batch upsert that failed part-way through a bulk write.
///
/// `committed` holds what earlier batches wrote; those rows stay in the store.
#[derive(thiserror::Error, Debug)]
#[error("batch {batch} of {batches} failed ({failed} of {batch_len} records rejected): {message}")]
pub struct StoreWriteError {
    /// 1-based index of the failing batch.
    pub batch: usize,
    pub batches: usize,
    pub batch_len: usize,
    pub failed: usize,
    pub committed: UpsertCounts,
    pub message: String,
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    InvalidArgument { message: String, details: Vec<String> },
    #[error("store write failed: {0}")]
    StoreWrite(#[from] StoreWriteError),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidArgument {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn validation(details: Vec<String>) -> Self {
        AppError::InvalidArgument {
            message: "Validation failed".to_string(),
            details,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            AppError::StoreWrite(_) => ErrorKind::StoreWrite,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn details(&self) -> &[String] {
        match self {
            AppError::InvalidArgument { details, .. } => details,
            _ => &[],
        }
    }
}

impl From<SpreadsheetError> for AppError {
    fn from(e: SpreadsheetError) -> Self {
        match e {
            SpreadsheetError::NotFound(_) | SpreadsheetError::SheetNotFound { .. } => {
                AppError::NotFound(e.to_string())
            }
            SpreadsheetError::Workbook(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(format!("store query failed: {e}"))
    }
}
