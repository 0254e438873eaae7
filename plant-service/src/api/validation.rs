use std::path::PathBuf;

use plant_client::domain::StateCode;
use serde::Deserialize;

use crate::service::MAX_TOP_LIMIT;

pub const DEFAULT_TOP_LIMIT: u32 = MAX_TOP_LIMIT;

/// Query string of `GET /api/v1/plants`, kept as raw text so bad input
/// becomes a validation message instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct TopPlantsParams {
    pub limit: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopPlantsQuery {
    pub limit: u32,
    pub state: Option<StateCode>,
}

/// Body of `POST /api/v1/plants/update`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlantsBody {
    pub excel_path: Option<String>,
    pub sheet_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlantsRequest {
    pub excel_path: PathBuf,
    pub sheet_name: String,
}

pub fn validate_top_plants(params: &TopPlantsParams) -> Result<TopPlantsQuery, Vec<String>> {
    let mut errors = Vec::new();

    let limit = match params.limit.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_TOP_LIMIT,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if (1..=i64::from(MAX_TOP_LIMIT)).contains(&n) => n as u32,
            Ok(_) => {
                errors.push(format!("Parameter limit must be between 1 and {MAX_TOP_LIMIT}"));
                0
            }
            Err(_) => {
                errors.push("Parameter limit must be a number".to_string());
                0
            }
        },
    };

    let state = match params.state.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<StateCode>() {
            Ok(code) => Some(code),
            Err(_) => {
                errors.push("State code must be a valid 2-letter abbreviation".to_string());
                None
            }
        },
    };

    if errors.is_empty() {
        Ok(TopPlantsQuery { limit, state })
    } else {
        Err(errors)
    }
}

pub fn validate_update_plants(
    body: &UpdatePlantsBody,
    default_sheet: &str,
) -> Result<UpdatePlantsRequest, Vec<String>> {
    let mut errors = Vec::new();

    let excel_path = body.excel_path.as_deref().map(str::trim).unwrap_or_default();
    if excel_path.is_empty() {
        errors.push("excelPath should not be empty".to_string());
    } else {
        let lower = excel_path.to_ascii_lowercase();
        if !(lower.ends_with(".xlsx") || lower.ends_with(".xls")) {
            errors.push("excelPath must point to an .xlsx or .xls file".to_string());
        }
    }

    let sheet_name = match body.sheet_name.as_deref() {
        None => default_sheet.to_string(),
        Some(name) if name.trim().is_empty() => {
            errors.push("sheetName should not be empty".to_string());
            String::new()
        }
        Some(name) => name.trim().to_string(),
    };

    if errors.is_empty() {
        Ok(UpdatePlantsRequest {
            excel_path: PathBuf::from(excel_path),
            sheet_name,
        })
    } else {
        Err(errors)
    }
}
