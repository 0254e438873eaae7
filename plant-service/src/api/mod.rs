pub mod validation;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::AppError,
    service::{PlantAggregationService, RefreshSummary, TopPlants},
};
use validation::{TopPlantsParams, UpdatePlantsBody};

/// Shared handles for the request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PlantAggregationService>,
    pub default_sheet: String,
    pub expose_diagnostics: bool,
}

impl AppState {
    fn reject(&self, error: AppError) -> ApiFailure {
        ApiFailure {
            error,
            expose_diagnostics: self.expose_diagnostics,
        }
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            details: None,
            diagnostic: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(error: String) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error),
            details: None,
            diagnostic: None,
        }
    }
}

/// An `AppError` on its way out of a handler.
pub struct ApiFailure {
    error: AppError,
    expose_diagnostics: bool,
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let kind = self.error.kind();
        let status = kind.status_code();

        metrics::counter!("plant_api_errors_total", "kind" => kind.as_str()).increment(1);
        if status.is_server_error() {
            tracing::error!(kind = kind.as_str(), status = status.as_u16(), error = %self.error, "request failed");
        } else {
            tracing::warn!(kind = kind.as_str(), status = status.as_u16(), error = %self.error, "request rejected");
        }

        let mut body = ApiResponse::failure(self.error.to_string());
        if !self.error.details().is_empty() {
            body.details = Some(self.error.details().to_vec());
        }
        if self.expose_diagnostics {
            body.diagnostic = Some(format!("{:?}", self.error));
        }

        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/plants", get(get_top_plants))
        .route("/api/v1/plants/update", post(update_plants))
        .fallback(route_not_found)
        .with_state(state)
}

async fn get_top_plants(
    State(state): State<AppState>,
    params: Result<Query<TopPlantsParams>, QueryRejection>,
) -> Result<Json<ApiResponse<TopPlants>>, ApiFailure> {
    metrics::counter!("plant_api_requests_total", "route" => "top_plants").increment(1);

    let Query(params) = params.map_err(|e| {
        state.reject(AppError::InvalidArgument {
            message: "Invalid query string".to_string(),
            details: vec![e.body_text()],
        })
    })?;
    let query = validation::validate_top_plants(&params).map_err(|details| state.reject(AppError::validation(details)))?;

    let top = state
        .service
        .top_plants(query.limit, query.state.as_ref())
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(ApiResponse::ok(top)))
}

async fn update_plants(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePlantsBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RefreshSummary>>), ApiFailure> {
    metrics::counter!("plant_api_requests_total", "route" => "update_plants").increment(1);

    let Json(body) = payload.map_err(|e| {
        state.reject(AppError::InvalidArgument {
            message: "Invalid request body".to_string(),
            details: vec![e.body_text()],
        })
    })?;
    let request = validation::validate_update_plants(&body, &state.default_sheet)
        .map_err(|details| state.reject(AppError::validation(details)))?;

    let summary = state
        .service
        .refresh(&request.excel_path, &request.sheet_name)
        .await
        .map_err(|e| state.reject(e))?;

    let mut response = ApiResponse::ok(summary);
    response.message = Some("Data updated successfully".to_string());
    Ok((StatusCode::CREATED, Json(response)))
}

async fn route_not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::failure("Route not found".to_string())))
}
