/*!
 * Medication & Catalog HTTP Handlers
 *
 * Handles HTTP requests for catalog loading, medication search and detail,
 * and engine statistics.
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::{
    handlers::AppState,
    utils::{AppError, Result},
};

/// Request body for the catalog load operation
#[derive(Debug, Deserialize)]
pub struct LoadCatalogRequest {
    /// Path to a processed catalog JSON file on the server
    pub path: String,
}

/// Query parameters for medication search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<usize>,
}

/// Load the medication catalog from a processed JSON file
///
/// POST /api/v1/catalog/load
///
/// Request body:
/// ```json
/// { "path": "data/processed/medications.json" }
/// ```
pub async fn load_catalog(
    State(state): State<AppState>,
    Json(request): Json<LoadCatalogRequest>,
) -> Result<impl IntoResponse> {
    if request.path.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Catalog path must not be empty".to_string(),
        ));
    }

    let summary = state.engine.load_catalog_from_file(&request.path)?;
    Ok((StatusCode::OK, Json(summary)))
}

/// Search medications by commercial name, generic name, or ingredient
///
/// GET /api/v1/medications/search?q=brufen&limit=20
pub async fn search_medications(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    if !state.engine.is_catalog_loaded() {
        return Err(AppError::CatalogNotLoaded);
    }

    let limit = query.limit.unwrap_or(20).min(100);
    let results = state.engine.search_medications(&query.q, limit);
    Ok((StatusCode::OK, Json(results)))
}

/// Get detailed medication information, including similar brands
///
/// GET /api/v1/medications/{id}
pub async fn get_medication(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let detail = state.engine.medication_info(id)?;
    Ok((StatusCode::OK, Json(detail)))
}

/// Get catalog statistics and feature flags
///
/// GET /api/v1/statistics
pub async fn get_statistics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok((StatusCode::OK, Json(state.engine.statistics())))
}
