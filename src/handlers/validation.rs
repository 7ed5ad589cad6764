/*!
 * Validation HTTP Handlers
 *
 * Handles HTTP requests for prescription validation, quick medication-list
 * checks, and pair interaction checks.
 *
 * The pipeline itself is side-effect-free; this layer decides event
 * dispatch after obtaining the result, so blocked prescriptions fan out to
 * webhook subscribers without the request waiting on deliveries.
 */

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    handlers::AppState,
    models::{
        PatientContext, Prescription, PrescriptionItem, ValidationResult, ValidationStatus,
    },
    utils::{AppError, Result},
};

/// Request body for full prescription validation
#[derive(Debug, Deserialize)]
pub struct PrescriptionValidationRequest {
    pub id: Option<String>,
    #[serde(default)]
    pub patient: PatientContext,
    #[serde(default)]
    pub items: Vec<PrescriptionItem>,
    pub prescriber_id: Option<String>,
    pub pharmacy_id: Option<String>,
}

/// Request body for the quick-check operation
#[derive(Debug, Deserialize)]
pub struct QuickCheckRequest {
    pub medication_ids: Vec<i64>,
    pub patient: Option<PatientContext>,
}

/// Request body for the pair interaction check
#[derive(Debug, Deserialize)]
pub struct InteractionCheckRequest {
    pub medication1_id: i64,
    pub medication2_id: i64,
}

/// Validation response with the derived status attached
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub status: ValidationStatus,
    #[serde(flatten)]
    pub result: ValidationResult,
}

/// Validate a complete prescription
///
/// POST /api/v1/validate/prescription
///
/// On a blocked result, alerts fan out to webhook subscribers off the
/// request path.
pub async fn validate_prescription(
    State(state): State<AppState>,
    Json(request): Json<PrescriptionValidationRequest>,
) -> Result<impl IntoResponse> {
    request
        .patient
        .validate()
        .map_err(|e| AppError::InvalidArgument(format!("Invalid patient context: {}", e)))?;

    let mut prescription = Prescription::new(
        request
            .id
            .unwrap_or_else(|| format!("rx-{}", Uuid::new_v4())),
        request.patient,
        request.items,
    );
    prescription.prescriber_id = request.prescriber_id;
    prescription.pharmacy_id = request.pharmacy_id;

    let result = state.engine.validate_prescription(&prescription);
    dispatch_alerts(&state, &prescription, &result);

    Ok((
        StatusCode::OK,
        Json(ValidationResponse {
            status: result.status(),
            result,
        }),
    ))
}

/// Validate a bare list of medication ids
///
/// POST /api/v1/validate/quick-check
pub async fn quick_check(
    State(state): State<AppState>,
    Json(request): Json<QuickCheckRequest>,
) -> Result<impl IntoResponse> {
    if let Some(patient) = &request.patient {
        patient
            .validate()
            .map_err(|e| AppError::InvalidArgument(format!("Invalid patient context: {}", e)))?;
    }

    let result = state
        .engine
        .validate_list(&request.medication_ids, request.patient);

    Ok((
        StatusCode::OK,
        Json(ValidationResponse {
            status: result.status(),
            result,
        }),
    ))
}

/// Check interactions between two medications
///
/// POST /api/v1/validate/interaction-check
pub async fn interaction_check(
    State(state): State<AppState>,
    Json(request): Json<InteractionCheckRequest>,
) -> Result<impl IntoResponse> {
    let interactions = state
        .engine
        .validate_pair(request.medication1_id, request.medication2_id)?;
    Ok((StatusCode::OK, Json(interactions)))
}

/// Fan blocked-prescription and major-interaction alerts out to webhook
/// subscribers without blocking the response.
fn dispatch_alerts(state: &AppState, prescription: &Prescription, result: &ValidationResult) {
    if result.status() != ValidationStatus::Blocked {
        return;
    }

    let webhooks = state.webhooks.clone();
    let prescription = prescription.clone();
    let result = result.clone();

    tokio::spawn(async move {
        let reason = blocked_reason(&result);
        webhooks
            .send_blocked_prescription_alert(&prescription, &result, &reason)
            .await;

        for interaction in result
            .interactions
            .iter()
            .filter(|i| i.severity == crate::models::InteractionSeverity::Major)
        {
            webhooks
                .send_major_interaction_alert(&prescription.id, interaction)
                .await;
        }
    });
}

/// Human-readable one-line reason for a blocked prescription
fn blocked_reason(result: &ValidationResult) -> String {
    let mut reasons = Vec::new();

    let counts = result.interaction_counts();
    if counts.major > 0 {
        reasons.push(format!("{} major drug interaction(s)", counts.major));
    }

    let contraindicated = result
        .dosing_adjustments
        .iter()
        .filter(|a| a.contraindicated)
        .count();
    if contraindicated > 0 {
        reasons.push(format!("{} contraindicated dose(s)", contraindicated));
    }

    if !result.contraindications.is_empty() {
        reasons.push(format!(
            "{} contraindication(s)",
            result.contraindications.len()
        ));
    }

    reasons.join("; ")
}
