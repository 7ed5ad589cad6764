/*!
 * Prescription Model
 *
 * A prescription is the unit of validation: a caller-assigned id, the
 * patient context, and an ordered list of medication items. An empty item
 * list is a legal input (the result is valid with zero medications).
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PatientContext;

/// Single medication line in a prescription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub medication_id: i64,
    #[serde(default)]
    pub dose: String,
    #[serde(default)]
    pub frequency: String,
    pub duration: Option<String>,
    pub route: Option<String>,
    pub instructions: Option<String>,
}

impl PrescriptionItem {
    /// Item with only a medication id, used by the quick-check helpers
    pub fn bare(medication_id: i64) -> Self {
        Self {
            medication_id,
            dose: String::new(),
            frequency: String::new(),
            duration: None,
            route: None,
            instructions: None,
        }
    }
}

/// Full prescription submitted for validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub patient: PatientContext,
    pub items: Vec<PrescriptionItem>,
    pub prescriber_id: Option<String>,
    pub pharmacy_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Prescription {
    pub fn new(id: impl Into<String>, patient: PatientContext, items: Vec<PrescriptionItem>) -> Self {
        Self {
            id: id.into(),
            patient,
            items,
            prescriber_id: None,
            pharmacy_id: None,
            created_at: Utc::now(),
        }
    }
}
