/*!
 * Validation Engine
 *
 * Orchestrates the full prescription validation pipeline:
 * resolve items -> drug-drug interactions -> dose adjustments ->
 * contraindications -> warnings -> recommendations -> verdict.
 *
 * The engine is an explicitly constructed value owning all subcomponents
 * (no global singletons); the catalog sits behind a read-write lock since
 * loads happen on an administrative path while requests read. The pipeline
 * itself is a pure function of (engine, prescription): it performs no I/O,
 * never suspends, and never talks to the webhook manager.
 */

use std::path::Path;
use std::sync::RwLock;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    DosingAdjustment, DrugInteraction, InteractionSeverity, Medication, PatientContext,
    Prescription, PrescriptionItem, ValidationResult,
};
use crate::services::catalog_service::{CatalogRecord, CatalogStatistics, DrugCatalog};
use crate::services::ddi_service::DdiEngine;
use crate::services::dosing_service::DosingEngine;
use crate::utils::{AppError, Result};

/// Medications contraindicated in pregnancy, matched by substring over the
/// commercial or generic name.
const PREGNANCY_CONTRAINDICATED: &[&str] = &[
    "methotrexate",
    "warfarin",
    "isotretinoin",
    "thalidomide",
    "misoprostol",
    "finasteride",
    "statins",
    "ace_inhibitor",
    "tetracycline",
    "fluoroquinolone",
];

/// Condition -> forbidden drug substrings, matched over the commercial name.
static CONDITION_CONTRAINDICATIONS: &[(&str, &[&str])] = &[
    ("asthma", &["beta_blocker", "aspirin", "nsaid"]),
    ("heart_failure", &["nsaid", "thiazolidinedione", "verapamil", "diltiazem"]),
    ("peptic_ulcer", &["nsaid", "aspirin", "corticosteroid"]),
    ("gout", &["thiazide", "loop_diuretic", "aspirin"]),
    ("myasthenia_gravis", &["aminoglycoside", "fluoroquinolone", "beta_blocker"]),
];

/// Summary of a catalog load
#[derive(Debug, Serialize)]
pub struct LoadSummary {
    pub medications_loaded: usize,
    pub statistics: CatalogStatistics,
}

/// Medication summary row returned by search
#[derive(Debug, Serialize)]
pub struct MedicationSummary {
    pub id: i64,
    pub commercial_name: String,
    pub generic_name: Option<String>,
    pub dosage_form: String,
    pub strength: Option<String>,
    pub is_high_alert: bool,
}

/// Reference to a similar medication (same generic, different brand)
#[derive(Debug, Serialize)]
pub struct SimilarMedication {
    pub id: i64,
    pub name: String,
}

/// Detailed medication info for the get-medication operation
#[derive(Debug, Serialize)]
pub struct MedicationDetail {
    pub id: i64,
    pub commercial_name: String,
    pub generic_name: Option<String>,
    pub arabic_name: Option<String>,
    pub active_ingredients: Vec<String>,
    pub dosage_form: String,
    pub strength: Option<String>,
    pub package_size: Option<String>,
    pub manufacturer: Option<String>,
    pub atc_code: Option<String>,
    pub is_otc: bool,
    pub is_controlled: bool,
    pub is_high_alert: bool,
    pub similar_medications: Vec<SimilarMedication>,
}

/// Feature flags reported by the statistics operation
#[derive(Debug, Serialize)]
pub struct FeatureFlags {
    pub ensemble_ddi: bool,
}

/// Engine-level statistics
#[derive(Debug, Serialize)]
pub struct EngineStatistics {
    pub catalog: CatalogStatistics,
    pub features: FeatureFlags,
}

/// The prescription validation engine
pub struct ValidationEngine {
    catalog: RwLock<DrugCatalog>,
    ddi: DdiEngine,
    dosing: DosingEngine,
}

impl ValidationEngine {
    /// Engine with the rule-based DDI detector only
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(DrugCatalog::new()),
            ddi: DdiEngine::new(),
            dosing: DosingEngine::new(),
        }
    }

    /// Engine with the ensemble DDI path enabled
    pub fn with_ensemble() -> Self {
        Self {
            catalog: RwLock::new(DrugCatalog::new()),
            ddi: DdiEngine::with_ensemble(),
            dosing: DosingEngine::new(),
        }
    }

    // ========================================================================
    // CATALOG OPERATIONS
    // ========================================================================

    /// Load the catalog from a processed JSON file
    pub fn load_catalog_from_file(&self, path: impl AsRef<Path>) -> Result<LoadSummary> {
        let mut catalog = self.catalog.write().expect("catalog lock poisoned");
        let medications_loaded = catalog.load_from_json_file(path)?;
        Ok(LoadSummary {
            medications_loaded,
            statistics: catalog.statistics(),
        })
    }

    /// Load the catalog from raw records (tests and admin bootstrap)
    pub fn load_catalog_records(&self, records: Vec<CatalogRecord>) -> LoadSummary {
        let mut catalog = self.catalog.write().expect("catalog lock poisoned");
        let medications_loaded = catalog.load_records(records);
        LoadSummary {
            medications_loaded,
            statistics: catalog.statistics(),
        }
    }

    /// Number of medications currently loaded
    pub fn medications_loaded(&self) -> usize {
        self.catalog.read().expect("catalog lock poisoned").len()
    }

    /// True once a catalog load has completed
    pub fn is_catalog_loaded(&self) -> bool {
        self.catalog.read().expect("catalog lock poisoned").is_loaded()
    }

    /// Search medications by name, generic, or ingredient
    pub fn search_medications(&self, query: &str, limit: usize) -> Vec<MedicationSummary> {
        let catalog = self.catalog.read().expect("catalog lock poisoned");
        catalog
            .search(query, limit)
            .into_iter()
            .map(|med| MedicationSummary {
                id: med.id,
                commercial_name: med.commercial_name.clone(),
                generic_name: med.generic_name.clone(),
                dosage_form: med.dosage_form.as_str().to_string(),
                strength: med.strength.clone(),
                is_high_alert: catalog.is_high_alert(med.id),
            })
            .collect()
    }

    /// Detailed medication information, including similar brands
    pub fn medication_info(&self, id: i64) -> Result<MedicationDetail> {
        let catalog = self.catalog.read().expect("catalog lock poisoned");
        if !catalog.is_loaded() {
            return Err(AppError::CatalogNotLoaded);
        }

        let med = catalog
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Medication {} not found", id)))?;

        let similar_medications = catalog
            .similar(id)
            .into_iter()
            .take(5)
            .map(|s| SimilarMedication {
                id: s.id,
                name: s.commercial_name.clone(),
            })
            .collect();

        Ok(MedicationDetail {
            id: med.id,
            commercial_name: med.commercial_name.clone(),
            generic_name: med.generic_name.clone(),
            arabic_name: med.arabic_name.clone(),
            active_ingredients: med.active_ingredients.clone(),
            dosage_form: med.dosage_form.as_str().to_string(),
            strength: med.strength.clone(),
            package_size: med.package_size.clone(),
            manufacturer: med.manufacturer.clone(),
            atc_code: med.atc_code.clone(),
            is_otc: med.is_otc,
            is_controlled: med.is_controlled,
            is_high_alert: catalog.is_high_alert(id),
            similar_medications,
        })
    }

    /// Engine statistics for the operations surface
    pub fn statistics(&self) -> EngineStatistics {
        let catalog = self.catalog.read().expect("catalog lock poisoned");
        EngineStatistics {
            catalog: catalog.statistics(),
            features: FeatureFlags {
                ensemble_ddi: self.ddi.ensemble_enabled(),
            },
        }
    }

    // ========================================================================
    // VALIDATION PIPELINE
    // ========================================================================

    /// Validate a complete prescription.
    ///
    /// Unknown medication ids are skipped with a warning on the result; the
    /// reported count reflects resolved medications only.
    pub fn validate_prescription(&self, prescription: &Prescription) -> ValidationResult {
        let start = Instant::now();
        let catalog = self.catalog.read().expect("catalog lock poisoned");

        let mut warnings: Vec<String> = Vec::new();

        // Resolve items against the catalog
        let mut medications: Vec<&Medication> = Vec::new();
        for item in &prescription.items {
            match catalog.get(item.medication_id) {
                Some(med) => medications.push(med),
                None => {
                    tracing::warn!("Medication not found: {}", item.medication_id);
                    warnings.push(format!(
                        "Medication not found in catalog: {}",
                        item.medication_id
                    ));
                }
            }
        }

        let interactions = self.ddi.check_prescription(&medications);
        let dosing_adjustments = self
            .dosing
            .check_prescription(&medications, &prescription.patient);
        let contraindications = check_contraindications(&medications, &prescription.patient);

        warnings.extend(generate_warnings(
            &catalog,
            &medications,
            &prescription.patient,
            &interactions,
            &dosing_adjustments,
        ));
        let recommendations = generate_recommendations(&interactions, &dosing_adjustments);

        let is_valid = !interactions
            .iter()
            .any(|i| i.severity == InteractionSeverity::Major)
            && !dosing_adjustments.iter().any(|a| a.contraindicated)
            && contraindications.is_empty();

        ValidationResult {
            is_valid,
            prescription_id: Some(prescription.id.clone()),
            medications_validated: medications.len(),
            interactions,
            dosing_adjustments,
            contraindications,
            warnings,
            recommendations,
            validation_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            validated_at: Utc::now(),
        }
    }

    /// Quick check for interactions between two medications
    pub fn validate_pair(&self, med1_id: i64, med2_id: i64) -> Result<Vec<DrugInteraction>> {
        let catalog = self.catalog.read().expect("catalog lock poisoned");

        let med1 = catalog
            .get(med1_id)
            .ok_or_else(|| AppError::NotFound(format!("Medication {} not found", med1_id)))?;
        let med2 = catalog
            .get(med2_id)
            .ok_or_else(|| AppError::NotFound(format!("Medication {} not found", med2_id)))?;

        Ok(self.ddi.check_pair(med1, med2))
    }

    /// Validate a bare list of medication ids by building a synthetic
    /// prescription and forwarding to the pipeline.
    pub fn validate_list(
        &self,
        medication_ids: &[i64],
        patient: Option<PatientContext>,
    ) -> ValidationResult {
        let items: Vec<PrescriptionItem> = medication_ids
            .iter()
            .map(|&id| PrescriptionItem::bare(id))
            .collect();

        let prescription = Prescription::new(
            format!("quick-{}", Uuid::new_v4()),
            patient.unwrap_or_default(),
            items,
        );

        self.validate_prescription(&prescription)
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Pregnancy and condition-drug contraindication rules
fn check_contraindications(medications: &[&Medication], patient: &PatientContext) -> Vec<String> {
    let mut contraindications = Vec::new();

    if patient.is_pregnant {
        for med in medications {
            let name_lower = med.commercial_name.to_lowercase();
            let generic_lower = med
                .generic_name
                .as_deref()
                .unwrap_or("")
                .to_lowercase();
            for drug in PREGNANCY_CONTRAINDICATED {
                if name_lower.contains(drug) || generic_lower.contains(drug) {
                    contraindications.push(format!(
                        "{}: Contraindicated in pregnancy",
                        med.commercial_name
                    ));
                    break;
                }
            }
        }
    }

    for condition in &patient.conditions {
        let condition_key = condition.to_lowercase().replace(' ', "_");
        let Some((_, forbidden)) = CONDITION_CONTRAINDICATIONS
            .iter()
            .find(|(key, _)| *key == condition_key)
        else {
            continue;
        };

        for med in medications {
            let name_lower = med.commercial_name.to_lowercase();
            for drug in *forbidden {
                if name_lower.contains(drug) {
                    contraindications.push(format!(
                        "{}: Caution/Contraindicated with {}",
                        med.commercial_name, condition
                    ));
                    break;
                }
            }
        }
    }

    contraindications
}

/// Warning strings, in the fixed order the pipeline emits them
fn generate_warnings(
    catalog: &DrugCatalog,
    medications: &[&Medication],
    patient: &PatientContext,
    interactions: &[DrugInteraction],
    dosing_adjustments: &[DosingAdjustment],
) -> Vec<String> {
    let mut warnings = Vec::new();

    for med in medications {
        if catalog.is_high_alert(med.id) {
            warnings.push(format!(
                "HIGH-ALERT: {} requires extra verification",
                med.commercial_name
            ));
        }
    }

    let major_count = interactions
        .iter()
        .filter(|i| i.severity == InteractionSeverity::Major)
        .count();
    if major_count > 0 {
        warnings.push(format!(
            "{} MAJOR drug interaction(s) detected - review required",
            major_count
        ));
    }

    let moderate_count = interactions
        .iter()
        .filter(|i| i.severity == InteractionSeverity::Moderate)
        .count();
    if moderate_count > 0 {
        warnings.push(format!(
            "{} moderate drug interaction(s) detected",
            moderate_count
        ));
    }

    let contraindicated_count = dosing_adjustments.iter().filter(|a| a.contraindicated).count();
    if contraindicated_count > 0 {
        warnings.push(format!(
            "{} medication(s) contraindicated for patient's renal function",
            contraindicated_count
        ));
    }

    let adjustment_count = dosing_adjustments.len() - contraindicated_count;
    if adjustment_count > 0 {
        warnings.push(format!(
            "{} medication(s) require dose adjustment for renal function",
            adjustment_count
        ));
    }

    if let Some(age) = patient.age {
        if age >= 65 {
            warnings.push(
                "Elderly patient - review for age-appropriate dosing and polypharmacy".to_string(),
            );
        } else if age < 18 {
            warnings.push(
                "Pediatric patient - verify age-appropriate formulations and doses".to_string(),
            );
        }
    }

    warnings
}

/// Actionable recommendation strings
fn generate_recommendations(
    interactions: &[DrugInteraction],
    dosing_adjustments: &[DosingAdjustment],
) -> Vec<String> {
    let mut recommendations = Vec::new();

    for interaction in interactions {
        if !interaction.management.is_empty() {
            recommendations.push(format!(
                "For {} + {}: {}",
                interaction.drug1_name, interaction.drug2_name, interaction.management
            ));
        }
    }

    for adjustment in dosing_adjustments {
        if adjustment.contraindicated {
            recommendations.push(format!(
                "AVOID {} - {}. Consider alternatives.",
                adjustment.medication_name, adjustment.adjustment_reason
            ));
        } else {
            recommendations.push(format!(
                "ADJUST {}: {} ({})",
                adjustment.medication_name,
                adjustment.adjusted_dose,
                adjustment.adjustment_reason
            ));
            if adjustment.monitoring_required {
                recommendations.push(format!(
                    "MONITOR for {}: {}",
                    adjustment.medication_name,
                    adjustment.monitoring_parameters.join(", ")
                ));
            }
        }
    }

    recommendations
}
