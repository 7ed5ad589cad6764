/*!
 * Dose Adjustment Service
 *
 * Computes creatinine clearance, classifies renal status, and looks up
 * per-drug renal-stage dose rules. Hepatic adjustments are not yet in the
 * rule base; the Child-Pugh calculator is exposed for callers that grade
 * hepatic impairment themselves.
 */

use serde::Deserialize;

use crate::models::{
    DosingAdjustment, HepaticImpairment, Medication, PatientContext, RenalImpairment,
};

const DOSING_SOURCE: &str = "National Formulary / Renal Drug Handbook";

/// NSAID substrings recognized for the class-level rule key, including
/// regional brand names.
const NSAID_SUBSTRINGS: &[&str] = &[
    "ibuprofen",
    "diclofenac",
    "naproxen",
    "brufen",
    "cataflam",
    "voltaren",
];

/// Renal dosing rules: drug key -> per-stage (adjusted dose, notes)
type StageRule = (RenalImpairment, &'static str, &'static str);

static RENAL_DOSING_RULES: &[(&str, &[StageRule])] = &[
    // Antibiotics
    ("amoxicillin", &[
        (RenalImpairment::Moderate, "250-500mg q12h", "Extend interval"),
        (RenalImpairment::Severe, "250-500mg q24h", "Once daily dosing"),
        (RenalImpairment::Esrd, "250-500mg q24h + post-HD dose", "Dialyzable - give after HD"),
    ]),
    ("ciprofloxacin", &[
        (RenalImpairment::Moderate, "250-500mg q12h", "Reduce dose or extend interval"),
        (RenalImpairment::Severe, "250-500mg q18-24h", "Significant reduction needed"),
        (RenalImpairment::Esrd, "250-500mg q24h", "Give after dialysis"),
    ]),
    ("levofloxacin", &[
        (RenalImpairment::Moderate, "250-500mg q24h", "Standard interval, may reduce dose"),
        (RenalImpairment::Severe, "250mg q24-48h", "Reduce dose and extend interval"),
        (RenalImpairment::Esrd, "250mg q48h", "Post-dialysis dosing"),
    ]),
    ("gentamicin", &[
        (RenalImpairment::Mild, "Use traditional dosing with monitoring", "Monitor levels closely"),
        (RenalImpairment::Moderate, "Extend interval to q24-36h", "TDM required"),
        (RenalImpairment::Severe, "Extend interval to q48h", "TDM required - nephrotoxic"),
        (RenalImpairment::Esrd, "Re-dose based on levels after HD", "TDM required"),
    ]),
    ("vancomycin", &[
        (RenalImpairment::Mild, "15-20mg/kg q12h", "Monitor trough levels"),
        (RenalImpairment::Moderate, "15-20mg/kg q24-48h", "TDM required"),
        (RenalImpairment::Severe, "15-20mg/kg q48-72h", "TDM required"),
        (RenalImpairment::Esrd, "15-25mg/kg loading, then based on levels", "Give after HD"),
    ]),
    ("metronidazole", &[
        (RenalImpairment::Severe, "Reduce dose by 50%", "Active metabolite accumulates"),
        (RenalImpairment::Esrd, "Reduce dose by 50%", "Not dialyzable"),
    ]),
    // Cardiovascular
    ("atenolol", &[
        (RenalImpairment::Moderate, "25-50mg daily", "Reduce dose"),
        (RenalImpairment::Severe, "25mg daily or every other day", "Significant reduction"),
        (RenalImpairment::Esrd, "25-50mg after HD", "Dialyzable"),
    ]),
    ("digoxin", &[
        (RenalImpairment::Mild, "0.125-0.25mg daily", "Monitor levels"),
        (RenalImpairment::Moderate, "0.0625-0.125mg daily", "Reduce dose significantly"),
        (RenalImpairment::Severe, "0.0625mg daily or every other day", "High toxicity risk"),
        (RenalImpairment::Esrd, "0.0625mg 3x/week", "Not dialyzable - very careful dosing"),
    ]),
    ("lisinopril", &[
        (RenalImpairment::Moderate, "Start 2.5-5mg daily", "Titrate carefully"),
        (RenalImpairment::Severe, "Start 2.5mg daily", "May accumulate - watch K+"),
        (RenalImpairment::Esrd, "Start 2.5mg daily", "Dialyzable"),
    ]),
    ("spironolactone", &[
        (RenalImpairment::Moderate, "Use with caution - monitor K+", "Risk of hyperkalemia"),
        (RenalImpairment::Severe, "Avoid if possible", "High hyperkalemia risk"),
        (RenalImpairment::Esrd, "Contraindicated", "Severe hyperkalemia risk"),
    ]),
    // Pain / anti-inflammatory
    ("morphine", &[
        (RenalImpairment::Moderate, "Reduce dose by 25-50%", "Active metabolite accumulates"),
        (RenalImpairment::Severe, "Reduce dose by 50-75%", "Use with extreme caution"),
        (RenalImpairment::Esrd, "Avoid - use fentanyl or hydromorphone", "Metabolite causes toxicity"),
    ]),
    ("gabapentin", &[
        (RenalImpairment::Mild, "300-600mg TID", "May need adjustment"),
        (RenalImpairment::Moderate, "200-300mg BID", "Reduce dose"),
        (RenalImpairment::Severe, "100-300mg daily", "Significant reduction"),
        (RenalImpairment::Esrd, "100-300mg post-HD", "Give after dialysis"),
    ]),
    ("nsaid", &[
        (RenalImpairment::Mild, "Use lowest effective dose for shortest duration", "Monitor renal function"),
        (RenalImpairment::Moderate, "Avoid if possible", "May worsen renal function"),
        (RenalImpairment::Severe, "Contraindicated", "High risk of AKI"),
        (RenalImpairment::Esrd, "Contraindicated", "No renal benefit, cardiovascular risk remains"),
    ]),
    // Diabetes
    ("metformin", &[
        (RenalImpairment::Mild, "No adjustment needed", "Monitor renal function"),
        (RenalImpairment::Moderate, "Max 1000mg daily if GFR 30-45", "Do not start if GFR <45"),
        (RenalImpairment::Severe, "Contraindicated", "Lactic acidosis risk"),
        (RenalImpairment::Esrd, "Contraindicated", "Lactic acidosis risk"),
    ]),
    ("glyburide", &[
        (RenalImpairment::Moderate, "Avoid - use glipizide instead", "Active metabolites accumulate"),
        (RenalImpairment::Severe, "Contraindicated", "Prolonged hypoglycemia risk"),
        (RenalImpairment::Esrd, "Contraindicated", "Use insulin"),
    ]),
    ("sitagliptin", &[
        (RenalImpairment::Moderate, "50mg daily", "Reduce from 100mg"),
        (RenalImpairment::Severe, "25mg daily", "Further reduction"),
        (RenalImpairment::Esrd, "25mg daily", "Can be given regardless of HD timing"),
    ]),
    // Anticoagulants
    ("enoxaparin", &[
        (RenalImpairment::Severe, "1mg/kg once daily for treatment", "Reduce prophylaxis to 30mg daily"),
        (RenalImpairment::Esrd, "Avoid - use UFH", "Unpredictable accumulation"),
    ]),
    ("rivaroxaban", &[
        (RenalImpairment::Moderate, "15mg daily for AF if GFR 15-50", "Reduce dose"),
        (RenalImpairment::Severe, "Avoid if GFR <15", "Limited data"),
        (RenalImpairment::Esrd, "Not recommended", "No data on HD patients"),
    ]),
    ("dabigatran", &[
        (RenalImpairment::Moderate, "110mg BID if GFR 30-50", "Reduce dose"),
        (RenalImpairment::Severe, "Contraindicated", "GFR <30"),
        (RenalImpairment::Esrd, "Contraindicated", "No data"),
    ]),
];

/// Drug-specific monitoring parameters; anything absent falls back to
/// serum creatinine + electrolytes.
static MONITORING_PARAMS: &[(&str, &[&str])] = &[
    ("gentamicin", &["Trough and peak levels", "Serum creatinine", "Audiometry if prolonged use"]),
    ("vancomycin", &["Trough levels", "Serum creatinine", "CBC"]),
    ("digoxin", &["Digoxin level", "Potassium", "ECG"]),
    ("metformin", &["Lactic acid if symptomatic", "Serum creatinine", "B12 annually"]),
    ("enoxaparin", &["Anti-Xa levels if monitoring needed", "Platelets", "Signs of bleeding"]),
    ("spironolactone", &["Potassium", "Sodium", "Serum creatinine"]),
    ("lisinopril", &["Potassium", "Serum creatinine", "Blood pressure"]),
];

/// GFR / creatinine clearance calculators
pub struct GfrCalculator;

impl GfrCalculator {
    /// Cockcroft-Gault creatinine clearance in mL/min, rounded to one
    /// decimal. Returns 0 when serum creatinine is non-positive.
    pub fn cockcroft_gault(age: u32, weight_kg: f64, serum_creatinine: f64, is_female: bool) -> f64 {
        if serum_creatinine <= 0.0 {
            return 0.0;
        }

        let mut crcl = ((140.0 - age as f64) * weight_kg) / (72.0 * serum_creatinine);
        if is_female {
            crcl *= 0.85;
        }

        (crcl * 10.0).round() / 10.0
    }

    /// CKD-EPI 2021 eGFR (race-free) in mL/min/1.73m², one decimal.
    pub fn ckd_epi(age: u32, serum_creatinine: f64, is_female: bool) -> f64 {
        let (kappa, alpha, female_factor) = if is_female {
            (0.7, -0.241, 1.012)
        } else {
            (0.9, -0.302, 1.0)
        };

        let scr_kappa = serum_creatinine / kappa;
        let exponent = if scr_kappa <= 1.0 { alpha } else { -1.200 };
        let egfr = 142.0 * scr_kappa.powf(exponent) * 0.9938_f64.powf(age as f64) * female_factor;

        (egfr * 10.0).round() / 10.0
    }

    /// Classify renal function based on GFR
    pub fn classify_renal_function(gfr: f64) -> RenalImpairment {
        RenalImpairment::from_gfr(gfr)
    }
}

/// Ascites grading for the Child-Pugh score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ascites {
    None,
    Mild,
    ModerateSevere,
}

/// Hepatic encephalopathy grading for the Child-Pugh score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Encephalopathy {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "grade_1_2")]
    Grade1_2,
    #[serde(rename = "grade_3_4")]
    Grade3_4,
}

/// Child-Pugh score calculator for hepatic impairment
pub struct ChildPughCalculator;

impl ChildPughCalculator {
    /// Calculate the Child-Pugh score (5-15) and its classification.
    ///
    /// Bilirubin in mg/dL, albumin in g/dL.
    pub fn calculate_score(
        bilirubin: f64,
        albumin: f64,
        inr: f64,
        ascites: Ascites,
        encephalopathy: Encephalopathy,
    ) -> (u8, HepaticImpairment) {
        let mut score = 0u8;

        score += if bilirubin < 2.0 {
            1
        } else if bilirubin <= 3.0 {
            2
        } else {
            3
        };

        score += if albumin > 3.5 {
            1
        } else if albumin >= 2.8 {
            2
        } else {
            3
        };

        score += if inr < 1.7 {
            1
        } else if inr <= 2.3 {
            2
        } else {
            3
        };

        score += match ascites {
            Ascites::None => 1,
            Ascites::Mild => 2,
            Ascites::ModerateSevere => 3,
        };

        score += match encephalopathy {
            Encephalopathy::None => 1,
            Encephalopathy::Grade1_2 => 2,
            Encephalopathy::Grade3_4 => 3,
        };

        let classification = if score <= 6 {
            HepaticImpairment::ChildPughA
        } else if score <= 9 {
            HepaticImpairment::ChildPughB
        } else {
            HepaticImpairment::ChildPughC
        };

        (score, classification)
    }
}

/// Dosing adjustment calculation engine
pub struct DosingEngine;

impl DosingEngine {
    pub fn new() -> Self {
        tracing::info!(
            "Dosing engine initialized with {} drug rules",
            RENAL_DOSING_RULES.len()
        );
        Self
    }

    /// Patient GFR: explicit value first, else Cockcroft-Gault when age,
    /// weight, creatinine and sex are all present. A non-positive explicit
    /// value is treated as absent so the derivation path still runs.
    pub fn patient_gfr(&self, patient: &PatientContext) -> Option<f64> {
        if let Some(gfr) = patient.gfr.filter(|g| *g > 0.0) {
            return Some(gfr);
        }

        match (patient.age, patient.weight_kg, patient.serum_creatinine, &patient.sex) {
            (Some(age), Some(weight), Some(creatinine), Some(_)) => Some(
                GfrCalculator::cockcroft_gault(age, weight, creatinine, patient.is_female()),
            ),
            _ => None,
        }
    }

    /// Renal impairment level: an explicitly recorded level wins; otherwise
    /// classify from GFR; otherwise assume normal.
    pub fn classify_renal_status(&self, patient: &PatientContext) -> RenalImpairment {
        if patient.renal_impairment != RenalImpairment::Normal {
            return patient.renal_impairment;
        }

        match self.patient_gfr(patient) {
            Some(gfr) if gfr > 0.0 => GfrCalculator::classify_renal_function(gfr),
            _ => RenalImpairment::Normal,
        }
    }

    /// Get the renal dosing adjustment for one medication, if any rule
    /// covers its drug key at the patient's renal stage.
    pub fn renal_adjustment(
        &self,
        medication: &Medication,
        patient: &PatientContext,
    ) -> Option<DosingAdjustment> {
        let renal_status = self.classify_renal_status(patient);
        if renal_status == RenalImpairment::Normal {
            return None;
        }

        let drug_key = find_drug_key(medication)?;
        let stages = RENAL_DOSING_RULES
            .iter()
            .find(|(key, _)| *key == drug_key)
            .map(|(_, stages)| *stages)?;

        let (_, adjusted_dose, notes) = stages
            .iter()
            .find(|(stage, _, _)| *stage == renal_status)?;

        let gfr_range = self
            .patient_gfr(patient)
            .map(|gfr| format!("GFR: {:.0} mL/min", gfr));

        // Lexical contraindication rule carried over from the source data:
        // the dose text itself declares "contraindicated" or "avoid".
        let combined = format!("{} {}", adjusted_dose, notes).to_lowercase();
        let contraindicated = combined.contains("contraindicated") || combined.contains("avoid");

        Some(DosingAdjustment {
            medication_id: medication.id,
            medication_name: medication.commercial_name.clone(),
            standard_dose: "See package insert".to_string(),
            adjusted_dose: (*adjusted_dose).to_string(),
            adjustment_reason: (*notes).to_string(),
            impairment_type: "renal".to_string(),
            impairment_level: renal_status.as_str().to_string(),
            gfr_range,
            monitoring_required: true,
            monitoring_parameters: monitoring_params(drug_key),
            contraindicated,
            source: DOSING_SOURCE.to_string(),
        })
    }

    /// Check every medication in a prescription; contraindicated
    /// adjustments sort first.
    pub fn check_prescription(
        &self,
        medications: &[&Medication],
        patient: &PatientContext,
    ) -> Vec<DosingAdjustment> {
        let mut adjustments: Vec<DosingAdjustment> = medications
            .iter()
            .filter_map(|med| self.renal_adjustment(med, patient))
            .collect();

        adjustments.sort_by_key(|a| !a.contraindicated);
        adjustments
    }
}

impl Default for DosingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Match a medication to a rule key by substring over the commercial name,
/// then the generic name, then the NSAID class list.
fn find_drug_key(medication: &Medication) -> Option<&'static str> {
    let name_lower = medication.commercial_name.to_lowercase();
    for (key, _) in RENAL_DOSING_RULES {
        if name_lower.contains(key) {
            return Some(key);
        }
    }

    if let Some(generic) = &medication.generic_name {
        let generic_lower = generic.to_lowercase();
        for (key, _) in RENAL_DOSING_RULES {
            if generic_lower.contains(key) {
                return Some(key);
            }
        }
    }

    if NSAID_SUBSTRINGS.iter().any(|n| name_lower.contains(n)) {
        return Some("nsaid");
    }

    None
}

fn monitoring_params(drug_key: &str) -> Vec<String> {
    MONITORING_PARAMS
        .iter()
        .find(|(key, _)| *key == drug_key)
        .map(|(_, params)| params.iter().map(|p| p.to_string()).collect())
        .unwrap_or_else(|| vec!["Serum creatinine".to_string(), "Electrolytes".to_string()])
}
