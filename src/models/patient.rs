/*!
 * Patient Context Model
 *
 * Value object carried with a prescription: demographics, renal/hepatic
 * status, allergies, conditions and pregnancy flags. Used by the dose
 * detector and the contraindication rules; never mutated by validation.
 */

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::AppError;

/// Renal impairment level (closed ordered set, by GFR thresholds)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenalImpairment {
    /// GFR >= 90
    #[default]
    Normal,
    /// GFR 60-89
    Mild,
    /// GFR 30-59
    Moderate,
    /// GFR 15-29
    Severe,
    /// GFR < 15
    Esrd,
}

impl RenalImpairment {
    /// Classify renal function from a GFR in mL/min/1.73m²
    pub fn from_gfr(gfr: f64) -> Self {
        if gfr >= 90.0 {
            RenalImpairment::Normal
        } else if gfr >= 60.0 {
            RenalImpairment::Mild
        } else if gfr >= 30.0 {
            RenalImpairment::Moderate
        } else if gfr >= 15.0 {
            RenalImpairment::Severe
        } else {
            RenalImpairment::Esrd
        }
    }

    /// Wire token for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            RenalImpairment::Normal => "normal",
            RenalImpairment::Mild => "mild",
            RenalImpairment::Moderate => "moderate",
            RenalImpairment::Severe => "severe",
            RenalImpairment::Esrd => "esrd",
        }
    }

    /// Strict parse from a wire token
    pub fn parse(token: &str) -> Result<Self, AppError> {
        match token {
            "normal" => Ok(RenalImpairment::Normal),
            "mild" => Ok(RenalImpairment::Mild),
            "moderate" => Ok(RenalImpairment::Moderate),
            "severe" => Ok(RenalImpairment::Severe),
            "esrd" => Ok(RenalImpairment::Esrd),
            _ => Err(AppError::InvalidArgument(format!(
                "Unknown renal impairment level: {}",
                token
            ))),
        }
    }
}

/// Hepatic impairment level (Child-Pugh classes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HepaticImpairment {
    #[default]
    None,
    /// Child-Pugh score 5-6
    ChildPughA,
    /// Child-Pugh score 7-9
    ChildPughB,
    /// Child-Pugh score 10-15
    ChildPughC,
}

impl HepaticImpairment {
    /// Wire token for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            HepaticImpairment::None => "none",
            HepaticImpairment::ChildPughA => "child_pugh_a",
            HepaticImpairment::ChildPughB => "child_pugh_b",
            HepaticImpairment::ChildPughC => "child_pugh_c",
        }
    }
}

/// Patient information for personalized validation
///
/// If `gfr` is absent but age, weight, creatinine and sex are all present,
/// the dose detector derives a creatinine clearance internally; this
/// context is never mutated by that derivation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PatientContext {
    #[validate(range(min = 0, max = 150))]
    pub age: Option<u32>,
    #[validate(range(min = 0.0, max = 500.0))]
    pub weight_kg: Option<f64>,
    #[validate(range(min = 0.0, max = 300.0))]
    pub height_cm: Option<f64>,
    /// "M" or "F"
    #[validate(custom(function = validate_sex))]
    pub sex: Option<String>,
    /// Serum creatinine in mg/dL
    #[validate(range(min = 0.0))]
    pub serum_creatinine: Option<f64>,
    /// GFR in mL/min/1.73m²
    #[validate(range(min = 0.0))]
    pub gfr: Option<f64>,
    #[serde(default)]
    pub renal_impairment: RenalImpairment,
    #[serde(default)]
    pub hepatic_impairment: HepaticImpairment,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Ids of medications the patient is already taking
    #[serde(default)]
    pub current_medications: Vec<i64>,
    #[serde(default)]
    pub is_pregnant: bool,
    #[serde(default)]
    pub is_breastfeeding: bool,
}

impl PatientContext {
    /// True when sex is recorded as female
    pub fn is_female(&self) -> bool {
        self.sex.as_deref() == Some("F")
    }
}

fn validate_sex(sex: &str) -> Result<(), validator::ValidationError> {
    if sex == "M" || sex == "F" {
        Ok(())
    } else {
        Err(validator::ValidationError::new("sex_must_be_m_or_f"))
    }
}
