/*!
 * Validation Result Models
 *
 * Output types of the validation pipeline: drug-drug interactions, dosing
 * adjustments, and the synthesized `ValidationResult` with its validity
 * rule and derived status for downstream systems.
 *
 * Results own their interaction and adjustment values (copies, not
 * references into rule tables) so they can cross task boundaries freely.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::AppError;

/// Severity levels for drug-drug interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionSeverity {
    /// Serious interaction requiring clinical intervention
    Major,
    /// Caution advised, may require monitoring
    Moderate,
    /// Low risk but may be clinically relevant
    Minor,
    /// Severity not determined
    Unknown,
}

impl InteractionSeverity {
    /// Get display name for the severity level
    pub fn display_name(&self) -> &'static str {
        match self {
            InteractionSeverity::Major => "Major",
            InteractionSeverity::Moderate => "Moderate",
            InteractionSeverity::Minor => "Minor",
            InteractionSeverity::Unknown => "Unknown",
        }
    }

    /// Get severity priority (higher = more severe)
    pub fn priority(&self) -> u8 {
        match self {
            InteractionSeverity::Major => 4,
            InteractionSeverity::Moderate => 3,
            InteractionSeverity::Minor => 2,
            InteractionSeverity::Unknown => 1,
        }
    }

    /// Strict parse from a wire token
    pub fn parse(token: &str) -> Result<Self, AppError> {
        match token {
            "major" => Ok(InteractionSeverity::Major),
            "moderate" => Ok(InteractionSeverity::Moderate),
            "minor" => Ok(InteractionSeverity::Minor),
            "unknown" => Ok(InteractionSeverity::Unknown),
            _ => Err(AppError::InvalidArgument(format!(
                "Unknown interaction severity: {}",
                token
            ))),
        }
    }
}

/// A detected drug-drug interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugInteraction {
    pub drug1_id: i64,
    pub drug2_id: i64,
    pub drug1_name: String,
    pub drug2_name: String,
    pub severity: InteractionSeverity,
    /// Short slug naming the matched rule, e.g. "ssri-tramadol"
    pub interaction_type: String,
    pub mechanism: String,
    pub clinical_effect: String,
    pub management: String,
    /// 1=Label, 2=Study, 3=Case Report, 4=Theoretical
    pub evidence_level: u8,
    pub source: String,
    /// Ensemble probability, when the ensemble scored this pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Set on purely ensemble-derived predictions so callers can downweight
    #[serde(default)]
    pub requires_review: bool,
    #[serde(default)]
    pub is_novel_prediction: bool,
}

/// Dosing adjustment recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DosingAdjustment {
    pub medication_id: i64,
    pub medication_name: String,
    pub standard_dose: String,
    pub adjusted_dose: String,
    pub adjustment_reason: String,
    /// "renal" or "hepatic"
    pub impairment_type: String,
    pub impairment_level: String,
    pub gfr_range: Option<String>,
    pub monitoring_required: bool,
    pub monitoring_parameters: Vec<String>,
    pub contraindicated: bool,
    pub source: String,
}

/// Derived prescription status for downstream systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Warning,
    Blocked,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "valid",
            ValidationStatus::Warning => "warning",
            ValidationStatus::Blocked => "blocked",
        }
    }
}

/// Interaction counts by severity
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct InteractionCounts {
    pub major: usize,
    pub moderate: usize,
    pub minor: usize,
}

/// Result of validating one prescription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub prescription_id: Option<String>,
    /// Count of items that resolved against the catalog
    pub medications_validated: usize,
    pub interactions: Vec<DrugInteraction>,
    pub dosing_adjustments: Vec<DosingAdjustment>,
    pub contraindications: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub validation_time_ms: f64,
    pub validated_at: DateTime<Utc>,
}

impl ValidationResult {
    /// True iff any interaction has severity major
    pub fn has_major_interactions(&self) -> bool {
        self.interactions
            .iter()
            .any(|i| i.severity == InteractionSeverity::Major)
    }

    /// True iff any dosing adjustment is contraindicated
    pub fn has_contraindicated_adjustments(&self) -> bool {
        self.dosing_adjustments.iter().any(|a| a.contraindicated)
    }

    /// Count interactions by severity
    pub fn interaction_counts(&self) -> InteractionCounts {
        let mut counts = InteractionCounts::default();
        for interaction in &self.interactions {
            match interaction.severity {
                InteractionSeverity::Major => counts.major += 1,
                InteractionSeverity::Moderate => counts.moderate += 1,
                InteractionSeverity::Minor => counts.minor += 1,
                InteractionSeverity::Unknown => {}
            }
        }
        counts
    }

    /// Derived status for downstream systems: blocked when the prescription
    /// must not be dispensed, warning when review is advised, valid otherwise.
    pub fn status(&self) -> ValidationStatus {
        if self.has_major_interactions()
            || self.has_contraindicated_adjustments()
            || !self.contraindications.is_empty()
        {
            ValidationStatus::Blocked
        } else if !self.interactions.is_empty() || !self.dosing_adjustments.is_empty() {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Valid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction(severity: InteractionSeverity) -> DrugInteraction {
        DrugInteraction {
            drug1_id: 1,
            drug2_id: 2,
            drug1_name: "Warfarin 5mg".to_string(),
            drug2_name: "Aspirin 100mg".to_string(),
            severity,
            interaction_type: "warfarin-aspirin".to_string(),
            mechanism: "Increased bleeding risk".to_string(),
            clinical_effect: String::new(),
            management: "Avoid combination".to_string(),
            evidence_level: 1,
            source: "test".to_string(),
            confidence: None,
            requires_review: false,
            is_novel_prediction: false,
        }
    }

    fn adjustment(contraindicated: bool) -> DosingAdjustment {
        DosingAdjustment {
            medication_id: 3,
            medication_name: "Metformin 500mg".to_string(),
            standard_dose: "See package insert".to_string(),
            adjusted_dose: "Contraindicated".to_string(),
            adjustment_reason: "Lactic acidosis risk".to_string(),
            impairment_type: "renal".to_string(),
            impairment_level: "severe".to_string(),
            gfr_range: None,
            monitoring_required: true,
            monitoring_parameters: vec![],
            contraindicated,
            source: "test".to_string(),
        }
    }

    fn result() -> ValidationResult {
        ValidationResult {
            is_valid: true,
            prescription_id: Some("rx-1".to_string()),
            medications_validated: 0,
            interactions: vec![],
            dosing_adjustments: vec![],
            contraindications: vec![],
            warnings: vec![],
            recommendations: vec![],
            validation_time_ms: 0.0,
            validated_at: Utc::now(),
        }
    }

    #[test]
    fn test_severity_priority_ordering() {
        assert!(InteractionSeverity::Major.priority() > InteractionSeverity::Moderate.priority());
        assert!(InteractionSeverity::Moderate.priority() > InteractionSeverity::Minor.priority());
        assert!(InteractionSeverity::Minor.priority() > InteractionSeverity::Unknown.priority());
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(
            InteractionSeverity::parse("major").unwrap(),
            InteractionSeverity::Major
        );
        assert!(InteractionSeverity::parse("catastrophic").is_err());
    }

    #[test]
    fn test_status_valid_when_empty() {
        assert_eq!(result().status(), ValidationStatus::Valid);
    }

    #[test]
    fn test_status_warning_on_moderate_interaction() {
        let mut r = result();
        r.interactions.push(interaction(InteractionSeverity::Moderate));
        assert_eq!(r.status(), ValidationStatus::Warning);
        assert!(!r.has_major_interactions());
    }

    #[test]
    fn test_status_blocked_on_major_interaction() {
        let mut r = result();
        r.interactions.push(interaction(InteractionSeverity::Major));
        assert_eq!(r.status(), ValidationStatus::Blocked);
        assert!(r.has_major_interactions());
    }

    #[test]
    fn test_status_blocked_on_contraindicated_adjustment() {
        let mut r = result();
        r.dosing_adjustments.push(adjustment(true));
        assert_eq!(r.status(), ValidationStatus::Blocked);
    }

    #[test]
    fn test_status_warning_on_plain_adjustment() {
        let mut r = result();
        r.dosing_adjustments.push(adjustment(false));
        assert_eq!(r.status(), ValidationStatus::Warning);
    }

    #[test]
    fn test_status_blocked_on_contraindication_string() {
        let mut r = result();
        r.contraindications
            .push("Warfarin 5mg: Contraindicated in pregnancy".to_string());
        assert_eq!(r.status(), ValidationStatus::Blocked);
    }

    #[test]
    fn test_interaction_counts() {
        let mut r = result();
        r.interactions.push(interaction(InteractionSeverity::Major));
        r.interactions.push(interaction(InteractionSeverity::Major));
        r.interactions.push(interaction(InteractionSeverity::Minor));
        let counts = r.interaction_counts();
        assert_eq!(counts.major, 2);
        assert_eq!(counts.moderate, 0);
        assert_eq!(counts.minor, 1);
    }
}
