/*!
 * Ensemble DDI Scorer
 *
 * Embedding-style auxiliary detector that augments the rule base. Each
 * known drug carries a small fixed-dimensional risk profile (bleeding, QT
 * prolongation, CNS depression) plus a class vector. Pair probability is
 * the element-wise maximum of the per-dimension products, with a
 * cosine-similarity bonus for same-class drugs.
 *
 * Rule-base hits always win; an ensemble score on a rule hit is retained
 * only as a confidence signal. Purely ensemble-derived predictions are
 * advisory and flagged for review.
 */

use crate::models::{InteractionSeverity, Medication};

/// Fixed risk profile for a known drug
#[derive(Debug, Clone, Copy)]
struct DrugRiskProfile {
    name: &'static str,
    bleeding: f64,
    qt: f64,
    cns: f64,
    class_vec: [f64; 4],
}

// Profiles are hand-curated approximations of the clinical risk surface;
// only the threshold behavior is contractual, not the raw numbers.
const DRUG_PROFILES: &[DrugRiskProfile] = &[
    DrugRiskProfile { name: "warfarin", bleeding: 0.95, qt: 0.05, cns: 0.05, class_vec: [1.0, 0.0, 0.0, 0.0] },
    DrugRiskProfile { name: "heparin", bleeding: 0.90, qt: 0.05, cns: 0.05, class_vec: [1.0, 0.0, 0.0, 0.0] },
    DrugRiskProfile { name: "aspirin", bleeding: 0.85, qt: 0.05, cns: 0.05, class_vec: [0.8, 0.2, 0.0, 0.0] },
    DrugRiskProfile { name: "clopidogrel", bleeding: 0.85, qt: 0.05, cns: 0.05, class_vec: [0.9, 0.1, 0.0, 0.0] },
    DrugRiskProfile { name: "ibuprofen", bleeding: 0.70, qt: 0.05, cns: 0.05, class_vec: [0.2, 1.0, 0.0, 0.0] },
    DrugRiskProfile { name: "diclofenac", bleeding: 0.70, qt: 0.05, cns: 0.05, class_vec: [0.2, 1.0, 0.0, 0.0] },
    DrugRiskProfile { name: "naproxen", bleeding: 0.70, qt: 0.05, cns: 0.05, class_vec: [0.2, 1.0, 0.0, 0.0] },
    DrugRiskProfile { name: "amiodarone", bleeding: 0.10, qt: 0.90, cns: 0.05, class_vec: [0.0, 0.0, 1.0, 0.0] },
    DrugRiskProfile { name: "ciprofloxacin", bleeding: 0.05, qt: 0.70, cns: 0.05, class_vec: [0.0, 0.0, 0.7, 0.3] },
    DrugRiskProfile { name: "levofloxacin", bleeding: 0.05, qt: 0.70, cns: 0.05, class_vec: [0.0, 0.0, 0.7, 0.3] },
    DrugRiskProfile { name: "clarithromycin", bleeding: 0.05, qt: 0.75, cns: 0.05, class_vec: [0.0, 0.0, 0.8, 0.2] },
    DrugRiskProfile { name: "domperidone", bleeding: 0.05, qt: 0.70, cns: 0.10, class_vec: [0.0, 0.0, 0.6, 0.4] },
    DrugRiskProfile { name: "escitalopram", bleeding: 0.15, qt: 0.45, cns: 0.60, class_vec: [0.0, 0.0, 0.2, 1.0] },
    DrugRiskProfile { name: "fluoxetine", bleeding: 0.15, qt: 0.40, cns: 0.60, class_vec: [0.0, 0.0, 0.2, 1.0] },
    DrugRiskProfile { name: "sertraline", bleeding: 0.15, qt: 0.40, cns: 0.60, class_vec: [0.0, 0.0, 0.2, 1.0] },
    DrugRiskProfile { name: "tramadol", bleeding: 0.05, qt: 0.20, cns: 0.75, class_vec: [0.0, 0.0, 0.0, 0.9] },
    DrugRiskProfile { name: "morphine", bleeding: 0.05, qt: 0.10, cns: 0.90, class_vec: [0.0, 0.0, 0.0, 0.8] },
    DrugRiskProfile { name: "fentanyl", bleeding: 0.05, qt: 0.10, cns: 0.90, class_vec: [0.0, 0.0, 0.0, 0.8] },
    DrugRiskProfile { name: "diazepam", bleeding: 0.05, qt: 0.05, cns: 0.85, class_vec: [0.0, 0.0, 0.0, 0.7] },
    DrugRiskProfile { name: "alprazolam", bleeding: 0.05, qt: 0.05, cns: 0.80, class_vec: [0.0, 0.0, 0.0, 0.7] },
    DrugRiskProfile { name: "digoxin", bleeding: 0.05, qt: 0.60, cns: 0.10, class_vec: [0.0, 0.0, 0.9, 0.1] },
];

/// An ensemble prediction for a medication pair
#[derive(Debug, Clone)]
pub struct EnsemblePrediction {
    /// Interaction probability in [0, 1]
    pub probability: f64,
    /// The risk dimension that dominated the score
    pub dominant_risk: &'static str,
    /// True when the class vectors were similar enough to add a bonus
    pub same_class: bool,
}

impl EnsemblePrediction {
    /// Map the probability to a severity; below 0.3 there is no prediction
    pub fn severity(&self) -> Option<InteractionSeverity> {
        if self.probability > 0.8 {
            Some(InteractionSeverity::Major)
        } else if self.probability > 0.5 {
            Some(InteractionSeverity::Moderate)
        } else if self.probability > 0.3 {
            Some(InteractionSeverity::Minor)
        } else {
            None
        }
    }
}

/// Embedding-based pair scorer
#[derive(Debug, Default)]
pub struct EnsembleScorer;

impl EnsembleScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a medication pair. Returns None when either drug has no
    /// profile; callers treat that as "no opinion".
    pub fn score_pair(
        &self,
        med1: &Medication,
        med2: &Medication,
    ) -> Option<EnsemblePrediction> {
        let profile1 = profile_for(med1)?;
        let profile2 = profile_for(med2)?;

        let dims = [
            ("bleeding", profile1.bleeding * profile2.bleeding),
            ("QT prolongation", profile1.qt * profile2.qt),
            ("CNS depression", profile1.cns * profile2.cns),
        ];
        let (dominant_risk, risk) = dims
            .iter()
            .copied()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();

        let similarity = cosine_similarity(&profile1.class_vec, &profile2.class_vec);
        let same_class = similarity > 0.85;

        let mut probability = risk;
        if same_class {
            probability += 0.1 * similarity;
        }
        probability = probability.min(1.0);

        Some(EnsemblePrediction {
            probability,
            dominant_risk,
            same_class,
        })
    }
}

fn profile_for(med: &Medication) -> Option<&'static DrugRiskProfile> {
    let generic = med.generic_name.as_deref().unwrap_or("").to_lowercase();
    let commercial = med.commercial_name.to_lowercase();

    DRUG_PROFILES
        .iter()
        .find(|p| generic.contains(p.name) || commercial.contains(p.name))
}

fn cosine_similarity(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
