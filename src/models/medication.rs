/*!
 * Medication Model
 *
 * Represents a medication from the national drug registry and the
 * commercial-name normalizer that turns vendor-supplied strings
 * ("Brufen 400mg 30/Tab") into structured strength, dosage form and
 * package-size fields.
 */

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::AppError;

/// Dosage form enum (closed set)
///
/// Wire representation is the short lowercase token. Strict parsing rejects
/// unknown tokens; the catalog loader degrades unknown tokens to `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DosageForm {
    Tablet,
    Capsule,
    Syrup,
    Injection,
    Ampoule,
    Cream,
    Gel,
    Ointment,
    Drop,
    Suspension,
    Solution,
    Suppository,
    Inhaler,
    Patch,
    Powder,
    #[default]
    Other,
}

impl DosageForm {
    /// Wire token for this dosage form
    pub fn as_str(&self) -> &'static str {
        match self {
            DosageForm::Tablet => "tablet",
            DosageForm::Capsule => "capsule",
            DosageForm::Syrup => "syrup",
            DosageForm::Injection => "injection",
            DosageForm::Ampoule => "ampoule",
            DosageForm::Cream => "cream",
            DosageForm::Gel => "gel",
            DosageForm::Ointment => "ointment",
            DosageForm::Drop => "drop",
            DosageForm::Suspension => "suspension",
            DosageForm::Solution => "solution",
            DosageForm::Suppository => "suppository",
            DosageForm::Inhaler => "inhaler",
            DosageForm::Patch => "patch",
            DosageForm::Powder => "powder",
            DosageForm::Other => "other",
        }
    }

    /// Strict parse from a wire token
    pub fn parse(token: &str) -> Result<Self, AppError> {
        match token {
            "tablet" => Ok(DosageForm::Tablet),
            "capsule" => Ok(DosageForm::Capsule),
            "syrup" => Ok(DosageForm::Syrup),
            "injection" => Ok(DosageForm::Injection),
            "ampoule" => Ok(DosageForm::Ampoule),
            "cream" => Ok(DosageForm::Cream),
            "gel" => Ok(DosageForm::Gel),
            "ointment" => Ok(DosageForm::Ointment),
            "drop" => Ok(DosageForm::Drop),
            "suspension" => Ok(DosageForm::Suspension),
            "solution" => Ok(DosageForm::Solution),
            "suppository" => Ok(DosageForm::Suppository),
            "inhaler" => Ok(DosageForm::Inhaler),
            "patch" => Ok(DosageForm::Patch),
            "powder" => Ok(DosageForm::Powder),
            "other" => Ok(DosageForm::Other),
            _ => Err(AppError::InvalidArgument(format!(
                "Unknown dosage form: {}",
                token
            ))),
        }
    }
}

/// A medication from the drug registry
///
/// Created at catalog load, mutated only by the catalog during indexing,
/// never mutated during a validation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: i64,
    pub commercial_name: String,
    pub generic_name: Option<String>,
    pub arabic_name: Option<String>,
    /// Active ingredients, normalized to lowercase
    pub active_ingredients: Vec<String>,
    /// Free-text strength as matched in the commercial name (e.g. "400mg")
    pub strength: Option<String>,
    pub strength_value: Option<f64>,
    pub strength_unit: Option<String>,
    pub dosage_form: DosageForm,
    pub package_size: Option<String>,
    pub manufacturer: Option<String>,
    pub atc_code: Option<String>,
    pub eda_registration: Option<String>,
    pub rxnorm_id: Option<String>,
    pub drugbank_id: Option<String>,
    pub is_otc: bool,
    pub is_controlled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structured fields extracted from a commercial name
#[derive(Debug, Default, Clone)]
pub struct ParsedCommercialName {
    pub strength: Option<String>,
    pub strength_value: Option<f64>,
    pub strength_unit: Option<String>,
    pub package_size: Option<String>,
    pub dosage_form: DosageForm,
}

// Strength like "500mg", "12.5 mg", "2.5ml"; first match wins.
static STRENGTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(mg|g|ml|mcg|µg|iu|%)").unwrap());

// Package sizes like "30/Tab", "100ml Syrup", "20gm Cream"; first pattern wins.
static PACKAGE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(\d+)\s*/\s*(Tab|Cap|Amp|Sach)").unwrap(),
        Regex::new(r"(?i)(\d+)\s*ml\s*(Syrup|Susp|Drop|Solution)?").unwrap(),
        Regex::new(r"(?i)(\d+)\s*gm?\s*(Cream|Gel|Oint)").unwrap(),
    ]
});

// Ordered dosage-form patterns; ampoule is checked before injection so that
// "Amp" rows do not fall through to the broader Inj/Vial pattern.
static FORM_PATTERNS: Lazy<Vec<(Regex, DosageForm)>> = Lazy::new(|| {
    [
        (r"(?i)\bTab\b|\bTablet\b|F\.C\.Tab", DosageForm::Tablet),
        (r"(?i)\bCap\b|\bCapsule\b", DosageForm::Capsule),
        (r"(?i)\bSyrup\b|\bSyr\b", DosageForm::Syrup),
        (r"(?i)\bAmp\b|\bAmpoule\b", DosageForm::Ampoule),
        (r"(?i)\bInj\b|\bInjection\b|\bVial\b", DosageForm::Injection),
        (r"(?i)\bCream\b|\bCrm\b", DosageForm::Cream),
        (r"(?i)\bGel\b|\bEmulgel\b", DosageForm::Gel),
        (r"(?i)\bOint\b|\bOintment\b", DosageForm::Ointment),
        (r"(?i)\bDrop\b", DosageForm::Drop),
        (r"(?i)\bSusp\b|\bSuspension\b", DosageForm::Suspension),
        (r"(?i)\bSolution\b|\bSol\b", DosageForm::Solution),
        (r"(?i)\bSupp\b|\bSuppository\b", DosageForm::Suppository),
        (
            r"(?i)\bInhaler\b|\bMDI\b|\bDiskus\b|\bTurbuhaler\b",
            DosageForm::Inhaler,
        ),
        (r"(?i)\bPatch\b", DosageForm::Patch),
        (r"(?i)\bPowder\b|\bSach\b", DosageForm::Powder),
    ]
    .into_iter()
    .map(|(pattern, form)| (Regex::new(pattern).unwrap(), form))
    .collect()
});

static PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static FORM_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(mg|gm|ml|tab|cap|syrup|amp|cream|gel|oint)\b").unwrap());
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Extract structured data from a vendor-supplied commercial name
pub fn parse_commercial_name(name: &str) -> ParsedCommercialName {
    let mut parsed = ParsedCommercialName::default();

    if let Some(caps) = STRENGTH_RE.captures(name) {
        parsed.strength = Some(caps.get(0).unwrap().as_str().to_string());
        parsed.strength_value = caps.get(1).unwrap().as_str().parse::<f64>().ok();
        parsed.strength_unit = Some(caps.get(2).unwrap().as_str().to_lowercase());
    }

    for pattern in PACKAGE_RES.iter() {
        if let Some(m) = pattern.find(name) {
            parsed.package_size = Some(m.as_str().to_string());
            break;
        }
    }

    for (pattern, form) in FORM_PATTERNS.iter() {
        if pattern.is_match(name) {
            parsed.dosage_form = *form;
            break;
        }
    }

    parsed
}

/// Normalize a medication name into a search key: lowercase, strip
/// punctuation, drop form suffix words and digit runs, collapse whitespace.
///
/// Used by the catalog for index keys; never stored on the entity.
pub fn normalize_search_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = PUNCTUATION_RE.replace_all(&lowered, "");
    let without_suffixes = FORM_SUFFIX_RE.replace_all(&stripped, "");
    let without_digits = DIGITS_RE.replace_all(&without_suffixes, "");
    without_digits
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl Medication {
    /// Build a medication from a raw registry row, parsing the commercial
    /// name into strength, unit, dosage form and package size. Generic name
    /// and ingredients start empty; the catalog fills them during indexing.
    pub fn from_commercial_name(id: i64, commercial_name: &str) -> Self {
        let parsed = parse_commercial_name(commercial_name);
        let now = Utc::now();

        Self {
            id,
            commercial_name: commercial_name.to_string(),
            generic_name: None,
            arabic_name: None,
            active_ingredients: Vec::new(),
            strength: parsed.strength,
            strength_value: parsed.strength_value,
            strength_unit: parsed.strength_unit,
            dosage_form: parsed.dosage_form,
            package_size: parsed.package_size,
            manufacturer: None,
            atc_code: None,
            eda_registration: None,
            rxnorm_id: None,
            drugbank_id: None,
            is_otc: false,
            is_controlled: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strength() {
        let parsed = parse_commercial_name("Brufen 400mg 30/Tab");
        assert_eq!(parsed.strength.as_deref(), Some("400mg"));
        assert_eq!(parsed.strength_value, Some(400.0));
        assert_eq!(parsed.strength_unit.as_deref(), Some("mg"));
    }

    #[test]
    fn test_parse_decimal_strength() {
        let parsed = parse_commercial_name("Digoxin 0.25mg 30/Tab");
        assert_eq!(parsed.strength_value, Some(0.25));
        assert_eq!(parsed.strength_unit.as_deref(), Some("mg"));
    }

    #[test]
    fn test_parse_mcg_strength() {
        let parsed = parse_commercial_name("Eltroxin 50mcg 50/Tab");
        assert_eq!(parsed.strength_value, Some(50.0));
        assert_eq!(parsed.strength_unit.as_deref(), Some("mcg"));
    }

    #[test]
    fn test_parse_package_size() {
        let parsed = parse_commercial_name("Brufen 400mg 30/Tab");
        assert_eq!(parsed.package_size.as_deref(), Some("30/Tab"));

        let parsed = parse_commercial_name("Ventolin Syrup 100ml");
        assert_eq!(parsed.package_size.as_deref(), Some("100ml"));
    }

    #[test]
    fn test_parse_dosage_form() {
        assert_eq!(
            parse_commercial_name("Brufen 400mg 30/Tab").dosage_form,
            DosageForm::Tablet
        );
        assert_eq!(
            parse_commercial_name("Amoxil 500mg 20/Cap").dosage_form,
            DosageForm::Capsule
        );
        assert_eq!(
            parse_commercial_name("Voltaren 75mg/3ml 5/Amp").dosage_form,
            DosageForm::Ampoule
        );
        assert_eq!(
            parse_commercial_name("Ventolin Inhaler MDI").dosage_form,
            DosageForm::Inhaler
        );
        assert_eq!(
            parse_commercial_name("Unmatched Product").dosage_form,
            DosageForm::Other
        );
    }

    #[test]
    fn test_normalize_search_name() {
        // Suffix words are stripped before digit runs, so units glued to a
        // number ("400mg") survive as bare "mg" after the digits go.
        assert_eq!(normalize_search_name("Brufen 400mg 30/Tab"), "brufen mg tab");
        assert_eq!(normalize_search_name("Panadol Tab"), "panadol");
        // Punctuation removed, standalone suffix word dropped, whitespace collapsed
        assert_eq!(normalize_search_name("Concor  Cor 2.5 mg"), "concor cor");
    }

    #[test]
    fn test_dosage_form_tokens_round_trip() {
        for form in [
            DosageForm::Tablet,
            DosageForm::Ampoule,
            DosageForm::Suppository,
            DosageForm::Other,
        ] {
            assert_eq!(DosageForm::parse(form.as_str()).unwrap(), form);
        }
    }

    #[test]
    fn test_dosage_form_rejects_unknown_token() {
        assert!(DosageForm::parse("lozenge").is_err());
    }

    #[test]
    fn test_from_commercial_name() {
        let med = Medication::from_commercial_name(1, "Brufen 400mg 30/Tab");
        assert_eq!(med.id, 1);
        assert_eq!(med.dosage_form, DosageForm::Tablet);
        assert_eq!(med.strength_value, Some(400.0));
        assert!(med.generic_name.is_none());
        assert!(med.active_ingredients.is_empty());
    }
}
