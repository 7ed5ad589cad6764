/*!
 * Drug Catalog Service
 *
 * Loads and indexes the medication registry. Maintains three indices
 * (normalized commercial name, generic name, active ingredient), flags
 * high-alert drugs, and answers multi-key searches.
 *
 * The catalog is read-mostly: `load_*` happens at startup or under an
 * administrative path; validation requests only read.
 */

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{normalize_search_name, DosageForm, Medication};

/// Common brand-to-generic mappings for the regional market.
/// Combination products use "a/b" generics and are split when indexing.
const BRAND_TO_GENERIC: &[(&str, &str)] = &[
    ("panadol", "paracetamol"),
    ("cataflam", "diclofenac"),
    ("augmentin", "amoxicillin/clavulanate"),
    ("flagyl", "metronidazole"),
    ("voltaren", "diclofenac"),
    ("aspocid", "aspirin"),
    ("brufen", "ibuprofen"),
    ("amoxil", "amoxicillin"),
    ("zithromax", "azithromycin"),
    ("glucophage", "metformin"),
    ("lasix", "furosemide"),
    ("lipitor", "atorvastatin"),
    ("nexium", "esomeprazole"),
    ("januvia", "sitagliptin"),
    ("janumet", "sitagliptin/metformin"),
    ("concor", "bisoprolol"),
    ("plavix", "clopidogrel"),
    ("coversyl", "perindopril"),
    ("adalat", "nifedipine"),
    ("lanoxin", "digoxin"),
    ("synthroid", "levothyroxine"),
    ("eltroxin", "levothyroxine"),
    ("ventolin", "salbutamol"),
    ("seretide", "fluticasone/salmeterol"),
    ("symbicort", "budesonide/formoterol"),
    ("klacid", "clarithromycin"),
    ("ciprobay", "ciprofloxacin"),
    ("tavanic", "levofloxacin"),
    ("zocor", "simvastatin"),
    ("crestor", "rosuvastatin"),
    ("cordarone", "amiodarone"),
    ("zestril", "lisinopril"),
    ("tritace", "ramipril"),
    ("aldactone", "spironolactone"),
    ("cipralex", "escitalopram"),
    ("prozac", "fluoxetine"),
    ("xanax", "alprazolam"),
    ("tegretol", "carbamazepine"),
    ("neurontin", "gabapentin"),
    ("amaryl", "glimepiride"),
    ("daonil", "glyburide"),
    ("diflucan", "fluconazole"),
    ("sporanox", "itraconazole"),
    ("motilium", "domperidone"),
];

/// High-alert medications requiring special attention (closed set)
const HIGH_ALERT_DRUGS: &[&str] = &[
    "warfarin",
    "heparin",
    "insulin",
    "digoxin",
    "methotrexate",
    "chemotherapy",
    "opioid",
    "morphine",
    "fentanyl",
    "potassium",
    "magnesium sulfate",
    "epinephrine",
    "norepinephrine",
    "dopamine",
    "amiodarone",
    "lidocaine",
    "propofol",
    "ketamine",
    "rocuronium",
];

/// One raw medication row from the processed catalog JSON
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogRecord {
    pub id: Option<i64>,
    pub commercial_name: Option<String>,
    pub generic_name: Option<String>,
    pub arabic_name: Option<String>,
    pub active_ingredients: Option<Vec<String>>,
    pub strength: Option<String>,
    pub strength_value: Option<f64>,
    pub strength_unit: Option<String>,
    pub dosage_form: Option<String>,
    pub package_size: Option<String>,
    pub manufacturer: Option<String>,
    pub atc_code: Option<String>,
    pub eda_registration: Option<String>,
    pub rxnorm_id: Option<String>,
    pub drugbank_id: Option<String>,
    #[serde(default)]
    pub is_otc: bool,
    #[serde(default)]
    pub is_controlled: bool,
}

/// Top-level shape of the processed catalog JSON
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    medications: Vec<serde_json::Value>,
}

/// Catalog statistics
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStatistics {
    pub total_medications: usize,
    pub unique_generics: usize,
    pub unique_ingredients: usize,
    pub high_alert_count: usize,
    pub dosage_form_distribution: BTreeMap<String, usize>,
    pub with_generic_mapping: usize,
}

/// In-memory medication catalog with multi-key lookup
///
/// BTreeMap keys keep iteration deterministic, so search results rank
/// identically across runs.
#[derive(Debug, Default)]
pub struct DrugCatalog {
    medications: BTreeMap<i64, Medication>,
    name_index: BTreeMap<String, Vec<i64>>,
    generic_index: BTreeMap<String, Vec<i64>>,
    ingredient_index: BTreeMap<String, Vec<i64>>,
    loaded: bool,
}

impl DrugCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any load has completed
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.medications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medications.is_empty()
    }

    /// Load medications from a processed catalog JSON file.
    ///
    /// Idempotent: re-loading the same file yields identical contents; a
    /// duplicate id replaces the earlier row.
    pub fn load_from_json_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        tracing::info!("Loading medications from JSON: {}", path.display());

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;

        let records = file
            .medications
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<CatalogRecord>(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping malformed catalog row: {}", e);
                    None
                }
            })
            .collect();

        let count = self.load_records(records);
        tracing::info!("Loaded {} medications from JSON", count);
        Ok(count)
    }

    /// Load a batch of raw records. Rows missing an id or a commercial name
    /// are warned and skipped; loading continues.
    pub fn load_records(&mut self, records: Vec<CatalogRecord>) -> usize {
        let mut count = 0;

        for record in records {
            match self.medication_from_record(record) {
                Ok(med) => {
                    self.insert(med);
                    count += 1;
                }
                Err(reason) => {
                    tracing::warn!("Failed to parse medication: {}", reason);
                }
            }
        }

        self.loaded = true;
        count
    }

    fn medication_from_record(&self, record: CatalogRecord) -> Result<Medication, String> {
        let id = record.id.ok_or("missing id")?;
        let commercial_name = record
            .commercial_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| format!("row {}: empty commercial name", id))?;

        let mut med = Medication::from_commercial_name(id, &commercial_name);

        // Record-provided fields win over parsed ones when present.
        if record.strength.is_some() {
            med.strength = record.strength;
        }
        if record.strength_value.is_some() {
            med.strength_value = record.strength_value;
        }
        if record.strength_unit.is_some() {
            med.strength_unit = record.strength_unit;
        }
        if let Some(token) = record.dosage_form.as_deref() {
            // Loader is lenient: unknown tokens degrade to Other.
            med.dosage_form = DosageForm::parse(token).unwrap_or_else(|_| {
                tracing::warn!("row {}: unknown dosage form '{}', using other", id, token);
                DosageForm::Other
            });
        }
        if record.package_size.is_some() {
            med.package_size = record.package_size;
        }
        med.generic_name = record.generic_name.map(|g| g.to_lowercase());
        med.arabic_name = record.arabic_name;
        med.active_ingredients = record
            .active_ingredients
            .unwrap_or_default()
            .into_iter()
            .map(|i| i.to_lowercase())
            .collect();
        med.manufacturer = record.manufacturer;
        med.atc_code = record.atc_code;
        med.eda_registration = record.eda_registration;
        med.rxnorm_id = record.rxnorm_id;
        med.drugbank_id = record.drugbank_id;
        med.is_otc = record.is_otc;
        med.is_controlled = record.is_controlled;

        if med.strength_value.is_some_and(|v| v < 0.0) {
            return Err(format!("row {}: negative strength value", id));
        }

        Ok(med)
    }

    /// Insert a medication, replacing (and de-indexing) any earlier row
    /// with the same id, then index it.
    fn insert(&mut self, mut med: Medication) {
        if self.medications.contains_key(&med.id) {
            self.remove_from_indices(med.id);
        }

        // Index by normalized commercial name
        let name_key = normalize_search_name(&med.commercial_name);
        self.name_index.entry(name_key).or_default().push(med.id);

        // Derive a generic name from the brand table or a parenthesized
        // token; a derivation hit overrides any record-provided generic.
        if let Some(generic) = extract_generic_name(&med.commercial_name) {
            med.generic_name = Some(generic);
        }
        if let Some(generic) = med.generic_name.clone() {
            self.generic_index
                .entry(generic.to_lowercase())
                .or_default()
                .push(med.id);
        }

        // Merge brand-derived ingredients with record-provided ones
        for ingredient in extract_ingredients(&med.commercial_name) {
            if !med.active_ingredients.contains(&ingredient) {
                med.active_ingredients.push(ingredient);
            }
        }
        for ingredient in &med.active_ingredients {
            self.ingredient_index
                .entry(ingredient.to_lowercase())
                .or_default()
                .push(med.id);
        }

        self.medications.insert(med.id, med);
    }

    fn remove_from_indices(&mut self, id: i64) {
        for index in [
            &mut self.name_index,
            &mut self.generic_index,
            &mut self.ingredient_index,
        ] {
            for ids in index.values_mut() {
                ids.retain(|&existing| existing != id);
            }
            index.retain(|_, ids| !ids.is_empty());
        }
    }

    /// Get a medication by id
    pub fn get(&self, id: i64) -> Option<&Medication> {
        self.medications.get(&id)
    }

    /// Get multiple medications, preserving order and dropping unknown ids
    pub fn get_many(&self, ids: &[i64]) -> Vec<&Medication> {
        ids.iter().filter_map(|id| self.medications.get(id)).collect()
    }

    /// Search by commercial name, generic name, or ingredient substring.
    ///
    /// Ranking priority: commercial-name match, then generic match, then
    /// ingredient match; results deduplicated by id and capped at `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Medication> {
        let query_lower = query.to_lowercase().trim().to_string();
        let mut results: Vec<&Medication> = Vec::new();
        let mut seen: std::collections::HashSet<i64> = std::collections::HashSet::new();

        if query_lower.is_empty() {
            return results;
        }

        for med in self.medications.values() {
            if med.commercial_name.to_lowercase().contains(&query_lower)
                && seen.insert(med.id)
            {
                results.push(med);
            }
        }

        for (generic, ids) in &self.generic_index {
            if generic.contains(&query_lower) {
                for id in ids {
                    if seen.insert(*id) {
                        results.push(&self.medications[id]);
                    }
                }
            }
        }

        for (ingredient, ids) in &self.ingredient_index {
            if ingredient.contains(&query_lower) {
                for id in ids {
                    if seen.insert(*id) {
                        results.push(&self.medications[id]);
                    }
                }
            }
        }

        results.truncate(limit);
        results
    }

    /// Check whether a medication belongs to the high-alert set
    pub fn is_high_alert(&self, id: i64) -> bool {
        let Some(med) = self.medications.get(&id) else {
            return false;
        };

        let name_lower = med.commercial_name.to_lowercase();
        if HIGH_ALERT_DRUGS.iter().any(|drug| name_lower.contains(drug)) {
            return true;
        }

        if let Some(generic) = &med.generic_name {
            let generic_lower = generic.to_lowercase();
            if HIGH_ALERT_DRUGS
                .iter()
                .any(|drug| generic_lower.contains(drug))
            {
                return true;
            }
        }

        false
    }

    /// Find medications sharing the same generic name (other brands)
    pub fn similar(&self, id: i64) -> Vec<&Medication> {
        let Some(generic) = self
            .medications
            .get(&id)
            .and_then(|m| m.generic_name.as_ref())
        else {
            return Vec::new();
        };

        self.generic_index
            .get(&generic.to_lowercase())
            .map(|ids| {
                ids.iter()
                    .filter(|&&other| other != id)
                    .filter_map(|other| self.medications.get(other))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Catalog statistics for the operations surface
    pub fn statistics(&self) -> CatalogStatistics {
        let mut form_counts: BTreeMap<String, usize> = BTreeMap::new();
        for med in self.medications.values() {
            *form_counts
                .entry(med.dosage_form.as_str().to_string())
                .or_default() += 1;
        }

        CatalogStatistics {
            total_medications: self.medications.len(),
            unique_generics: self.generic_index.len(),
            unique_ingredients: self.ingredient_index.len(),
            high_alert_count: self
                .medications
                .keys()
                .filter(|&&id| self.is_high_alert(id))
                .count(),
            dosage_form_distribution: form_counts,
            with_generic_mapping: self
                .medications
                .values()
                .filter(|m| m.generic_name.is_some())
                .count(),
        }
    }
}

/// Derive a generic name from a commercial name: first the brand table,
/// then a parenthesized non-numeric token ("Advil (Ibuprofen)").
fn extract_generic_name(commercial_name: &str) -> Option<String> {
    let name_lower = commercial_name.to_lowercase();

    for (brand, generic) in BRAND_TO_GENERIC {
        if name_lower.contains(brand) {
            return Some((*generic).to_string());
        }
    }

    if let (Some(open), Some(close)) = (commercial_name.find('('), commercial_name.find(')')) {
        if open < close {
            let token = commercial_name[open + 1..close].trim();
            if !token.is_empty() && !token.chars().all(|c| c.is_ascii_digit()) {
                return Some(token.to_lowercase());
            }
        }
    }

    None
}

/// Derive active ingredients from the brand table, splitting combination
/// generics of the form "a/b" into both components.
fn extract_ingredients(commercial_name: &str) -> Vec<String> {
    let name_lower = commercial_name.to_lowercase();
    let mut ingredients = Vec::new();

    for (brand, generic) in BRAND_TO_GENERIC {
        if name_lower.contains(brand) {
            if generic.contains('/') {
                ingredients.extend(generic.split('/').map(|part| part.to_string()));
            } else {
                ingredients.push((*generic).to_string());
            }
        }
    }

    ingredients
}
