/*!
 * Data Models Module
 *
 * Contains the core domain models and their associated operations.
 */

pub mod medication;
pub mod patient;
pub mod prescription;
pub mod validation;

pub use medication::{
    normalize_search_name, parse_commercial_name, DosageForm, Medication, ParsedCommercialName,
};
pub use patient::{HepaticImpairment, PatientContext, RenalImpairment};
pub use prescription::{Prescription, PrescriptionItem};
pub use validation::{
    DosingAdjustment, DrugInteraction, InteractionCounts, InteractionSeverity, ValidationResult,
    ValidationStatus,
};
