/*!
 * Services Module
 *
 * Contains business logic and service layer implementations.
 */

pub mod catalog_service;
pub mod ddi_service;
pub mod dosing_service;
pub mod ensemble_service;
pub mod validation_service;
pub mod webhook_service;

pub use catalog_service::{CatalogRecord, CatalogStatistics, DrugCatalog};
pub use ddi_service::{DdiEngine, DrugClassifier};
pub use dosing_service::{ChildPughCalculator, DosingEngine, GfrCalculator};
pub use ensemble_service::{EnsemblePrediction, EnsembleScorer};
pub use validation_service::{
    EngineStatistics, LoadSummary, MedicationDetail, MedicationSummary, ValidationEngine,
};
pub use webhook_service::{
    DeliveryHistoryFilter, DeliveryStatus, WebhookDelivery, WebhookEvent, WebhookManager,
    WebhookSubscription, WebhookSummary, WebhookUpdate,
};
