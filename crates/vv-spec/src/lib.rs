#![allow(missing_docs)]

pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod record;
pub mod reference;
pub mod render;
pub mod service;
pub mod store;
pub mod template;
pub mod validate;

pub use catalog::{
    CatalogDocument, CatalogError, Species, SpeciesCatalog, Subcategory, catalog_schema,
};
pub use config::WizardConfig;
pub use controller::WizardController;
pub use error::{StateError, ValidationError, WizardError};
pub use flow::{CountKey, FlowId, FlowIdError, FlowStage, FlowState};
pub use record::{RegistrationRecord, RegistrationStatus, SummaryLine};
pub use reference::ReferenceMinter;
pub use render::{
    ViewName, confirmation_view, counts_view, error_summary, species_view, start_view,
};
pub use service::{Response, ServiceError, WizardService};
pub use store::{FileStore, FlowStore, MemoryStore, StoreError};
pub use template::{HandlebarsRenderer, JsonRenderer, RenderError, Renderer};
pub use validate::{CountPolicy, RawFields, validate_counts, validate_species_selection};
