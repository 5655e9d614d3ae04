use chrono::Utc;
use tracing::{debug, info};

use crate::catalog::SpeciesCatalog;
use crate::config::WizardConfig;
use crate::error::{StateError, WizardError};
use crate::flow::{FlowId, FlowStage, FlowState};
use crate::record::RegistrationRecord;
use crate::reference::ReferenceMinter;
use crate::store::FlowStore;
use crate::validate::{RawFields, validate_counts, validate_species_selection};

/// Drives one flow through species selection, animal counts and confirmation.
///
/// Each step validates its submission against the catalog before touching the
/// store. A rejected submission leaves the stored flow exactly as it was.
/// Callers serialise steps for the same flow id.
#[derive(Debug)]
pub struct WizardController<S> {
    catalog: SpeciesCatalog,
    store: S,
    config: WizardConfig,
    minter: ReferenceMinter,
}

impl<S: FlowStore> WizardController<S> {
    pub fn new(catalog: SpeciesCatalog, store: S, config: WizardConfig) -> Self {
        let minter = ReferenceMinter::new(config.reference_prefix.clone());
        Self {
            catalog,
            store,
            config,
            minter,
        }
    }

    pub fn catalog(&self) -> &SpeciesCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn begin_flow(&self) -> Result<FlowId, WizardError> {
        let flow_id = FlowId::generate();
        let state = FlowState::new(flow_id.clone(), Utc::now());
        self.store.put(&flow_id, &state)?;
        info!(%flow_id, "flow started");
        Ok(flow_id)
    }

    /// Current state of a flow, for rendering.
    pub fn flow(&self, flow_id: &FlowId) -> Result<FlowState, WizardError> {
        self.load(flow_id)
    }

    pub fn select_species<K: AsRef<str>>(
        &self,
        flow_id: &FlowId,
        submitted: &[K],
    ) -> Result<(), WizardError> {
        let mut state = self.load(flow_id)?;
        let selected = validate_species_selection(&self.catalog, submitted).map_err(|error| {
            debug!(%flow_id, "species selection rejected");
            WizardError::Invalid(vec![error])
        })?;

        state
            .counts
            .retain(|key, _| selected.contains(key.species()));
        state.selected_species = selected;
        state.stage = FlowStage::AnimalCounts;
        state.updated_at = Utc::now();
        self.store.put(flow_id, &state)?;

        info!(
            %flow_id,
            species = state.selected_species.len(),
            "species selected"
        );
        Ok(())
    }

    pub fn submit_counts(&self, flow_id: &FlowId, raw: &RawFields) -> Result<(), WizardError> {
        let mut state = self.load(flow_id)?;
        if state.selected_species.is_empty() {
            return Err(StateError::NoSpeciesSelected(flow_id.clone()).into());
        }
        if state.stage == FlowStage::SpeciesSelection {
            return Err(StateError::OutOfSequence {
                flow_id: flow_id.clone(),
                expected: FlowStage::AnimalCounts,
                actual: state.stage,
            }
            .into());
        }

        let counts = validate_counts(
            &self.catalog,
            &state.selected_species,
            raw,
            &self.config.count_policy(),
        )
        .map_err(|errors| {
            debug!(%flow_id, invalid = errors.len(), "animal counts rejected");
            WizardError::Invalid(errors)
        })?;

        state.counts = counts;
        state.stage = FlowStage::Confirmation;
        state.updated_at = Utc::now();
        self.store.put(flow_id, &state)?;

        info!(%flow_id, fields = state.counts.len(), "animal counts accepted");
        Ok(())
    }

    /// Issues the registration and removes the flow from the store.
    pub fn complete_flow(&self, flow_id: &FlowId) -> Result<RegistrationRecord, WizardError> {
        let state = self.load(flow_id)?;
        if state.stage != FlowStage::Confirmation {
            return Err(StateError::OutOfSequence {
                flow_id: flow_id.clone(),
                expected: FlowStage::Confirmation,
                actual: state.stage,
            }
            .into());
        }
        if !state.has_all_counts(&self.catalog) {
            return Err(StateError::Incomplete(flow_id.clone()).into());
        }

        let now = Utc::now();
        let reference = self.minter.mint(now);
        let record = RegistrationRecord::from_flow(&self.catalog, &state, reference, now);
        self.store.delete(flow_id)?;

        info!(
            %flow_id,
            reference = %record.reference_number,
            lines = record.species_summary.len(),
            "registration completed"
        );
        Ok(record)
    }

    /// Discards partial answers and returns the flow to species selection.
    pub fn reset_flow(&self, flow_id: &FlowId) -> Result<(), WizardError> {
        let previous = self.load(flow_id)?;
        let state = FlowState {
            created_at: previous.created_at,
            ..FlowState::new(previous.flow_id, Utc::now())
        };
        self.store.put(flow_id, &state)?;
        debug!(%flow_id, "flow reset");
        Ok(())
    }

    fn load(&self, flow_id: &FlowId) -> Result<FlowState, WizardError> {
        self.store
            .get(flow_id)?
            .ok_or_else(|| StateError::FlowMissing(flow_id.clone()).into())
    }
}
