use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::controller::WizardController;
use crate::error::{StateError, ValidationError, WizardError};
use crate::flow::FlowId;
use crate::render::{ViewName, confirmation_view, counts_view, species_view, start_view};
use crate::store::{FlowStore, StoreError};
use crate::template::{RenderError, Renderer};
use crate::validate::RawFields;

/// What the caller should send back for a wizard request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Page { view: ViewName, body: String },
    Redirect { to: ViewName },
}

impl Response {
    pub fn view(&self) -> ViewName {
        match self {
            Response::Page { view, .. } => *view,
            Response::Redirect { to } => *to,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Response::Redirect { .. })
    }
}

/// Collaborator failures, plus a flow vanishing between two store calls.
///
/// Validation and sequencing problems are answered with pages and redirects.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        ServiceError::Wizard(WizardError::Store(error))
    }
}

/// Request/response surface of the wizard: pages on GET, redirects after a
/// successful POST, the same page with inline errors after a rejected one.
#[derive(Debug)]
pub struct WizardService<S, R> {
    controller: WizardController<S>,
    renderer: R,
}

impl<S: FlowStore, R: Renderer> WizardService<S, R> {
    pub fn new(controller: WizardController<S>, renderer: R) -> Self {
        Self {
            controller,
            renderer,
        }
    }

    pub fn controller(&self) -> &WizardController<S> {
        &self.controller
    }

    pub fn start(&self) -> Result<(FlowId, Response), ServiceError> {
        let flow_id = self.controller.begin_flow()?;
        let data = start_view(self.controller.config(), &flow_id);
        let response = self.page(ViewName::Start, &data)?;
        Ok((flow_id, response))
    }

    pub fn species_page(&self, flow_id: &FlowId) -> Result<Response, ServiceError> {
        let state = match self.controller.flow(flow_id) {
            Ok(state) => state,
            Err(WizardError::Store(err)) => return Err(err.into()),
            Err(_) => return Ok(Response::Redirect { to: ViewName::Start }),
        };
        self.render_species(&state.selected_species, &[])
    }

    pub fn submit_species<K: AsRef<str>>(
        &self,
        flow_id: &FlowId,
        submitted: &[K],
    ) -> Result<Response, ServiceError> {
        match self.controller.select_species(flow_id, submitted) {
            Ok(()) => Ok(Response::Redirect {
                to: ViewName::AnimalCounts,
            }),
            Err(error) => self.settle(flow_id, error, |errors| {
                self.render_species(&BTreeSet::new(), &errors)
            }),
        }
    }

    pub fn counts_page(&self, flow_id: &FlowId) -> Result<Response, ServiceError> {
        let state = match self.controller.flow(flow_id) {
            Ok(state) => state,
            Err(error) => return self.settle(flow_id, error, |_| self.redirect_to_species()),
        };
        if state.selected_species.is_empty() {
            return self.redirect_to_species();
        }
        let data = counts_view(
            self.controller.config(),
            self.controller.catalog(),
            &state,
            None,
            &[],
        );
        self.page(ViewName::AnimalCounts, &data)
    }

    pub fn submit_counts(
        &self,
        flow_id: &FlowId,
        fields: &RawFields,
    ) -> Result<Response, ServiceError> {
        match self.controller.submit_counts(flow_id, fields) {
            Ok(()) => Ok(Response::Redirect {
                to: ViewName::Confirmation,
            }),
            Err(error) => self.settle(flow_id, error, |errors| {
                let state = self.controller.flow(flow_id)?;
                let data = counts_view(
                    self.controller.config(),
                    self.controller.catalog(),
                    &state,
                    Some(fields),
                    &errors,
                );
                self.page(ViewName::AnimalCounts, &data)
            }),
        }
    }

    /// Completes the flow and renders the registration.
    pub fn confirmation(&self, flow_id: &FlowId) -> Result<Response, ServiceError> {
        match self.controller.complete_flow(flow_id) {
            Ok(record) => {
                let data = confirmation_view(self.controller.config(), &record);
                self.page(ViewName::Confirmation, &data)
            }
            Err(error) => self.settle(flow_id, error, |_| self.redirect_to_species()),
        }
    }

    fn settle(
        &self,
        flow_id: &FlowId,
        error: WizardError,
        on_invalid: impl FnOnce(Vec<ValidationError>) -> Result<Response, ServiceError>,
    ) -> Result<Response, ServiceError> {
        match error {
            WizardError::Invalid(errors) => on_invalid(errors),
            WizardError::State(state) => self.restart(flow_id, &state),
            WizardError::Store(err) => Err(err.into()),
        }
    }

    /// Sends the user back to the first step, discarding partial answers.
    fn restart(&self, flow_id: &FlowId, cause: &StateError) -> Result<Response, ServiceError> {
        debug!(%flow_id, %cause, "restarting flow at species selection");
        if !matches!(cause, StateError::FlowMissing(_)) {
            self.controller.reset_flow(flow_id)?;
        }
        self.redirect_to_species()
    }

    fn redirect_to_species(&self) -> Result<Response, ServiceError> {
        Ok(Response::Redirect {
            to: ViewName::SpeciesSelection,
        })
    }

    fn render_species(
        &self,
        checked: &BTreeSet<String>,
        errors: &[ValidationError],
    ) -> Result<Response, ServiceError> {
        let data = species_view(
            self.controller.config(),
            self.controller.catalog(),
            checked,
            errors,
        );
        self.page(ViewName::SpeciesSelection, &data)
    }

    fn page(&self, view: ViewName, data: &serde_json::Value) -> Result<Response, ServiceError> {
        let body = self.renderer.render(view, data)?;
        Ok(Response::Page { view, body })
    }
}
