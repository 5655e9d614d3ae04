use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use vv_spec::{
    CatalogError, FlowId, FlowIdError, FlowStore, MemoryStore, RawFields, SpeciesCatalog,
    ValidationError, WizardConfig, WizardController, WizardError,
};

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("failed to parse request: {0}")]
    RequestParse(#[source] serde_json::Error),
    #[error(transparent)]
    FlowId(#[from] FlowIdError),
    #[error("species '{0}' is not in the catalog")]
    SpeciesNotFound(String),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Wizard(#[from] WizardError),
}

impl ComponentError {
    /// Machine-readable category carried in error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            ComponentError::Wizard(WizardError::Invalid(_)) => "validation",
            ComponentError::Wizard(WizardError::State(_)) => "state",
            ComponentError::SpeciesNotFound(_) => "not_found",
            ComponentError::RequestParse(_) | ComponentError::FlowId(_) => "bad_request",
            ComponentError::ConfigParse(_)
            | ComponentError::Catalog(_)
            | ComponentError::JsonEncode(_)
            | ComponentError::Wizard(WizardError::Store(_)) => "internal",
        }
    }
}

/// Component configuration: an optional catalog document plus wizard switches.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ComponentConfig {
    #[serde(default)]
    pub catalog_json: Option<String>,
    #[serde(flatten)]
    pub wizard: WizardConfig,
}

impl ComponentConfig {
    pub fn parse(config_json: &str) -> Result<Self, ComponentError> {
        if config_json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)
    }

    fn catalog(&self) -> Result<SpeciesCatalog, ComponentError> {
        match self.catalog_json.as_deref() {
            Some(raw) => Ok(SpeciesCatalog::from_json(raw)?),
            None => Ok(SpeciesCatalog::default()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpeciesKeys {
    Many(Vec<String>),
    One(String),
}

impl SpeciesKeys {
    fn into_vec(self) -> Vec<String> {
        match self {
            SpeciesKeys::Many(keys) => keys,
            SpeciesKeys::One(key) => vec![key],
        }
    }
}

/// JSON-in, JSON-out façade over the wizard controller.
///
/// Every call answers with `{"success": true, "data": ...}` or
/// `{"success": false, "error": ..., "code": ...}`. Rejected submissions add
/// the per-field `errors` and, for counts, the submitted `values`.
#[derive(Debug)]
pub struct Component<S = MemoryStore> {
    controller: WizardController<S>,
}

impl Component<MemoryStore> {
    pub fn in_memory(config_json: &str) -> Result<Self, ComponentError> {
        Self::new(config_json, MemoryStore::new())
    }
}

impl<S: FlowStore> Component<S> {
    pub fn new(config_json: &str, store: S) -> Result<Self, ComponentError> {
        let config = ComponentConfig::parse(config_json)?;
        let catalog = config.catalog()?;
        Ok(Self::from_controller(WizardController::new(
            catalog,
            store,
            config.wizard,
        )))
    }

    pub fn from_controller(controller: WizardController<S>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &WizardController<S> {
        &self.controller
    }

    pub fn health(&self) -> String {
        respond(Ok(json!({
            "status": "ok",
            "service": self.controller.config().service_name,
            "species": self.controller.catalog().species().len(),
        })))
    }

    pub fn list_species(&self) -> String {
        respond(
            serde_json::to_value(self.controller.catalog().species())
                .map_err(ComponentError::JsonEncode),
        )
    }

    pub fn get_species(&self, key: &str) -> String {
        respond(
            self.controller
                .catalog()
                .get(key)
                .ok_or_else(|| ComponentError::SpeciesNotFound(key.to_string()))
                .and_then(|species| {
                    serde_json::to_value(species).map_err(ComponentError::JsonEncode)
                }),
        )
    }

    pub fn begin(&self) -> String {
        respond(
            self.controller
                .begin_flow()
                .map_err(ComponentError::from)
                .and_then(|flow_id| self.flow_value(&flow_id)),
        )
    }

    /// `keys_json` is an array of species keys or a single key string.
    pub fn select_species(&self, flow: &str, keys_json: &str) -> String {
        respond(self.try_select_species(flow, keys_json))
    }

    /// `fields_json` maps field names to strings or numbers; `null` entries are
    /// treated as not submitted.
    pub fn submit_counts(&self, flow: &str, fields_json: &str) -> String {
        let fields = match parse_fields(fields_json) {
            Ok(fields) => fields,
            Err(err) => return respond(Err(err)),
        };
        let result = flow
            .parse::<FlowId>()
            .map_err(ComponentError::from)
            .and_then(|flow_id| {
                self.controller.submit_counts(&flow_id, &fields)?;
                self.flow_value(&flow_id)
            });
        match result {
            Err(ComponentError::Wizard(WizardError::Invalid(errors))) => {
                rejected(&errors, Some(&fields))
            }
            other => respond(other),
        }
    }

    pub fn complete(&self, flow: &str) -> String {
        respond(self.try_complete(flow))
    }

    pub fn describe_flow(&self, flow: &str) -> String {
        respond(
            flow.parse::<FlowId>()
                .map_err(ComponentError::from)
                .and_then(|flow_id| self.flow_value(&flow_id)),
        )
    }

    fn try_select_species(&self, flow: &str, keys_json: &str) -> Result<Value, ComponentError> {
        let flow_id: FlowId = flow.parse()?;
        let keys: SpeciesKeys =
            serde_json::from_str(keys_json).map_err(ComponentError::RequestParse)?;
        self.controller.select_species(&flow_id, &keys.into_vec())?;
        self.flow_value(&flow_id)
    }

    fn try_complete(&self, flow: &str) -> Result<Value, ComponentError> {
        let flow_id: FlowId = flow.parse()?;
        let record = self.controller.complete_flow(&flow_id)?;
        let mut value = serde_json::to_value(&record).map_err(ComponentError::JsonEncode)?;
        value["total_animals"] = json!(record.total_animals());
        Ok(value)
    }

    fn flow_value(&self, flow_id: &FlowId) -> Result<Value, ComponentError> {
        let state = self.controller.flow(flow_id)?;
        let complete = state.has_all_counts(self.controller.catalog());
        let counts: BTreeMap<String, u64> = state
            .counts
            .iter()
            .map(|(key, count)| (key.field_name(), *count))
            .collect();
        Ok(json!({
            "flow_id": state.flow_id,
            "stage": state.stage,
            "selected_species": state.selected_species,
            "counts": counts,
            "complete": complete,
            "updated_at": state.updated_at,
        }))
    }
}

fn parse_fields(fields_json: &str) -> Result<RawFields, ComponentError> {
    let submitted: BTreeMap<String, Value> =
        serde_json::from_str(fields_json).map_err(ComponentError::RequestParse)?;
    Ok(submitted
        .into_iter()
        .filter_map(|(field, value)| {
            let raw = match value {
                Value::Null => return None,
                Value::String(raw) => raw,
                other => other.to_string(),
            };
            Some((field, raw))
        })
        .collect())
}

fn rejected(errors: &[ValidationError], values: Option<&RawFields>) -> String {
    debug!(invalid = errors.len(), "request rejected by validation");
    let mut envelope = json!({
        "success": false,
        "error": "validation failed",
        "code": "validation",
        "errors": errors,
    });
    if let Some(values) = values {
        envelope["values"] = json!(values);
    }
    envelope.to_string()
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(data) => json!({ "success": true, "data": data }).to_string(),
        Err(ComponentError::Wizard(WizardError::Invalid(errors))) => rejected(&errors, None),
        Err(err) => json!({
            "success": false,
            "error": err.to_string(),
            "code": err.code(),
        })
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(payload: &str) -> Value {
        serde_json::from_str(payload).expect("valid json")
    }

    fn started(component: &Component) -> String {
        let begun = parse(&component.begin());
        begun["data"]["flow_id"]
            .as_str()
            .expect("flow id")
            .to_string()
    }

    #[test]
    fn health_reports_catalog_size() {
        let component = Component::in_memory("").expect("component");
        let health = parse(&component.health());
        assert_eq!(health["success"], true);
        assert_eq!(health["data"]["status"], "ok");
        assert_eq!(health["data"]["species"], 5);
    }

    #[test]
    fn get_species_returns_not_found_envelope() {
        let component = Component::in_memory("").expect("component");
        let found = parse(&component.get_species("pigs"));
        assert_eq!(found["data"]["subcategories"][0]["key"], "sows");

        let missing = parse(&component.get_species("llamas"));
        assert_eq!(missing["success"], false);
        assert_eq!(missing["code"], "not_found");
    }

    #[test]
    fn config_selects_catalog_and_rules() {
        let catalog = json!({
            "species": [
                {
                    "key": "goats",
                    "name": "Goats",
                    "subcategories": [{ "key": "nannies", "name": "Nannies" }]
                }
            ]
        });
        let config = json!({
            "catalog_json": catalog.to_string(),
            "reject_zero_counts": true,
            "reference_prefix": "GT"
        });
        let component = Component::in_memory(&config.to_string()).expect("component");
        let listed = parse(&component.list_species());
        assert_eq!(listed["data"][0]["key"], "goats");

        let flow = started(&component);
        component.select_species(&flow, r#""goats""#);
        let rejected = parse(&component.submit_counts(&flow, r#"{"goats_nannies": 0}"#));
        assert_eq!(rejected["errors"][0]["code"], "zero");

        component.submit_counts(&flow, r#"{"goats_nannies": 4}"#);
        let record = parse(&component.complete(&flow));
        assert!(
            record["data"]["reference_number"]
                .as_str()
                .expect("reference")
                .starts_with("GT-")
        );
    }

    #[test]
    fn bad_config_is_reported() {
        let err = Component::in_memory("{not json").expect_err("bad config");
        assert_eq!(err.code(), "internal");
    }

    #[test]
    fn walkthrough_issues_reference() {
        let component = Component::in_memory("").expect("component");
        let flow = started(&component);

        let selected = parse(&component.select_species(&flow, r#"["pigs"]"#));
        assert_eq!(selected["data"]["stage"], "animal_counts");

        let fields = json!({
            "pigs_sows": "3",
            "pigs_boars": 1,
            "pigs_piglets": "0",
            "pigs_fattening_pigs": 12
        });
        let counted = parse(&component.submit_counts(&flow, &fields.to_string()));
        assert_eq!(counted["data"]["stage"], "confirmation");
        assert_eq!(counted["data"]["counts"]["pigs_fattening_pigs"], 12);
        assert_eq!(counted["data"]["complete"], true);

        let record = parse(&component.complete(&flow));
        assert_eq!(record["success"], true);
        assert_eq!(record["data"]["status"], "pending");
        assert_eq!(record["data"]["total_animals"], 16);
        assert_eq!(record["data"]["species_summary"].as_array().map(Vec::len), Some(3));

        let gone = parse(&component.describe_flow(&flow));
        assert_eq!(gone["code"], "state");
    }

    #[test]
    fn rejected_counts_echo_values() {
        let component = Component::in_memory("").expect("component");
        let flow = started(&component);
        component.select_species(&flow, r#"["sheep"]"#);

        let response = parse(&component.submit_counts(
            &flow,
            r#"{"sheep_ewes": "ten", "sheep_rams": null, "sheep_lambs": "-3"}"#,
        ));
        assert_eq!(response["success"], false);
        assert_eq!(response["error"], "validation failed");
        assert_eq!(response["values"]["sheep_ewes"], "ten");
        assert!(response["values"].get("sheep_rams").is_none());

        let codes: Vec<&str> = response["errors"]
            .as_array()
            .expect("errors")
            .iter()
            .filter_map(|error| error["code"].as_str())
            .collect();
        assert_eq!(codes, vec!["not_a_number", "missing", "negative"]);
    }

    #[test]
    fn empty_selection_is_a_validation_failure() {
        let component = Component::in_memory("").expect("component");
        let flow = started(&component);
        let response = parse(&component.select_species(&flow, "[]"));
        assert_eq!(response["code"], "validation");
        assert_eq!(response["errors"][0]["field"], "species");
        assert!(response.get("values").is_none());
    }

    #[test]
    fn malformed_requests_are_bad_requests() {
        let component = Component::in_memory("").expect("component");
        let flow = started(&component);

        let bad_keys = parse(&component.select_species(&flow, "{"));
        assert_eq!(bad_keys["code"], "bad_request");

        let bad_flow = parse(&component.describe_flow("../etc/passwd"));
        assert_eq!(bad_flow["code"], "bad_request");
    }

    #[test]
    fn complete_out_of_sequence_is_a_state_error() {
        let component = Component::in_memory("").expect("component");
        let flow = started(&component);
        let response = parse(&component.complete(&flow));
        assert_eq!(response["success"], false);
        assert_eq!(response["code"], "state");
    }
}
