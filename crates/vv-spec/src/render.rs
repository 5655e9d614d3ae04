use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value, json};

use crate::{
    catalog::SpeciesCatalog,
    config::WizardConfig,
    error::ValidationError,
    flow::{FlowId, FlowState},
    record::RegistrationRecord,
    validate::{RawFields, SPECIES_FIELD},
};

/// Views the wizard asks the renderer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewName {
    Start,
    SpeciesSelection,
    AnimalCounts,
    Confirmation,
}

impl ViewName {
    pub const ALL: [ViewName; 4] = [
        ViewName::Start,
        ViewName::SpeciesSelection,
        ViewName::AnimalCounts,
        ViewName::Confirmation,
    ];

    /// Template and route name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewName::Start => "start",
            ViewName::SpeciesSelection => "species-selection",
            ViewName::AnimalCounts => "animal-counts",
            ViewName::Confirmation => "confirmation",
        }
    }

    pub fn page_title(&self) -> &'static str {
        match self {
            ViewName::Start => "Register animals for vet visits",
            ViewName::SpeciesSelection => "Which animals do you have?",
            ViewName::AnimalCounts => "How many animals do you have?",
            ViewName::Confirmation => "Registration complete",
        }
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary box listing every error with a link to its field.
pub fn error_summary(errors: &[ValidationError]) -> Value {
    if errors.is_empty() {
        return Value::Null;
    }
    let items = errors
        .iter()
        .map(|error| {
            json!({
                "text": error.message,
                "href": error.href(),
            })
        })
        .collect::<Vec<_>>();
    json!({
        "title": "There is a problem",
        "items": items,
    })
}

fn page(config: &WizardConfig, view: ViewName, errors: &[ValidationError]) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("view".into(), Value::String(view.as_str().into()));
    map.insert("page_title".into(), Value::String(view.page_title().into()));
    map.insert(
        "service_name".into(),
        Value::String(config.service_name.clone()),
    );
    map.insert("error_summary".into(), error_summary(errors));
    map
}

pub fn start_view(config: &WizardConfig, flow_id: &FlowId) -> Value {
    let mut map = page(config, ViewName::Start, &[]);
    map.insert("flow_id".into(), Value::String(flow_id.to_string()));
    Value::Object(map)
}

/// Species checkboxes; `checked` keys are ticked.
pub fn species_view(
    config: &WizardConfig,
    catalog: &SpeciesCatalog,
    checked: &BTreeSet<String>,
    errors: &[ValidationError],
) -> Value {
    let species = catalog
        .species()
        .iter()
        .map(|species| {
            json!({
                "key": species.key,
                "name": species.name,
                "checked": checked.contains(&species.key),
            })
        })
        .collect::<Vec<_>>();

    let mut map = page(config, ViewName::SpeciesSelection, errors);
    map.insert("field".into(), Value::String(SPECIES_FIELD.into()));
    map.insert("species".into(), Value::Array(species));
    map.insert(
        "error".into(),
        errors
            .iter()
            .find(|error| error.field == SPECIES_FIELD)
            .map(|error| Value::String(error.message.clone()))
            .unwrap_or(Value::Null),
    );
    Value::Object(map)
}

/// Count inputs for the selected species.
///
/// Values echo `submitted` when present (a rejected submission), otherwise the
/// stored counts.
pub fn counts_view(
    config: &WizardConfig,
    catalog: &SpeciesCatalog,
    state: &FlowState,
    submitted: Option<&RawFields>,
    errors: &[ValidationError],
) -> Value {
    let species = catalog
        .selected(&state.selected_species)
        .map(|species| {
            let subcategories = species
                .subcategories
                .iter()
                .zip(species.count_keys())
                .map(|(sub, key)| {
                    let field = key.field_name();
                    let value = match submitted {
                        Some(raw) => raw.get(&field).cloned().unwrap_or_default(),
                        None => state
                            .count(&key)
                            .map(|count| count.to_string())
                            .unwrap_or_default(),
                    };
                    let error = errors
                        .iter()
                        .find(|error| error.field == field)
                        .map(|error| Value::String(error.message.clone()))
                        .unwrap_or(Value::Null);
                    json!({
                        "key": sub.key,
                        "name": sub.name,
                        "field": field,
                        "value": value,
                        "error": error,
                    })
                })
                .collect::<Vec<_>>();
            json!({
                "key": species.key,
                "name": species.name,
                "subcategories": subcategories,
            })
        })
        .collect::<Vec<_>>();

    let mut map = page(config, ViewName::AnimalCounts, errors);
    map.insert("species".into(), Value::Array(species));
    Value::Object(map)
}

pub fn confirmation_view(config: &WizardConfig, record: &RegistrationRecord) -> Value {
    let summary = record
        .species_summary
        .iter()
        .map(|line| {
            json!({
                "species": line.species_name,
                "subcategory": line.subcategory_name,
                "count": line.count,
            })
        })
        .collect::<Vec<_>>();

    let mut map = page(config, ViewName::Confirmation, &[]);
    map.insert(
        "reference_number".into(),
        Value::String(record.reference_number.clone()),
    );
    map.insert("summary".into(), Value::Array(summary));
    map.insert("total".into(), json!(record.total_animals()));
    map.insert(
        "created_at".into(),
        Value::String(record.created_at.to_rfc3339()),
    );
    Value::Object(map)
}
