use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::{SpeciesCatalog, Subcategory};
use crate::error::ValidationError;
use crate::flow::CountKey;

/// Raw form submission: field name to submitted text.
pub type RawFields = BTreeMap<String, String>;

/// Field that species-selection errors attach to.
pub const SPECIES_FIELD: &str = "species";

static COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[0-9]+\s*$").expect("count pattern is valid"));
static NEGATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s*[0-9]+\s*$").expect("negative pattern is valid"));

/// Rules applied to every headcount field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountPolicy {
    /// Require at least one animal on every line.
    pub reject_zero: bool,
    pub max_count: Option<u64>,
}

/// Keeps the catalog-known keys, deduplicated.
pub fn validate_species_selection<K: AsRef<str>>(
    catalog: &SpeciesCatalog,
    submitted: &[K],
) -> Result<BTreeSet<String>, ValidationError> {
    let selected: BTreeSet<String> = submitted
        .iter()
        .map(|key| key.as_ref().trim())
        .filter(|key| catalog.contains(key))
        .map(str::to_string)
        .collect();

    if selected.is_empty() {
        return Err(ValidationError::new(
            SPECIES_FIELD,
            "Select at least one species of animal you have",
            "no_species",
        ));
    }
    Ok(selected)
}

/// Parses one count per subcategory of every selected species.
///
/// Errors are collected for all fields, in catalog order. A submission whose
/// grand total does not fit in a `u64` is rejected on the field that overflows
/// it.
pub fn validate_counts(
    catalog: &SpeciesCatalog,
    selected: &BTreeSet<String>,
    raw: &RawFields,
    policy: &CountPolicy,
) -> Result<BTreeMap<CountKey, u64>, Vec<ValidationError>> {
    let mut counts = BTreeMap::new();
    let mut errors = Vec::new();

    for species in catalog.selected(selected) {
        for sub in &species.subcategories {
            let key = CountKey::new(species.key.clone(), sub.key.clone());
            let field = key.field_name();
            match parse_count(raw.get(&field).map(String::as_str), sub, &field, policy) {
                Ok(count) => {
                    counts.insert(key, count);
                }
                Err(error) => errors.push(error),
            }
        }
    }

    if errors.is_empty()
        && let Some(error) = check_total(catalog, selected, &counts)
    {
        errors.push(error);
    }

    if errors.is_empty() {
        Ok(counts)
    } else {
        Err(errors)
    }
}

fn check_total(
    catalog: &SpeciesCatalog,
    selected: &BTreeSet<String>,
    counts: &BTreeMap<CountKey, u64>,
) -> Option<ValidationError> {
    let mut total: u64 = 0;
    for species in catalog.selected(selected) {
        for key in species.count_keys() {
            let count = counts.get(&key).copied().unwrap_or(0);
            match total.checked_add(count) {
                Some(sum) => total = sum,
                None => {
                    return Some(ValidationError::new(
                        key.field_name(),
                        "Total number of animals is too large",
                        "total_too_large",
                    ));
                }
            }
        }
    }
    None
}

fn parse_count(
    raw: Option<&str>,
    sub: &Subcategory,
    field: &str,
    policy: &CountPolicy,
) -> Result<u64, ValidationError> {
    let label = sub.name.to_lowercase();

    let Some(text) = raw.filter(|text| !text.trim().is_empty()) else {
        return Err(ValidationError::new(
            field,
            format!("Enter the number of {label}"),
            "missing",
        ));
    };

    if NEGATIVE.is_match(text) {
        return Err(ValidationError::new(
            field,
            format!("Number of {label} must be 0 or more"),
            "negative",
        ));
    }

    if !COUNT.is_match(text) {
        return Err(ValidationError::new(
            field,
            format!("Number of {label} must be a whole number"),
            "not_a_number",
        ));
    }

    let Ok(count) = text.trim().parse::<u64>() else {
        return Err(ValidationError::new(
            field,
            format!("Number of {label} is too large to record"),
            "out_of_range",
        ));
    };

    if count == 0 && policy.reject_zero {
        return Err(ValidationError::new(
            field,
            format!("Number of {label} must be greater than 0"),
            "zero",
        ));
    }

    if let Some(max) = policy.max_count
        && count > max
    {
        return Err(ValidationError::new(
            field,
            format!("Number of {label} must be {max} or fewer"),
            "too_large",
        ));
    }

    Ok(count)
}
