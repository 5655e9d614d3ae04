use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::SpeciesCatalog;

const FLOW_ID_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowIdError {
    #[error("flow id is empty")]
    Empty,
    #[error("flow id is longer than 64 characters")]
    TooLong,
    #[error("flow id '{0}' contains characters other than letters, digits and '-'")]
    InvalidCharacter(String),
}

/// Opaque identifier of one in-progress wizard run.
///
/// Restricted to ASCII letters, digits and `-` so it is safe to embed in file
/// names, cookies and query strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FlowId(String);

impl FlowId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for FlowId {
    type Err = FlowIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FlowIdError::Empty);
        }
        if raw.len() > FLOW_ID_MAX_LEN {
            return Err(FlowIdError::TooLong);
        }
        if !raw.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-') {
            return Err(FlowIdError::InvalidCharacter(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }
}

impl TryFrom<String> for FlowId {
    type Error = FlowIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FlowId> for String {
    fn from(value: FlowId) -> Self {
        value.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("count key '{0}' must look like 'species:subcategory'")]
pub struct CountKeyError(String);

/// A `(species, subcategory)` pair identifying one headcount.
///
/// Serialises as `species:subcategory`; forms address it through
/// [`CountKey::field_name`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountKey {
    species: String,
    subcategory: String,
}

impl CountKey {
    pub fn new(species: impl Into<String>, subcategory: impl Into<String>) -> Self {
        Self {
            species: species.into(),
            subcategory: subcategory.into(),
        }
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn subcategory(&self) -> &str {
        &self.subcategory
    }

    /// Form input name for this count.
    pub fn field_name(&self) -> String {
        format!("{}_{}", self.species, self.subcategory)
    }
}

impl fmt::Display for CountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.species, self.subcategory)
    }
}

impl TryFrom<String> for CountKey {
    type Error = CountKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once(':') {
            Some((species, subcategory))
                if !species.is_empty() && !subcategory.is_empty() && !subcategory.contains(':') =>
            {
                Ok(Self::new(species, subcategory))
            }
            _ => Err(CountKeyError(value)),
        }
    }
}

impl From<CountKey> for String {
    fn from(value: CountKey) -> Self {
        value.to_string()
    }
}

/// Wizard step a flow is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStage {
    SpeciesSelection,
    AnimalCounts,
    Confirmation,
}

impl FlowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStage::SpeciesSelection => "species_selection",
            FlowStage::AnimalCounts => "animal_counts",
            FlowStage::Confirmation => "confirmation",
        }
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers accumulated for one flow between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    pub flow_id: FlowId,
    pub stage: FlowStage,
    #[serde(default)]
    pub selected_species: BTreeSet<String>,
    #[serde(default)]
    pub counts: BTreeMap<CountKey, u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowState {
    pub fn new(flow_id: FlowId, now: DateTime<Utc>) -> Self {
        Self {
            flow_id,
            stage: FlowStage::SpeciesSelection,
            selected_species: BTreeSet::new(),
            counts: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when every subcategory of every selected species has a count.
    pub fn has_all_counts(&self, catalog: &SpeciesCatalog) -> bool {
        !self.selected_species.is_empty()
            && catalog
                .selected(&self.selected_species)
                .flat_map(|species| species.count_keys())
                .all(|key| self.counts.contains_key(&key))
    }

    pub fn count(&self, key: &CountKey) -> Option<u64> {
        self.counts.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_key_round_trips_through_string() {
        let key = CountKey::new("cattle", "dairy_cows");
        let encoded: String = key.clone().into();
        assert_eq!(encoded, "cattle:dairy_cows");
        assert_eq!(CountKey::try_from(encoded).expect("parse"), key);
        assert_eq!(key.field_name(), "cattle_dairy_cows");
    }

    #[test]
    fn count_key_rejects_malformed_strings() {
        assert!(CountKey::try_from("cattle".to_string()).is_err());
        assert!(CountKey::try_from(":bulls".to_string()).is_err());
        assert!(CountKey::try_from("a:b:c".to_string()).is_err());
    }

    #[test]
    fn flow_id_rejects_path_characters() {
        assert!("../etc".parse::<FlowId>().is_err());
        assert!("".parse::<FlowId>().is_err());
        assert!(FlowId::generate().as_str().parse::<FlowId>().is_ok());
    }
}
