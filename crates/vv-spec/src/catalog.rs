use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flow::CountKey;

static SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[_-][a-z0-9]+)*$").expect("slug pattern is valid")
});

/// One headcount line offered under a species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Subcategory {
    pub key: String,
    pub name: String,
}

/// A species the wizard can register, with its ordered subcategories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Species {
    pub key: String,
    pub name: String,
    pub subcategories: Vec<Subcategory>,
}

impl Species {
    pub fn subcategory(&self, key: &str) -> Option<&Subcategory> {
        self.subcategories.iter().find(|sub| sub.key == key)
    }

    /// Typed count keys for every subcategory, in display order.
    pub fn count_keys(&self) -> impl Iterator<Item = CountKey> + '_ {
        self.subcategories
            .iter()
            .map(|sub| CountKey::new(self.key.clone(), sub.key.clone()))
    }
}

/// On-disk shape of a catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CatalogDocument {
    pub species: Vec<Species>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog must contain at least one species")]
    Empty,
    #[error("'{0}' is not a valid key; use lowercase letters and digits joined by '_' or '-'")]
    InvalidKey(String),
    #[error("species '{0}' is listed more than once")]
    DuplicateSpecies(String),
    #[error("species '{species}' lists subcategory '{subcategory}' more than once")]
    DuplicateSubcategory {
        species: String,
        subcategory: String,
    },
    #[error("species '{0}' has no subcategories")]
    NoSubcategories(String),
    #[error("field name '{field}' is produced by both {first} and {second}")]
    FieldCollision {
        field: String,
        first: String,
        second: String,
    },
    #[error("failed to read catalog '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Validated species reference data. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesCatalog {
    species: Vec<Species>,
}

impl SpeciesCatalog {
    pub fn new(species: Vec<Species>) -> Result<Self, CatalogError> {
        if species.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut species_keys = BTreeSet::new();
        let mut fields: BTreeMap<String, CountKey> = BTreeMap::new();

        for entry in &species {
            ensure_slug(&entry.key)?;
            if !species_keys.insert(entry.key.as_str()) {
                return Err(CatalogError::DuplicateSpecies(entry.key.clone()));
            }
            if entry.subcategories.is_empty() {
                return Err(CatalogError::NoSubcategories(entry.key.clone()));
            }

            let mut sub_keys = BTreeSet::new();
            for sub in &entry.subcategories {
                ensure_slug(&sub.key)?;
                if !sub_keys.insert(sub.key.as_str()) {
                    return Err(CatalogError::DuplicateSubcategory {
                        species: entry.key.clone(),
                        subcategory: sub.key.clone(),
                    });
                }
            }

            for key in entry.count_keys() {
                let field = key.field_name();
                if let Some(existing) = fields.get(&field) {
                    return Err(CatalogError::FieldCollision {
                        field,
                        first: existing.to_string(),
                        second: key.to_string(),
                    });
                }
                fields.insert(field, key);
            }
        }

        Ok(Self { species })
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(raw).map_err(CatalogError::Parse)?;
        Self::try_from(document)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn get(&self, key: &str) -> Option<&Species> {
        self.species.iter().find(|species| species.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Selected species in catalog order, skipping unknown keys.
    pub fn selected<'a>(
        &'a self,
        keys: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a Species> + 'a {
        self.species
            .iter()
            .filter(move |species| keys.contains(&species.key))
    }

    pub fn to_document(&self) -> CatalogDocument {
        CatalogDocument {
            species: self.species.clone(),
        }
    }
}

impl TryFrom<CatalogDocument> for SpeciesCatalog {
    type Error = CatalogError;

    fn try_from(document: CatalogDocument) -> Result<Self, Self::Error> {
        Self::new(document.species)
    }
}

impl Default for SpeciesCatalog {
    fn default() -> Self {
        Self {
            species: builtin_species(),
        }
    }
}

/// JSON Schema for catalog files.
pub fn catalog_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(CatalogDocument))
        .unwrap_or(serde_json::Value::Null)
}

fn ensure_slug(key: &str) -> Result<(), CatalogError> {
    if SLUG.is_match(key) {
        Ok(())
    } else {
        Err(CatalogError::InvalidKey(key.to_string()))
    }
}

fn species(key: &str, name: &str, subcategories: &[(&str, &str)]) -> Species {
    Species {
        key: key.into(),
        name: name.into(),
        subcategories: subcategories
            .iter()
            .map(|(key, name)| Subcategory {
                key: (*key).into(),
                name: (*name).into(),
            })
            .collect(),
    }
}

fn builtin_species() -> Vec<Species> {
    vec![
        species(
            "cattle",
            "Cattle",
            &[
                ("dairy_cows", "Dairy cows"),
                ("beef_cattle", "Beef cattle"),
                ("bulls", "Bulls"),
                ("calves", "Calves"),
            ],
        ),
        species(
            "sheep",
            "Sheep",
            &[("ewes", "Ewes"), ("rams", "Rams"), ("lambs", "Lambs")],
        ),
        species(
            "pigs",
            "Pigs",
            &[
                ("sows", "Sows"),
                ("boars", "Boars"),
                ("piglets", "Piglets"),
                ("fattening_pigs", "Fattening pigs"),
            ],
        ),
        species(
            "poultry",
            "Poultry",
            &[
                ("laying_hens", "Laying hens"),
                ("broilers", "Broilers"),
                ("turkeys", "Turkeys"),
                ("ducks", "Ducks"),
                ("geese", "Geese"),
            ],
        ),
        species(
            "horses",
            "Horses",
            &[
                ("mares", "Mares"),
                ("stallions", "Stallions"),
                ("geldings", "Geldings"),
                ("foals", "Foals"),
            ],
        ),
    ]
}
