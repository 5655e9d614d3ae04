use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::SpeciesCatalog;
use crate::flow::FlowState;

/// One non-zero headcount line on a completed registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub species_name: String,
    pub subcategory_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
}

/// Terminal artifact of a completed flow. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub id: Uuid,
    pub reference_number: String,
    pub status: RegistrationStatus,
    pub species_summary: Vec<SummaryLine>,
    pub created_at: DateTime<Utc>,
}

impl RegistrationRecord {
    pub(crate) fn from_flow(
        catalog: &SpeciesCatalog,
        state: &FlowState,
        reference_number: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference_number,
            status: RegistrationStatus::Pending,
            species_summary: summarise(catalog, state),
            created_at,
        }
    }

    /// Sum of every summary line, saturating at `u64::MAX`.
    pub fn total_animals(&self) -> u64 {
        self.species_summary
            .iter()
            .fold(0u64, |total, line| total.saturating_add(line.count))
    }
}

fn summarise(catalog: &SpeciesCatalog, state: &FlowState) -> Vec<SummaryLine> {
    let mut lines = Vec::new();
    for species in catalog.selected(&state.selected_species) {
        for (sub, key) in species.subcategories.iter().zip(species.count_keys()) {
            match state.count(&key) {
                Some(count) if count > 0 => lines.push(SummaryLine {
                    species_name: species.name.clone(),
                    subcategory_name: sub.name.clone(),
                    count,
                }),
                _ => {}
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(count: u64) -> SummaryLine {
        SummaryLine {
            species_name: "Sheep".into(),
            subcategory_name: "Ewes".into(),
            count,
        }
    }

    #[test]
    fn total_saturates_instead_of_overflowing() {
        let record = RegistrationRecord {
            id: Uuid::new_v4(),
            reference_number: "VV-000000-ABCDEFGH".into(),
            status: RegistrationStatus::Pending,
            species_summary: vec![line(u64::MAX), line(1)],
            created_at: Utc::now(),
        };
        assert_eq!(record.total_animals(), u64::MAX);
    }
}
