use tracing::debug;

use super::Query;
use crate::emr::{DischargeSearch, DischargedEncounterPage, EmrApi, EmrResult};

/// One page of discharge encounters recorded at the ward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DischargedEncounterQuery {
    pub location_uuid: Option<String>,
    pub encounter_type: String,
    pub page: usize,
    pub page_size: usize,
}

impl DischargedEncounterQuery {
    pub fn new(location_uuid: Option<&str>, encounter_type: &str, page: usize, page_size: usize) -> Self {
        Self {
            location_uuid: location_uuid.map(str::to_string),
            encounter_type: encounter_type.to_string(),
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }
}

impl Query for DischargedEncounterQuery {
    type Output = DischargedEncounterPage;

    fn key(&self) -> Option<String> {
        self.location_uuid.as_ref().map(|uuid| {
            format!(
                "fhir/Encounter?type={}&location={uuid}&page={}&count={}",
                self.encounter_type, self.page, self.page_size
            )
        })
    }

    fn fetch(&self, api: &dyn EmrApi) -> EmrResult<DischargedEncounterPage> {
        let search = DischargeSearch {
            location_uuid: self.location_uuid.clone().unwrap_or_default(),
            encounter_type: self.encounter_type.clone(),
            page: self.page,
            page_size: self.page_size,
        };
        let page = api.discharge_encounters(&search)?;
        debug!(
            location = %search.location_uuid,
            total = page.total,
            "fetched discharged encounters"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emr::{DischargedEncounter, DischargedPatient, InMemoryEmr};
    use crate::fetch::QueryCache;

    #[test]
    fn test_pages_and_total() {
        let emr = InMemoryEmr::new();
        for i in 0..12 {
            emr.add_discharged(
                "w-1",
                DischargedEncounter {
                    uuid: format!("e-{i}"),
                    patient: DischargedPatient {
                        uuid: format!("p-{i}"),
                        name: format!("Patient {i}"),
                        openmrs_id: None,
                    },
                    encounter_datetime: None,
                },
            );
        }
        let mut cache = QueryCache::new();
        let state = cache.run(&emr, &DischargedEncounterQuery::new(Some("w-1"), "t", 2, 10));
        let page = state.data().unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.encounters.len(), 2);
        assert_eq!(page.encounters[0].uuid, "e-10");
    }

    #[test]
    fn test_page_is_at_least_one() {
        let query = DischargedEncounterQuery::new(Some("w"), "t", 0, 0);
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 1);
    }
}
