use tracing::debug;

use super::Query;
use crate::emr::{EmrApi, EmrResult};
use crate::models::AdmissionLocation;

/// Bed layout and occupancy for one ward.
///
/// Not applicable when the bed-management module is missing; the flag is
/// checked before any request goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionLocationQuery {
    pub location_uuid: Option<String>,
}

impl AdmissionLocationQuery {
    pub fn new(location_uuid: Option<&str>) -> Self {
        Self {
            location_uuid: location_uuid.map(str::to_string),
        }
    }
}

impl Query for AdmissionLocationQuery {
    type Output = AdmissionLocation;

    fn key(&self) -> Option<String> {
        self.location_uuid
            .as_ref()
            .map(|uuid| format!("admissionLocation/{uuid}"))
    }

    fn is_applicable(&self, api: &dyn EmrApi) -> bool {
        api.is_bed_management_installed()
    }

    fn fetch(&self, api: &dyn EmrApi) -> EmrResult<AdmissionLocation> {
        let location = self.location_uuid.as_deref().unwrap_or_default();
        let result = api.admission_location(location)?;
        debug!(
            location,
            beds = result.bed_layouts.len(),
            occupied = result.occupied_beds,
            "fetched admission location"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emr::{EmrOperation, InMemoryEmr};
    use crate::fetch::{QueryCache, QueryState};
    use crate::models::Location;

    #[test]
    fn test_not_applicable_without_bed_management() {
        let emr = InMemoryEmr::without_bed_management();
        let mut cache = QueryCache::new();
        let state = cache.run(&emr, &AdmissionLocationQuery::new(Some("w-1")));
        assert!(matches!(state, QueryState::NotApplicable));
        assert_eq!(emr.call_count(EmrOperation::AdmissionLocation), 0);
    }

    #[test]
    fn test_no_location_no_query() {
        let emr = InMemoryEmr::new();
        let mut cache = QueryCache::new();
        let state = cache.run(&emr, &AdmissionLocationQuery::new(None));
        assert!(matches!(state, QueryState::NoQuery));
        assert_eq!(emr.call_count(EmrOperation::AdmissionLocation), 0);
    }

    #[test]
    fn test_fetches_layout() {
        let emr = InMemoryEmr::new();
        emr.add_admission_location(AdmissionLocation {
            ward: Location {
                uuid: "w-1".into(),
                ..Location::default()
            },
            total_beds: 4,
            ..AdmissionLocation::default()
        });
        let mut cache = QueryCache::new();
        let state = cache.run(&emr, &AdmissionLocationQuery::new(Some("w-1")));
        assert_eq!(state.data().unwrap().total_beds, 4);
    }

    #[test]
    fn test_failure_is_typed_error() {
        let emr = InMemoryEmr::new();
        emr.fail(EmrOperation::AdmissionLocation);
        let mut cache = QueryCache::new();
        let state = cache.run(&emr, &AdmissionLocationQuery::new(Some("w-1")));
        assert!(state.error().is_some());
    }
}
