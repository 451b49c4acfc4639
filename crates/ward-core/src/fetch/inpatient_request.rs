use tracing::debug;

use super::Query;
use crate::emr::{EmrApi, EmrResult};
use crate::models::{DispositionType, InpatientRequest};

/// Pending requests into the ward. Backend order is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InpatientRequestQuery {
    pub location_uuid: Option<String>,
    pub types: Vec<DispositionType>,
}

impl InpatientRequestQuery {
    /// Admit and transfer requests into the ward.
    pub fn new(location_uuid: Option<&str>) -> Self {
        Self::with_types(location_uuid, &DispositionType::WARD_DEFAULT)
    }

    pub fn with_types(location_uuid: Option<&str>, types: &[DispositionType]) -> Self {
        Self {
            location_uuid: location_uuid.map(str::to_string),
            types: types.to_vec(),
        }
    }
}

impl Query for InpatientRequestQuery {
    type Output = Vec<InpatientRequest>;

    fn key(&self) -> Option<String> {
        let types = self
            .types
            .iter()
            .map(DispositionType::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.location_uuid.as_ref().map(|uuid| {
            format!("emrapi/inpatient/request?dispositionType={types}&dispositionLocation={uuid}")
        })
    }

    fn fetch(&self, api: &dyn EmrApi) -> EmrResult<Vec<InpatientRequest>> {
        let location = self.location_uuid.as_deref().unwrap_or_default();
        let mut requests = api.inpatient_requests(location, &self.types)?;
        requests.retain(|r| self.types.contains(&r.disposition_type));
        debug!(location, count = requests.len(), "fetched inpatient requests");
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emr::InMemoryEmr;
    use crate::fetch::QueryCache;
    use crate::models::{Patient, ResourceRef};

    fn request(patient: &str, kind: DispositionType) -> InpatientRequest {
        InpatientRequest {
            disposition_type: kind,
            disposition_location: Some(ResourceRef::new("w-1")),
            disposition: None,
            disposition_encounter: None,
            patient: Patient::stub(patient, patient),
            visit: None,
        }
    }

    #[test]
    fn test_filters_types_and_keeps_order() {
        let emr = InMemoryEmr::new();
        emr.add_request(request("p-3", DispositionType::Transfer));
        emr.add_request(request("p-1", DispositionType::Discharge));
        emr.add_request(request("p-2", DispositionType::Admit));
        let mut cache = QueryCache::new();

        let state = cache.run(&emr, &InpatientRequestQuery::new(Some("w-1")));
        let uuids: Vec<&str> = state
            .data()
            .unwrap()
            .iter()
            .map(|r| r.patient.uuid.as_str())
            .collect();
        assert_eq!(uuids, vec!["p-3", "p-2"]);
    }

    #[test]
    fn test_key_includes_types() {
        let admit_only =
            InpatientRequestQuery::with_types(Some("w-1"), &[DispositionType::Admit]);
        let default = InpatientRequestQuery::new(Some("w-1"));
        assert_ne!(admit_only.key(), default.key());
    }
}
