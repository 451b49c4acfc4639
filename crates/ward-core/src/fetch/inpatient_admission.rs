use tracing::debug;

use super::Query;
use crate::emr::{EmrApi, EmrResult};
use crate::models::InpatientAdmission;

/// Admissions whose current inpatient location is the ward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InpatientAdmissionQuery {
    pub location_uuid: Option<String>,
}

impl InpatientAdmissionQuery {
    pub fn new(location_uuid: Option<&str>) -> Self {
        Self {
            location_uuid: location_uuid.map(str::to_string),
        }
    }
}

impl Query for InpatientAdmissionQuery {
    type Output = Vec<InpatientAdmission>;

    fn key(&self) -> Option<String> {
        self.location_uuid
            .as_ref()
            .map(|uuid| format!("emrapi/inpatient/admission?currentInpatientLocation={uuid}"))
    }

    fn fetch(&self, api: &dyn EmrApi) -> EmrResult<Vec<InpatientAdmission>> {
        let location = self.location_uuid.as_deref().unwrap_or_default();
        let admissions = api.inpatient_admissions(location)?;
        debug!(location, count = admissions.len(), "fetched inpatient admissions");
        Ok(admissions)
    }
}
