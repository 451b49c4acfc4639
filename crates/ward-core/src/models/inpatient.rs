//! Inpatient admissions and disposition requests.

use serde::{Deserialize, Serialize};

use super::{Encounter, Patient, ResourceRef, Visit};

/// Disposition requested for a patient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispositionType {
    Admit,
    Transfer,
    Discharge,
}

impl DispositionType {
    /// Types the ward asks for when listing pending requests.
    pub const WARD_DEFAULT: [DispositionType; 2] = [DispositionType::Admit, DispositionType::Transfer];

    pub fn as_str(&self) -> &'static str {
        match self {
            DispositionType::Admit => "ADMIT",
            DispositionType::Transfer => "TRANSFER",
            DispositionType::Discharge => "DISCHARGE",
        }
    }
}

impl std::fmt::Display for DispositionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending disposition for a patient (admit into, transfer into, or
/// discharge from a location).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InpatientRequest {
    pub disposition_type: DispositionType,
    #[serde(default)]
    pub disposition_location: Option<ResourceRef>,
    /// The coded disposition concept.
    #[serde(default)]
    pub disposition: Option<ResourceRef>,
    #[serde(default)]
    pub disposition_encounter: Option<Encounter>,
    pub patient: Patient,
    #[serde(default)]
    pub visit: Option<Visit>,
}

impl InpatientRequest {
    pub fn targets(&self, location_uuid: &str) -> bool {
        self.disposition_location
            .as_ref()
            .is_some_and(|l| l.uuid == location_uuid)
    }

    /// When the request was made, if known.
    pub fn requested_at(&self) -> Option<&str> {
        self.disposition_encounter
            .as_ref()
            .and_then(|e| e.encounter_datetime.as_deref())
    }
}

/// An active inpatient admission, as reported by the EMR.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InpatientAdmission {
    pub patient: Patient,
    #[serde(default)]
    pub visit: Option<Visit>,
    /// Pending transfer or discharge for this admission.
    #[serde(default)]
    pub current_inpatient_request: Option<InpatientRequest>,
    #[serde(default)]
    pub first_admission_or_transfer_encounter: Option<Encounter>,
    #[serde(default)]
    pub encounter_assigning_to_current_inpatient_location: Option<Encounter>,
    #[serde(default)]
    pub current_inpatient_location: Option<ResourceRef>,
}

impl InpatientAdmission {
    pub fn new(patient: Patient, visit: Option<Visit>) -> Self {
        Self {
            patient,
            visit,
            current_inpatient_request: None,
            first_admission_or_transfer_encounter: None,
            encounter_assigning_to_current_inpatient_location: None,
            current_inpatient_location: None,
        }
    }

    /// Date the patient arrived at the current ward.
    pub fn admitted_at(&self) -> Option<&str> {
        self.encounter_assigning_to_current_inpatient_location
            .as_ref()
            .or(self.first_admission_or_transfer_encounter.as_ref())
            .and_then(|e| e.encounter_datetime.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_request() {
        let json = r#"{
            "dispositionType": "TRANSFER",
            "dispositionLocation": {"uuid": "ward-b"},
            "dispositionEncounter": {"uuid": "e-1", "encounterDatetime": "2024-07-01T09:00:00.000+0300"},
            "patient": {"uuid": "p-1"}
        }"#;
        let request: InpatientRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.disposition_type, DispositionType::Transfer);
        assert!(request.targets("ward-b"));
        assert!(!request.targets("ward-a"));
        assert_eq!(request.requested_at(), Some("2024-07-01T09:00:00.000+0300"));
    }

    #[test]
    fn test_admitted_at_prefers_current_location_encounter() {
        let mut admission = InpatientAdmission::new(Patient::stub("p", "P"), None);
        admission.first_admission_or_transfer_encounter = Some(Encounter {
            uuid: "first".into(),
            encounter_datetime: Some("2024-06-01".into()),
            ..Encounter::default()
        });
        assert_eq!(admission.admitted_at(), Some("2024-06-01"));

        admission.encounter_assigning_to_current_inpatient_location = Some(Encounter {
            uuid: "current".into(),
            encounter_datetime: Some("2024-06-05".into()),
            ..Encounter::default()
        });
        assert_eq!(admission.admitted_at(), Some("2024-06-05"));
    }
}
