//! EMR client seam.
//!
//! The ward core never talks to the network directly. Everything goes through
//! [`EmrApi`], implemented by [`RestEmrClient`] for a live server and by
//! [`InMemoryEmr`] for tests and offline demos.

mod fhir;
mod memory;
mod rest;

pub use fhir::*;
pub use memory::*;
pub use rest::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    AdmissionLocation, BedAssignment, Bill, Concept, DispositionType, Encounter, EncounterPayload,
    InpatientAdmission, InpatientRequest, Location, ResourceRef, Visit,
};

/// EMR request errors.
#[derive(Error, Debug)]
pub enum EmrError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("EMR returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Failed to decode EMR response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected EMR response: {0}")]
    Unexpected(String),
}

pub type EmrResult<T> = Result<T, EmrError>;

impl EmrError {
    /// Server-provided error message, falling back to the error's own text.
    pub fn user_message(&self) -> String {
        if let EmrError::Status { body, .. } = self {
            if let Some(message) = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            {
                return message;
            }
        }
        self.to_string()
    }

    /// Validation messages the server attached to one request field.
    pub fn field_errors(&self, field: &str) -> Vec<String> {
        let EmrError::Status { body, .. } = self else {
            return Vec::new();
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return Vec::new();
        };
        value["error"]["fieldErrors"][field]
            .as_array()
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e["message"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EmrError::Status { code: 404, .. })
    }
}

/// Representation requested when loading an encounter with its visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncounterView {
    /// Visit encounters with their types and dates only.
    Summary,
    /// Visit encounters with diagnoses.
    Diagnoses,
    /// Visit encounters with orders and observations.
    OrdersAndObs,
}

impl EncounterView {
    pub fn representation(&self) -> &'static str {
        match self {
            EncounterView::Summary => {
                "custom:(uuid,display,encounterDatetime,visit:(uuid,display,encounters:(uuid,display,encounterType:(uuid,display),encounterDatetime)))"
            }
            EncounterView::Diagnoses => {
                "custom:(uuid,display,visit:(uuid,encounters:(uuid,encounterType:(uuid,display),encounterDatetime,diagnoses:(uuid,display,certainty,diagnosis:(coded:(uuid,display),nonCoded)))))"
            }
            EncounterView::OrdersAndObs => {
                "custom:(uuid,display,location:(display),encounterDatetime,visit:(uuid,display,encounters:(uuid,display,encounterType:(uuid,display),encounterDatetime,orders,obs)))"
            }
        }
    }
}

/// One page of the discharged-encounter search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DischargeSearch {
    pub location_uuid: String,
    pub encounter_type: String,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
}

/// Operations the ward core needs from the EMR.
pub trait EmrApi: Send + Sync {
    /// Whether the bed-management module is installed.
    fn is_bed_management_installed(&self) -> bool;

    /// Bed layout and occupancy of one ward.
    fn admission_location(&self, location_uuid: &str) -> EmrResult<AdmissionLocation>;

    /// All admission locations (every page).
    fn admission_locations(&self) -> EmrResult<Vec<AdmissionLocation>>;

    /// Admissions whose current inpatient location is the ward.
    fn inpatient_admissions(&self, location_uuid: &str) -> EmrResult<Vec<InpatientAdmission>>;

    /// Pending requests into the ward for the given disposition types.
    fn inpatient_requests(
        &self,
        location_uuid: &str,
        types: &[DispositionType],
    ) -> EmrResult<Vec<InpatientRequest>>;

    /// Discharge encounters recorded at the ward.
    fn discharge_encounters(&self, search: &DischargeSearch) -> EmrResult<DischargedEncounterPage>;

    /// An encounter with its visit, in the requested representation.
    fn encounter_with_visit(&self, encounter_uuid: &str, view: EncounterView) -> EmrResult<Encounter>;

    fn concept(&self, concept_uuid: &str) -> EmrResult<Concept>;

    /// A location with its tags.
    fn location(&self, location_uuid: &str) -> EmrResult<Location>;

    /// The patient's active visit with its encounters, if any.
    fn active_visit(&self, patient_uuid: &str) -> EmrResult<Option<Visit>>;

    /// Every encounter recorded for the patient.
    fn patient_encounters(&self, patient_uuid: &str) -> EmrResult<Vec<Encounter>>;

    /// Pending requests for one patient, whatever their target location.
    fn patient_requests(
        &self,
        patient_uuid: &str,
        types: &[DispositionType],
    ) -> EmrResult<Vec<InpatientRequest>>;

    /// Concepts matching a name search that map into the given concept source.
    fn search_concepts(&self, query: &str, source_uuid: &str) -> EmrResult<Vec<Concept>>;

    /// All providers (every page).
    fn providers(&self) -> EmrResult<Vec<ResourceRef>>;

    fn create_encounter(&self, payload: &EncounterPayload) -> EmrResult<Encounter>;

    fn assign_bed(
        &self,
        bed_id: i64,
        patient_uuid: &str,
        encounter_uuid: Option<&str>,
    ) -> EmrResult<()>;

    fn remove_from_bed(&self, bed_id: i64, patient_uuid: &str) -> EmrResult<()>;

    /// Beds currently held by a patient.
    fn assigned_beds(&self, patient_uuid: &str) -> EmrResult<Vec<BedAssignment>>;

    /// Bills created for a patient within a time window.
    fn patient_bills(
        &self,
        patient_uuid: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> EmrResult<Vec<Bill>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_from_body() {
        let err = EmrError::Status {
            code: 400,
            body: r#"{"error":{"message":"Invalid Submission","fieldErrors":{"encounterDatetime":[{"code":"x","message":"Encounter datetime should be after the visit start"}]}}}"#.into(),
        };
        assert_eq!(err.user_message(), "Invalid Submission");
        assert_eq!(
            err.field_errors("encounterDatetime"),
            vec!["Encounter datetime should be after the visit start".to_string()]
        );
        assert!(err.field_errors("location").is_empty());
    }

    #[test]
    fn test_user_message_fallback() {
        let err = EmrError::Status {
            code: 500,
            body: "<html>oops</html>".into(),
        };
        assert_eq!(err.user_message(), "EMR returned status 500: <html>oops</html>");
        assert!(!err.is_not_found());
        assert!(EmrError::Status { code: 404, body: String::new() }.is_not_found());
    }
}
