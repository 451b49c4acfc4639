//! The derived ward patient.

use serde::{Deserialize, Serialize};

use super::{Bed, InpatientAdmission, InpatientRequest, Patient, Visit};

/// How a ward patient was produced by reconciliation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WardPatientOrigin {
    /// Joined with an inpatient admission.
    Admitted,
    /// Bed occupant with no matching admission record.
    Unreconciled,
    /// Pending request into the ward, not yet admitted.
    Pending,
}

/// A patient as shown on the ward, joined across beds, admissions and
/// requests. Never sent to the EMR.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WardPatient {
    pub patient: Patient,
    pub visit: Option<Visit>,
    pub bed: Option<Bed>,
    pub inpatient_admission: Option<InpatientAdmission>,
    pub inpatient_request: Option<InpatientRequest>,
    pub origin: WardPatientOrigin,
}

impl WardPatient {
    /// A bed occupant joined with its admission. The pending request rides
    /// along from the admission.
    pub fn from_admission(bed: Option<Bed>, admission: &InpatientAdmission) -> Self {
        Self {
            patient: admission.patient.clone(),
            visit: admission.visit.clone(),
            bed,
            inpatient_admission: Some(admission.clone()),
            inpatient_request: admission.current_inpatient_request.clone(),
            origin: WardPatientOrigin::Admitted,
        }
    }

    /// A bed occupant with no admission record.
    pub fn unreconciled(bed: Bed, patient: &Patient) -> Self {
        Self {
            patient: patient.clone(),
            visit: None,
            bed: Some(bed),
            inpatient_admission: None,
            inpatient_request: None,
            origin: WardPatientOrigin::Unreconciled,
        }
    }

    pub fn from_request(request: &InpatientRequest) -> Self {
        Self {
            patient: request.patient.clone(),
            visit: request.visit.clone(),
            bed: None,
            inpatient_admission: None,
            inpatient_request: Some(request.clone()),
            origin: WardPatientOrigin::Pending,
        }
    }

    pub fn patient_uuid(&self) -> &str {
        &self.patient.uuid
    }

    pub fn bed_number(&self) -> Option<&str> {
        self.bed.as_ref().map(|b| b.bed_number.as_str())
    }

    /// Date the patient arrived at the ward, if known.
    pub fn admitted_at(&self) -> Option<&str> {
        self.inpatient_admission
            .as_ref()
            .and_then(InpatientAdmission::admitted_at)
    }
}
