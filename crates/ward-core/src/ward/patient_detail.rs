//! One patient's in-patient stay, read from their active visit.
//!
//! A patient moved between wards carries several admission-like encounters in
//! the same visit; the latest admission or in-hospital transfer is the one that
//! placed them where they are now.

use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::debug;

use crate::config::{EncounterTypes, InpatientForm, WardConfig};
use crate::dates::{days_since, parse_datetime};
use crate::emr::{EmrApi, EmrResult};
use crate::models::{DispositionType, Encounter, InpatientRequest, Location, ResourceRef, Visit};

/// The patient's current stay as recorded in their active visit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InpatientDetail {
    pub visit: Option<Visit>,
    /// Latest admission or in-hospital transfer encounter.
    pub admission_encounter: Option<Encounter>,
    /// Exit-from-inpatient encounter, once the patient has left.
    pub discharge_encounter: Option<Encounter>,
    /// Location of the original admission encounter; its tags pick the forms.
    pub admission_location: Option<ResourceRef>,
}

fn encounter_time(encounter: &Encounter) -> Option<DateTime<FixedOffset>> {
    encounter.encounter_datetime.as_deref().and_then(parse_datetime)
}

/// Latest encounter by date. Undated encounters lose to dated ones, and ties
/// keep the earlier-listed encounter.
fn latest<'a>(encounters: impl Iterator<Item = &'a Encounter>) -> Option<&'a Encounter> {
    encounters.fold(None, |best, encounter| match best {
        Some(best) if encounter_time(best) >= encounter_time(encounter) => Some(best),
        _ => Some(encounter),
    })
}

impl InpatientDetail {
    pub fn from_visit(visit: Option<Visit>, types: &EncounterTypes) -> Self {
        let Some(visit) = visit else {
            return Self::default();
        };
        let admission_encounter = latest(visit.encounters.iter().filter(|e| {
            e.is_of_type(&types.admission) || e.is_of_type(&types.transfer_within_hospital)
        }))
        .cloned();
        let discharge_encounter = visit.first_encounter_of_type(&types.exit_from_inpatient).cloned();
        let admission_location = visit
            .first_encounter_of_type(&types.admission)
            .and_then(|e| e.location.clone());
        Self {
            visit: Some(visit),
            admission_encounter,
            discharge_encounter,
            admission_location,
        }
    }

    /// Admitted or transferred in, and not yet discharged.
    pub fn is_patient_admitted(&self) -> bool {
        self.admission_encounter.is_some() && self.discharge_encounter.is_none()
    }

    /// Whether the active visit is of the in-patient visit type.
    pub fn is_inpatient_visit(&self, inpatient_visit_type: &str) -> bool {
        self.visit
            .as_ref()
            .and_then(|v| v.visit_type.as_ref())
            .is_some_and(|t| t.uuid == inpatient_visit_type)
    }

    pub fn admitted_at(&self) -> Option<&str> {
        self.admission_encounter
            .as_ref()
            .and_then(|e| e.encounter_datetime.as_deref())
    }

    /// Whole days since the latest admission or transfer; zero when unknown.
    pub fn days_in_ward(&self, today: NaiveDate) -> i64 {
        self.admitted_at()
            .and_then(|at| days_since(at, today))
            .unwrap_or(0)
    }

    /// Ward the latest admission or transfer placed the patient in.
    pub fn current_ward(&self) -> Option<&ResourceRef> {
        self.admission_encounter.as_ref().and_then(|e| e.location.as_ref())
    }

    /// Encounter already filled with the given form in this visit.
    pub fn form_encounter(&self, form_uuid: &str) -> Option<&Encounter> {
        self.visit.as_ref().and_then(|v| {
            v.encounters
                .iter()
                .find(|e| e.form.as_ref().is_some_and(|f| f.uuid == form_uuid))
        })
    }
}

/// Forms offered for an admitted patient, limited by the admission ward's tags.
/// Nothing is offered once the patient is no longer admitted.
pub fn available_forms<'a>(
    config: &'a WardConfig,
    detail: &InpatientDetail,
    admission_ward: &Location,
) -> Vec<&'a InpatientForm> {
    if !detail.is_patient_admitted() {
        return Vec::new();
    }
    config.forms_for_ward(admission_ward)
}

/// Read the patient's active visit and derive their stay.
pub fn load_inpatient_detail(
    api: &dyn EmrApi,
    config: &WardConfig,
    patient_uuid: &str,
) -> EmrResult<InpatientDetail> {
    let visit = api.active_visit(patient_uuid)?;
    let detail = InpatientDetail::from_visit(visit, &config.encounter_types);
    debug!(
        patient = %patient_uuid,
        admitted = detail.is_patient_admitted(),
        "loaded inpatient detail"
    );
    Ok(detail)
}

/// Forms for the patient, resolving the admission ward's tags from the EMR.
pub fn inpatient_forms<'a>(
    api: &dyn EmrApi,
    config: &'a WardConfig,
    detail: &InpatientDetail,
) -> EmrResult<Vec<&'a InpatientForm>> {
    if !detail.is_patient_admitted() {
        return Ok(Vec::new());
    }
    let ward = match &detail.admission_location {
        Some(location) => api.location(&location.uuid)?,
        None => Location::default(),
    };
    Ok(available_forms(config, detail, &ward))
}

/// The patient's encounters that were filled with one of the in-patient forms.
pub fn patient_form_encounters(
    api: &dyn EmrApi,
    config: &WardConfig,
    patient_uuid: &str,
) -> EmrResult<Vec<Encounter>> {
    Ok(api
        .patient_encounters(patient_uuid)?
        .into_iter()
        .filter(|e| {
            e.form
                .as_ref()
                .is_some_and(|f| config.inpatient_forms.iter().any(|form| form.uuid == f.uuid))
        })
        .collect())
}

/// Pending admission requests for the patient, whichever ward they target.
pub fn admission_requests(api: &dyn EmrApi, patient_uuid: &str) -> EmrResult<Vec<InpatientRequest>> {
    api.patient_requests(patient_uuid, &[DispositionType::Admit])
}
