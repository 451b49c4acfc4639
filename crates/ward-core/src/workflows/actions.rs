use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{info, warn};

use super::{form_values_to_obs, AdmissionFormData, BedFeeStatus, Notification, Session};
use crate::context::WardViewContext;
use crate::dates::{self, PLACEHOLDER};
use crate::emr::{EmrApi, EmrError, EmrResult};
use crate::models::{DispositionType, EncounterPayload, EncounterProviderPayload, ObsPayload, WardPatient};

const ADMIT_FAILED: &str = "Failed to admit patient";
const ADMITTED: &str = "Patient admitted successfully";
const DISCHARGE_FAILED: &str = "Error discharging patient";
const TRANSFER_FAILED: &str = "Error creating transfer request";
const SWAP_FAILED: &str = "Failed to swap patient bed";
const UNASSIGN_FAILED: &str = "Failed to unassign bed";

/// Encounter date-time sent with admission encounters.
const ENCOUNTER_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

impl WardViewContext {
    /// Borrow the context's mutation capability for one session.
    pub fn actions(&mut self, session: Session) -> WardActions<'_> {
        WardActions {
            context: self,
            session,
        }
    }
}

/// Ward mutations on behalf of a signed-in user.
pub struct WardActions<'a> {
    context: &'a mut WardViewContext,
    session: Session,
}

fn patient_name(ward_patient: &WardPatient) -> &str {
    ward_patient.patient.display_name().unwrap_or(PLACEHOLDER)
}

/// Release whatever bed the patient currently holds, if any.
fn release_held_bed(api: &dyn EmrApi, patient_uuid: &str) -> EmrResult<()> {
    if let Some(held) = api.assigned_beds(patient_uuid)?.first() {
        api.remove_from_bed(held.bed_id, patient_uuid)?;
    }
    Ok(())
}

impl WardActions<'_> {
    fn providers(&self, role: &str) -> Vec<EncounterProviderPayload> {
        self.session
            .provider
            .iter()
            .map(|p| EncounterProviderPayload {
                provider: p.uuid.clone(),
                encounter_role: role.to_string(),
            })
            .collect()
    }

    /// Publish the outcome after re-fetching the ward.
    fn finish(&mut self, action: &str, patient_uuid: &str, notification: Notification) -> Notification {
        if notification.is_success() {
            info!(action, patient = patient_uuid, "ward workflow completed");
        } else {
            warn!(
                action,
                patient = patient_uuid,
                kind = ?notification.kind,
                subtitle = notification.subtitle.as_deref().unwrap_or_default(),
                "ward workflow did not complete"
            );
        }
        self.context.invalidate();
        notification
    }

    /// Admit (or accept the transfer of) a patient awaiting admission, then
    /// assign the chosen bed or release a bed the patient still holds.
    pub fn admit_patient(&mut self, ward_patient: &WardPatient, form: &AdmissionFormData) -> Notification {
        let outcome = self.try_admit(ward_patient, form);
        self.finish("admit", ward_patient.patient_uuid(), outcome)
    }

    fn try_admit(&self, ward_patient: &WardPatient, form: &AdmissionFormData) -> Notification {
        let config = self.context.config();
        let Some(ward_uuid) = self.context.location_uuid() else {
            return Notification::error(ADMIT_FAILED, "No ward location selected");
        };
        let Some(visit) = &ward_patient.visit else {
            return Notification::error(ADMIT_FAILED, "Patient has no active visit");
        };
        let disposition = ward_patient
            .inpatient_request
            .as_ref()
            .map(|r| r.disposition_type)
            .unwrap_or(DispositionType::Admit);
        let encounter_type = match disposition {
            DispositionType::Transfer => &config.encounter_types.transfer_within_hospital,
            _ => &config.encounter_types.admission,
        };

        let payload = EncounterPayload {
            patient: ward_patient.patient_uuid().to_string(),
            encounter_type: encounter_type.clone(),
            location: Some(ward_uuid.to_string()),
            visit: Some(visit.uuid.clone()),
            encounter_datetime: Some(form.admission_date.format(ENCOUNTER_DATETIME_FORMAT).to_string()),
            encounter_providers: self.providers(&config.roles.admission_provider),
            obs: form_values_to_obs(form, &config.concepts),
            form: None,
        };
        let api = self.context.api();
        let encounter = match api.create_encounter(&payload) {
            Ok(encounter) => encounter,
            Err(err) => {
                let field_errors = err.field_errors("encounterDatetime");
                let subtitle = if field_errors.is_empty() {
                    err.user_message()
                } else {
                    field_errors.join(", ")
                };
                return Notification::error(ADMIT_FAILED, subtitle);
            }
        };

        let view = self.context.view();
        let selected = form.bed_id.and_then(|bed_id| {
            view.beds
                .data()
                .and_then(|beds| beds.find_bed(bed_id))
                .map(|bed| (bed_id, bed.bed_number.clone()))
        });
        let patient_uuid = ward_patient.patient_uuid();
        let bed_outcome = match selected {
            Some((bed_id, bed_number)) => api
                .assign_bed(bed_id, patient_uuid, Some(&encounter.uuid))
                .map(|()| Some(bed_number)),
            None => release_held_bed(api, patient_uuid).map(|()| None),
        };

        match bed_outcome {
            Ok(Some(bed_number)) => Notification::success(
                ADMITTED,
                Some(format!(
                    "{} has been successfully admitted and assigned to bed {bed_number}",
                    patient_name(ward_patient)
                )),
            ),
            Ok(None) => {
                let ward_name = view.ward().map(|w| w.name().to_string());
                Notification::success(
                    ADMITTED,
                    Some(format!(
                        "Patient admitted successfully to {}",
                        ward_name.as_deref().unwrap_or(ward_uuid)
                    )),
                )
            }
            Err(err) => {
                warn!(patient = patient_uuid, error = %err, "bed update after admission failed");
                Notification::warning(
                    ADMITTED,
                    Some("Patient admitted successfully but failed to assign bed to patient".to_string()),
                )
            }
        }
    }

    /// Discharge a patient: exit encounter first, then release the bed.
    /// The bed is only touched once the encounter exists.
    pub fn discharge_patient(&mut self, ward_patient: &WardPatient) -> Notification {
        let outcome = match self.try_discharge(ward_patient) {
            Ok(()) => Notification::success("Patient was discharged", None),
            Err(message) => Notification::error(DISCHARGE_FAILED, message),
        };
        self.finish("discharge", ward_patient.patient_uuid(), outcome)
    }

    fn try_discharge(&self, ward_patient: &WardPatient) -> Result<(), String> {
        let config = self.context.config();
        let visit = ward_patient
            .visit
            .as_ref()
            .ok_or_else(|| "Patient has no active visit".to_string())?;
        let payload = EncounterPayload {
            patient: ward_patient.patient_uuid().to_string(),
            encounter_type: config.encounter_types.exit_from_inpatient.clone(),
            location: Some(self.session.location.uuid.clone()),
            visit: Some(visit.uuid.clone()),
            encounter_providers: self.providers(&config.roles.clinician),
            ..EncounterPayload::default()
        };
        let api = self.context.api();
        api.create_encounter(&payload)
            .map_err(|e| format!("Failed to create discharge encounter: {}", e.user_message()))?;

        if let Some(bed_id) = ward_patient.bed.as_ref().and_then(|b| b.id) {
            api.remove_from_bed(bed_id, ward_patient.patient_uuid())
                .map_err(|e| format!("Failed to remove patient from bed: {}", e.user_message()))?;
        }
        Ok(())
    }

    /// Ask for the patient to be moved to another ward.
    pub fn request_transfer(
        &mut self,
        ward_patient: &WardPatient,
        target_location_uuid: &str,
        note: Option<&str>,
    ) -> Notification {
        let outcome = match self.try_request_transfer(ward_patient, target_location_uuid, note) {
            Ok(()) => Notification::success("Patient transfer request created", None),
            Err(message) => Notification::error(TRANSFER_FAILED, message),
        };
        self.finish("transfer-request", ward_patient.patient_uuid(), outcome)
    }

    fn try_request_transfer(
        &self,
        ward_patient: &WardPatient,
        target_location_uuid: &str,
        note: Option<&str>,
    ) -> Result<(), String> {
        let config = self.context.config();
        if self.context.location_uuid() == Some(target_location_uuid) {
            return Err("Patient is already on this ward".to_string());
        }
        let visit = ward_patient
            .visit
            .as_ref()
            .ok_or_else(|| "Patient has no active visit".to_string())?;
        let concepts = &config.concepts;
        let mut obs = vec![
            ObsPayload::new(
                concepts.disposition.as_str(),
                concepts.transfer_within_hospital_disposition.as_str(),
            ),
            ObsPayload::new(concepts.internal_transfer_location.as_str(), target_location_uuid),
        ];
        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            obs.push(ObsPayload::new(concepts.clinical_note.as_str(), note));
        }
        let payload = EncounterPayload {
            patient: ward_patient.patient_uuid().to_string(),
            encounter_type: config.encounter_types.transfer_request.clone(),
            location: Some(self.session.location.uuid.clone()),
            visit: Some(visit.uuid.clone()),
            encounter_providers: self.providers(&config.roles.clinician),
            obs,
            ..EncounterPayload::default()
        };
        self.context
            .api()
            .create_encounter(&payload)
            .map(|_| ())
            .map_err(|e| e.user_message())
    }

    /// Move a patient to another bed on the same ward.
    pub fn swap_bed(&mut self, ward_patient: &WardPatient, bed_id: i64) -> Notification {
        let outcome = self.try_swap_bed(ward_patient, bed_id);
        self.finish("bed-swap", ward_patient.patient_uuid(), outcome)
    }

    fn try_swap_bed(&self, ward_patient: &WardPatient, bed_id: i64) -> Notification {
        let view = self.context.view();
        let Some(bed) = view.beds.data().and_then(|beds| beds.find_bed(bed_id)) else {
            return Notification::error(SWAP_FAILED, format!("Bed {bed_id} is not on this ward"));
        };
        if ward_patient.bed.as_ref().and_then(|b| b.id) == Some(bed_id) {
            return Notification::warning(
                "Patient already in bed",
                Some(format!("{} is already in bed {}", patient_name(ward_patient), bed.bed_number)),
            );
        }
        match self
            .context
            .api()
            .assign_bed(bed_id, ward_patient.patient_uuid(), None)
        {
            Ok(()) => Notification::success(
                "Bed swapped",
                Some(format!(
                    "{} moved to bed {}",
                    patient_name(ward_patient),
                    bed.bed_number
                )),
            ),
            Err(err) => Notification::error(SWAP_FAILED, err.user_message()),
        }
    }

    /// Daily bed fee billing for the patient's current stay, as of `today`.
    pub fn bed_fee_status(&self, ward_patient: &WardPatient, today: NaiveDate) -> EmrResult<BedFeeStatus> {
        let admitted_at = ward_patient.admitted_at();
        let days_in_ward = admitted_at
            .and_then(|at| dates::days_since(at, today))
            .unwrap_or(0);
        let since = admitted_at
            .and_then(dates::parse_datetime)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| today.and_time(NaiveTime::MIN).and_utc());
        let until = today
            .succ_opt()
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or_else(Utc::now);
        let bills = self
            .context
            .api()
            .patient_bills(ward_patient.patient_uuid(), since, until)?;
        Ok(BedFeeStatus::from_bills(
            &bills,
            &self.context.config().daily_bed_fee_service,
            days_in_ward,
        ))
    }

    /// Release the patient's bed once the daily bed fee is settled.
    pub fn unassign_bed(&mut self, ward_patient: &WardPatient, today: NaiveDate) -> Notification {
        let outcome = self.try_unassign_bed(ward_patient, today);
        self.finish("bed-unassign", ward_patient.patient_uuid(), outcome)
    }

    fn try_unassign_bed(&self, ward_patient: &WardPatient, today: NaiveDate) -> Notification {
        let Some(bed) = ward_patient.bed.as_ref() else {
            return Notification::warning("Patient has no bed", None);
        };
        let Some(bed_id) = bed.id else {
            return Notification::error(UNASSIGN_FAILED, "Bed has no id");
        };
        let status = match self.bed_fee_status(ward_patient, today) {
            Ok(status) => status,
            Err(err) => return Notification::error(UNASSIGN_FAILED, bill_error(&err)),
        };
        if !status.is_settled() {
            return Notification::warning(
                "Daily bed fee not settled",
                Some(format!(
                    "{} of {} bed days billed",
                    status.days_billed, status.days_in_ward
                )),
            );
        }
        match self
            .context
            .api()
            .remove_from_bed(bed_id, ward_patient.patient_uuid())
        {
            Ok(()) => Notification::success(
                "Bed released",
                Some(format!(
                    "{} removed from bed {}",
                    patient_name(ward_patient),
                    bed.bed_number
                )),
            ),
            Err(err) => Notification::error(UNASSIGN_FAILED, err.user_message()),
        }
    }
}

fn bill_error(err: &EmrError) -> String {
    format!("Could not load patient bills: {}", err.user_message())
}
