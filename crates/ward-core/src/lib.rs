//! Ward Core Library
//!
//! Inpatient ward occupancy, admission and discharge workflows against an
//! OpenMRS-style EMR.
//!
//! # Architecture
//!
//! ```text
//!   admission location ─┐
//!   inpatient admissions ─┼─► QueryCache ─► WardReconciler ─► WardView ─► readers
//!   inpatient requests ───┘        ▲                            │
//!   discharged encounters ─────────┘                            ▼
//!                                                          WardMetrics
//!                                                          table rows
//!
//!   WardActions (admit / discharge / transfer / bed) ─► EMR write ─► invalidate
//! ```
//!
//! Every EMR call goes through the [`emr::EmrApi`] seam. Reads are cached with
//! stale-while-revalidate semantics; writes always invalidate the view.
//!
//! # Modules
//!
//! - [`config`]: Typed, validated ward configuration
//! - [`models`]: EMR resources and the derived ward patient
//! - [`emr`]: EMR seam, REST client and in-memory EMR
//! - [`fetch`]: Request cache and the ward fetchers
//! - [`ward`]: Reconciler, metrics, line list and table rows
//! - [`context`]: Per-ward view context and readers
//! - [`workflows`]: Admit, discharge, transfer and bed workflows

pub mod config;
pub mod context;
pub mod dates;
pub mod emr;
pub mod fetch;
pub mod models;
pub mod ward;
pub mod workflows;

// Re-export commonly used types
pub use config::{ErrorPolicy, WardConfig};
pub use context::{ViewStatus, WardSource, WardView, WardViewContext, WardViewReader};
pub use emr::{EmrApi, EmrError, InMemoryEmr, RestEmrClient};
pub use fetch::{QueryCache, QueryState};
pub use models::{
    AdmissionLocation, Bed, BedLayout, InpatientAdmission, InpatientRequest, Patient, WardPatient,
};
pub use ward::{ReconciledWard, WardMetrics, WardPatientStatus, WardReconciler};
pub use workflows::{AdmissionFormData, Notification, NotificationKind, Session, WardActions};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDateTime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Seed data for [`open_demo_ward_view`].
pub const DEMO_FIXTURE: &str = include_str!("../fixtures/demo-ward.json");

/// Ward location of the demo fixture.
pub const DEMO_WARD_UUID: &str = "ba685651-ed3b-4e63-b0a1-6c9e3e0c1d2a";

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum WardCoreError {
    #[error("EMR error: {0}")]
    EmrError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<emr::EmrError> for WardCoreError {
    fn from(e: emr::EmrError) -> Self {
        WardCoreError::EmrError(e.user_message())
    }
}

impl From<config::ConfigError> for WardCoreError {
    fn from(e: config::ConfigError) -> Self {
        WardCoreError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for WardCoreError {
    fn from(e: serde_json::Error) -> Self {
        WardCoreError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for WardCoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        WardCoreError::InvalidInput(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install the global tracing subscriber. Later calls are no-ops.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) {
    let filter = filter
        .and_then(|f| tracing_subscriber::EnvFilter::try_new(f).ok())
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("ward_core=info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Open a ward view against a live EMR.
///
/// `config_toml` overrides the default configuration; its `[connection]`
/// table is replaced by `connection`.
#[uniffi::export]
pub fn open_ward_view(
    connection: FfiConnection,
    location_uuid: Option<String>,
    config_toml: Option<String>,
) -> Result<Arc<WardViewHandle>, WardCoreError> {
    let mut config = match config_toml {
        Some(text) => WardConfig::from_toml_str(&text)?,
        None => WardConfig::default(),
    };
    config.connection = connection.into();
    config.validate()?;
    let client = RestEmrClient::new(config.connection.clone())?;
    Ok(WardViewHandle::open(Arc::new(client), config, location_uuid))
}

/// Open a ward view over the bundled demo data (no network).
#[uniffi::export]
pub fn open_demo_ward_view(location_uuid: Option<String>) -> Result<Arc<WardViewHandle>, WardCoreError> {
    let emr = InMemoryEmr::from_json(DEMO_FIXTURE)?;
    let location_uuid = location_uuid.or_else(|| Some(DEMO_WARD_UUID.to_string()));
    Ok(WardViewHandle::open(Arc::new(emr), WardConfig::default(), location_uuid))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe ward view for FFI. One writer at a time.
#[derive(uniffi::Object)]
pub struct WardViewHandle {
    context: Mutex<WardViewContext>,
}

impl WardViewHandle {
    pub fn open(api: Arc<dyn EmrApi>, config: WardConfig, location_uuid: Option<String>) -> Arc<Self> {
        let context = WardViewContext::new(api, Arc::new(config), location_uuid.as_deref());
        Arc::new(Self {
            context: Mutex::new(context),
        })
    }

    fn with_patient<F>(&self, patient_uuid: &str, action: F) -> Result<FfiNotification, WardCoreError>
    where
        F: FnOnce(&mut WardViewContext, &WardPatient) -> Notification,
    {
        let mut context = self.context.lock()?;
        let view = context.view();
        let ward_patient = find_ward_patient(&view, patient_uuid)
            .ok_or_else(|| WardCoreError::NotFound(format!("patient {patient_uuid} on this ward")))?;
        Ok(action(&mut *context, &ward_patient).into())
    }
}

fn find_ward_patient(view: &WardView, patient_uuid: &str) -> Option<WardPatient> {
    let ward = view.reconciled.as_ref()?;
    ward.find_patient(patient_uuid)
        .map(|p| p.ward_patient.clone())
        .or_else(|| {
            ward.awaiting_admission
                .iter()
                .find(|p| p.patient_uuid() == patient_uuid)
                .cloned()
        })
}

fn today() -> chrono::NaiveDate {
    Local::now().date_naive()
}

fn patient_page<'a>(
    patients: impl Iterator<Item = &'a WardPatient>,
    to_row: fn(&WardPatient, chrono::NaiveDate) -> ward::PatientRow,
    query: Option<String>,
    page: u32,
    page_size: u32,
) -> FfiPatientPage {
    let today = today();
    let rows: Vec<ward::PatientRow> = patients.map(|p| to_row(p, today)).collect();
    let rows = ward::search_rows(rows, query.as_deref().unwrap_or_default());
    ward::paginate(&rows, page_size as usize, page as usize).into()
}

#[uniffi::export]
impl WardViewHandle {
    // =========================================================================
    // View Operations
    // =========================================================================

    /// Fetch stale or missing sources and return the ward summary.
    pub fn refresh(&self) -> Result<FfiWardSummary, WardCoreError> {
        let mut context = self.context.lock()?;
        Ok(context.refresh().as_ref().into())
    }

    /// Re-fetch everything, e.g. when the screen regains focus.
    pub fn revalidate(&self) -> Result<FfiWardSummary, WardCoreError> {
        let mut context = self.context.lock()?;
        Ok(context.revalidate_on_focus().as_ref().into())
    }

    /// Summary of the last published view, without fetching.
    pub fn summary(&self) -> Result<FfiWardSummary, WardCoreError> {
        let context = self.context.lock()?;
        Ok(context.view().as_ref().into())
    }

    /// Bed layout of the ward, in layout order.
    pub fn beds(&self) -> Result<Vec<FfiBed>, WardCoreError> {
        let context = self.context.lock()?;
        let view = context.view();
        Ok(view
            .beds
            .data()
            .map(|beds| beds.bed_layouts.iter().map(FfiBed::from).collect())
            .unwrap_or_default())
    }

    // =========================================================================
    // Table Operations
    // =========================================================================

    /// Admitted patients (including unreconciled bed occupants).
    pub fn admitted_patients(
        &self,
        query: Option<String>,
        page: u32,
        page_size: u32,
    ) -> Result<FfiPatientPage, WardCoreError> {
        let context = self.context.lock()?;
        let view = context.view();
        let Some(ward) = view.reconciled.as_ref() else {
            return Ok(patient_page(std::iter::empty(), ward::admitted_row, query, page, page_size));
        };
        let patients = ward.admitted().chain(ward.unreconciled());
        Ok(patient_page(patients, ward::admitted_row, query, page, page_size))
    }

    /// Patients with a discharge encounter still holding a bed.
    pub fn discharge_in_patients(
        &self,
        query: Option<String>,
        page: u32,
        page_size: u32,
    ) -> Result<FfiPatientPage, WardCoreError> {
        let context = self.context.lock()?;
        let view = context.view();
        let Some(ward) = view.reconciled.as_ref() else {
            return Ok(patient_page(std::iter::empty(), ward::admitted_row, query, page, page_size));
        };
        Ok(patient_page(
            ward.discharge_in_transit(),
            ward::admitted_row,
            query,
            page,
            page_size,
        ))
    }

    pub fn awaiting_admission_patients(
        &self,
        query: Option<String>,
        page: u32,
        page_size: u32,
    ) -> Result<FfiPatientPage, WardCoreError> {
        let context = self.context.lock()?;
        let view = context.view();
        let Some(ward) = view.reconciled.as_ref() else {
            return Ok(patient_page(std::iter::empty(), ward::awaiting_row, query, page, page_size));
        };
        Ok(patient_page(
            ward.awaiting_admission.iter(),
            ward::awaiting_row,
            query,
            page,
            page_size,
        ))
    }

    /// One server-side page of discharged patients.
    pub fn discharged_patients(&self, page: u32, page_size: u32) -> Result<FfiDischargedPage, WardCoreError> {
        let mut context = self.context.lock()?;
        let view = context.set_discharged_page(page as usize, page_size as usize);
        if let Some(err) = view.discharged.error() {
            return Err(WardCoreError::EmrError(err.user_message()));
        }
        let (rows, total): (Vec<ward::DischargedRow>, usize) = view
            .discharged
            .data()
            .map(|d| (d.encounters.iter().map(ward::discharged_row).collect(), d.total))
            .unwrap_or_default();
        Ok(FfiDischargedPage {
            rows: rows.into_iter().map(FfiDischargedRow::from).collect(),
            current_page: page.max(1),
            total_items: total as u64,
        })
    }

    /// Every non-mortuary ward with occupancy, plus hospital totals.
    pub fn ward_line_list(&self) -> Result<FfiLineList, WardCoreError> {
        let context = self.context.lock()?;
        let (lines, summary) = ward::ward_line_list(context.api(), context.config())?;
        Ok(FfiLineList {
            wards: lines.into_iter().map(FfiWardLine::from).collect(),
            total_beds: summary.total_beds,
            occupied_beds: summary.occupied_beds,
            free_beds: summary.free_beds,
            occupancy: ward::format_percent(summary.occupancy_percent),
            admitted_patients: summary.admitted_patients as u64,
        })
    }

    // =========================================================================
    // Workflow Operations
    // =========================================================================

    pub fn admit_patient(
        &self,
        session: FfiSession,
        patient_uuid: String,
        form: FfiAdmissionForm,
    ) -> Result<FfiNotification, WardCoreError> {
        let form = AdmissionFormData::try_from(form)?;
        self.with_patient(&patient_uuid, |context, patient| {
            context.actions(session.into()).admit_patient(patient, &form)
        })
    }

    pub fn discharge_patient(
        &self,
        session: FfiSession,
        patient_uuid: String,
    ) -> Result<FfiNotification, WardCoreError> {
        self.with_patient(&patient_uuid, |context, patient| {
            context.actions(session.into()).discharge_patient(patient)
        })
    }

    pub fn request_transfer(
        &self,
        session: FfiSession,
        patient_uuid: String,
        target_location_uuid: String,
        note: Option<String>,
    ) -> Result<FfiNotification, WardCoreError> {
        self.with_patient(&patient_uuid, |context, patient| {
            context
                .actions(session.into())
                .request_transfer(patient, &target_location_uuid, note.as_deref())
        })
    }

    pub fn swap_bed(
        &self,
        session: FfiSession,
        patient_uuid: String,
        bed_id: i64,
    ) -> Result<FfiNotification, WardCoreError> {
        self.with_patient(&patient_uuid, |context, patient| {
            context.actions(session.into()).swap_bed(patient, bed_id)
        })
    }

    /// Release the patient's bed if the daily bed fee is settled.
    pub fn unassign_bed(
        &self,
        session: FfiSession,
        patient_uuid: String,
    ) -> Result<FfiNotification, WardCoreError> {
        self.with_patient(&patient_uuid, |context, patient| {
            context.actions(session.into()).unassign_bed(patient, today())
        })
    }

    // =========================================================================
    // Patient Detail Operations
    // =========================================================================

    /// The patient's current stay, with the forms offered for it.
    pub fn inpatient_detail(&self, patient_uuid: String) -> Result<FfiInpatientDetail, WardCoreError> {
        let context = self.context.lock()?;
        let (api, config) = (context.api(), context.config());
        let detail = ward::load_inpatient_detail(api, config, &patient_uuid)?;
        let forms = ward::inpatient_forms(api, config, &detail)?
            .into_iter()
            .map(|form| FfiInpatientForm {
                uuid: form.uuid.clone(),
                label: form.label.clone(),
                encounter_uuid: detail.form_encounter(&form.uuid).map(|e| e.uuid.clone()),
            })
            .collect();
        let admission_request_wards = ward::admission_requests(api, &patient_uuid)?
            .into_iter()
            .filter_map(|r| r.disposition_location.map(|l| l.label().to_string()))
            .collect();
        Ok(FfiInpatientDetail {
            admitted: detail.is_patient_admitted(),
            inpatient_visit: detail.is_inpatient_visit(&config.inpatient_visit_type),
            admitted_at: detail.admitted_at().map(|at| dates::format_table_datetime(Some(at))),
            days_in_ward: detail.days_in_ward(today()),
            ward_name: detail.current_ward().map(|w| w.label().to_string()),
            forms,
            admission_request_wards,
        })
    }

    /// Encounters the patient has on the in-patient forms.
    pub fn patient_form_encounters(&self, patient_uuid: String) -> Result<Vec<FfiOption>, WardCoreError> {
        let context = self.context.lock()?;
        Ok(ward::patient_form_encounters(context.api(), context.config(), &patient_uuid)?
            .into_iter()
            .map(|e| FfiOption {
                label: e.form.as_ref().map_or_else(|| e.uuid.clone(), |f| f.label().to_string()),
                uuid: e.uuid,
            })
            .collect())
    }

    /// Diagnoses matching a name; queries under three characters return nothing.
    pub fn search_diagnoses(&self, query: String) -> Result<Vec<FfiOption>, WardCoreError> {
        let context = self.context.lock()?;
        let source = &context.config().diagnosis_concept_source;
        Ok(workflows::search_diagnoses(context.api(), source, &query)?
            .into_iter()
            .map(|d| FfiOption {
                uuid: d.uuid,
                label: d.display,
            })
            .collect())
    }

    pub fn providers(&self) -> Result<Vec<FfiOption>, WardCoreError> {
        let context = self.context.lock()?;
        Ok(workflows::provider_options(context.api())?
            .into_iter()
            .map(|p| FfiOption {
                label: p.label().to_string(),
                uuid: p.uuid,
            })
            .collect())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe EMR connection settings.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConnection {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl From<FfiConnection> for config::EmrConnection {
    fn from(c: FfiConnection) -> Self {
        config::EmrConnection {
            base_url: c.base_url,
            username: c.username,
            password: c.password,
            timeout_secs: c.timeout_secs,
            bed_management: None,
        }
    }
}

/// FFI-safe session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSession {
    pub location_uuid: String,
    pub provider_uuid: Option<String>,
}

impl From<FfiSession> for Session {
    fn from(s: FfiSession) -> Self {
        Session::new(s.location_uuid, s.provider_uuid)
    }
}

/// FFI-safe admission form. `admission_date` is `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAdmissionForm {
    pub bed_id: Option<i64>,
    pub admission_date: String,
    pub diagnosis: Option<String>,
    pub primary_doctor: Option<String>,
    pub primary_doctor_phone_number: Option<String>,
    pub emergency_doctor: Option<String>,
    pub emergency_doctor_phone_number: Option<String>,
    pub payment_mode: Option<String>,
    pub insurance_type: Option<String>,
    pub other_insurance_type: Option<String>,
}

impl TryFrom<FfiAdmissionForm> for AdmissionFormData {
    type Error = WardCoreError;

    fn try_from(form: FfiAdmissionForm) -> Result<Self, Self::Error> {
        let admission_date =
            NaiveDateTime::parse_from_str(&form.admission_date, workflows::ADMISSION_DATETIME_FORMAT)
                .map_err(|e| WardCoreError::InvalidInput(format!("admission_date: {e}")))?;
        Ok(AdmissionFormData {
            bed_id: form.bed_id,
            admission_date,
            diagnosis: form.diagnosis,
            primary_doctor: form.primary_doctor,
            primary_doctor_phone_number: form.primary_doctor_phone_number,
            emergency_doctor: form.emergency_doctor,
            emergency_doctor_phone_number: form.emergency_doctor_phone_number,
            payment_mode: form.payment_mode,
            insurance_type: form.insurance_type,
            other_insurance_type: form.other_insurance_type,
        })
    }
}

/// FFI-safe notification.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNotification {
    pub kind: String,
    pub title: String,
    pub subtitle: Option<String>,
}

impl From<Notification> for FfiNotification {
    fn from(n: Notification) -> Self {
        Self {
            kind: format!("{:?}", n.kind),
            title: n.title,
            subtitle: n.subtitle,
        }
    }
}

/// FFI-safe ward header summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWardSummary {
    pub status: String,
    pub error: Option<String>,
    pub source_errors: Vec<String>,
    pub ward_name: Option<String>,
    pub total_beds: u32,
    pub occupied_beds: u32,
    pub free_beds: u32,
    pub occupancy: String,
    pub admitted: u64,
    pub discharge_in_transit: u64,
    pub discharged: Option<u64>,
    pub awaiting_admission: u64,
    pub unreconciled: u64,
}

impl From<&WardView> for FfiWardSummary {
    fn from(view: &WardView) -> Self {
        let metrics = view.metrics.as_ref();
        let count = |f: fn(&WardMetrics) -> usize| metrics.map_or(0, |m| f(m) as u64);
        Self {
            status: format!("{:?}", view.status()),
            error: view.error.as_ref().map(|e| e.user_message()),
            source_errors: view
                .source_errors
                .iter()
                .map(|(source, e)| format!("{source:?}: {}", e.user_message()))
                .collect(),
            ward_name: view.ward().map(|w| w.name().to_string()),
            total_beds: metrics.map_or(0, |m| m.total_beds),
            occupied_beds: metrics.map_or(0, |m| m.occupied_beds),
            free_beds: metrics.map_or(0, |m| m.free_beds),
            occupancy: metrics.map_or_else(|| ward::format_percent(0.0), |m| m.occupancy_display()),
            admitted: count(|m| m.admitted),
            discharge_in_transit: count(|m| m.discharge_in_transit),
            discharged: metrics.and_then(|m| m.discharged).map(|d| d as u64),
            awaiting_admission: count(|m| m.awaiting_admission),
            unreconciled: count(|m| m.unreconciled),
        }
    }
}

/// FFI-safe bed.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBed {
    pub bed_id: Option<i64>,
    pub bed_number: String,
    pub status: String,
    pub patient_uuids: Vec<String>,
}

impl From<&BedLayout> for FfiBed {
    fn from(layout: &BedLayout) -> Self {
        Self {
            bed_id: layout.bed_id,
            bed_number: layout.bed_number.clone(),
            status: format!("{:?}", layout.status),
            patient_uuids: layout.patients.iter().map(|p| p.uuid.clone()).collect(),
        }
    }
}

/// FFI-safe table row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientRow {
    pub patient_uuid: String,
    pub date: String,
    pub id_number: String,
    pub name: String,
    pub gender: String,
    pub age: String,
    pub bed_number: String,
    pub days: String,
}

impl From<ward::PatientRow> for FfiPatientRow {
    fn from(row: ward::PatientRow) -> Self {
        Self {
            patient_uuid: row.patient_uuid,
            date: row.date,
            id_number: row.id_number,
            name: row.name,
            gender: row.gender,
            age: row.age,
            bed_number: row.bed_number,
            days: row.days,
        }
    }
}

/// FFI-safe page of table rows.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientPage {
    pub rows: Vec<FfiPatientRow>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl From<ward::Page<ward::PatientRow>> for FfiPatientPage {
    fn from(page: ward::Page<ward::PatientRow>) -> Self {
        Self {
            rows: page.items.into_iter().map(FfiPatientRow::from).collect(),
            current_page: page.current_page as u32,
            total_pages: page.total_pages as u32,
            total_items: page.total_items as u64,
        }
    }
}

/// FFI-safe discharged-patient row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDischargedRow {
    pub encounter_uuid: String,
    pub patient_uuid: String,
    pub discharge_date: String,
    pub id_number: String,
    pub name: String,
}

impl From<ward::DischargedRow> for FfiDischargedRow {
    fn from(row: ward::DischargedRow) -> Self {
        Self {
            encounter_uuid: row.encounter_uuid,
            patient_uuid: row.patient_uuid,
            discharge_date: row.discharge_date,
            id_number: row.id_number,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDischargedPage {
    pub rows: Vec<FfiDischargedRow>,
    pub current_page: u32,
    pub total_items: u64,
}

/// FFI-safe line list row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWardLine {
    pub ward_uuid: String,
    pub ward_name: String,
    pub total_beds: u32,
    pub occupied_beds: u32,
    pub free_beds: u32,
    pub occupancy: String,
    pub pending_out: Option<u64>,
}

impl From<ward::WardLine> for FfiWardLine {
    fn from(line: ward::WardLine) -> Self {
        Self {
            occupancy: line.occupancy_display(),
            ward_uuid: line.ward_uuid,
            ward_name: line.ward_name,
            total_beds: line.total_beds,
            occupied_beds: line.occupied_beds,
            free_beds: line.free_beds,
            pending_out: line.pending_out.map(|p| p as u64),
        }
    }
}

/// FFI-safe picker entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOption {
    pub uuid: String,
    pub label: String,
}

/// FFI-safe in-patient form, with the encounter already filled in this visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInpatientForm {
    pub uuid: String,
    pub label: String,
    pub encounter_uuid: Option<String>,
}

/// FFI-safe in-patient detail.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInpatientDetail {
    pub admitted: bool,
    pub inpatient_visit: bool,
    pub admitted_at: Option<String>,
    pub days_in_ward: i64,
    pub ward_name: Option<String>,
    pub forms: Vec<FfiInpatientForm>,
    /// Wards targeted by the patient's pending admission requests.
    pub admission_request_wards: Vec<String>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLineList {
    pub wards: Vec<FfiWardLine>,
    pub total_beds: u32,
    pub occupied_beds: u32,
    pub free_beds: u32,
    pub occupancy: String,
    pub admitted_patients: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> FfiSession {
        FfiSession {
            location_uuid: DEMO_WARD_UUID.to_string(),
            provider_uuid: Some("prov-1".to_string()),
        }
    }

    #[test]
    fn test_demo_view_summary() {
        let handle = open_demo_ward_view(None).unwrap();
        let summary = handle.refresh().unwrap();
        assert_eq!(summary.status, "Ready");
        assert_eq!(summary.ward_name.as_deref(), Some("Female Medical Ward"));
        assert_eq!(summary.total_beds, 4);
        assert_eq!(summary.occupied_beds, 3);
        assert_eq!(summary.free_beds, 1);
        assert_eq!(summary.occupancy, "75.00%");
        assert_eq!(summary.admitted, 2);
        assert_eq!(summary.discharge_in_transit, 1);
        assert_eq!(summary.unreconciled, 1);
        assert_eq!(summary.awaiting_admission, 1);
        assert_eq!(summary.discharged, Some(2));
    }

    #[test]
    fn test_demo_tables() {
        let handle = open_demo_ward_view(None).unwrap();
        handle.refresh().unwrap();

        let admitted = handle.admitted_patients(None, 1, 10).unwrap();
        assert_eq!(admitted.total_items, 3);
        let searched = handle.admitted_patients(Some("joyce".into()), 1, 10).unwrap();
        assert_eq!(searched.rows.len(), 1);
        assert_eq!(searched.rows[0].id_number, "MGV7T");
        assert_eq!(searched.rows[0].bed_number, "FMW-1");

        let awaiting = handle.awaiting_admission_patients(None, 1, 10).unwrap();
        assert_eq!(awaiting.rows[0].name, "Grace Achieng");

        let discharged = handle.discharged_patients(1, 1).unwrap();
        assert_eq!(discharged.rows.len(), 1);
        assert_eq!(discharged.total_items, 2);
    }

    #[test]
    fn test_demo_line_list_hides_mortuary() {
        let handle = open_demo_ward_view(None).unwrap();
        let list = handle.ward_line_list().unwrap();
        assert_eq!(list.wards.len(), 1);
        assert_eq!(list.wards[0].pending_out, Some(1));
        assert_eq!(list.total_beds, 4);
    }

    #[test]
    fn test_discharge_through_handle() {
        let handle = open_demo_ward_view(None).unwrap();
        handle.refresh().unwrap();
        let notification = handle.discharge_patient(session(), "p-peter".into()).unwrap();
        assert_eq!(notification.kind, "Success");
        let summary = handle.summary().unwrap();
        assert_eq!(summary.discharge_in_transit, 0);
        assert_eq!(summary.occupied_beds, 2);
    }

    #[test]
    fn test_unknown_patient_is_not_found() {
        let handle = open_demo_ward_view(None).unwrap();
        handle.refresh().unwrap();
        let err = handle.discharge_patient(session(), "nobody".into()).unwrap_err();
        assert!(matches!(err, WardCoreError::NotFound(_)));
    }

    #[test]
    fn test_admission_form_date_validated() {
        let form = FfiAdmissionForm {
            bed_id: None,
            admission_date: "yesterday".into(),
            diagnosis: None,
            primary_doctor: None,
            primary_doctor_phone_number: None,
            emergency_doctor: None,
            emergency_doctor_phone_number: None,
            payment_mode: None,
            insurance_type: None,
            other_insurance_type: None,
        };
        assert!(matches!(
            AdmissionFormData::try_from(form),
            Err(WardCoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_demo_inpatient_detail() {
        let handle = open_demo_ward_view(None).unwrap();
        let detail = handle.inpatient_detail("p-joyce".into()).unwrap();
        assert!(detail.admitted);
        assert!(detail.inpatient_visit);
        assert_eq!(detail.ward_name.as_deref(), Some("Female Medical Ward"));
        let labels: Vec<&str> = detail.forms.iter().map(|f| f.label.as_str()).collect();
        assert!(labels.contains(&"Inpatient Discharge form"));
        assert!(!labels.contains(&"Partograph Form"));

        let samuel = handle.inpatient_detail("p-samuel".into()).unwrap();
        assert!(!samuel.admitted);
        assert!(samuel.forms.is_empty());
    }

    #[test]
    fn test_demo_admission_pickers() {
        let handle = open_demo_ward_view(None).unwrap();
        let diagnoses = handle.search_diagnoses("mal".into()).unwrap();
        assert_eq!(diagnoses.len(), 1);
        assert_eq!(diagnoses[0].label, "1F4Z-Malaria");
        assert!(handle.search_diagnoses("ma".into()).unwrap().is_empty());

        let providers = handle.providers().unwrap();
        assert_eq!(providers[0].label, "Dr. Akinyi Mwangi");
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(Some("ward_core=debug".into()));
        init_logging(None);
    }
}
