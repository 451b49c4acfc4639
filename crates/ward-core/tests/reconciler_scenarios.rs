//! Ward scenarios driven through the view context and the in-memory EMR.

use std::sync::Arc;

use ward_core::config::{ErrorPolicy, WardConfig};
use ward_core::context::{ViewStatus, WardSource, WardViewContext};
use ward_core::emr::{EmrApi, EmrOperation, InMemoryEmr};
use ward_core::fetch::{InpatientRequestQuery, Query, QueryCache, QueryState};
use ward_core::models::{
    AdmissionLocation, BedLayout, DispositionType, Encounter, InpatientAdmission, InpatientRequest,
    Location, Patient, ResourceRef, Visit,
};
use ward_core::ward::WardPatientStatus;

const WARD: &str = "3a1e7c52-8f40-4b6e-9d3c-5b2a1f0e9c77";

fn ward(total: u32, occupants: &[Option<&str>]) -> AdmissionLocation {
    AdmissionLocation {
        ward: Location {
            uuid: WARD.to_string(),
            display: Some("Ward L".to_string()),
            tags: Vec::new(),
        },
        total_beds: total,
        occupied_beds: occupants.iter().filter(|o| o.is_some()).count() as u32,
        bed_layouts: occupants
            .iter()
            .enumerate()
            .map(|(i, occupant)| BedLayout {
                bed_number: format!("{}", i + 1),
                bed_id: Some(i as i64 + 1),
                patients: occupant.iter().map(|uuid| Patient::stub(*uuid, *uuid)).collect(),
                ..BedLayout::default()
            })
            .collect(),
    }
}

fn admission(patient: &str, encounters: Vec<Encounter>) -> InpatientAdmission {
    let visit = Visit {
        uuid: format!("v-{patient}"),
        encounters,
        ..Visit::default()
    };
    let mut admission = InpatientAdmission::new(Patient::stub(patient, patient), Some(visit));
    admission.current_inpatient_location = Some(ResourceRef::new(WARD));
    admission
}

fn request(patient: &str, kind: DispositionType) -> InpatientRequest {
    InpatientRequest {
        disposition_type: kind,
        disposition_location: Some(ResourceRef::new(WARD)),
        disposition: None,
        disposition_encounter: None,
        patient: Patient::stub(patient, patient),
        visit: None,
    }
}

fn context(emr: Arc<InMemoryEmr>, config: WardConfig) -> WardViewContext {
    WardViewContext::new(emr, Arc::new(config), Some(WARD))
}

#[test]
fn test_one_admitted_one_free_bed() {
    let emr = Arc::new(InMemoryEmr::new());
    emr.add_admission_location(ward(2, &[Some("P1"), None]));
    emr.add_admission(admission("P1", Vec::new()));

    let mut ctx = context(emr, WardConfig::default());
    let view = ctx.refresh();
    let metrics = view.metrics.as_ref().unwrap();
    assert_eq!(metrics.admitted, 1);
    assert_eq!(metrics.free_beds, 1);
    assert_eq!(metrics.occupancy_display(), "50.00%");

    let ward = view.reconciled.as_ref().unwrap();
    assert_eq!(ward.find_patient("P1").unwrap().status, WardPatientStatus::Admitted);
}

#[test]
fn test_orphan_occupant_is_kept_but_not_typed() {
    let emr = Arc::new(InMemoryEmr::new());
    emr.add_admission_location(ward(1, &[Some("P2")]));

    let mut ctx = context(emr, WardConfig::default());
    let view = ctx.refresh();
    let ward = view.reconciled.as_ref().unwrap();
    let orphan = ward.find_patient("P2").unwrap();
    assert_eq!(orphan.status, WardPatientStatus::Unreconciled);
    assert!(orphan.ward_patient.visit.is_none());
    assert!(orphan.ward_patient.inpatient_admission.is_none());
    assert!(orphan.ward_patient.inpatient_request.is_none());

    let metrics = view.metrics.as_ref().unwrap();
    assert_eq!(metrics.admitted, 0);
    assert_eq!(metrics.discharge_in_transit, 0);
    assert_eq!(metrics.unreconciled, 1);
    assert_eq!(metrics.occupied_beds, 1);
}

#[test]
fn test_discharge_encounter_marks_in_transit() {
    let config = WardConfig::default();
    let discharge = Encounter {
        uuid: "e-dc".into(),
        encounter_type: Some(ResourceRef::new(config.encounter_types.ipd_discharge.clone())),
        ..Encounter::default()
    };
    let emr = Arc::new(InMemoryEmr::new());
    emr.add_admission_location(ward(2, &[Some("P1"), Some("P3")]));
    emr.add_admission(admission("P1", Vec::new()));
    emr.add_admission(admission("P3", vec![discharge]));

    let mut ctx = context(emr, config);
    let view = ctx.refresh();
    let ward = view.reconciled.as_ref().unwrap();
    assert_eq!(ward.find_patient("P3").unwrap().status, WardPatientStatus::DischargeInTransit);
    assert_eq!(view.metrics.as_ref().unwrap().discharge_in_transit, 1);
    assert_eq!(view.metrics.as_ref().unwrap().admitted, 1);
}

#[test]
fn test_admit_only_requests() {
    let emr = InMemoryEmr::new();
    emr.add_request(request("R1", DispositionType::Admit));
    emr.add_request(request("R2", DispositionType::Admit));
    emr.add_request(request("R3", DispositionType::Transfer));

    let query = InpatientRequestQuery::with_types(Some(WARD), &[DispositionType::Admit]);
    let requests = query.fetch(&emr).unwrap();
    assert_eq!(requests.len(), 2);

    let mut cache = QueryCache::new();
    let all = cache.run(&emr, &InpatientRequestQuery::new(Some(WARD)));
    assert_eq!(all.data().unwrap().len(), 3);
}

#[test]
fn test_whole_view_error_uses_first_failing_source() {
    let emr = Arc::new(InMemoryEmr::new());
    emr.add_admission_location(ward(1, &[Some("P1")]));
    emr.fail(EmrOperation::InpatientAdmissions);
    emr.fail(EmrOperation::InpatientRequests);

    let mut ctx = context(emr.clone(), WardConfig::default());
    let view = ctx.refresh();
    assert_eq!(view.status(), ViewStatus::Error);
    assert!(view.reconciled.is_none());
    let error = view.error.as_ref().unwrap();
    assert!(Arc::ptr_eq(error, view.source_error(WardSource::Admissions).unwrap()));

    emr.recover(EmrOperation::InpatientAdmissions);
    emr.recover(EmrOperation::InpatientRequests);
    let view = ctx.invalidate();
    assert_eq!(view.status(), ViewStatus::Ready);
}

#[test]
fn test_partial_policy_reports_each_source() {
    let emr = Arc::new(InMemoryEmr::new());
    emr.add_admission_location(ward(1, &[Some("P1")]));
    emr.add_admission(admission("P1", Vec::new()));
    emr.fail(EmrOperation::AdmissionLocation);

    let config = WardConfig {
        error_policy: ErrorPolicy::Partial,
        ..WardConfig::default()
    };
    let mut ctx = context(emr, config);
    let view = ctx.refresh();
    assert_eq!(view.status(), ViewStatus::Ready);
    assert!(view.source_error(WardSource::Beds).is_some());
    let ward = view.reconciled.as_ref().unwrap();
    assert!(ward.bed_patients.is_empty());
    assert_eq!(ward.unassigned_patients.len(), 1);
    assert_eq!(view.metrics.as_ref().unwrap().admitted, 1);
}

#[test]
fn test_failed_revalidation_keeps_awaiting_patients() {
    let emr = Arc::new(InMemoryEmr::new());
    emr.add_admission_location(ward(2, &[Some("P1"), None]));
    emr.add_admission(admission("P1", Vec::new()));
    emr.add_request(request("R1", DispositionType::Admit));

    let config = WardConfig {
        error_policy: ErrorPolicy::Partial,
        ..WardConfig::default()
    };
    let mut ctx = context(emr.clone(), config);
    let view = ctx.refresh();
    assert_eq!(view.metrics.as_ref().unwrap().awaiting_admission, 1);

    emr.fail(EmrOperation::InpatientRequests);
    let view = ctx.revalidate_on_focus();
    assert_eq!(view.status(), ViewStatus::Ready);
    assert!(matches!(view.requests, QueryState::Stale { .. }));
    assert!(view.requests.data().is_some());
    assert!(view.source_error(WardSource::Requests).is_some());
    assert_eq!(view.metrics.as_ref().unwrap().awaiting_admission, 1);
}

#[test]
fn test_no_bed_management_is_not_an_error() {
    let emr = Arc::new(InMemoryEmr::without_bed_management());
    emr.add_admission(admission("P1", Vec::new()));

    let mut ctx = context(emr.clone(), WardConfig::default());
    let view = ctx.refresh();
    assert!(matches!(view.beds, QueryState::NotApplicable));
    assert_eq!(view.status(), ViewStatus::Ready);
    assert_eq!(emr.call_count(EmrOperation::AdmissionLocation), 0);
    assert_eq!(view.metrics.as_ref().unwrap().admitted, 1);
    assert_eq!(view.metrics.as_ref().unwrap().total_beds, 0);
}

#[test]
fn test_unchanged_revalidation_keeps_identity() {
    let emr = Arc::new(InMemoryEmr::new());
    emr.add_admission_location(ward(1, &[Some("P1")]));
    emr.add_admission(admission("P1", Vec::new()));

    let mut ctx = context(emr.clone(), WardConfig::default());
    let first = ctx.refresh();
    let second = ctx.invalidate();
    assert!(Arc::ptr_eq(
        first.reconciled.as_ref().unwrap(),
        second.reconciled.as_ref().unwrap()
    ));
    assert_eq!(ctx.reconcile_runs(), 1);

    emr.set_admissions(vec![admission("P1", Vec::new()), admission("P4", Vec::new())]);
    let third = ctx.invalidate();
    assert!(!Arc::ptr_eq(
        first.reconciled.as_ref().unwrap(),
        third.reconciled.as_ref().unwrap()
    ));
    assert_eq!(ctx.reconcile_runs(), 2);
    assert_eq!(third.metrics.as_ref().unwrap().admitted, 2);
}

#[test]
fn test_readers_follow_the_owner() {
    let emr = Arc::new(InMemoryEmr::new());
    emr.add_admission_location(ward(1, &[Some("P1")]));

    let mut ctx = context(emr, WardConfig::default());
    let reader = ctx.reader();
    let child = reader.clone();
    assert_eq!(reader.current().status(), ViewStatus::Loading);
    ctx.refresh();
    assert_eq!(child.current().status(), ViewStatus::Ready);
}

#[test]
fn test_demo_fixture_loads() {
    let emr = InMemoryEmr::from_json(ward_core::DEMO_FIXTURE).unwrap();
    assert!(emr.is_bed_management_installed());
    let beds = emr.admission_location(ward_core::DEMO_WARD_UUID).unwrap();
    assert_eq!(beds.bed_layouts.len(), 4);
}
