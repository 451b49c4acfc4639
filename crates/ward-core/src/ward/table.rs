//! Row models behind the ward tables, with name search and pagination.

use chrono::NaiveDate;
use serde::Serialize;
use strsim::jaro_winkler;

use crate::dates::{days_since, format_table_datetime, PLACEHOLDER};
use crate::emr::DischargedEncounter;
use crate::models::WardPatient;

/// Minimum Jaro-Winkler similarity for a fuzzy name match.
pub const FUZZY_NAME_THRESHOLD: f64 = 0.88;

/// Queries shorter than this only match as substrings.
const MIN_FUZZY_QUERY_LEN: usize = 3;

/// A row of the admitted, discharge-in or awaiting-admission table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRow {
    pub patient_uuid: String,
    /// Admission date, or date queued for awaiting patients.
    pub date: String,
    pub id_number: String,
    pub name: String,
    pub gender: String,
    pub age: String,
    pub bed_number: String,
    /// Days in ward, or days in queue.
    pub days: String,
}

/// A row of the discharged-patients table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DischargedRow {
    pub encounter_uuid: String,
    pub patient_uuid: String,
    pub discharge_date: String,
    pub id_number: String,
    pub name: String,
}

fn or_placeholder(value: Option<String>) -> String {
    value.unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn row(ward_patient: &WardPatient, since: Option<&str>, today: NaiveDate) -> PatientRow {
    let patient = &ward_patient.patient;
    PatientRow {
        patient_uuid: patient.uuid.clone(),
        date: format_table_datetime(since),
        id_number: or_placeholder(patient.openmrs_id().map(str::to_string)),
        name: or_placeholder(patient.display_name().map(str::to_string)),
        gender: or_placeholder(patient.gender().map(str::to_string)),
        age: or_placeholder(patient.age().map(|a| a.to_string())),
        bed_number: or_placeholder(ward_patient.bed_number().map(str::to_string)),
        days: or_placeholder(since.and_then(|s| days_since(s, today)).map(|d| d.to_string())),
    }
}

/// Row for an admitted or discharge-in-transit patient.
pub fn admitted_row(ward_patient: &WardPatient, today: NaiveDate) -> PatientRow {
    row(ward_patient, ward_patient.admitted_at(), today)
}

/// Row for a patient awaiting admission; dates count from the request.
pub fn awaiting_row(ward_patient: &WardPatient, today: NaiveDate) -> PatientRow {
    let queued = ward_patient
        .inpatient_request
        .as_ref()
        .and_then(|r| r.requested_at());
    row(ward_patient, queued, today)
}

pub fn discharged_row(encounter: &DischargedEncounter) -> DischargedRow {
    DischargedRow {
        encounter_uuid: encounter.uuid.clone(),
        patient_uuid: encounter.patient.uuid.clone(),
        discharge_date: format_table_datetime(encounter.encounter_datetime.as_deref()),
        id_number: or_placeholder(encounter.patient.openmrs_id.clone()),
        name: encounter.patient.name.clone(),
    }
}

/// Case-insensitive substring match, with a fuzzy fallback per name token.
pub fn name_matches(name: &str, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    let name = name.to_lowercase();
    if name.contains(&query) {
        return true;
    }
    if query.chars().count() < MIN_FUZZY_QUERY_LEN {
        return false;
    }
    name.split_whitespace()
        .any(|token| jaro_winkler(token, &query) >= FUZZY_NAME_THRESHOLD)
        || jaro_winkler(&name, &query) >= FUZZY_NAME_THRESHOLD
}

/// Keep rows whose name matches the query.
pub fn search_rows(rows: Vec<PatientRow>, query: &str) -> Vec<PatientRow> {
    rows.into_iter().filter(|r| name_matches(&r.name, query)).collect()
}

/// One page of a client-side paginated list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based, clamped to the available pages.
    pub current_page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

pub fn paginate<T: Clone>(items: &[T], page_size: usize, page: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);
    let current_page = page.clamp(1, total_pages);
    let start = (current_page - 1) * page_size;
    Page {
        items: items.iter().skip(start).take(page_size).cloned().collect(),
        current_page,
        page_size,
        total_pages,
        total_items: items.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Bed, Encounter, InpatientAdmission, Patient, PatientIdentifier, ResourceRef,
        OPENMRS_ID_TYPE,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 5).unwrap()
    }

    #[test]
    fn test_admitted_row_fields() {
        let mut patient = Patient::stub("p-1", "Joyce Kamau");
        patient.identifiers.push(PatientIdentifier {
            identifier: "MGV7T".into(),
            identifier_type: Some(ResourceRef::with_display("t", OPENMRS_ID_TYPE)),
            ..PatientIdentifier::default()
        });
        if let Some(person) = patient.person.as_mut() {
            person.gender = Some("F".into());
            person.age = Some(30);
        }
        let mut admission = InpatientAdmission::new(patient, None);
        admission.encounter_assigning_to_current_inpatient_location = Some(Encounter {
            uuid: "e".into(),
            encounter_datetime: Some("2024-07-02T10:15:00.000+0300".into()),
            ..Encounter::default()
        });
        let bed = Bed {
            bed_number: "MAT-3".into(),
            ..Bed::default()
        };
        let wp = WardPatient::from_admission(Some(bed), &admission);

        let row = admitted_row(&wp, today());
        assert_eq!(row.date, "02-Jul-2024, 10:15");
        assert_eq!(row.id_number, "MGV7T");
        assert_eq!(row.name, "Joyce Kamau");
        assert_eq!(row.gender, "F");
        assert_eq!(row.age, "30");
        assert_eq!(row.bed_number, "MAT-3");
        assert_eq!(row.days, "3");
    }

    #[test]
    fn test_unreconciled_row_uses_placeholders() {
        let wp = WardPatient::unreconciled(Bed::default(), &Patient::stub("p-2", "Ann"));
        let row = admitted_row(&wp, today());
        assert_eq!(row.date, PLACEHOLDER);
        assert_eq!(row.days, PLACEHOLDER);
        assert_eq!(row.id_number, PLACEHOLDER);
    }

    #[test]
    fn test_name_matching() {
        assert!(name_matches("Joyce Kamau", ""));
        assert!(name_matches("Joyce Kamau", "kam"));
        assert!(name_matches("Joyce Kamau", "JOYCE"));
        assert!(name_matches("Joyce Kamau", "Joice"));
        assert!(!name_matches("Joyce Kamau", "Otieno"));
        assert!(!name_matches("Joyce Kamau", "zq"));
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (1..=12).collect();
        let page = paginate(&items, 5, 3);
        assert_eq!(page.items, vec![11, 12]);
        assert_eq!(page.total_pages, 3);

        let clamped = paginate(&items, 5, 9);
        assert_eq!(clamped.current_page, 3);

        let empty: Page<u32> = paginate(&[], 10, 1);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }
}
