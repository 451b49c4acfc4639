//! Admission form values, their observation payloads, and the lookups that
//! fill the form's pickers.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::WardConcepts;
use crate::emr::{EmrApi, EmrResult};
use crate::models::{Concept, ObsPayload, ResourceRef};

/// Wire format of the admission date-time observation.
pub const ADMISSION_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Values captured by the admission form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionFormData {
    /// Bed to assign once the admission encounter exists.
    #[serde(default)]
    pub bed_id: Option<i64>,
    pub admission_date: NaiveDateTime,
    /// Chief complaint / provisional diagnosis concept.
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub primary_doctor: Option<String>,
    #[serde(default)]
    pub primary_doctor_phone_number: Option<String>,
    #[serde(default)]
    pub emergency_doctor: Option<String>,
    #[serde(default)]
    pub emergency_doctor_phone_number: Option<String>,
    /// Payment method concept.
    #[serde(default)]
    pub payment_mode: Option<String>,
    /// Insurance type concept, used with the insurance payment method.
    #[serde(default)]
    pub insurance_type: Option<String>,
    /// Free-text insurer name when the insurance type is "other".
    #[serde(default)]
    pub other_insurance_type: Option<String>,
}

impl AdmissionFormData {
    pub fn new(admission_date: NaiveDateTime) -> Self {
        Self {
            bed_id: None,
            admission_date,
            diagnosis: None,
            primary_doctor: None,
            primary_doctor_phone_number: None,
            emergency_doctor: None,
            emergency_doctor_phone_number: None,
            payment_mode: None,
            insurance_type: None,
            other_insurance_type: None,
        }
    }
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Observations for an admission encounter. Empty values are dropped.
pub fn form_values_to_obs(data: &AdmissionFormData, concepts: &WardConcepts) -> Vec<ObsPayload> {
    let admission_date = data.admission_date.format(ADMISSION_DATETIME_FORMAT).to_string();
    let mut fields: Vec<(&str, Option<&str>)> = vec![
        (concepts.admission_date_time.as_str(), Some(admission_date.as_str())),
        (concepts.primary_doctor.as_str(), filled(&data.primary_doctor)),
        (concepts.chief_complaint.as_str(), filled(&data.diagnosis)),
        (concepts.primary_doctor_phone_number.as_str(), filled(&data.primary_doctor_phone_number)),
        (concepts.emergency_doctor.as_str(), filled(&data.emergency_doctor)),
        (concepts.emergency_doctor_phone_number.as_str(), filled(&data.emergency_doctor_phone_number)),
        (concepts.payment_method.as_str(), filled(&data.payment_mode)),
    ];

    if filled(&data.payment_mode) == Some(concepts.insurance_payment_method.as_str()) {
        let insurance_type = filled(&data.insurance_type);
        fields.push((concepts.insurance_payment_method.as_str(), insurance_type));
        if insurance_type == Some(concepts.other_insurance_type.as_str()) {
            fields.push((concepts.insurance_other_specify.as_str(), filled(&data.other_insurance_type)));
        }
    }

    fields
        .into_iter()
        .filter_map(|(concept, value)| value.map(|v| ObsPayload::new(concept, v)))
        .collect()
}

/// Diagnosis searches shorter than this are not sent.
pub const MIN_DIAGNOSIS_QUERY_LEN: usize = 3;

/// A pickable diagnosis, displayed as `code-name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisOption {
    pub uuid: String,
    pub display: String,
}

/// Options for the concepts mapped into the diagnosis concept source.
pub fn diagnosis_options(concepts: &[Concept], source_uuid: &str) -> Vec<DiagnosisOption> {
    concepts
        .iter()
        .filter_map(|concept| {
            let term = concept.reference_term(source_uuid)?;
            let name = concept.name().unwrap_or(&concept.uuid);
            let display = match term.code.as_deref() {
                Some(code) => format!("{code}-{name}"),
                None => name.to_string(),
            };
            Some(DiagnosisOption {
                uuid: concept.uuid.clone(),
                display,
            })
        })
        .collect()
}

/// Search diagnoses by name in the configured concept source.
pub fn search_diagnoses(api: &dyn EmrApi, source_uuid: &str, query: &str) -> EmrResult<Vec<DiagnosisOption>> {
    let query = query.trim();
    if query.chars().count() < MIN_DIAGNOSIS_QUERY_LEN {
        return Ok(Vec::new());
    }
    let concepts = api.search_concepts(query, source_uuid)?;
    debug!(query, found = concepts.len(), "diagnosis search");
    Ok(diagnosis_options(&concepts, source_uuid))
}

/// Providers for the primary and emergency doctor pickers, by display name.
pub fn provider_options(api: &dyn EmrApi) -> EmrResult<Vec<ResourceRef>> {
    let mut providers = api.providers()?;
    providers.sort_by(|a, b| a.label().cmp(b.label()));
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WardConfig;
    use crate::emr::{EmrOperation, InMemoryEmr};
    use chrono::NaiveDate;

    fn admitted_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn concepts_of(obs: &[ObsPayload]) -> Vec<&str> {
        obs.iter().map(|o| o.concept.as_str()).collect()
    }

    #[test]
    fn test_empty_values_dropped() {
        let concepts = WardConcepts::default();
        let mut data = AdmissionFormData::new(admitted_at());
        data.primary_doctor = Some("  ".into());
        data.diagnosis = Some("malaria".into());

        let obs = form_values_to_obs(&data, &concepts);
        assert_eq!(
            concepts_of(&obs),
            vec![concepts.admission_date_time.as_str(), concepts.chief_complaint.as_str()]
        );
        assert_eq!(obs[0].value, serde_json::json!("2024-07-01 09:30:00"));
    }

    #[test]
    fn test_insurance_only_under_insurance_payment() {
        let concepts = WardConcepts::default();
        let mut data = AdmissionFormData::new(admitted_at());
        data.payment_mode = Some(concepts.cash_payment_method.clone());
        data.insurance_type = Some("sha".into());

        let obs = form_values_to_obs(&data, &concepts);
        assert!(!concepts_of(&obs).contains(&concepts.insurance_payment_method.as_str()));

        data.payment_mode = Some(concepts.insurance_payment_method.clone());
        let obs = form_values_to_obs(&data, &concepts);
        let insurance = obs
            .iter()
            .find(|o| o.concept == concepts.insurance_payment_method)
            .unwrap();
        assert_eq!(insurance.value, serde_json::json!("sha"));
        assert!(!concepts_of(&obs).contains(&concepts.insurance_other_specify.as_str()));
    }

    #[test]
    fn test_other_insurance_specified() {
        let concepts = WardConcepts::default();
        let mut data = AdmissionFormData::new(admitted_at());
        data.payment_mode = Some(concepts.insurance_payment_method.clone());
        data.insurance_type = Some(concepts.other_insurance_type.clone());
        data.other_insurance_type = Some("Jubilee".into());

        let obs = form_values_to_obs(&data, &concepts);
        let other = obs
            .iter()
            .find(|o| o.concept == concepts.insurance_other_specify)
            .unwrap();
        assert_eq!(other.value, serde_json::json!("Jubilee"));
    }

    fn coded(uuid: &str, name: &str, terms: &[(&str, Option<&str>)]) -> Concept {
        serde_json::from_value(serde_json::json!({
            "uuid": uuid,
            "name": { "uuid": format!("{uuid}-name"), "display": name },
            "mappings": terms
                .iter()
                .map(|(source, code)| serde_json::json!({
                    "conceptReferenceTerm": { "code": code, "conceptSource": { "uuid": source } }
                }))
                .collect::<Vec<_>>()
        }))
        .unwrap()
    }

    #[test]
    fn test_diagnosis_display_uses_source_code() {
        let source = WardConfig::default().diagnosis_concept_source;
        let concepts = vec![
            coded("c-malaria", "Malaria", &[("ciel", Some("116128")), (source.as_str(), Some("B54"))]),
            coded("c-fever", "Fever", &[("ciel", Some("140238"))]),
            coded("c-cough", "Cough", &[(source.as_str(), None)]),
        ];
        let options = diagnosis_options(&concepts, &source);
        assert_eq!(
            options,
            vec![
                DiagnosisOption { uuid: "c-malaria".into(), display: "B54-Malaria".into() },
                DiagnosisOption { uuid: "c-cough".into(), display: "Cough".into() },
            ]
        );
    }

    #[test]
    fn test_short_diagnosis_query_not_sent() {
        let source = WardConfig::default().diagnosis_concept_source;
        let emr = InMemoryEmr::new();
        emr.add_concept(coded("c-malaria", "Malaria", &[(source.as_str(), Some("B54"))]));

        assert!(search_diagnoses(&emr, &source, " ma ").unwrap().is_empty());
        assert_eq!(emr.call_count(EmrOperation::ConceptSearch), 0);

        let found = search_diagnoses(&emr, &source, "malar").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display, "B54-Malaria");
        assert_eq!(emr.call_count(EmrOperation::ConceptSearch), 1);
    }

    #[test]
    fn test_providers_sorted_by_name() {
        let emr = InMemoryEmr::new();
        emr.add_provider(ResourceRef::with_display("pr-2", "Dr. Wanjiru"));
        emr.add_provider(ResourceRef::with_display("pr-1", "Dr. Akinyi"));
        let providers = provider_options(&emr).unwrap();
        assert_eq!(providers[0].uuid, "pr-1");
        assert_eq!(providers.len(), 2);
    }
}
