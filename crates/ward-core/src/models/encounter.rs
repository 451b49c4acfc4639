//! Visits, encounters and their clinical payload.
//!
//! These are owned by the EMR; the ward core only reads them, except for
//! [`EncounterPayload`], which is the body of an encounter creation request.

use serde::{Deserialize, Serialize};

use super::{Patient, ResourceRef};

/// A hospital visit with its encounters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub uuid: String,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub visit_type: Option<ResourceRef>,
    #[serde(default)]
    pub start_datetime: Option<String>,
    #[serde(default)]
    pub stop_datetime: Option<String>,
    #[serde(default)]
    pub encounters: Vec<Encounter>,
}

impl Visit {
    pub fn has_encounter_of_type(&self, encounter_type_uuid: &str) -> bool {
        self.encounters.iter().any(|e| e.is_of_type(encounter_type_uuid))
    }

    pub fn encounters_of_type<'a>(
        &'a self,
        encounter_type_uuid: &'a str,
    ) -> impl Iterator<Item = &'a Encounter> + 'a {
        self.encounters
            .iter()
            .filter(move |e| e.is_of_type(encounter_type_uuid))
    }

    /// Earliest-listed encounter of the given type.
    pub fn first_encounter_of_type(&self, encounter_type_uuid: &str) -> Option<&Encounter> {
        self.encounters.iter().find(|e| e.is_of_type(encounter_type_uuid))
    }
}

/// A clinical encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub uuid: String,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub encounter_datetime: Option<String>,
    #[serde(default)]
    pub encounter_type: Option<ResourceRef>,
    #[serde(default)]
    pub location: Option<ResourceRef>,
    #[serde(default)]
    pub patient: Option<Patient>,
    #[serde(default)]
    pub obs: Vec<Obs>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub diagnoses: Vec<Diagnosis>,
    #[serde(default)]
    pub form: Option<ResourceRef>,
    /// Present only in the "encounter with visit" representation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit: Option<Box<Visit>>,
}

impl Encounter {
    pub fn is_of_type(&self, encounter_type_uuid: &str) -> bool {
        self.encounter_type
            .as_ref()
            .is_some_and(|t| t.uuid == encounter_type_uuid)
    }

    /// Observations whose concept matches.
    pub fn obs_for_concept<'a>(&'a self, concept_uuid: &'a str) -> impl Iterator<Item = &'a Obs> + 'a {
        self.obs.iter().filter(move |o| o.concept.uuid == concept_uuid)
    }
}

/// An observation, possibly a group with members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Obs {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    pub concept: ResourceRef,
    #[serde(default)]
    pub value: Option<ObsValue>,
    #[serde(default)]
    pub group_members: Vec<Obs>,
    #[serde(default)]
    pub obs_datetime: Option<String>,
}

impl Obs {
    /// Display text of the value, if any.
    pub fn value_text(&self) -> Option<String> {
        self.value.as_ref().map(ObsValue::display)
    }

    pub fn member(&self, concept_uuid: &str) -> Option<&Obs> {
        self.group_members.iter().find(|m| m.concept.uuid == concept_uuid)
    }
}

/// Observation value: coded answer, number, boolean, or free text / datetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ObsValue {
    Coded(ResourceRef),
    Numeric(f64),
    Boolean(bool),
    Text(String),
}

impl ObsValue {
    pub fn display(&self) -> String {
        match self {
            ObsValue::Coded(coded) => coded.label().to_string(),
            ObsValue::Numeric(n) if n.fract() == 0.0 => format!("{n:.0}"),
            ObsValue::Numeric(n) => n.to_string(),
            ObsValue::Boolean(b) => b.to_string(),
            ObsValue::Text(text) => text.clone(),
        }
    }
}

/// Kind of clinical order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OrderKind {
    #[serde(rename = "drugorder")]
    Drug,
    #[serde(rename = "testorder")]
    Test,
    #[default]
    #[serde(other)]
    Other,
}

/// A drug or test order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub uuid: String,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: OrderKind,
    #[serde(default)]
    pub concept: Option<ResourceRef>,
}

/// A diagnosis recorded in an encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub certainty: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<CodedDiagnosis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CodedDiagnosis {
    #[serde(default)]
    pub coded: Option<ResourceRef>,
    #[serde(default)]
    pub non_coded: Option<String>,
}

impl Diagnosis {
    /// Coded display, falling back to the non-coded text and the row display.
    pub fn label(&self) -> Option<&str> {
        self.diagnosis
            .as_ref()
            .and_then(|d| {
                d.coded
                    .as_ref()
                    .and_then(|c| c.display.as_deref())
                    .or(d.non_coded.as_deref())
            })
            .or(self.display.as_deref())
    }
}

/// A concept as needed for lab result rendering and diagnosis search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub uuid: String,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub name: Option<ResourceRef>,
    #[serde(default)]
    pub set_members: Vec<Concept>,
    #[serde(default)]
    pub hi_normal: Option<f64>,
    #[serde(default)]
    pub low_normal: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<ConceptMapping>,
}

impl Concept {
    /// Preferred name, falling back to the display text.
    pub fn name(&self) -> Option<&str> {
        self.name
            .as_ref()
            .and_then(|n| n.display.as_deref())
            .or(self.display.as_deref())
    }

    /// Reference term the concept maps to in the given concept source.
    pub fn reference_term(&self, source_uuid: &str) -> Option<&ConceptReferenceTerm> {
        self.mappings
            .iter()
            .filter_map(|m| m.concept_reference_term.as_ref())
            .find(|term| term.concept_source.as_ref().is_some_and(|s| s.uuid == source_uuid))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMapping {
    #[serde(default)]
    pub concept_reference_term: Option<ConceptReferenceTerm>,
}

/// A code in an external concept source such as ICD-10.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConceptReferenceTerm {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub concept_source: Option<ResourceRef>,
}

/// Provider participating in a new encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncounterProviderPayload {
    pub provider: String,
    pub encounter_role: String,
}

/// One observation in an encounter creation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObsPayload {
    pub concept: String,
    pub value: serde_json::Value,
}

impl ObsPayload {
    pub fn new(concept: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            concept: concept.into(),
            value: value.into(),
        }
    }
}

/// Body of an encounter creation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EncounterPayload {
    pub patient: String,
    pub encounter_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_datetime: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub encounter_providers: Vec<EncounterProviderPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub obs: Vec<ObsPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obs_value_variants() {
        let coded: ObsValue =
            serde_json::from_str(r#"{"uuid": "c-1", "display": "Malaria"}"#).unwrap();
        assert_eq!(coded.display(), "Malaria");

        let numeric: ObsValue = serde_json::from_str("38").unwrap();
        assert_eq!(numeric.display(), "38");

        let fraction: ObsValue = serde_json::from_str("37.5").unwrap();
        assert_eq!(fraction.display(), "37.5");

        let text: ObsValue = serde_json::from_str(r#""Headache for 3 days""#).unwrap();
        assert_eq!(text.display(), "Headache for 3 days");
    }

    #[test]
    fn test_order_kind_from_type_field() {
        let json = r#"[{"uuid":"o-1","type":"drugorder"},{"uuid":"o-2","type":"testorder"},{"uuid":"o-3","type":"referralorder"},{"uuid":"o-4"}]"#;
        let orders: Vec<Order> = serde_json::from_str(json).unwrap();
        let kinds: Vec<OrderKind> = orders.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![OrderKind::Drug, OrderKind::Test, OrderKind::Other, OrderKind::Other]
        );
    }

    #[test]
    fn test_visit_encounter_lookup() {
        let visit = Visit {
            uuid: "v-1".into(),
            encounters: vec![
                Encounter {
                    uuid: "e-1".into(),
                    encounter_type: Some(ResourceRef::new("admission")),
                    ..Encounter::default()
                },
                Encounter {
                    uuid: "e-2".into(),
                    encounter_type: Some(ResourceRef::new("discharge")),
                    ..Encounter::default()
                },
            ],
            ..Visit::default()
        };
        assert!(visit.has_encounter_of_type("discharge"));
        assert!(!visit.has_encounter_of_type("transfer"));
        assert_eq!(
            visit.first_encounter_of_type("admission").map(|e| e.uuid.as_str()),
            Some("e-1")
        );
    }

    #[test]
    fn test_diagnosis_label_fallbacks() {
        let coded = Diagnosis {
            diagnosis: Some(CodedDiagnosis {
                coded: Some(ResourceRef::with_display("c", "Pneumonia")),
                non_coded: None,
            }),
            ..Diagnosis::default()
        };
        assert_eq!(coded.label(), Some("Pneumonia"));

        let free_text = Diagnosis {
            display: Some("row".into()),
            diagnosis: Some(CodedDiagnosis {
                coded: None,
                non_coded: Some("Snake bite".into()),
            }),
            ..Diagnosis::default()
        };
        assert_eq!(free_text.label(), Some("Snake bite"));
    }

    #[test]
    fn test_payload_skips_empty_fields() {
        let payload = EncounterPayload {
            patient: "p".into(),
            encounter_type: "t".into(),
            ..EncounterPayload::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"patient": "p", "encounterType": "t"}));
    }

    #[test]
    fn test_concept_reference_term_by_source() {
        let concept: Concept = serde_json::from_value(serde_json::json!({
            "uuid": "c-malaria",
            "name": { "uuid": "n-1", "display": "Malaria" },
            "mappings": [
                { "conceptReferenceTerm": { "code": "84", "conceptSource": { "uuid": "ciel" } } },
                { "conceptReferenceTerm": { "code": "B54", "conceptSource": { "uuid": "icd-10" } } }
            ]
        }))
        .unwrap();
        assert_eq!(concept.name(), Some("Malaria"));
        assert_eq!(
            concept.reference_term("icd-10").and_then(|t| t.code.as_deref()),
            Some("B54")
        );
        assert!(concept.reference_term("snomed").is_none());
    }

    #[test]
    fn test_whole_numeric_values_print_without_fraction() {
        assert_eq!(ObsValue::Numeric(37.0).display(), "37");
        assert_eq!(ObsValue::Numeric(1.0e20).display(), "100000000000000000000");
        assert_eq!(ObsValue::Numeric(36.6).display(), "36.6");
    }
}
