//! FHIR encounter search results.

use serde::{Deserialize, Serialize};

/// A discharge encounter from the FHIR search, reduced to what the
/// discharged-patients table shows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DischargedEncounter {
    pub uuid: String,
    pub patient: DischargedPatient,
    pub encounter_datetime: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DischargedPatient {
    pub uuid: String,
    pub name: String,
    pub openmrs_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DischargedEncounterPage {
    pub encounters: Vec<DischargedEncounter>,
    /// Total matches across all pages.
    pub total: usize,
}

/// Split `"Joyce Kamau (OpenMRS ID: MGV7T)"` into name and identifier.
/// Anything else is treated as a bare name.
pub fn parse_subject_display(display: &str) -> (String, Option<String>) {
    const MARKER: &str = " (OpenMRS ID: ";
    if let Some(start) = display.rfind(MARKER) {
        if let Some(rest) = display[start + MARKER.len()..].strip_suffix(')') {
            return (display[..start].trim().to_string(), Some(rest.trim().to_string()));
        }
    }
    (display.trim().to_string(), None)
}

#[derive(Debug, Deserialize)]
pub(crate) struct Bundle {
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BundleEntry {
    pub resource: FhirEncounter,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FhirEncounter {
    pub id: String,
    #[serde(default)]
    pub subject: Option<FhirReference>,
    #[serde(default)]
    pub period: Option<FhirPeriod>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FhirReference {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FhirPeriod {
    #[serde(default)]
    pub start: Option<String>,
}

impl From<Bundle> for DischargedEncounterPage {
    fn from(bundle: Bundle) -> Self {
        let encounters: Vec<DischargedEncounter> = bundle
            .entry
            .into_iter()
            .map(|entry| {
                let resource = entry.resource;
                let subject = resource.subject.unwrap_or(FhirReference {
                    reference: None,
                    display: None,
                });
                let (name, openmrs_id) =
                    parse_subject_display(subject.display.as_deref().unwrap_or_default());
                let uuid = subject
                    .reference
                    .as_deref()
                    .and_then(|r| r.rsplit('/').next())
                    .unwrap_or_default()
                    .to_string();
                DischargedEncounter {
                    uuid: resource.id,
                    patient: DischargedPatient {
                        uuid,
                        name,
                        openmrs_id,
                    },
                    encounter_datetime: resource.period.and_then(|p| p.start),
                }
            })
            .collect();
        let total = bundle.total.unwrap_or(encounters.len());
        Self { encounters, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subject_display() {
        assert_eq!(
            parse_subject_display("Joyce Kamau (OpenMRS ID: MGV7T)"),
            ("Joyce Kamau".to_string(), Some("MGV7T".to_string()))
        );
        assert_eq!(
            parse_subject_display("Ann (Annie) Waiguru (OpenMRS ID: 100-4)"),
            ("Ann (Annie) Waiguru".to_string(), Some("100-4".to_string()))
        );
        assert_eq!(parse_subject_display("Unknown Patient"), ("Unknown Patient".to_string(), None));
    }

    #[test]
    fn test_bundle_to_page() {
        let json = r#"{
            "resourceType": "Bundle",
            "total": 23,
            "entry": [{
                "resource": {
                    "resourceType": "Encounter",
                    "id": "enc-1",
                    "subject": {"reference": "Patient/p-1", "display": "Joyce Kamau (OpenMRS ID: MGV7T)"},
                    "period": {"start": "2024-07-02T10:15:00+03:00"}
                }
            }]
        }"#;
        let bundle: Bundle = serde_json::from_str(json).unwrap();
        let page = DischargedEncounterPage::from(bundle);
        assert_eq!(page.total, 23);
        assert_eq!(page.encounters[0].patient.uuid, "p-1");
        assert_eq!(page.encounters[0].patient.openmrs_id.as_deref(), Some("MGV7T"));
        assert_eq!(
            page.encounters[0].encounter_datetime.as_deref(),
            Some("2024-07-02T10:15:00+03:00")
        );
    }
}
