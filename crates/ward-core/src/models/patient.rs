//! Patient models.

use serde::{Deserialize, Serialize};

use super::ResourceRef;

/// Identifier type display used by the EMR for the primary patient number.
pub const OPENMRS_ID_TYPE: &str = "OpenMRS ID";

/// A patient as returned by the admission, request and bed endpoints.
///
/// The bed endpoint returns a thinner stub than the admission endpoint, so
/// everything except the uuid is optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub uuid: String,
    #[serde(default)]
    pub identifiers: Vec<PatientIdentifier>,
    #[serde(default)]
    pub person: Option<Person>,
    #[serde(default)]
    pub voided: bool,
}

/// Demographic part of a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub birthdate: Option<String>,
    #[serde(default)]
    pub preferred_name: Option<ResourceRef>,
    #[serde(default)]
    pub dead: bool,
}

/// A patient identifier (e.g. the OpenMRS ID).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentifier {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    pub identifier: String,
    #[serde(default)]
    pub identifier_type: Option<ResourceRef>,
}

impl Patient {
    /// Create a patient stub with only a uuid and display name.
    pub fn stub(uuid: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            identifiers: Vec::new(),
            person: Some(Person {
                display: Some(display.into()),
                ..Person::default()
            }),
            voided: false,
        }
    }

    /// Display name of the patient, if the representation carried one.
    pub fn display_name(&self) -> Option<&str> {
        let person = self.person.as_ref()?;
        person
            .display
            .as_deref()
            .or_else(|| person.preferred_name.as_ref().and_then(|n| n.display.as_deref()))
    }

    pub fn gender(&self) -> Option<&str> {
        self.person.as_ref()?.gender.as_deref()
    }

    pub fn age(&self) -> Option<u32> {
        self.person.as_ref()?.age
    }

    /// The OpenMRS ID, falling back to the first identifier.
    pub fn openmrs_id(&self) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|id| {
                id.identifier_type
                    .as_ref()
                    .and_then(|t| t.display.as_deref())
                    .is_some_and(|t| t == OPENMRS_ID_TYPE)
            })
            .or_else(|| self.identifiers.first())
            .map(|id| id.identifier.as_str())
    }
}
