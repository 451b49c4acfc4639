//! Typed ward configuration.
//!
//! Every EMR identifier the ward core needs is a named field here. The
//! configuration is loaded from TOML (or built from defaults) and validated
//! once at startup, so a typo in a UUID fails loudly instead of silently
//! classifying nobody as discharged.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Location;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the ward view reacts when one of its three sources fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Any failure puts the whole view in the error state.
    #[default]
    WholeView,
    /// Render whatever loaded and report per-source errors.
    Partial,
}

/// Where and how to reach the EMR.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmrConnection {
    /// Server root, e.g. `https://emr.example.org/openmrs`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
    /// Overrides the bed-management module check when set.
    pub bed_management: Option<bool>,
}

impl Default for EmrConnection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/openmrs".to_string(),
            username: String::new(),
            password: String::new(),
            timeout_secs: 30,
            bed_management: None,
        }
    }
}

/// Encounter types the ward reads or writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EncounterTypes {
    /// Presence of this type in a visit marks the patient as discharged in transit.
    pub ipd_discharge: String,
    pub transfer_request: String,
    pub admission: String,
    pub transfer_within_hospital: String,
    pub exit_from_inpatient: String,
    pub drug_order: String,
    pub clinical_consultation: String,
}

impl Default for EncounterTypes {
    fn default() -> Self {
        Self {
            ipd_discharge: "7e618d13-ffdb-4650-9a97-10ccd16ca36d".to_string(),
            transfer_request: "b2c4d5e6-7f8a-4e9b-8c1d-2e3f8e4a3b8f".to_string(),
            admission: "e22e39fd-7db2-45e7-80f1-60fa0d5a4378".to_string(),
            transfer_within_hospital: "7b68d557-85ef-4fc8-b767-4fa4f5eb5c23".to_string(),
            exit_from_inpatient: "181820aa-88c9-479b-9077-af92f5364329".to_string(),
            drug_order: "7df67b83-1b84-4fe2-b1b7-794b4e9bfcc3".to_string(),
            clinical_consultation: "465a92f2-baf8-42e9-9612-53064be868e8".to_string(),
        }
    }
}

/// Encounter roles used when creating encounters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EncounterRoles {
    pub clinician: String,
    pub admission_provider: String,
}

impl Default for EncounterRoles {
    fn default() -> Self {
        Self {
            clinician: "4f10ad1a-ec49-48df-98c7-1391c6ac7f05".to_string(),
            admission_provider: "a0b03050-c99b-11e0-9572-0800200c9a66".to_string(),
        }
    }
}

/// Concepts used by the admission form and the discharge printouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WardConcepts {
    pub payment_method: String,
    pub mpesa_payment_method: String,
    pub cash_payment_method: String,
    pub insurance_payment_method: String,
    pub other_insurance_type: String,
    pub insurance_other_specify: String,
    pub primary_doctor: String,
    pub primary_doctor_phone_number: String,
    pub emergency_doctor: String,
    pub emergency_doctor_phone_number: String,
    pub admission_date_time: String,
    pub chief_complaint: String,
    pub complaint: String,
    pub physical_examination: String,
    pub discharge_instruction: String,
    pub drug_reaction: String,
    pub reacting_drug: String,
    /// Coded disposition recorded on a transfer request.
    pub disposition: String,
    pub transfer_within_hospital_disposition: String,
    pub internal_transfer_location: String,
    pub clinical_note: String,
}

impl Default for WardConcepts {
    fn default() -> Self {
        Self {
            payment_method: "ffd8e033-a286-42b4-89d5-c6d6506d3161".to_string(),
            mpesa_payment_method: "9b24f997-6582-46b5-8f58-924b0e39ad9a".to_string(),
            cash_payment_method: "fc894152-07be-4e77-9dac-2a164e400a13".to_string(),
            insurance_payment_method: "95d2b358-ef3b-4a41-9215-06bfc9ef107e".to_string(),
            other_insurance_type: "5622AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            insurance_other_specify: "162169AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            primary_doctor: "2b537713-298c-4b60-83c3-8006ea622d70".to_string(),
            primary_doctor_phone_number: "159635AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            emergency_doctor: "1473AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            emergency_doctor_phone_number: "163152AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            admission_date_time: "1640AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            chief_complaint: "5219AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            complaint: "160531AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            physical_examination: "162737AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            discharge_instruction: "160632AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            drug_reaction: "162747AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            reacting_drug: "1193AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            disposition: "164060AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            transfer_within_hospital_disposition: "164093AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
                .to_string(),
            internal_transfer_location: "165088AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            clinical_note: "162169AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
        }
    }
}

/// An insurance option offered on the admission form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsuranceType {
    pub concept: String,
    pub label: String,
}

/// A form that can be filled for in-patients, optionally limited to wards
/// carrying one of the listed location tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InpatientForm {
    pub label: String,
    pub uuid: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl InpatientForm {
    pub fn applies_to(&self, ward: &Location) -> bool {
        self.tags.is_empty() || self.tags.iter().any(|tag| ward.has_tag(tag))
    }
}

/// Ward configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WardConfig {
    pub connection: EmrConnection,
    pub encounter_types: EncounterTypes,
    pub roles: EncounterRoles,
    pub concepts: WardConcepts,
    /// Visit type of an in-patient stay.
    pub inpatient_visit_type: String,
    /// Concept source whose codes label diagnoses, e.g. ICD-10.
    pub diagnosis_concept_source: String,
    /// Locations with this tag are mortuaries and never listed as wards.
    pub mortuary_location_tag: String,
    pub daily_bed_fee_service: String,
    pub insurance_types: Vec<InsuranceType>,
    pub inpatient_forms: Vec<InpatientForm>,
    pub error_policy: ErrorPolicy,
    pub page_sizes: Vec<usize>,
}

impl Default for WardConfig {
    fn default() -> Self {
        Self {
            connection: EmrConnection::default(),
            encounter_types: EncounterTypes::default(),
            roles: EncounterRoles::default(),
            concepts: WardConcepts::default(),
            inpatient_visit_type: "a73e2ac6-263b-47fc-99fc-e0f2c09fc914".to_string(),
            diagnosis_concept_source: "39ADDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDDD".to_string(),
            mortuary_location_tag: "1dbbfe22-d21f-499c-bf33-cc9f75b6c7e8".to_string(),
            daily_bed_fee_service: "37ce491f-b2dd-4433-b203-efebb8ba1469".to_string(),
            insurance_types: vec![
                InsuranceType {
                    concept: "1a7fb8b5-6093-486d-baa2-65f8b4388544".to_string(),
                    label: "SHA".to_string(),
                },
                InsuranceType {
                    concept: "1917AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
                    label: "Policy Holder".to_string(),
                },
                InsuranceType {
                    concept: "5622AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
                    label: "OTHER".to_string(),
                },
            ],
            inpatient_forms: vec![
                InpatientForm {
                    label: "Cardex Nursing Plan".to_string(),
                    uuid: "1f81d5e2-3569-40cf-bbb9-361a53ba409b".to_string(),
                    tags: Vec::new(),
                },
                InpatientForm {
                    label: "Doctors Note".to_string(),
                    uuid: "87379b0a-738b-4799-9736-cdac614cee2a".to_string(),
                    tags: Vec::new(),
                },
                InpatientForm {
                    label: "Partograph Form".to_string(),
                    uuid: "3791e5b7-2cdc-44fc-982b-a81135367c96".to_string(),
                    tags: vec!["7680b7ee-6880-450c-8b7e-2a748b6f9dc7".to_string()],
                },
                InpatientForm {
                    label: "Inpatient Discharge form".to_string(),
                    uuid: "98a781d2-b777-4756-b4c9-c9b0deb3483c".to_string(),
                    tags: vec![
                        "dab3c2bb-0b0b-4ebd-8f99-3ad44996d311".to_string(),
                        "7680b7ee-6880-450c-8b7e-2a748b6f9dc7".to_string(),
                    ],
                },
            ],
            error_policy: ErrorPolicy::default(),
            page_sizes: vec![5, 10, 20, 50, 100],
        }
    }
}

/// Accepts RFC 4122 UUIDs and the 36-character concept reference form
/// (`5219AAAA...`).
pub fn is_emr_uuid(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
        || (value.len() == 36 && value.chars().all(|c| c.is_ascii_alphanumeric()))
}

impl WardConfig {
    /// Load and validate a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: WardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every identifier and the connection settings.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut ids: Vec<(&str, &String)> = vec![
            ("encounter_types.ipd_discharge", &self.encounter_types.ipd_discharge),
            ("encounter_types.transfer_request", &self.encounter_types.transfer_request),
            ("encounter_types.admission", &self.encounter_types.admission),
            (
                "encounter_types.transfer_within_hospital",
                &self.encounter_types.transfer_within_hospital,
            ),
            ("encounter_types.exit_from_inpatient", &self.encounter_types.exit_from_inpatient),
            ("encounter_types.drug_order", &self.encounter_types.drug_order),
            (
                "encounter_types.clinical_consultation",
                &self.encounter_types.clinical_consultation,
            ),
            ("roles.clinician", &self.roles.clinician),
            ("roles.admission_provider", &self.roles.admission_provider),
            ("inpatient_visit_type", &self.inpatient_visit_type),
            ("diagnosis_concept_source", &self.diagnosis_concept_source),
            ("mortuary_location_tag", &self.mortuary_location_tag),
            ("daily_bed_fee_service", &self.daily_bed_fee_service),
        ];
        let c = &self.concepts;
        ids.extend([
            ("concepts.payment_method", &c.payment_method),
            ("concepts.mpesa_payment_method", &c.mpesa_payment_method),
            ("concepts.cash_payment_method", &c.cash_payment_method),
            ("concepts.insurance_payment_method", &c.insurance_payment_method),
            ("concepts.other_insurance_type", &c.other_insurance_type),
            ("concepts.insurance_other_specify", &c.insurance_other_specify),
            ("concepts.primary_doctor", &c.primary_doctor),
            ("concepts.primary_doctor_phone_number", &c.primary_doctor_phone_number),
            ("concepts.emergency_doctor", &c.emergency_doctor),
            ("concepts.emergency_doctor_phone_number", &c.emergency_doctor_phone_number),
            ("concepts.admission_date_time", &c.admission_date_time),
            ("concepts.chief_complaint", &c.chief_complaint),
            ("concepts.complaint", &c.complaint),
            ("concepts.physical_examination", &c.physical_examination),
            ("concepts.discharge_instruction", &c.discharge_instruction),
            ("concepts.drug_reaction", &c.drug_reaction),
            ("concepts.reacting_drug", &c.reacting_drug),
            ("concepts.disposition", &c.disposition),
            (
                "concepts.transfer_within_hospital_disposition",
                &c.transfer_within_hospital_disposition,
            ),
            ("concepts.internal_transfer_location", &c.internal_transfer_location),
            ("concepts.clinical_note", &c.clinical_note),
        ]);
        for insurance in &self.insurance_types {
            ids.push(("insurance_types.concept", &insurance.concept));
        }
        for form in &self.inpatient_forms {
            ids.push(("inpatient_forms.uuid", &form.uuid));
            for tag in &form.tags {
                ids.push(("inpatient_forms.tags", tag));
            }
        }

        for (field, value) in ids {
            if !is_emr_uuid(value) {
                return Err(invalid(field, format!("`{value}` is not a UUID")));
            }
        }

        if self.page_sizes.is_empty() || self.page_sizes.contains(&0) {
            return Err(invalid("page_sizes", "must list at least one non-zero size"));
        }

        let base_url = self.connection.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("connection.base_url", "must be an http(s) URL"));
        }
        if self.connection.timeout_secs == 0 {
            return Err(invalid("connection.timeout_secs", "must be positive"));
        }
        Ok(())
    }

    /// Smallest configured page size.
    pub fn default_page_size(&self) -> usize {
        self.page_sizes.iter().copied().min().unwrap_or(10)
    }

    /// Forms available on the given ward.
    pub fn forms_for_ward(&self, ward: &Location) -> Vec<&InpatientForm> {
        self.inpatient_forms.iter().filter(|f| f.applies_to(ward)).collect()
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}
