//! Discharge data assembly.
//!
//! Two reads of the discharge encounter back the printout: one with the
//! visit's diagnoses, one with the visit's orders and observations. A failed
//! read marks only the sections it feeds as failed.

use serde::Serialize;
use tracing::{debug, warn};
use ward_core::config::WardConfig;
use ward_core::emr::{EmrApi, EncounterView};
use ward_core::models::{Encounter, Obs, Order, OrderKind};

use crate::lab::{lab_results, LabResult};
use crate::{PrintoutError, PrintoutResult};

/// One printable section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Section<T> {
    Ready(T),
    /// The read succeeded but found nothing.
    Empty,
    /// The read behind this section failed.
    Failed(String),
}

impl<T> Section<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Section::Failed(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Section::Failed(message) => Some(message),
            _ => None,
        }
    }

    fn from_option(value: Option<T>) -> Self {
        value.map_or(Section::Empty, Section::Ready)
    }
}

impl<T> Section<Vec<T>> {
    fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            Section::Empty
        } else {
            Section::Ready(items)
        }
    }
}

/// A diagnosis as printed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisEntry {
    pub uuid: Option<String>,
    pub text: String,
    pub certainty: Option<String>,
}

/// Everything the discharge documents print, per section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DischargeData {
    pub encounter_uuid: String,
    /// Location the discharge encounter was recorded at.
    pub location: Option<String>,
    pub admission_datetime: Option<String>,
    pub discharge_datetime: Option<String>,
    pub diagnoses: Section<Vec<DiagnosisEntry>>,
    pub drug_orders: Section<Vec<Order>>,
    pub test_orders: Section<Vec<Order>>,
    pub complaints: Section<String>,
    pub drug_reactions: Section<String>,
    pub physical_examination: Section<String>,
    pub discharge_instructions: Section<String>,
    #[serde(skip)]
    pub visit_encounters: Vec<Encounter>,
}

impl DischargeData {
    fn new(encounter_uuid: &str) -> Self {
        Self {
            encounter_uuid: encounter_uuid.to_string(),
            location: None,
            admission_datetime: None,
            discharge_datetime: None,
            diagnoses: Section::Empty,
            drug_orders: Section::Empty,
            test_orders: Section::Empty,
            complaints: Section::Empty,
            drug_reactions: Section::Empty,
            physical_examination: Section::Empty,
            discharge_instructions: Section::Empty,
            visit_encounters: Vec::new(),
        }
    }

    /// Diagnoses joined for a single line.
    pub fn diagnosis_display(&self) -> Option<String> {
        self.diagnoses.ready().map(|diagnoses| {
            diagnoses
                .iter()
                .map(|d| d.text.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    /// Failed sections with their messages, in print order.
    pub fn failures(&self) -> Vec<(&'static str, &str)> {
        [
            ("Diagnosis", self.diagnoses.error()),
            ("Treatment", self.drug_orders.error()),
            ("Investigation", self.test_orders.error()),
            ("History", self.complaints.error()),
            ("Drug reactions", self.drug_reactions.error()),
            ("Physical Examination", self.physical_examination.error()),
            ("Discharge Instructions", self.discharge_instructions.error()),
        ]
        .into_iter()
        .filter_map(|(section, error)| error.map(|e| (section, e)))
        .collect()
    }

    /// Fails with the first section that could not be loaded.
    pub fn check(&self) -> PrintoutResult<()> {
        match self.failures().first() {
            Some(&(section, message)) => Err(PrintoutError::SectionFailed {
                section,
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Collects discharge printout data from the EMR.
pub struct DischargeAssembler<'a> {
    api: &'a dyn EmrApi,
    config: &'a WardConfig,
}

impl<'a> DischargeAssembler<'a> {
    pub fn new(api: &'a dyn EmrApi, config: &'a WardConfig) -> Self {
        Self { api, config }
    }

    pub fn assemble(&self, encounter_uuid: &str) -> DischargeData {
        let mut data = DischargeData::new(encounter_uuid);

        data.diagnoses = match self
            .api
            .encounter_with_visit(encounter_uuid, EncounterView::Diagnoses)
        {
            Ok(encounter) => Section::from_items(diagnosis_entries(&encounter)),
            Err(err) => {
                warn!(encounter = encounter_uuid, error = %err, "diagnosis read failed");
                Section::Failed(err.user_message())
            }
        };

        match self
            .api
            .encounter_with_visit(encounter_uuid, EncounterView::OrdersAndObs)
        {
            Ok(encounter) => self.fill_from_visit(&mut data, encounter),
            Err(err) => {
                warn!(encounter = encounter_uuid, error = %err, "orders and observations read failed");
                let message = err.user_message();
                data.drug_orders = Section::Failed(message.clone());
                data.test_orders = Section::Failed(message.clone());
                data.complaints = Section::Failed(message.clone());
                data.drug_reactions = Section::Failed(message.clone());
                data.physical_examination = Section::Failed(message.clone());
                data.discharge_instructions = Section::Failed(message);
            }
        }

        debug!(
            encounter = encounter_uuid,
            failed = data.failures().len(),
            "discharge printout assembled"
        );
        data
    }

    /// Lab results for the assembled test orders.
    pub fn lab_results(&self, data: &DischargeData) -> Section<Vec<LabResult>> {
        match &data.test_orders {
            Section::Ready(orders) => {
                Section::from_items(lab_results(self.api, orders, &data.visit_encounters))
            }
            Section::Empty => Section::Empty,
            Section::Failed(message) => Section::Failed(message.clone()),
        }
    }

    fn fill_from_visit(&self, data: &mut DischargeData, encounter: Encounter) {
        let types = &self.config.encounter_types;
        let concepts = &self.config.concepts;

        data.location = encounter.location.as_ref().and_then(|l| l.display.clone());
        data.discharge_datetime = encounter.encounter_datetime.clone();
        let encounters = encounter.visit.map(|v| *v).map(|v| (v.start_datetime, v.encounters));
        let (visit_start, encounters) = encounters.unwrap_or_default();

        data.admission_datetime = encounters
            .iter()
            .find(|e| e.is_of_type(&types.admission) || e.is_of_type(&types.transfer_within_hospital))
            .and_then(|e| e.encounter_datetime.clone())
            .or(visit_start);

        let (drug_orders, test_orders) = split_orders(
            encounters.iter().filter(|e| e.is_of_type(&types.drug_order)),
        );
        data.drug_orders = Section::from_items(drug_orders);
        data.test_orders = Section::from_items(test_orders);

        let consultations: Vec<&Encounter> = encounters
            .iter()
            .filter(|e| e.is_of_type(&types.clinical_consultation))
            .collect();
        data.complaints = Section::from_option(join_values(
            group_members(&consultations, &concepts.complaint, &concepts.chief_complaint),
            ", ",
        ));
        data.drug_reactions = Section::from_option(
            join_values(
                group_members(&consultations, &concepts.drug_reaction, &concepts.reacting_drug),
                ", ",
            )
            .map(|reactions| reactions.to_lowercase()),
        );

        let all: Vec<&Encounter> = encounters.iter().collect();
        data.physical_examination = Section::from_option(join_values(
            obs_with_concept(&all, &concepts.physical_examination),
            "\n",
        ));
        data.discharge_instructions = Section::from_option(join_values(
            obs_with_concept(&all, &concepts.discharge_instruction),
            "\n",
        ));
        data.visit_encounters = encounters;
    }
}

fn diagnosis_entries(encounter: &Encounter) -> Vec<DiagnosisEntry> {
    encounter
        .visit
        .iter()
        .flat_map(|visit| visit.encounters.iter())
        .flat_map(|e| e.diagnoses.iter())
        .filter_map(|d| {
            let text = d.display.as_deref().or_else(|| d.label())?;
            Some(DiagnosisEntry {
                uuid: d
                    .diagnosis
                    .as_ref()
                    .and_then(|coded| coded.coded.as_ref())
                    .map(|c| c.uuid.clone()),
                text: text.to_string(),
                certainty: d.certainty.clone(),
            })
        })
        .collect()
}

/// Drug and test orders from the given encounters, in encounter order.
pub fn split_orders<'e>(encounters: impl Iterator<Item = &'e Encounter>) -> (Vec<Order>, Vec<Order>) {
    let mut drug_orders = Vec::new();
    let mut test_orders = Vec::new();
    for order in encounters.flat_map(|e| e.orders.iter()) {
        match order.kind {
            OrderKind::Drug => drug_orders.push(order.clone()),
            OrderKind::Test => test_orders.push(order.clone()),
            OrderKind::Other => {}
        }
    }
    (drug_orders, test_orders)
}

/// Members with `member_concept` inside groups with `group_concept`.
pub fn group_members<'e>(
    encounters: &[&'e Encounter],
    group_concept: &str,
    member_concept: &str,
) -> Vec<&'e Obs> {
    encounters
        .iter()
        .flat_map(|e| e.obs.iter())
        .filter(|o| o.concept.uuid == group_concept)
        .flat_map(|group| group.group_members.iter())
        .filter(|member| member.concept.uuid == member_concept)
        .collect()
}

fn obs_with_concept<'e>(encounters: &[&'e Encounter], concept: &str) -> Vec<&'e Obs> {
    encounters
        .iter()
        .flat_map(|e| e.obs.iter())
        .filter(|o| o.concept.uuid == concept)
        .collect()
}

fn join_values(obs: Vec<&Obs>, separator: &str) -> Option<String> {
    let values: Vec<String> = obs.into_iter().filter_map(Obs::value_text).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(separator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_core::models::{ObsValue, ResourceRef};

    fn obs(concept: &str, value: &str) -> Obs {
        Obs {
            concept: ResourceRef::new(concept),
            value: Some(ObsValue::Text(value.to_string())),
            ..Obs::default()
        }
    }

    fn group(concept: &str, members: Vec<Obs>) -> Obs {
        Obs {
            concept: ResourceRef::new(concept),
            group_members: members,
            ..Obs::default()
        }
    }

    #[test]
    fn test_group_members_only_inside_matching_group() {
        let consultation = Encounter {
            uuid: "e-1".into(),
            obs: vec![
                group("complaint", vec![obs("chief", "Cough"), obs("duration", "3 days")]),
                group("other", vec![obs("chief", "Ignored")]),
                obs("chief", "Loose"),
            ],
            ..Encounter::default()
        };
        let members = group_members(&[&consultation], "complaint", "chief");
        let values: Vec<String> = members.into_iter().filter_map(Obs::value_text).collect();
        assert_eq!(values, vec!["Cough"]);
    }

    #[test]
    fn test_split_orders_by_kind() {
        let encounter = Encounter {
            uuid: "e-1".into(),
            orders: vec![
                Order {
                    uuid: "o-1".into(),
                    kind: OrderKind::Drug,
                    ..Order::default()
                },
                Order {
                    uuid: "o-2".into(),
                    kind: OrderKind::Test,
                    ..Order::default()
                },
                Order {
                    uuid: "o-3".into(),
                    kind: OrderKind::Other,
                    ..Order::default()
                },
            ],
            ..Encounter::default()
        };
        let (drugs, tests) = split_orders(std::iter::once(&encounter));
        assert_eq!(drugs.len(), 1);
        assert_eq!(tests[0].uuid, "o-2");
    }

    #[test]
    fn test_section_helpers() {
        let ready: Section<Vec<u8>> = Section::from_items(vec![1]);
        assert_eq!(ready.ready(), Some(&vec![1]));
        assert_eq!(Section::<Vec<u8>>::from_items(vec![]), Section::Empty);

        let failed: Section<String> = Section::Failed("offline".into());
        assert!(failed.is_failed());
        assert_eq!(failed.error(), Some("offline"));
    }

    #[test]
    fn test_check_reports_first_failed_section() {
        let mut data = DischargeData::new("e-1");
        assert!(data.check().is_ok());

        data.physical_examination = Section::Failed("timeout".into());
        data.complaints = Section::Failed("timeout".into());
        let err = data.check().unwrap_err();
        assert_eq!(err.to_string(), "History unavailable: timeout");
        assert!(!data.is_complete());
    }
}
