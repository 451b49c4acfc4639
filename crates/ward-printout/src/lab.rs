//! Lab results for test orders.

use serde::Serialize;
use tracing::warn;
use ward_core::emr::EmrApi;
use ward_core::models::{Concept, Encounter, Obs, Order};

use crate::assembler::Section;

pub const NO_RESULTS: &str = "No results";
const NO_RANGE: &str = "N/A";

/// One printed result line: a single test or one member of a panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabResultRow {
    pub concept_uuid: String,
    pub test_type: String,
    pub result: String,
    pub normal_range: String,
}

impl LabResultRow {
    pub fn has_result(&self) -> bool {
        self.result != NO_RESULTS
    }

    /// `test: result (low - high)`; the range is left out when there is no result.
    pub fn render(&self) -> String {
        let test = self.test_type.to_lowercase();
        if self.has_result() {
            format!("{test}: {} ({})", self.result, self.normal_range)
        } else {
            format!("{test}: {}", self.result)
        }
    }
}

/// Results of one test order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabResult {
    pub order_uuid: String,
    pub rows: Section<Vec<LabResultRow>>,
}

impl LabResult {
    pub fn render(&self) -> String {
        match &self.rows {
            Section::Ready(rows) => rows
                .iter()
                .map(LabResultRow::render)
                .collect::<Vec<_>>()
                .join("; "),
            Section::Empty => NO_RESULTS.to_string(),
            Section::Failed(message) => format!("Error loading lab results: {message}"),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// `low - high` when both bounds are set and non-zero.
pub fn normal_range(concept: &Concept) -> String {
    match (concept.low_normal, concept.hi_normal) {
        (Some(low), Some(high)) if low != 0.0 && high != 0.0 => {
            format!("{} - {}", format_number(low), format_number(high))
        }
        _ => NO_RANGE.to_string(),
    }
}

fn result_text(obs: Option<&Obs>) -> String {
    obs.and_then(|o| o.value_text().or_else(|| o.display.clone()))
        .unwrap_or_else(|| NO_RESULTS.to_string())
}

fn row(concept: &Concept, obs: Option<&Obs>) -> LabResultRow {
    LabResultRow {
        concept_uuid: concept.uuid.clone(),
        test_type: concept
            .display
            .clone()
            .unwrap_or_else(|| NO_RESULTS.to_string()),
        result: result_text(obs),
        normal_range: normal_range(concept),
    }
}

/// Result rows for a test concept. Panels get one row per set member, read
/// from the members of the panel's result group.
pub fn result_rows(concept: &Concept, result: Option<&Obs>) -> Vec<LabResultRow> {
    if concept.set_members.is_empty() {
        return vec![row(concept, result)];
    }
    concept
        .set_members
        .iter()
        .map(|member| row(member, result.and_then(|r| r.member(&member.uuid))))
        .collect()
}

/// First observation recording the concept across the visit.
pub fn find_result_obs<'e>(encounters: &'e [Encounter], concept_uuid: &str) -> Option<&'e Obs> {
    encounters
        .iter()
        .flat_map(|e| e.obs.iter())
        .find(|o| o.concept.uuid == concept_uuid)
}

/// Results for each test order; a failed concept read fails only that order.
pub fn lab_results(api: &dyn EmrApi, test_orders: &[Order], encounters: &[Encounter]) -> Vec<LabResult> {
    test_orders
        .iter()
        .map(|order| {
            let rows = match order.concept.as_ref() {
                None => Section::Empty,
                Some(concept_ref) => match api.concept(&concept_ref.uuid) {
                    Ok(concept) => Section::Ready(result_rows(
                        &concept,
                        find_result_obs(encounters, &concept.uuid),
                    )),
                    Err(err) => {
                        warn!(order = %order.uuid, error = %err, "test concept read failed");
                        Section::Failed(err.user_message())
                    }
                },
            };
            LabResult {
                order_uuid: order.uuid.clone(),
                rows,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_core::models::{ObsValue, ResourceRef};

    fn concept(uuid: &str, display: &str, range: Option<(f64, f64)>) -> Concept {
        Concept {
            uuid: uuid.into(),
            display: Some(display.into()),
            low_normal: range.map(|r| r.0),
            hi_normal: range.map(|r| r.1),
            ..Concept::default()
        }
    }

    fn numeric(concept: &str, value: f64) -> Obs {
        Obs {
            concept: ResourceRef::new(concept),
            value: Some(ObsValue::Numeric(value)),
            ..Obs::default()
        }
    }

    #[test]
    fn test_normal_range_needs_both_bounds() {
        assert_eq!(normal_range(&concept("c", "Hb", Some((12.0, 15.5)))), "12 - 15.5");
        assert_eq!(normal_range(&concept("c", "Hb", Some((0.0, 15.5)))), "N/A");
        assert_eq!(normal_range(&concept("c", "Hb", None)), "N/A");
    }

    #[test]
    fn test_whole_bounds_print_without_fraction() {
        assert_eq!(normal_range(&concept("c", "Platelets", Some((150.0, 4.0e11)))), "150 - 400000000000");
        assert_eq!(normal_range(&concept("c", "X", Some((1.0, 1.0e20)))), "1 - 100000000000000000000");
    }

    #[test]
    fn test_single_test_row() {
        let glucose = concept("glu", "Blood Glucose", Some((4.0, 7.8)));
        let rows = result_rows(&glucose, Some(&numeric("glu", 5.4)));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].render(), "blood glucose: 5.4 (4 - 7.8)");

        let missing = result_rows(&glucose, None);
        assert_eq!(missing[0].render(), "blood glucose: No results");
    }

    #[test]
    fn test_panel_rows_follow_set_members() {
        let panel = Concept {
            set_members: vec![
                concept("hb", "Haemoglobin", Some((12.0, 16.0))),
                concept("wbc", "WBC", None),
            ],
            ..concept("fbc", "Full Blood Count", None)
        };
        let result = Obs {
            concept: ResourceRef::new("fbc"),
            group_members: vec![numeric("hb", 10.2)],
            ..Obs::default()
        };
        let rows = result_rows(&panel, Some(&result));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].result, "10.2");
        assert_eq!(rows[1].result, NO_RESULTS);
        assert!(!rows[1].has_result());
    }
}
