//! Hospital-wide ward line list.

use serde::Serialize;
use tracing::{debug, warn};

use super::{format_percent, occupancy_percent};
use crate::config::WardConfig;
use crate::emr::{EmrApi, EmrResult};
use crate::models::AdmissionLocation;

/// One ward row of the line list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WardLine {
    pub ward_uuid: String,
    pub ward_name: String,
    pub total_beds: u32,
    pub occupied_beds: u32,
    pub free_beds: u32,
    pub occupancy_percent: f64,
    /// Admitted patients with a pending transfer or discharge. `None` when
    /// the ward's admissions could not be loaded.
    pub pending_out: Option<usize>,
}

impl WardLine {
    pub fn occupancy_display(&self) -> String {
        format_percent(self.occupancy_percent)
    }
}

/// Totals across all listed wards.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct HospitalSummary {
    pub wards: usize,
    pub total_beds: u32,
    pub occupied_beds: u32,
    pub free_beds: u32,
    pub occupancy_percent: f64,
    /// Patients currently placed in beds.
    pub admitted_patients: usize,
}

/// Drop locations carrying the mortuary tag.
pub fn visible_wards<'a>(
    locations: &'a [AdmissionLocation],
    mortuary_tag: &str,
) -> Vec<&'a AdmissionLocation> {
    locations
        .iter()
        .filter(|l| mortuary_tag.is_empty() || !l.ward.has_tag(mortuary_tag))
        .collect()
}

pub fn hospital_summary(wards: &[&AdmissionLocation]) -> HospitalSummary {
    let total_beds: u32 = wards.iter().map(|w| w.total_beds).sum();
    let occupied_beds: u32 = wards.iter().map(|w| w.occupied_beds).sum();
    HospitalSummary {
        wards: wards.len(),
        total_beds,
        occupied_beds,
        free_beds: total_beds.saturating_sub(occupied_beds),
        occupancy_percent: occupancy_percent(total_beds, occupied_beds),
        admitted_patients: wards.iter().map(|w| w.occupant_count()).sum(),
    }
}

fn line_for(location: &AdmissionLocation, pending_out: Option<usize>) -> WardLine {
    WardLine {
        ward_uuid: location.ward.uuid.clone(),
        ward_name: location.ward.name().to_string(),
        total_beds: location.total_beds,
        occupied_beds: location.occupied_beds,
        free_beds: location.total_beds.saturating_sub(location.occupied_beds),
        occupancy_percent: occupancy_percent(location.total_beds, location.occupied_beds),
        pending_out,
    }
}

/// Hospital line list: every non-mortuary admission location, plus totals.
///
/// A failure listing locations fails the whole list; a failure loading one
/// ward's admissions only blanks that ward's pending-out cell.
pub fn ward_line_list(
    api: &dyn EmrApi,
    config: &WardConfig,
) -> EmrResult<(Vec<WardLine>, HospitalSummary)> {
    let locations = api.admission_locations()?;
    let wards = visible_wards(&locations, &config.mortuary_location_tag);
    debug!(
        locations = locations.len(),
        wards = wards.len(),
        "building ward line list"
    );

    let lines = wards
        .iter()
        .map(|location| {
            let pending_out = match api.inpatient_admissions(&location.ward.uuid) {
                Ok(admissions) => Some(
                    admissions
                        .iter()
                        .filter(|a| a.current_inpatient_request.is_some())
                        .count(),
                ),
                Err(err) => {
                    warn!(location = %location.ward.uuid, error = %err, "pending-out count unavailable");
                    None
                }
            };
            line_for(location, pending_out)
        })
        .collect();
    Ok((lines, hospital_summary(&wards)))
}
