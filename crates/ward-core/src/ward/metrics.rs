//! Ward summary metrics.

use serde::Serialize;

use super::{ReconciledWard, WardPatientStatus};

/// Occupancy as a percentage in `[0, 100]`. Zero when there are no beds or no
/// occupied beds.
pub fn occupancy_percent(total_beds: u32, occupied_beds: u32) -> f64 {
    if total_beds == 0 || occupied_beds == 0 {
        return 0.0;
    }
    (f64::from(occupied_beds) / f64::from(total_beds) * 100.0).clamp(0.0, 100.0)
}

/// `"0%"` for zero, otherwise two decimals (`"66.67%"`).
pub fn format_percent(percent: f64) -> String {
    if percent == 0.0 {
        "0%".to_string()
    } else {
        format!("{percent:.2}%")
    }
}

/// Counts shown in the ward header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WardMetrics {
    pub total_beds: u32,
    pub occupied_beds: u32,
    pub free_beds: u32,
    pub occupancy_percent: f64,
    pub admitted: usize,
    pub discharge_in_transit: usize,
    /// From the discharged-encounter search; `None` until it has loaded.
    pub discharged: Option<usize>,
    pub awaiting_admission: usize,
    pub unreconciled: usize,
}

impl WardMetrics {
    pub fn from_ward(ward: &ReconciledWard, discharged: Option<usize>) -> Self {
        Self {
            total_beds: ward.total_beds,
            occupied_beds: ward.occupied_beds,
            free_beds: ward.total_beds.saturating_sub(ward.occupied_beds),
            occupancy_percent: occupancy_percent(ward.total_beds, ward.occupied_beds),
            admitted: ward.count(WardPatientStatus::Admitted),
            discharge_in_transit: ward.count(WardPatientStatus::DischargeInTransit),
            discharged,
            awaiting_admission: ward.awaiting_admission.len(),
            unreconciled: ward.count(WardPatientStatus::Unreconciled),
        }
    }

    pub fn occupancy_display(&self) -> String {
        format_percent(self.occupancy_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupancy_zero_cases() {
        assert_eq!(occupancy_percent(0, 0), 0.0);
        assert_eq!(occupancy_percent(10, 0), 0.0);
        assert_eq!(occupancy_percent(0, 3), 0.0);
        assert_eq!(format_percent(0.0), "0%");
    }

    #[test]
    fn test_occupancy_two_decimals() {
        assert_eq!(format_percent(occupancy_percent(3, 2)), "66.67%");
        assert_eq!(format_percent(occupancy_percent(4, 4)), "100.00%");
    }

    #[test]
    fn test_occupancy_is_clamped() {
        assert_eq!(occupancy_percent(2, 5), 100.0);
    }

    #[test]
    fn test_free_beds_saturate() {
        let ward = ReconciledWard {
            total_beds: 2,
            occupied_beds: 5,
            ..ReconciledWard::default()
        };
        let metrics = WardMetrics::from_ward(&ward, Some(3));
        assert_eq!(metrics.free_beds, 0);
        assert_eq!(metrics.discharged, Some(3));
        assert_eq!(metrics.occupancy_display(), "100.00%");
    }
}
