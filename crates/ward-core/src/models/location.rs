//! Ward locations and bed layouts.

use serde::{Deserialize, Serialize};

use super::{Patient, ResourceRef};

/// A ward (or any EMR location).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub uuid: String,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub tags: Vec<ResourceRef>,
}

impl Location {
    pub fn has_tag(&self, tag_uuid: &str) -> bool {
        self.tags.iter().any(|t| t.uuid == tag_uuid)
    }

    pub fn name(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.uuid)
    }
}

/// Bed occupancy status as reported by bed management.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BedStatus {
    #[default]
    Available,
    Occupied,
    #[serde(other)]
    Unknown,
}

/// Bed type descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BedType {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One bed position in a ward, with its current occupants.
///
/// More than one occupant is legal (shared beds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BedLayout {
    #[serde(default)]
    pub row_number: Option<u32>,
    #[serde(default)]
    pub column_number: Option<u32>,
    pub bed_number: String,
    /// Numeric id used by the bed assignment endpoints.
    #[serde(default)]
    pub bed_id: Option<i64>,
    #[serde(default)]
    pub bed_uuid: Option<String>,
    #[serde(default)]
    pub bed_type: Option<BedType>,
    #[serde(default)]
    pub status: BedStatus,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub patients: Vec<Patient>,
}

impl BedLayout {
    /// The bed as attached to a ward patient (occupants stripped).
    pub fn to_bed(&self) -> Bed {
        Bed {
            id: self.bed_id,
            uuid: self.bed_uuid.clone(),
            bed_number: self.bed_number.clone(),
            bed_type: self
                .bed_type
                .as_ref()
                .and_then(|t| t.display_name.clone().or_else(|| t.name.clone())),
            status: self.status,
        }
    }

    pub fn is_occupied(&self) -> bool {
        !self.patients.is_empty()
    }
}

/// A bed reference carried by a ward patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Bed {
    pub id: Option<i64>,
    pub uuid: Option<String>,
    pub bed_number: String,
    pub bed_type: Option<String>,
    pub status: BedStatus,
}

/// Bed layout and occupancy of one ward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionLocation {
    pub ward: Location,
    #[serde(default)]
    pub total_beds: u32,
    #[serde(default)]
    pub occupied_beds: u32,
    #[serde(default)]
    pub bed_layouts: Vec<BedLayout>,
}

impl AdmissionLocation {
    /// Number of patients currently placed in beds of this ward.
    pub fn occupant_count(&self) -> usize {
        self.bed_layouts.iter().map(|b| b.patients.len()).sum()
    }

    pub fn find_bed(&self, bed_id: i64) -> Option<&BedLayout> {
        self.bed_layouts.iter().find(|b| b.bed_id == Some(bed_id))
    }
}

/// A patient's active bed assignment, as returned by the bed lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BedAssignment {
    #[serde(alias = "id")]
    pub bed_id: i64,
    #[serde(default, alias = "number")]
    pub bed_number: Option<String>,
    #[serde(default)]
    pub physical_location: Option<ResourceRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_admission_location() {
        let json = r#"{
            "ward": {"uuid": "w-1", "display": "Maternity", "tags": [{"uuid": "t-1", "display": "Admission Location"}]},
            "totalBeds": 2,
            "occupiedBeds": 1,
            "bedLayouts": [
                {"rowNumber": 1, "columnNumber": 1, "bedNumber": "MAT-1", "bedId": 11, "status": "OCCUPIED",
                 "bedType": {"name": "adult", "displayName": "Adult bed"},
                 "patients": [{"uuid": "p-1"}]},
                {"rowNumber": 1, "columnNumber": 2, "bedNumber": "MAT-2", "bedId": 12, "status": "AVAILABLE"}
            ]
        }"#;
        let location: AdmissionLocation = serde_json::from_str(json).unwrap();
        assert_eq!(location.ward.name(), "Maternity");
        assert!(location.ward.has_tag("t-1"));
        assert_eq!(location.occupant_count(), 1);
        assert_eq!(location.bed_layouts[1].status, BedStatus::Available);

        let bed = location.bed_layouts[0].to_bed();
        assert_eq!(bed.id, Some(11));
        assert_eq!(bed.bed_type.as_deref(), Some("Adult bed"));
        assert_eq!(location.find_bed(12).map(|b| b.bed_number.as_str()), Some("MAT-2"));
    }

    #[test]
    fn test_unknown_bed_status() {
        let layout: BedLayout =
            serde_json::from_str(r#"{"bedNumber": "X", "status": "DIRTY"}"#).unwrap();
        assert_eq!(layout.status, BedStatus::Unknown);
    }
}
