//! Discharge summary and gate pass documents.

use chrono::NaiveDateTime;
use serde::Serialize;
use ward_core::dates::format_date;
use ward_core::models::{Order, Patient};

use crate::assembler::{DischargeData, Section};
use crate::lab::LabResult;
use crate::PrintoutResult;

pub const NO_DATA: &str = "No data";
const BLANK: &str = "______________";

/// A labelled value; `None` prints as a blank to fill by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub value: Option<String>,
}

impl Field {
    fn new(name: &'static str, value: Option<String>) -> Self {
        Self { name, value }
    }

    fn blank(name: &'static str) -> Self {
        Self { name, value: None }
    }

    fn render(&self) -> String {
        format!("{}: {}", self.name, self.value.as_deref().unwrap_or(BLANK))
    }
}

/// A titled block of free text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSection {
    pub title: &'static str,
    pub body: String,
}

fn age_text(patient: &Patient) -> Option<String> {
    patient.age().map(|age| format!("{age} years"))
}

fn sex_text(patient: &Patient) -> Option<String> {
    patient.gender().map(|gender| match gender {
        "F" | "f" => "Female".to_string(),
        "M" | "m" => "Male".to_string(),
        other => other.to_string(),
    })
}

fn date_text(value: Option<&str>) -> Option<String> {
    value.and_then(format_date)
}

fn section_text(section: &Section<String>) -> String {
    section.ready().cloned().unwrap_or_else(|| NO_DATA.to_string())
}

fn order_lines(section: &Section<Vec<Order>>) -> String {
    section
        .ready()
        .map(|orders| {
            orders
                .iter()
                .filter_map(|o| o.display.as_deref())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NO_DATA.to_string())
}

fn render_rows(out: &mut String, fields: &[Field], per_row: usize) {
    for row in fields.chunks(per_row.max(1)) {
        let line = row.iter().map(Field::render).collect::<Vec<_>>().join("    ");
        out.push_str(&line);
        out.push('\n');
    }
}

fn render_header(out: &mut String, location: &str, title: &str) {
    out.push_str(location);
    out.push('\n');
    out.push_str(title);
    out.push_str("\n\n");
}

/// The discharge summary handed to the patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DischargeSummary {
    pub location: String,
    pub title: &'static str,
    pub fields: Vec<Field>,
    pub sections: Vec<TextSection>,
    pub sign_off: Vec<Field>,
}

impl DischargeSummary {
    pub fn build(location: &str, patient: &Patient, data: &DischargeData, labs: &Section<Vec<LabResult>>) -> Self {
        let fields = vec![
            Field::new("Name", patient.display_name().map(str::to_string)),
            Field::new("IP No", patient.openmrs_id().map(str::to_string)),
            Field::new("Age", age_text(patient)),
            Field::new("Sex", sex_text(patient)),
            Field::new("DOA", date_text(data.admission_datetime.as_deref())),
            Field::new("DOD", date_text(data.discharge_datetime.as_deref())),
        ];

        let mut history = section_text(&data.complaints);
        if let Some(reactions) = data.drug_reactions.ready() {
            history.push_str(&format!("\nDrug reactions: {reactions}"));
        }
        let investigation = match labs {
            Section::Ready(results) => results
                .iter()
                .map(LabResult::render)
                .collect::<Vec<_>>()
                .join("\n"),
            _ => NO_DATA.to_string(),
        };

        let sections = vec![
            TextSection {
                title: "Diagnosis",
                body: data.diagnosis_display().unwrap_or_else(|| NO_DATA.to_string()),
            },
            TextSection { title: "History", body: history },
            TextSection {
                title: "Physical Examination",
                body: section_text(&data.physical_examination),
            },
            TextSection {
                title: "Investigation",
                body: investigation,
            },
            TextSection {
                title: "Treatment",
                body: order_lines(&data.drug_orders),
            },
            TextSection {
                title: "Discharge Instructions",
                body: section_text(&data.discharge_instructions),
            },
        ];

        Self {
            location: location.to_string(),
            title: "Discharge Summary",
            fields,
            sections,
            sign_off: vec![
                Field::blank("Name"),
                Field::blank("Signature"),
                Field::new("Destination", Some("Discharge".to_string())),
                Field::new("Date", date_text(data.discharge_datetime.as_deref())),
            ],
        }
    }

    pub fn section(&self, title: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.body.as_str())
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        render_header(&mut out, &self.location, self.title);
        render_rows(&mut out, &self.fields, 3);
        for section in &self.sections {
            out.push('\n');
            out.push_str(&section.title.to_uppercase());
            out.push('\n');
            out.push_str(&section.body);
            out.push('\n');
        }
        out.push('\n');
        render_rows(&mut out, &self.sign_off, 2);
        out
    }

    pub fn to_json(&self) -> PrintoutResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub const PAYMENT_METHODS: [&str; 5] = ["Cash", "Cheque", "SHA", "Scheme", "M.R.M"];
pub const GATE_PASS_APPROVERS: [&str; 4] = [
    "Account Officer",
    "Health Record Officer",
    "Nurse In Charge",
    "Security Guard",
];
const GATE_PASS_NOTE: &str = "This form should be filled in duplicate, one copy to be retained in the ward and the other to be left in the main gate";

/// Pass the patient shows at the gate on leaving the hospital.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatePass {
    pub location: String,
    pub title: &'static str,
    pub fields: Vec<Field>,
    pub payment_methods: Vec<&'static str>,
    pub approvers: Vec<&'static str>,
}

impl GatePass {
    pub fn build(location: &str, patient: &Patient, data: &DischargeData, printed_at: NaiveDateTime) -> Self {
        Self {
            location: location.to_string(),
            title: "Ward gate pass",
            fields: vec![
                Field::blank("Paper No"),
                Field::new("Patient No", patient.openmrs_id().map(str::to_string)),
                Field::new("Date", Some(printed_at.format("%d/%m/%Y").to_string())),
                Field::new("Time", Some(printed_at.format("%I:%M %p").to_string())),
                Field::new("Patient names", patient.display_name().map(str::to_string)),
                Field::new("Age", age_text(patient)),
                Field::new("DOA", date_text(data.admission_datetime.as_deref())),
                Field::new("DOD", date_text(data.discharge_datetime.as_deref())),
            ],
            payment_methods: PAYMENT_METHODS.to_vec(),
            approvers: GATE_PASS_APPROVERS.to_vec(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        render_header(&mut out, &self.location, self.title);
        render_rows(&mut out, &self.fields[..4], 4);
        render_rows(&mut out, &self.fields[4..6], 2);
        render_rows(&mut out, &self.fields[6..], 2);

        out.push_str("\nMethod of payment (tick as appropriate)\n");
        let boxes: Vec<String> = self
            .payment_methods
            .iter()
            .map(|method| format!("{method} [ ]"))
            .collect();
        out.push_str(&boxes.join("  "));
        out.push_str(&format!("  {}\n", Field::blank("Other").render()));

        out.push_str("\nApproved By\n");
        for &approver in &self.approvers {
            let row = [Field::blank(approver), Field::blank("Sign"), Field::blank("Date")];
            render_rows(&mut out, &row, 3);
        }
        out.push_str(&format!("\nN/B: {GATE_PASS_NOTE}\n"));
        out
    }

    pub fn to_json(&self) -> PrintoutResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
