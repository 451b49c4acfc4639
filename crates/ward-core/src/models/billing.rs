//! Patient bills, used to gate bed release on the daily bed fee.

use serde::{Deserialize, Serialize};

use super::ResourceRef;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Posted,
    #[default]
    Pending,
    Paid,
    Credited,
    Cancelled,
    Adjusted,
    Exempted,
}

/// A line on a bill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BillLineItem {
    #[serde(default)]
    pub uuid: Option<String>,
    /// Billable service uuid (the EMR sends a plain uuid string here).
    #[serde(default)]
    pub billable_service: Option<String>,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub uuid: String,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub patient: Option<ResourceRef>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub voided: bool,
    #[serde(default)]
    pub line_items: Vec<BillLineItem>,
}

impl Bill {
    /// Total quantity billed for one service on this bill.
    pub fn quantity_for_service(&self, service_uuid: &str) -> u64 {
        self.line_items
            .iter()
            .filter(|item| item.billable_service.as_deref() == Some(service_uuid))
            .map(|item| u64::from(item.quantity))
            .sum()
    }
}
