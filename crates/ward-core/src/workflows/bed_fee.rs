//! Daily bed fee reconciliation against the patient's bills.

use crate::models::{Bill, PaymentStatus};

/// Billing state of a patient's stay.
#[derive(Debug, Clone, PartialEq)]
pub struct BedFeeStatus {
    pub days_in_ward: i64,
    /// Daily bed fee units billed across the patient's bills.
    pub days_billed: u64,
    pub pending_bills: Vec<Bill>,
}

impl BedFeeStatus {
    pub fn from_bills(bills: &[Bill], daily_bed_fee_service: &str, days_in_ward: i64) -> Self {
        Self {
            days_in_ward,
            days_billed: billed_bed_days(bills, daily_bed_fee_service),
            pending_bills: pending_bills(bills).into_iter().cloned().collect(),
        }
    }

    /// Settled when the billed bed days equal the days in the ward. A stay of
    /// zero days is always settled.
    pub fn is_settled(&self) -> bool {
        self.days_in_ward <= 0 || u64::try_from(self.days_in_ward) == Ok(self.days_billed)
    }
}

fn live(bills: &[Bill]) -> impl Iterator<Item = &Bill> {
    bills.iter().filter(|b| !b.voided)
}

/// Sum of daily bed fee quantities over the non-voided bills.
pub fn billed_bed_days(bills: &[Bill], daily_bed_fee_service: &str) -> u64 {
    live(bills)
        .map(|b| b.quantity_for_service(daily_bed_fee_service))
        .sum()
}

pub fn pending_bills(bills: &[Bill]) -> Vec<&Bill> {
    live(bills)
        .filter(|b| b.status == PaymentStatus::Pending)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillLineItem;

    const BED_FEE: &str = "bed-fee";

    fn bill(uuid: &str, status: PaymentStatus, items: &[(&str, u32)]) -> Bill {
        Bill {
            uuid: uuid.into(),
            status,
            line_items: items
                .iter()
                .map(|(service, quantity)| BillLineItem {
                    billable_service: Some(service.to_string()),
                    quantity: *quantity,
                    ..BillLineItem::default()
                })
                .collect(),
            ..Bill::default()
        }
    }

    fn settled(bills: &[Bill], days_in_ward: i64) -> bool {
        BedFeeStatus::from_bills(bills, BED_FEE, days_in_ward).is_settled()
    }

    #[test]
    fn test_zero_days_is_settled() {
        assert!(settled(&[], 0));
    }

    #[test]
    fn test_quantities_summed_across_bills() {
        let bills = vec![
            bill("b-1", PaymentStatus::Paid, &[(BED_FEE, 2), ("lab", 1)]),
            bill("b-2", PaymentStatus::Pending, &[(BED_FEE, 1)]),
        ];
        assert!(settled(&bills, 3));
        assert!(!settled(&bills, 4));
        assert!(!settled(&bills, 2));
    }

    #[test]
    fn test_voided_bills_ignored() {
        let mut voided = bill("b-1", PaymentStatus::Pending, &[(BED_FEE, 3)]);
        voided.voided = true;
        let bills = vec![voided];
        assert!(!settled(&bills, 3));
        assert!(pending_bills(&bills).is_empty());
    }

    #[test]
    fn test_large_quantities_do_not_wrap() {
        let bills = vec![
            bill("b-1", PaymentStatus::Paid, &[(BED_FEE, u32::MAX)]),
            bill("b-2", PaymentStatus::Paid, &[(BED_FEE, 2)]),
        ];
        assert_eq!(billed_bed_days(&bills, BED_FEE), u64::from(u32::MAX) + 2);
        assert!(!settled(&bills, 1));
        assert!(settled(&bills, i64::from(u32::MAX) + 2));
    }

    #[test]
    fn test_status_reports_pending_bills() {
        let bills = vec![
            bill("b-1", PaymentStatus::Paid, &[(BED_FEE, 1)]),
            bill("b-2", PaymentStatus::Pending, &[]),
        ];
        let status = BedFeeStatus::from_bills(&bills, BED_FEE, 1);
        assert!(status.is_settled());
        assert_eq!(status.days_billed, 1);
        assert_eq!(status.pending_bills.len(), 1);
        assert_eq!(status.pending_bills[0].uuid, "b-2");
    }
}
