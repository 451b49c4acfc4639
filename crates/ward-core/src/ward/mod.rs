//! Ward view model: reconciliation, metrics, line list, table rows and the
//! per-patient in-patient detail.

mod line_list;
mod metrics;
mod patient_detail;
mod reconciler;
mod table;

pub use line_list::*;
pub use metrics::*;
pub use patient_detail::*;
pub use reconciler::*;
pub use table::*;
