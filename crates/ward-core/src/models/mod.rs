//! Domain models for the ward view.
//!
//! Wire types mirror the EMR's REST representations (camelCase JSON). Derived
//! types such as [`WardPatient`] are never sent back to the EMR.

mod billing;
mod encounter;
mod inpatient;
mod location;
mod patient;
mod resource;
mod ward_patient;

pub use billing::*;
pub use encounter::*;
pub use inpatient::*;
pub use location::*;
pub use patient::*;
pub use resource::*;
pub use ward_patient::*;
