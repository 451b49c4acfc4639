//! Printable discharge documents for a single in-patient.
//!
//! [`DischargeAssembler`] walks the visit behind a discharge encounter and
//! collects diagnoses, orders, complaints, drug reactions, examination notes
//! and discharge instructions. Each section degrades on its own when the fetch
//! behind it fails. [`DischargeSummary`] and [`GatePass`] turn the assembled
//! data into plain-text documents.

pub mod assembler;
pub mod document;
pub mod lab;

pub use assembler::*;
pub use document::*;
pub use lab::*;

use thiserror::Error;

/// Printout errors.
#[derive(Error, Debug)]
pub enum PrintoutError {
    #[error("{section} unavailable: {message}")]
    SectionFailed {
        section: &'static str,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PrintoutResult<T> = Result<T, PrintoutError>;
