//! Fetchers for the three ward sources plus the discharged-encounter search.
//!
//! Each fetcher is a [`Query`]: it names its cache key (or `None` when there is
//! nothing to ask yet), may declare itself not applicable, and performs the
//! actual EMR call. [`QueryCache::run`] turns a query into a [`QueryState`].

mod admission_location;
mod cache;
mod discharge_encounter;
mod inpatient_admission;
mod inpatient_request;

pub use admission_location::*;
pub use cache::*;
pub use discharge_encounter::*;
pub use inpatient_admission::*;
pub use inpatient_request::*;

use std::sync::Arc;

use serde::Serialize;

use crate::emr::{EmrApi, EmrError, EmrResult};

/// Outcome of a query.
#[derive(Debug)]
pub enum QueryState<T> {
    /// No location yet, so no request was issued.
    NoQuery,
    /// The capability the query needs is not installed. Not an error.
    NotApplicable,
    /// Not fetched yet.
    Pending,
    Ready(Arc<T>),
    /// A re-fetch failed; `data` is the last payload that loaded.
    Stale { data: Arc<T>, error: Arc<EmrError> },
    Failed(Arc<EmrError>),
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        match self {
            QueryState::NoQuery => QueryState::NoQuery,
            QueryState::NotApplicable => QueryState::NotApplicable,
            QueryState::Pending => QueryState::Pending,
            QueryState::Ready(value) => QueryState::Ready(Arc::clone(value)),
            QueryState::Stale { data, error } => QueryState::Stale {
                data: Arc::clone(data),
                error: Arc::clone(error),
            },
            QueryState::Failed(err) => QueryState::Failed(Arc::clone(err)),
        }
    }
}

impl<T> QueryState<T> {
    pub fn data(&self) -> Option<&Arc<T>> {
        match self {
            QueryState::Ready(value) | QueryState::Stale { data: value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Arc<EmrError>> {
        match self {
            QueryState::Failed(err) | QueryState::Stale { error: err, .. } => Some(err),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, QueryState::Pending)
    }
}

/// A cacheable EMR read.
pub trait Query {
    type Output: Serialize + Send + Sync + 'static;

    /// Cache key, or `None` when the query has nothing to ask.
    fn key(&self) -> Option<String>;

    /// Checked before any request is issued.
    fn is_applicable(&self, _api: &dyn EmrApi) -> bool {
        true
    }

    fn fetch(&self, api: &dyn EmrApi) -> EmrResult<Self::Output>;
}
