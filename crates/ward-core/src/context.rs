//! Ward view context.
//!
//! One [`WardViewContext`] exists per rendered ward location. It owns the
//! request cache and the memoizing reconciler, and publishes each resulting
//! [`WardView`] to any number of [`WardViewReader`]s. Readers can only look;
//! refreshing and invalidating need `&mut WardViewContext`, so only the owner
//! (and the workflows it lends itself to) can trigger a re-fetch.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::config::{ErrorPolicy, WardConfig};
use crate::emr::{DischargedEncounterPage, EmrApi, EmrError};
use crate::fetch::{
    AdmissionLocationQuery, DischargedEncounterQuery, InpatientAdmissionQuery,
    InpatientRequestQuery, QueryCache, QueryState,
};
use crate::models::{AdmissionLocation, InpatientAdmission, InpatientRequest, Location};
use crate::ward::{ReconcileInputs, ReconciledWard, WardMetrics, WardReconciler};

/// The data sources behind a ward view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WardSource {
    Beds,
    Admissions,
    Requests,
    Discharged,
}

/// Overall state of a ward view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    /// No ward location was given.
    NoLocation,
    Loading,
    Error,
    Ready,
}

/// Everything a ward screen renders, as of the last refresh.
#[derive(Debug, Clone)]
pub struct WardView {
    pub location_uuid: Option<String>,
    pub beds: QueryState<AdmissionLocation>,
    pub admissions: QueryState<Vec<InpatientAdmission>>,
    pub requests: QueryState<Vec<InpatientRequest>>,
    pub discharged: QueryState<DischargedEncounterPage>,
    pub reconciled: Option<Arc<ReconciledWard>>,
    pub metrics: Option<WardMetrics>,
    /// Set when the view as a whole is in the error state.
    pub error: Option<Arc<EmrError>>,
    /// Every failed source, in source order.
    pub source_errors: Vec<(WardSource, Arc<EmrError>)>,
}

impl WardView {
    fn pending(location_uuid: Option<String>) -> Self {
        let (state_a, state_b, state_c, state_d) = if location_uuid.is_some() {
            (QueryState::Pending, QueryState::Pending, QueryState::Pending, QueryState::Pending)
        } else {
            (QueryState::NoQuery, QueryState::NoQuery, QueryState::NoQuery, QueryState::NoQuery)
        };
        Self {
            location_uuid,
            beds: state_a,
            admissions: state_b,
            requests: state_c,
            discharged: state_d,
            reconciled: None,
            metrics: None,
            error: None,
            source_errors: Vec::new(),
        }
    }

    pub fn status(&self) -> ViewStatus {
        if self.location_uuid.is_none() {
            ViewStatus::NoLocation
        } else if self.error.is_some() {
            ViewStatus::Error
        } else if self.beds.is_pending() || self.admissions.is_pending() || self.requests.is_pending() {
            ViewStatus::Loading
        } else {
            ViewStatus::Ready
        }
    }

    /// The ward location, known once the bed layout has loaded.
    pub fn ward(&self) -> Option<&Location> {
        self.beds.data().map(|b| &b.ward)
    }

    pub fn source_error(&self, source: WardSource) -> Option<&Arc<EmrError>> {
        self.source_errors
            .iter()
            .find(|(s, _)| *s == source)
            .map(|(_, e)| e)
    }
}

/// Read-only handle to the views published by a [`WardViewContext`].
#[derive(Debug, Clone)]
pub struct WardViewReader {
    published: Arc<RwLock<Arc<WardView>>>,
}

impl WardViewReader {
    /// The most recently published view.
    pub fn current(&self) -> Arc<WardView> {
        let guard = self.published.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }
}

/// Owner of one ward view.
pub struct WardViewContext {
    api: Arc<dyn EmrApi>,
    config: Arc<WardConfig>,
    location_uuid: Option<String>,
    cache: QueryCache,
    reconciler: WardReconciler,
    discharged_page: usize,
    discharged_page_size: usize,
    published: Arc<RwLock<Arc<WardView>>>,
}

fn first_error(sources: &[(WardSource, Option<&Arc<EmrError>>)]) -> Vec<(WardSource, Arc<EmrError>)> {
    sources
        .iter()
        .filter_map(|(source, err)| err.map(|e| (*source, Arc::clone(e))))
        .collect()
}

impl WardViewContext {
    pub fn new(api: Arc<dyn EmrApi>, config: Arc<WardConfig>, location_uuid: Option<&str>) -> Self {
        let location_uuid = location_uuid.map(str::to_string);
        let page_size = config.default_page_size();
        let reconciler = WardReconciler::new(config.encounter_types.ipd_discharge.clone());
        Self {
            published: Arc::new(RwLock::new(Arc::new(WardView::pending(location_uuid.clone())))),
            api,
            config,
            location_uuid,
            cache: QueryCache::new(),
            reconciler,
            discharged_page: 1,
            discharged_page_size: page_size,
        }
    }

    pub fn location_uuid(&self) -> Option<&str> {
        self.location_uuid.as_deref()
    }

    pub fn config(&self) -> &WardConfig {
        &self.config
    }

    pub fn api(&self) -> &dyn EmrApi {
        self.api.as_ref()
    }

    pub fn reader(&self) -> WardViewReader {
        WardViewReader {
            published: Arc::clone(&self.published),
        }
    }

    /// The current published view.
    pub fn view(&self) -> Arc<WardView> {
        self.reader().current()
    }

    /// How many times reconciliation actually ran.
    pub fn reconcile_runs(&self) -> u64 {
        self.reconciler.runs()
    }

    /// Resolve every source (cached where fresh), reconcile, and publish.
    pub fn refresh(&mut self) -> Arc<WardView> {
        let location = self.location_uuid.as_deref();
        let api = self.api.as_ref();

        let beds = self.cache.run(api, &AdmissionLocationQuery::new(location));
        let admissions = self.cache.run(api, &InpatientAdmissionQuery::new(location));
        let requests = self.cache.run(api, &InpatientRequestQuery::new(location));
        let discharged = self.cache.run(
            api,
            &DischargedEncounterQuery::new(
                location,
                &self.config.encounter_types.ipd_discharge,
                self.discharged_page,
                self.discharged_page_size,
            ),
        );

        let source_errors = first_error(&[
            (WardSource::Beds, beds.error()),
            (WardSource::Admissions, admissions.error()),
            (WardSource::Requests, requests.error()),
            (WardSource::Discharged, discharged.error()),
        ]);
        let error = match self.config.error_policy {
            ErrorPolicy::WholeView => source_errors
                .iter()
                .find(|(s, _)| *s != WardSource::Discharged)
                .map(|(_, e)| Arc::clone(e)),
            ErrorPolicy::Partial => None,
        };

        let (reconciled, metrics) = if location.is_some() && error.is_none() {
            let ward = self.reconciler.reconcile(ReconcileInputs {
                beds: beds.data().cloned(),
                admissions: admissions.data().cloned(),
                requests: requests.data().cloned(),
            });
            let metrics = WardMetrics::from_ward(&ward, discharged.data().map(|d| d.total));
            (Some(ward), Some(metrics))
        } else {
            (None, None)
        };

        let view = Arc::new(WardView {
            location_uuid: self.location_uuid.clone(),
            beds,
            admissions,
            requests,
            discharged,
            reconciled,
            metrics,
            error,
            source_errors,
        });
        debug!(location = ?self.location_uuid, status = ?view.status(), "published ward view");
        self.publish(Arc::clone(&view));
        view
    }

    fn publish(&self, view: Arc<WardView>) {
        let mut guard = self.published.write().unwrap_or_else(|p| p.into_inner());
        *guard = view;
    }

    /// Mark every cached source stale and re-fetch.
    pub fn invalidate(&mut self) -> Arc<WardView> {
        info!(location = ?self.location_uuid, "invalidating ward view");
        self.cache.invalidate_all();
        self.refresh()
    }

    /// Revalidate when the screen regains focus.
    pub fn revalidate_on_focus(&mut self) -> Arc<WardView> {
        self.invalidate()
    }

    /// Switch the discharged-patients page and refresh.
    pub fn set_discharged_page(&mut self, page: usize, page_size: usize) -> Arc<WardView> {
        self.discharged_page = page.max(1);
        self.discharged_page_size = page_size.max(1);
        self.refresh()
    }
}
