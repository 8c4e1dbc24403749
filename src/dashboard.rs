//! Admin dashboard state.
//!
//! Every refresh reloads the whole lead list and rebuilds the report. Each
//! refresh takes a ticket from a monotonic counter; a result is applied only
//! when its ticket is newer than the last applied one, so a slow early fetch
//! can't overwrite a later one. Failed fetches keep the previous report.

use crate::analyzer::report::{self, LeadReport};
use crate::events::{LeadEvents, Subscription};
use crate::lead::Lead;
use crate::store::{LeadStore, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    Failed,
    Stale,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub backend: &'static str,
    pub report: Option<LeadReport>,
    pub refreshed_at: Option<String>,
    pub last_error: Option<String>,
    pub stale: bool,
}

#[derive(Debug, Default)]
struct DashboardState {
    report: Option<LeadReport>,
    refreshed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    applied: u64,
}

pub struct Dashboard {
    store: Arc<dyn LeadStore>,
    sequence: AtomicU64,
    state: Mutex<DashboardState>,
}

impl Dashboard {
    pub fn new(store: Arc<dyn LeadStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            sequence: AtomicU64::new(0),
            state: Mutex::new(DashboardState::default()),
        })
    }

    /// Runs an initial refresh and recomputes on every later lead change.
    pub fn mount(self: &Arc<Self>, events: &LeadEvents) -> Subscription {
        self.refresh();

        let dashboard = Arc::downgrade(self);
        events.subscribe(move |change| {
            if let Some(dashboard) = dashboard.upgrade() {
                debug!(?change, "lead change received, recomputing dashboard");
                dashboard.refresh();
            }
        })
    }

    pub fn refresh(&self) -> RefreshOutcome {
        let ticket = self.begin_refresh();
        let leads = self.store.list_all();
        self.complete(ticket, leads, Utc::now())
    }

    pub fn begin_refresh(&self) -> RefreshTicket {
        RefreshTicket(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn complete(
        &self,
        ticket: RefreshTicket,
        leads: Result<Vec<Lead>, StoreError>,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if ticket.0 <= state.applied {
            debug!(ticket = ticket.0, applied = state.applied, "discarding stale dashboard refresh");
            return RefreshOutcome::Stale;
        }
        state.applied = ticket.0;

        match leads {
            Ok(leads) => {
                state.report = Some(report::build_report(&leads, now.date_naive(), now));
                state.refreshed_at = Some(now);
                state.last_error = None;
                RefreshOutcome::Applied
            }
            Err(error) => {
                warn!(error = %error, backend = self.store.backend_name(), "dashboard refresh failed; keeping last report");
                state.last_error = Some(error.to_string());
                RefreshOutcome::Failed
            }
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        DashboardSnapshot {
            backend: self.store.backend_name(),
            report: state.report.clone(),
            refreshed_at: state.refreshed_at.map(|at| at.to_rfc3339()),
            last_error: state.last_error.clone(),
            stale: state.last_error.is_some() && state.report.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Dashboard, RefreshOutcome};
    use crate::events::LeadEvents;
    use crate::intake::{self, SignupForm};
    use crate::lead::{Lead, NewLead, Plan, University};
    use crate::store::{LeadStore, MemoryStore, StoreError};
    use anyhow::anyhow;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakyStore {
        inner: MemoryStore,
        down: AtomicBool,
    }

    impl LeadStore for FlakyStore {
        fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
            self.inner.insert(lead)
        }

        fn list_all(&self) -> Result<Vec<Lead>, StoreError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(anyhow!("connection refused").into());
            }
            self.inner.list_all()
        }

        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    fn lead(email: &str, plan: Plan) -> Lead {
        Lead {
            id: None,
            email: email.to_string(),
            name: None,
            phone: None,
            university: University::Ucl,
            selected_plan: plan,
            created_at: Utc::now(),
        }
    }

    fn signup(email: &str) -> SignupForm {
        SignupForm {
            email: email.to_string(),
            university: "lse".to_string(),
            plan: Some("free".to_string()),
            ..SignupForm::default()
        }
    }

    #[test]
    fn stale_refresh_does_not_overwrite_newer_result() {
        let dashboard = Dashboard::new(Arc::new(MemoryStore::new()));

        let first = dashboard.begin_refresh();
        let second = dashboard.begin_refresh();

        let newer = dashboard.complete(second, Ok(vec![lead("a@x.com", Plan::Free)]), Utc::now());
        let older = dashboard.complete(
            first,
            Ok(vec![lead("a@x.com", Plan::Free), lead("b@x.com", Plan::Premium)]),
            Utc::now(),
        );

        assert_eq!(newer, RefreshOutcome::Applied);
        assert_eq!(older, RefreshOutcome::Stale);
        let report = dashboard.snapshot().report.expect("report");
        assert_eq!(report.stats.total, 1);
    }

    #[test]
    fn failed_refresh_keeps_last_report_visible() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::with_leads(vec![lead("a@x.com", Plan::Premium)]),
            down: AtomicBool::new(false),
        });
        let dashboard = Dashboard::new(store.clone());

        assert_eq!(dashboard.refresh(), RefreshOutcome::Applied);
        store.down.store(true, Ordering::SeqCst);
        assert_eq!(dashboard.refresh(), RefreshOutcome::Failed);

        let snapshot = dashboard.snapshot();
        assert!(snapshot.stale);
        assert!(snapshot.last_error.is_some_and(|error| error.contains("connection refused")));
        assert_eq!(snapshot.report.expect("report").stats.premium, 1);

        store.down.store(false, Ordering::SeqCst);
        assert_eq!(dashboard.refresh(), RefreshOutcome::Applied);
        let recovered = dashboard.snapshot();
        assert!(!recovered.stale);
        assert!(recovered.last_error.is_none());
    }

    #[test]
    fn mounted_dashboard_recomputes_on_every_signup() {
        let store: Arc<dyn LeadStore> = Arc::new(MemoryStore::new());
        let events = LeadEvents::new();
        let dashboard = Dashboard::new(Arc::clone(&store));
        let subscription = dashboard.mount(&events);

        assert_eq!(dashboard.snapshot().report.expect("initial").stats.total, 0);

        intake::submit(store.as_ref(), &events, &signup("a@x.com")).expect("signup");
        intake::submit(store.as_ref(), &events, &signup("b@x.com")).expect("signup");
        assert_eq!(dashboard.snapshot().report.expect("report").stats.total, 2);

        subscription.unsubscribe();
        intake::submit(store.as_ref(), &events, &signup("c@x.com")).expect("signup");
        assert_eq!(dashboard.snapshot().report.expect("report").stats.total, 2);
    }
}
