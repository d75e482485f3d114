use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::api::{JobsApi, JobsRequest};
use crate::auth::AuthSession;
use crate::debounce::Debouncer;
use crate::error::ApiResult;
use crate::fetch::{FetchDriver, RequestStatus};
use crate::models::{EmploymentType, JobSummary, SalaryRange};

/// Filter and search input of the job listing.
#[derive(Debug, Clone)]
pub struct JobQuery {
    search_term: String,
    debounced_search: Debouncer<String>,
    employment_types: BTreeSet<EmploymentType>,
    minimum_package: Option<SalaryRange>,
}

impl JobQuery {
    pub fn new(debounce: Duration) -> Self {
        Self {
            search_term: String::new(),
            debounced_search: Debouncer::new(String::new(), debounce),
            employment_types: BTreeSet::new(),
            minimum_package: None,
        }
    }

    /// The search box as typed.
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// The search term requests are built from.
    pub fn debounced_search_term(&self) -> &str {
        self.debounced_search.value()
    }

    pub fn employment_types(&self) -> &BTreeSet<EmploymentType> {
        &self.employment_types
    }

    pub fn minimum_package(&self) -> Option<SalaryRange> {
        self.minimum_package
    }

    pub fn set_search_term(&mut self, term: &str, now: Instant) {
        self.search_term = term.to_string();
        self.debounced_search.set(self.search_term.clone(), now);
    }

    /// Add the type if absent, remove it if present. Unknown ids are ignored.
    /// Returns true if the filter set changed.
    pub fn toggle_employment_type(&mut self, id: &str) -> bool {
        let Some(kind) = EmploymentType::from_id(id) else {
            tracing::debug!(id, "Ignoring unknown employment type");
            return false;
        };
        if !self.employment_types.remove(&kind) {
            self.employment_types.insert(kind);
        }
        true
    }

    pub fn set_minimum_package(&mut self, floor: Option<SalaryRange>) {
        self.minimum_package = floor;
    }

    pub fn request(&self) -> JobsRequest {
        let search = self.debounced_search_term();
        JobsRequest {
            employment_types: self
                .employment_types
                .iter()
                .map(|t| t.id().to_string())
                .collect(),
            minimum_package: self.minimum_package.map(|m| m.id().to_string()),
            search: (!search.is_empty()).then(|| search.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListingState {
    Idle,
    Loading,
    Success(Vec<JobSummary>),
    Failure(String),
}

impl ListingState {
    pub fn status(&self) -> RequestStatus {
        match self {
            ListingState::Idle => RequestStatus::Idle,
            ListingState::Loading => RequestStatus::Loading,
            ListingState::Success(_) => RequestStatus::Success,
            ListingState::Failure(_) => RequestStatus::Failure,
        }
    }
}

/// Everything that determines a listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Trigger {
    request: JobsRequest,
    token: Option<String>,
}

/// The job listing: turns query changes into requests and tracks their
/// lifecycle.
///
/// Call [`JobListing::tick`] regularly (every UI frame). A change to the
/// debounced search term, the filter set, the salary floor or the session
/// token issues exactly one new request that supersedes any still in flight.
pub struct JobListing {
    api: Arc<dyn JobsApi>,
    session: watch::Receiver<AuthSession>,
    query: JobQuery,
    state: ListingState,
    driver: FetchDriver<Vec<JobSummary>>,
    last_trigger: Option<Trigger>,
}

impl JobListing {
    pub fn new(api: Arc<dyn JobsApi>, session: watch::Receiver<AuthSession>, debounce: Duration) -> Self {
        Self {
            api,
            session,
            query: JobQuery::new(debounce),
            state: ListingState::Idle,
            driver: FetchDriver::new(),
            last_trigger: None,
        }
    }

    pub fn query(&self) -> &JobQuery {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut JobQuery {
        &mut self.query
    }

    pub fn state(&self) -> &ListingState {
        &self.state
    }

    pub fn status(&self) -> RequestStatus {
        self.state.status()
    }

    /// Fetch again with the current inputs.
    pub fn retry(&mut self) {
        self.state = ListingState::Idle;
    }

    /// Apply the typed search term now and fetch again.
    pub fn submit_search(&mut self) {
        self.query.debounced_search.flush();
        self.state = ListingState::Idle;
    }

    /// When the pending search term will be applied, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.query.debounced_search.deadline()
    }

    /// Advance timers, issue a request if the inputs changed, and apply any
    /// response that has arrived. Returns true if the state changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.query.debounced_search.poll(now);

        let mut changed = self.issue_if_needed();
        while let Some(result) = self.driver.try_next() {
            self.apply(result);
            changed = true;
        }
        changed
    }

    /// Issue the current request (if needed) and wait for its outcome.
    pub async fn load(&mut self) -> &ListingState {
        self.issue_if_needed();
        if let Some(result) = self.driver.next().await {
            self.apply(result);
        }
        &self.state
    }

    fn issue_if_needed(&mut self) -> bool {
        let trigger = Trigger {
            request: self.query.request(),
            token: self.session.borrow().token.clone(),
        };
        let idle = self.state == ListingState::Idle;
        if !idle && self.last_trigger.as_ref() == Some(&trigger) {
            return false;
        }

        let api = Arc::clone(&self.api);
        let request = trigger.request.clone();
        let token = trigger.token.clone();
        let seq = self.driver.issue(async move { api.list_jobs(&request, token.as_deref()).await });
        tracing::debug!(
            seq,
            params = ?trigger.request.query_pairs(),
            has_token = trigger.token.is_some(),
            "Fetching jobs"
        );

        self.last_trigger = Some(trigger);
        self.state = ListingState::Loading;
        true
    }

    fn apply(&mut self, result: ApiResult<Vec<JobSummary>>) {
        self.state = match result {
            Ok(jobs) => {
                tracing::info!(count = jobs.len(), "Jobs loaded");
                ListingState::Success(jobs)
            }
            Err(e) => {
                tracing::warn!(error = %e, status = ?e.status(), "Error fetching jobs");
                ListingState::Failure(e.to_string())
            }
        };
    }
}
