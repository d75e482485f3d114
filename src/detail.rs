use std::sync::Arc;
use tokio::sync::watch;

use crate::api::JobsApi;
use crate::auth::AuthSession;
use crate::fetch::{RequestStatus, Resource, ResourceState};
use crate::models::JobDetailPage;

/// A job detail page keyed by job id.
///
/// Refetches whenever the id or the session token changes. The job and its
/// similar jobs arrive in one response and are stored together.
pub struct JobDetailModel {
    api: Arc<dyn JobsApi>,
    session: watch::Receiver<AuthSession>,
    id: String,
    resource: Resource<(String, Option<String>), JobDetailPage>,
}

impl JobDetailModel {
    pub fn new(api: Arc<dyn JobsApi>, session: watch::Receiver<AuthSession>, id: &str) -> Self {
        Self {
            api,
            session,
            id: id.to_string(),
            resource: Resource::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    pub fn state(&self) -> &ResourceState<JobDetailPage> {
        self.resource.state()
    }

    pub fn status(&self) -> RequestStatus {
        self.resource.state().status()
    }

    pub fn retry(&mut self) {
        self.resource.invalidate();
    }

    /// Issue a request if the id or token changed and apply any arrived
    /// response. Returns true if the state changed.
    pub fn tick(&mut self) -> bool {
        let issued = self.issue_if_needed();
        self.resource.poll() || issued
    }

    pub async fn load(&mut self) -> &ResourceState<JobDetailPage> {
        self.issue_if_needed();
        self.resource.wait().await
    }

    fn issue_if_needed(&mut self) -> bool {
        let key = (self.id.clone(), self.session.borrow().token.clone());
        let api = Arc::clone(&self.api);
        self.resource.ensure(key, |(id, token)| {
            tracing::debug!(id = %id, has_token = token.is_some(), "Fetching job details");
            async move { api.job_details(&id, token.as_deref()).await }
        })
    }
}
