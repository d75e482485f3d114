use std::sync::Arc;
use tokio::sync::watch;

use crate::api::JobsApi;
use crate::auth::AuthSession;
use crate::fetch::{Resource, ResourceState};
use crate::models::Profile;

/// The signed-in user's profile card, refetched when the token changes.
pub struct ProfileModel {
    api: Arc<dyn JobsApi>,
    session: watch::Receiver<AuthSession>,
    resource: Resource<Option<String>, Profile>,
}

impl ProfileModel {
    pub fn new(api: Arc<dyn JobsApi>, session: watch::Receiver<AuthSession>) -> Self {
        Self {
            api,
            session,
            resource: Resource::new(),
        }
    }

    pub fn state(&self) -> &ResourceState<Profile> {
        self.resource.state()
    }

    pub fn retry(&mut self) {
        self.resource.invalidate();
    }

    pub fn tick(&mut self) -> bool {
        let issued = self.issue_if_needed();
        self.resource.poll() || issued
    }

    pub async fn load(&mut self) -> &ResourceState<Profile> {
        self.issue_if_needed();
        self.resource.wait().await
    }

    fn issue_if_needed(&mut self) -> bool {
        let token = self.session.borrow().token.clone();
        let api = Arc::clone(&self.api);
        self.resource.ensure(token, |token| async move {
            api.profile(token.as_deref()).await
        })
    }
}
