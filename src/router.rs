use std::fmt;

use crate::auth::AuthSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Jobs,
    JobDetail(String),
    NotFound,
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let trimmed = path.trim().trim_end_matches('/');
        let segments: Vec<&str> = trimmed
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["jobs"] => Route::Jobs,
            ["jobs", id] => Route::JobDetail(id.to_string()),
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Jobs => "/jobs".to_string(),
            Route::JobDetail(id) => format!("/jobs/{}", id),
            Route::NotFound => "/not-found".to_string(),
        }
    }

    /// Routes that need a session token.
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Jobs | Route::JobDetail(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// --- Route guard ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Stored session not read yet; no decision can be made.
    AwaitingSession,
    Authorized,
    Unauthorized,
}

pub fn guard(session: &AuthSession) -> GuardState {
    if session.initializing {
        GuardState::AwaitingSession
    } else if session.token.is_some() {
        GuardState::Authorized
    } else {
        GuardState::Unauthorized
    }
}

/// What to show for a requested route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Neutral loading indicator while the session is restored.
    Loading,
    Render(Route),
    /// Replace the requested route. The original destination is not kept.
    Redirect(Route),
}

pub fn resolve(route: Route, session: &AuthSession) -> Resolution {
    if !route.is_protected() {
        return Resolution::Render(route);
    }
    match guard(session) {
        GuardState::AwaitingSession => Resolution::Loading,
        GuardState::Authorized => Resolution::Render(route),
        GuardState::Unauthorized => Resolution::Redirect(Route::Login),
    }
}
