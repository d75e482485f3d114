use tokio::sync::watch;

use crate::router::Route;
use crate::storage::TokenStore;

/// Snapshot of the authentication state shared with every view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: Option<String>,
    /// True until the persisted token has been read once.
    pub initializing: bool,
}

impl AuthSession {
    fn starting() -> Self {
        Self {
            token: None,
            initializing: true,
        }
    }
}

/// Single writer for the session token.
///
/// Readers call [`AuthStore::subscribe`] and react to changes; only
/// `initialize`, `login` and `logout` mutate the session.
pub struct AuthStore {
    store: Box<dyn TokenStore>,
    session_tx: watch::Sender<AuthSession>,
}

impl AuthStore {
    pub fn new(store: Box<dyn TokenStore>) -> Self {
        let (session_tx, _) = watch::channel(AuthSession::starting());
        Self { store, session_tx }
    }

    /// Restore the persisted token. Only the first call reads storage.
    pub fn initialize(&self) {
        if !self.session_tx.borrow().initializing {
            tracing::debug!("Session already initialized");
            return;
        }

        let token = match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored session, continuing logged out");
                None
            }
        };
        tracing::info!(has_token = token.is_some(), "Session restored");

        self.session_tx.send_modify(|session| {
            session.token = token;
            session.initializing = false;
        });
    }

    /// Persist `token`, make it current, and ask to show the job listing.
    pub fn login(&self, token: &str) -> Route {
        if let Err(e) = self.store.save(token) {
            tracing::warn!(error = %e, "Could not persist session token");
        }
        self.session_tx.send_modify(|session| {
            session.token = Some(token.to_string());
        });
        tracing::info!("Logged in");
        Route::Jobs
    }

    /// Forget the token everywhere and ask to show the login view.
    pub fn logout(&self) -> Route {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Could not remove stored session token");
        }
        self.session_tx.send_modify(|session| {
            session.token = None;
        });
        tracing::info!("Logged out");
        Route::Login
    }

    pub fn current_token(&self) -> Option<String> {
        self.session_tx.borrow().token.clone()
    }

    pub fn is_initializing(&self) -> bool {
        self.session_tx.borrow().initializing
    }

    pub fn session(&self) -> AuthSession {
        self.session_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSession> {
        self.session_tx.subscribe()
    }
}
