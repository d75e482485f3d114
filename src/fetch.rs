use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::ApiResult;

/// Lifecycle of the request behind a view. Exactly one holds at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Idle,
    Loading,
    Success,
    Failure,
}

/// Runs fetches in the background and hands back only the newest result.
///
/// Each `issue` gets a higher sequence number than the last; a response is
/// delivered only if its number is still the latest, anything older is
/// dropped. Every issued fetch reports back exactly once, a panicking one
/// as `ApiError::Task`. Dropping the driver aborts whatever is still in
/// flight.
pub struct FetchDriver<T> {
    seq: u64,
    pending: bool,
    tx: mpsc::UnboundedSender<(u64, ApiResult<T>)>,
    rx: mpsc::UnboundedReceiver<(u64, ApiResult<T>)>,
    tasks: Vec<AbortHandle>,
}

impl<T: Send + 'static> FetchDriver<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            seq: 0,
            pending: false,
            tx,
            rx,
            tasks: Vec::new(),
        }
    }

    /// True while the latest request has not been delivered.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Start `fetch`, superseding every earlier request. Must be called
    /// from within a tokio runtime.
    pub fn issue<F>(&mut self, fetch: F) -> u64
    where
        F: Future<Output = ApiResult<T>> + Send + 'static,
    {
        self.seq += 1;
        self.pending = true;
        let seq = self.seq;
        let tx = self.tx.clone();

        self.tasks.retain(|task| !task.is_finished());
        let fetch = tokio::spawn(fetch);
        self.tasks.push(fetch.abort_handle());
        tokio::spawn(async move {
            let result = fetch.await.unwrap_or_else(|e| Err(e.into()));
            // receiver gone means the view was torn down
            let _ = tx.send((seq, result));
        });
        seq
    }

    /// Result of the latest request if it has arrived. Never blocks.
    pub fn try_next(&mut self) -> Option<ApiResult<T>> {
        while let Ok((seq, result)) = self.rx.try_recv() {
            if let Some(result) = self.accept(seq, result) {
                return Some(result);
            }
        }
        None
    }

    /// Wait for the latest request's result. Returns `None` straight away
    /// when nothing is outstanding.
    pub async fn next(&mut self) -> Option<ApiResult<T>> {
        while self.pending {
            let (seq, result) = self.rx.recv().await?;
            if let Some(result) = self.accept(seq, result) {
                return Some(result);
            }
        }
        None
    }

    fn accept(&mut self, seq: u64, result: ApiResult<T>) -> Option<ApiResult<T>> {
        if seq != self.seq {
            tracing::debug!(seq, latest = self.seq, "Discarding stale response");
            return None;
        }
        self.pending = false;
        Some(result)
    }
}

impl<T: Send + 'static> Default for FetchDriver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for FetchDriver<T> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// State of a single-resource view: two phases, no idle.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceState<T> {
    Loading,
    Success(T),
    Failure(String),
}

impl<T> ResourceState<T> {
    pub fn status(&self) -> RequestStatus {
        match self {
            ResourceState::Loading => RequestStatus::Loading,
            ResourceState::Success(_) => RequestStatus::Success,
            ResourceState::Failure(_) => RequestStatus::Failure,
        }
    }
}

/// A resource fetched by key that refetches whenever the key changes.
pub struct Resource<K, T> {
    state: ResourceState<T>,
    driver: FetchDriver<T>,
    issued: Option<K>,
}

impl<K: Clone + PartialEq, T: Send + 'static> Resource<K, T> {
    pub fn new() -> Self {
        Self {
            state: ResourceState::Loading,
            driver: FetchDriver::new(),
            issued: None,
        }
    }

    pub fn state(&self) -> &ResourceState<T> {
        &self.state
    }

    /// Forget the last key so the next `ensure` refetches.
    pub fn invalidate(&mut self) {
        self.issued = None;
    }

    /// Start a fetch unless one was already issued for `key`.
    /// Returns true if a request was issued.
    pub fn ensure<F, Fut>(&mut self, key: K, fetch: F) -> bool
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        if self.issued.as_ref() == Some(&key) {
            return false;
        }
        self.issued = Some(key.clone());
        self.state = ResourceState::Loading;
        self.driver.issue(fetch(key));
        true
    }

    /// Apply an arrived result. Returns true if the state changed.
    pub fn poll(&mut self) -> bool {
        match self.driver.try_next() {
            Some(result) => {
                self.apply(result);
                true
            }
            None => false,
        }
    }

    /// Wait for the outstanding request, if any, and apply it.
    pub async fn wait(&mut self) -> &ResourceState<T> {
        if let Some(result) = self.driver.next().await {
            self.apply(result);
        }
        &self.state
    }

    fn apply(&mut self, result: ApiResult<T>) {
        self.state = match result {
            Ok(value) => ResourceState::Success(value),
            Err(e) => {
                tracing::warn!(error = %e, status = ?e.status(), "Request failed");
                ResourceState::Failure(e.to_string())
            }
        };
    }
}

impl<K: Clone + PartialEq, T: Send + 'static> Default for Resource<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
