//! Remote HTTP storage.
//!
//! Talks to a small REST surface:
//!
//! | Method   | Path            | Meaning                          |
//! |----------|-----------------|----------------------------------|
//! | `GET`    | `{base}/todos`  | JSON array of tasks              |
//! | `POST`   | `{base}/todos`  | replace the collection (array)   |
//! | `DELETE` | `{base}/todos`  | clear the collection             |
//!
//! Each attempt is bounded by a timeout. Transport failures are retried with
//! a fixed delay; timeouts and HTTP error statuses are not.

use super::{StorageFuture, StorageStrategy, StrategyKind};
use crate::error::{StorageError, StorageErrorKind};
use crate::types::Task;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use taskstore_core::environment::{Clock, SystemClock};
use taskstore_runtime::retry::{RetryPolicy, retry_with_predicate};
use thiserror::Error;
use tokio::sync::broadcast;

/// Connection settings for [`RemoteStorage`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    /// API root, e.g. `http://localhost:3000/api`
    pub base_url: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt for transport failures
    pub retry_count: usize,
    /// Fixed pause between retries
    pub retry_delay: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout: Duration::from_secs(10),
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl RemoteConfig {
    /// Config for `base_url` with default timeout and retries
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// Lifecycle notifications broadcast by [`RemoteStorage`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteEvent {
    /// An exchange with the API started
    SyncStarted {
        /// When it started
        at: DateTime<Utc>,
    },
    /// An exchange finished successfully
    SyncSucceeded {
        /// Tasks read or written
        count: usize,
        /// When it finished
        at: DateTime<Utc>,
    },
    /// An exchange failed
    SyncFailed {
        /// Failure classification
        kind: StorageErrorKind,
        /// Failure description
        message: String,
        /// When it failed
        at: DateTime<Utc>,
    },
    /// Connectivity flipped
    ConnectionChanged {
        /// New connectivity
        connected: bool,
        /// When it changed
        at: DateTime<Utc>,
    },
}

impl RemoteEvent {
    /// When the event happened
    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::SyncStarted { at }
            | Self::SyncSucceeded { at, .. }
            | Self::SyncFailed { at, .. }
            | Self::ConnectionChanged { at, .. } => *at,
        }
    }
}

/// Connectivity snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteStatus {
    /// The strategy may be used (not marked offline)
    pub available: bool,
    /// The last exchange succeeded
    pub connected: bool,
    /// Time of the last successful exchange
    pub last_sync: Option<DateTime<Utc>>,
}

/// Failure of a single HTTP attempt
#[derive(Debug, Error)]
enum AttemptError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("server responded with {0}")]
    Status(StatusCode),
}

/// Task storage backed by an HTTP API
pub struct RemoteStorage {
    client: Client,
    config: RemoteConfig,
    token: RwLock<Option<String>>,
    online: AtomicBool,
    connected: AtomicBool,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    events: broadcast::Sender<RemoteEvent>,
    clock: Arc<dyn Clock>,
}

impl RemoteStorage {
    /// Create a client for the configured API
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        let (events, _) = broadcast::channel(32);
        let base_url = config.base_url.trim_end_matches('/').to_string();

        Self {
            client: Client::new(),
            config: RemoteConfig { base_url, ..config },
            token: RwLock::new(None),
            online: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            last_sync: Mutex::new(None),
            events,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a specific clock for event and sync timestamps
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach `Authorization: Bearer <token>` to every request
    pub fn set_auth_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Stop sending a bearer token
    pub fn clear_auth_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Subscribe to lifecycle events; drop the receiver to unsubscribe
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RemoteEvent> {
        self.events.subscribe()
    }

    /// Current connectivity
    #[must_use]
    pub fn status(&self) -> RemoteStatus {
        RemoteStatus {
            available: self.is_available(),
            connected: self.connected.load(Ordering::Acquire),
            last_sync: *self.last_sync.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Mark the network as up or down
    ///
    /// While offline, [`StorageStrategy::is_available`] reports `false` and
    /// the coordinator will not fall back to this strategy.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
        self.set_connected(online);
    }

    /// Re-evaluate connectivity from availability, returning it
    pub fn check_connection(&self) -> bool {
        let connected = self.is_available();
        self.set_connected(connected);
        connected
    }

    /// Read the collection once to refresh status
    ///
    /// # Errors
    ///
    /// Returns the [`StorageError`] of the underlying read.
    pub async fn sync(&self) -> Result<(), StorageError> {
        self.fetch().await.map(|_| ())
    }

    fn emit(&self, event: RemoteEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::AcqRel);
        if previous != connected {
            tracing::info!(connected, "Remote storage connectivity changed");
            self.emit(RemoteEvent::ConnectionChanged {
                connected,
                at: self.clock.now(),
            });
        }
    }

    fn url(&self) -> String {
        format!("{}/todos", self.config.base_url)
    }

    /// One HTTP attempt: send, check status, read body; bounded by the timeout
    async fn attempt(&self, method: Method, body: Option<Vec<u8>>) -> Result<Vec<u8>, AttemptError> {
        let mut request = self
            .client
            .request(method, self.url())
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        let token = self.token.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let exchange = async move {
            let response = request.send().await.map_err(AttemptError::Transport)?;
            let status = response.status();
            if !status.is_success() {
                return Err(AttemptError::Status(status));
            }
            let bytes = response.bytes().await.map_err(AttemptError::Transport)?;
            Ok(bytes.to_vec())
        };

        tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| AttemptError::Timeout(self.config.timeout))?
    }

    /// Run an exchange with retries, events and failure bookkeeping
    ///
    /// Nothing is sent while the strategy is offline. The caller marks the
    /// exchange successful once the body is handled.
    async fn exchange(&self, method: Method, body: Option<Vec<u8>>) -> Result<Vec<u8>, StorageError> {
        if !self.is_available() {
            tracing::debug!(%method, "Remote storage is offline, not sending");
            return Err(StorageError::unavailable("network is not available"));
        }

        self.emit(RemoteEvent::SyncStarted {
            at: self.clock.now(),
        });

        let policy = RetryPolicy::fixed(self.config.retry_count, self.config.retry_delay);
        let mut attempts = 0_usize;
        let result = retry_with_predicate(
            policy,
            || {
                attempts += 1;
                if attempts > 1 {
                    metrics::counter!("storage.remote.retries").increment(1);
                }
                self.attempt(method.clone(), body.clone())
            },
            |error| matches!(error, AttemptError::Transport(_)),
        )
        .await;

        result.map_err(|error| {
            let error = self.classify(error, attempts);
            tracing::error!(%error, attempts, "Remote storage request failed");
            self.set_connected(false);
            self.emit(RemoteEvent::SyncFailed {
                kind: error.kind(),
                message: error.message().to_string(),
                at: self.clock.now(),
            });
            error
        })
    }

    fn classify(&self, error: AttemptError, attempts: usize) -> StorageError {
        match error {
            AttemptError::Timeout(_) => {
                StorageError::network(format!("{} timed out", self.url())).with_source(error)
            },
            AttemptError::Transport(_) => StorageError::network(format!(
                "network error after {attempts} attempts to {}",
                self.url()
            ))
            .with_source(error),
            AttemptError::Status(status) => {
                let kind = kind_for_status(status);
                StorageError::new(kind, format!("{} responded with {status}", self.url()))
                    .with_source(error)
            },
        }
    }

    fn synced(&self, count: usize) {
        let now = self.clock.now();
        *self.last_sync.lock().unwrap_or_else(PoisonError::into_inner) = Some(now);
        self.set_connected(true);
        tracing::info!(count, "Remote sync succeeded");
        self.emit(RemoteEvent::SyncSucceeded { count, at: now });
    }

    fn failed_decode(&self, error: StorageError) -> StorageError {
        tracing::error!(%error, "Remote storage response rejected");
        self.set_connected(false);
        self.emit(RemoteEvent::SyncFailed {
            kind: error.kind(),
            message: error.message().to_string(),
            at: self.clock.now(),
        });
        error
    }

    async fn fetch(&self) -> Result<Vec<Task>, StorageError> {
        let bytes = self.exchange(Method::GET, None).await?;
        let tasks: Vec<Task> = serde_json::from_slice(&bytes).map_err(|e| {
            self.failed_decode(
                StorageError::invalid_data("remote response is not a task list").with_source(e),
            )
        })?;
        self.synced(tasks.len());
        Ok(tasks)
    }

    async fn store(&self, tasks: &[Task]) -> Result<(), StorageError> {
        let body = serde_json::to_vec(tasks).map_err(|e| {
            StorageError::invalid_data("tasks could not be serialized").with_source(e)
        })?;
        self.exchange(Method::POST, Some(body)).await?;
        self.synced(tasks.len());
        Ok(())
    }

    async fn remove(&self) -> Result<(), StorageError> {
        self.exchange(Method::DELETE, None).await?;
        self.synced(0);
        Ok(())
    }
}

impl std::fmt::Debug for RemoteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStorage")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl StorageStrategy for RemoteStorage {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Remote
    }

    fn get_all(&self) -> StorageFuture<'_, Vec<Task>> {
        Box::pin(self.fetch())
    }

    fn save_all<'a>(&'a self, tasks: &'a [Task]) -> StorageFuture<'a, ()> {
        Box::pin(self.store(tasks))
    }

    fn clear(&self) -> StorageFuture<'_, ()> {
        Box::pin(self.remove())
    }

    fn is_available(&self) -> bool {
        self.online.load(Ordering::Acquire) && !self.config.base_url.is_empty()
    }
}

/// Map an HTTP error status onto the shared error kinds
fn kind_for_status(status: StatusCode) -> StorageErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageErrorKind::Permission,
        StatusCode::NOT_FOUND => StorageErrorKind::ServiceUnavailable,
        s if s.is_server_error() => StorageErrorKind::ServiceUnavailable,
        _ => StorageErrorKind::Unknown,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::types::{CreateTaskInput, TaskId};
    use taskstore_testing::test_clock;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn storage(server: &MockServer) -> RemoteStorage {
        RemoteStorage::new(RemoteConfig {
            base_url: format!("{}/api/", server.uri()),
            timeout: Duration::from_millis(500),
            retry_count: 2,
            retry_delay: Duration::from_millis(10),
        })
        .with_clock(Arc::new(test_clock()))
    }

    fn tasks() -> Vec<Task> {
        vec![Task::create(TaskId::new("todo_1"), &CreateTaskInput::new("Remote"), test_clock().now()).unwrap()]
    }

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(kind_for_status(StatusCode::UNAUTHORIZED), StorageErrorKind::Permission);
        assert_eq!(kind_for_status(StatusCode::FORBIDDEN), StorageErrorKind::Permission);
        assert_eq!(kind_for_status(StatusCode::NOT_FOUND), StorageErrorKind::ServiceUnavailable);
        assert_eq!(kind_for_status(StatusCode::BAD_GATEWAY), StorageErrorKind::ServiceUnavailable);
        assert_eq!(kind_for_status(StatusCode::CONFLICT), StorageErrorKind::Unknown);
    }

    #[tokio::test]
    async fn get_all_decodes_tasks_and_marks_connected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/todos"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tasks()))
            .expect(1)
            .mount(&server)
            .await;

        let remote = storage(&server);
        assert_eq!(remote.get_all().await.unwrap(), tasks());

        let status = remote.status();
        assert!(status.connected);
        assert_eq!(status.last_sync, Some(test_clock().now()));
    }

    #[tokio::test]
    async fn bearer_token_is_attached_when_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/todos"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let remote = storage(&server);
        remote.set_auth_token("secret");
        remote.save_all(&tasks()).await.unwrap();
    }

    #[tokio::test]
    async fn forbidden_is_permission_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/todos"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = storage(&server).clear().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Permission);
    }

    #[tokio::test]
    async fn server_error_is_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = storage(&server).get_all().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let remote = storage(&server);
        remote.set_online(true);
        assert!(remote.status().connected);

        let err = remote.get_all().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::InvalidData);
        assert!(!remote.status().connected);
        assert!(remote.status().last_sync.is_none());
    }

    #[tokio::test]
    async fn slow_response_times_out_as_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(Vec::<Task>::new())
                    .set_delay(Duration::from_secs(2)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = storage(&server).get_all().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Network);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error_after_retries() {
        let remote = RemoteStorage::new(RemoteConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            retry_count: 1,
            retry_delay: Duration::from_millis(5),
        });

        let err = remote.get_all().await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Network);
        assert!(err.message().contains("2 attempts"));
        assert!(!remote.status().connected);
    }

    #[tokio::test]
    async fn events_follow_the_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tasks()))
            .mount(&server)
            .await;

        let remote = storage(&server);
        let mut events = remote.subscribe();
        remote.sync().await.unwrap();

        let at = test_clock().now();
        assert_eq!(events.recv().await.unwrap(), RemoteEvent::SyncStarted { at });
        assert_eq!(
            events.recv().await.unwrap(),
            RemoteEvent::ConnectionChanged { connected: true, at }
        );
        assert_eq!(events.recv().await.unwrap(), RemoteEvent::SyncSucceeded { count: 1, at });
    }

    #[tokio::test]
    async fn offline_strategy_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tasks()))
            .expect(0)
            .mount(&server)
            .await;

        let remote = storage(&server);
        remote.set_online(false);
        let mut events = remote.subscribe();

        for err in [
            remote.get_all().await.unwrap_err(),
            remote.save_all(&tasks()).await.unwrap_err(),
            remote.clear().await.unwrap_err(),
        ] {
            assert_eq!(err.kind(), StorageErrorKind::ServiceUnavailable);
            assert_eq!(err.message(), "network is not available");
        }

        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(!remote.status().connected);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_strategy_is_unavailable() {
        let remote = RemoteStorage::new(RemoteConfig::default());
        let mut events = remote.subscribe();
        assert!(remote.is_available());

        remote.set_online(true);
        assert!(remote.check_connection());
        remote.set_online(false);

        assert!(!remote.is_available());
        assert!(!remote.check_connection());
        assert!(matches!(
            events.recv().await.unwrap(),
            RemoteEvent::ConnectionChanged { connected: true, .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            RemoteEvent::ConnectionChanged { connected: false, .. }
        ));
    }
}
