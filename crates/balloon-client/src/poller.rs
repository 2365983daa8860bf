// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Periodic dataset polling.
//!
//! The poller runs on its own thread with a Tokio runtime. It fetches the feed
//! once at startup and then again after a randomized delay, publishing each
//! snapshot into shared state that the UI reads every frame.
//!
//! Requests are serialized: the next delay only starts once the previous
//! request has finished, so responses can never arrive out of order. Each
//! successful snapshot bumps a generation counter that consumers use to
//! notice new data. Cancelling the poller stops the task at its next await
//! point, including mid-request, and no state is written afterwards.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rand::Rng;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::model::HourlyDataset;

/// Default feed endpoint.
pub const DEFAULT_DATA_URL: &str = "http://127.0.0.1:8000/data";

/// Errors that can occur while fetching the dataset.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid dataset: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Configuration for the poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Feed URL returning the hourly dataset as JSON.
    pub url: String,
    /// Lower bound of the randomized delay between polls.
    pub min_interval: Duration,
    /// Upper bound of the randomized delay between polls.
    pub max_interval: Duration,
    /// Timeout applied to each request.
    pub request_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATA_URL.to_string(),
            min_interval: Duration::from_secs(8 * 60),
            max_interval: Duration::from_secs(13 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PollerConfig {
    /// Pick the delay before the next poll, uniformly within the configured bounds.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let (lo, hi) = if self.min_interval <= self.max_interval {
            (self.min_interval, self.max_interval)
        } else {
            (self.max_interval, self.min_interval)
        };
        let lo_ms = u64::try_from(lo.as_millis()).unwrap_or(u64::MAX);
        let hi_ms = u64::try_from(hi.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(lo_ms..=hi_ms))
    }
}

/// Fetch status shown by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PollStatus {
    /// No request has completed yet.
    #[default]
    Loading,
    /// The last request succeeded.
    Ready,
    /// The last request failed.
    Failed(String),
}

/// State shared between the poller task and the UI.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    pub status: PollStatus,
    /// Most recent good snapshot. Kept across later failures.
    pub dataset: Option<Arc<HourlyDataset>>,
    /// Incremented on every successful fetch.
    pub generation: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
}

impl PollState {
    /// Replace the dataset with a freshly fetched one.
    pub fn record_success(&mut self, dataset: HourlyDataset) {
        let now = Utc::now();
        self.status = PollStatus::Ready;
        self.dataset = Some(Arc::new(dataset));
        self.generation += 1;
        self.last_success = Some(now);
        self.last_attempt = Some(now);
    }

    /// Note a failed fetch. The previous dataset, if any, stays available.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.status = PollStatus::Failed(message.into());
        self.last_attempt = Some(Utc::now());
    }

    /// Error to show when no dataset has ever been loaded.
    #[must_use]
    pub fn fatal_error(&self) -> Option<&str> {
        match (&self.status, &self.dataset) {
            (PollStatus::Failed(message), None) => Some(message),
            _ => None,
        }
    }

    /// Error to show as a banner over an older dataset.
    #[must_use]
    pub fn stale_error(&self) -> Option<&str> {
        match (&self.status, &self.dataset) {
            (PollStatus::Failed(message), Some(_)) => Some(message),
            _ => None,
        }
    }
}

pub type SharedPollState = Arc<Mutex<PollState>>;

/// Lock the shared state, recovering it if a holder panicked.
///
/// Every write replaces whole fields, so a poisoned guard still holds a
/// consistent snapshot.
#[must_use]
pub fn lock_state(state: &SharedPollState) -> MutexGuard<'_, PollState> {
    state.lock().unwrap_or_else(|poisoned| {
        error!("Poll state lock was poisoned, recovering");
        PoisonError::into_inner(poisoned)
    })
}

/// Callback fired after every state change.
pub type ChangeNotifier = Arc<dyn Fn() + Send + Sync>;

/// Fetch and decode the dataset once.
pub async fn fetch_dataset(client: &reqwest::Client, url: &str) -> Result<HourlyDataset, FetchError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let body = response.bytes().await?;
    Ok(HourlyDataset::from_json(&body)?)
}

/// Handle to the background polling task.
///
/// Dropping the handle stops the task.
pub struct DataPoller {
    state: SharedPollState,
    cancel_token: CancellationToken,
    refresh: Arc<Notify>,
    url: String,
}

impl std::fmt::Debug for DataPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPoller")
            .field("url", &self.url)
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl DataPoller {
    /// Start polling on a dedicated thread.
    #[must_use]
    pub fn spawn(config: PollerConfig, on_change: ChangeNotifier) -> Self {
        let state: SharedPollState = Arc::new(Mutex::new(PollState::default()));
        let cancel_token = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let url = config.url.clone();

        let task = PollTask {
            config,
            state: Arc::clone(&state),
            cancel_token: cancel_token.clone(),
            refresh: Arc::clone(&refresh),
            on_change,
        };

        std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to start poller runtime: {e}");
                    task.publish_failure(format!("failed to start poller runtime: {e}"));
                    return;
                }
            };
            runtime.block_on(task.run());
        });

        Self {
            state,
            cancel_token,
            refresh,
            url,
        }
    }

    /// Shared state for readers.
    #[must_use]
    pub fn state(&self) -> SharedPollState {
        Arc::clone(&self.state)
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> PollState {
        lock_state(&self.state).clone()
    }

    /// Skip the remaining delay and poll immediately.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the background task.
    pub fn stop(&self) {
        if !self.cancel_token.is_cancelled() {
            info!("Stopping data poller");
            self.cancel_token.cancel();
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for DataPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PollTask {
    config: PollerConfig,
    state: SharedPollState,
    cancel_token: CancellationToken,
    refresh: Arc<Notify>,
    on_change: ChangeNotifier,
}

impl PollTask {
    async fn run(self) {
        let client = match reqwest::Client::builder()
            .timeout(self.config.request_timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build HTTP client: {e}");
                self.publish_failure(e.to_string());
                return;
            }
        };

        loop {
            info!("Fetching balloon data from {}", self.config.url);

            let result = tokio::select! {
                () = self.cancel_token.cancelled() => break,
                result = fetch_dataset(&client, &self.config.url) => result,
            };

            if self.cancel_token.is_cancelled() {
                break;
            }

            match result {
                Ok(dataset) => {
                    info!(
                        "Loaded {} hours ({} records, {} unavailable)",
                        dataset.hours().len(),
                        dataset.record_count(),
                        dataset.unavailable_count()
                    );
                    lock_state(&self.state).record_success(dataset);
                    (self.on_change)();
                }
                Err(e) => {
                    warn!("Failed to fetch balloon data: {e}");
                    self.publish_failure(e.to_string());
                }
            }

            let delay = self.config.next_delay();
            info!("Next poll in {}s", delay.as_secs());

            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
                () = self.refresh.notified() => info!("Manual refresh requested"),
            }
        }

        info!("Data poller stopped");
    }

    fn publish_failure(&self, message: String) {
        lock_state(&self.state).record_failure(message);
        (self.on_change)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HourSlice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a fixed HTTP response to every connection and return the base URL.
    async fn serve(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/data")
    }

    const BODY: &str = r#"{"0": [{"lat": 1.0, "lon": 2.0, "wind_speed": 3.0, "wind_direction": 4.0, "altitude": 5.0}], "1": "corrupted"}"#;

    #[tokio::test]
    async fn test_fetch_success() {
        let url = serve("200 OK", BODY).await;
        let dataset = fetch_dataset(&reqwest::Client::new(), &url).await.unwrap();
        assert_eq!(dataset.record_count(), 1);
        assert!(matches!(dataset.slice("1"), Some(HourSlice::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let url = serve("503 Service Unavailable", "{}").await;
        let err = fetch_dataset(&reqwest::Client::new(), &url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 503));
        assert_eq!(err.to_string(), "server returned HTTP 503 Service Unavailable");
    }

    #[tokio::test]
    async fn test_fetch_bad_json() {
        let url = serve("200 OK", "not json").await;
        let err = fetch_dataset(&reqwest::Client::new(), &url).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_transport_error() {
        // Bind then drop to get a port nothing listens on
        let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        let err = fetch_dataset(&reqwest::Client::new(), &format!("http://{addr}/data"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }

    #[test]
    fn test_next_delay_bounds() {
        let config = PollerConfig::default();
        for _ in 0..200 {
            let delay = config.next_delay();
            assert!(delay >= Duration::from_secs(8 * 60));
            assert!(delay <= Duration::from_secs(13 * 60));
        }
    }

    #[test]
    fn test_next_delay_swapped_bounds() {
        let config = PollerConfig {
            min_interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(2),
            ..PollerConfig::default()
        };
        let delay = config.next_delay();
        assert!(delay >= Duration::from_secs(2) && delay <= Duration::from_secs(5));
    }

    #[test]
    fn test_state_transitions() {
        let mut state = PollState::default();
        assert_eq!(state.status, PollStatus::Loading);
        assert!(state.fatal_error().is_none());

        state.record_failure("boom");
        assert_eq!(state.fatal_error(), Some("boom"));
        assert!(state.stale_error().is_none());
        assert_eq!(state.generation, 0);

        state.record_success(HourlyDataset::default());
        assert_eq!(state.status, PollStatus::Ready);
        assert_eq!(state.generation, 1);
        assert!(state.last_success.is_some());

        state.record_failure("later");
        assert!(state.fatal_error().is_none());
        assert_eq!(state.stale_error(), Some("later"));
        assert!(state.dataset.is_some());

        state.record_success(HourlyDataset::default());
        assert_eq!(state.generation, 2);
        assert!(state.stale_error().is_none());
    }

    #[test]
    fn test_poisoned_state_keeps_updates() {
        let state: SharedPollState = Arc::new(Mutex::new(PollState::default()));
        let holder = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = holder.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(state.is_poisoned());

        lock_state(&state).record_success(HourlyDataset::default());
        let snapshot = lock_state(&state).clone();
        assert_eq!(snapshot.status, PollStatus::Ready);
        assert_eq!(snapshot.generation, 1);
        assert!(snapshot.dataset.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_poller_publishes_and_stops() {
        let url = serve("200 OK", BODY).await;
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);

        let poller = DataPoller::spawn(
            PollerConfig {
                url,
                ..PollerConfig::default()
            },
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let mut ready = false;
        for _ in 0..100 {
            if poller.snapshot().status == PollStatus::Ready {
                ready = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(ready, "poller never loaded the dataset");
        assert_eq!(poller.snapshot().generation, 1);
        assert!(notified.load(Ordering::SeqCst) >= 1);

        poller.stop();
        assert!(poller.is_stopped());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_poller_manual_refresh() {
        let url = serve("200 OK", BODY).await;
        let poller = DataPoller::spawn(
            PollerConfig {
                url,
                ..PollerConfig::default()
            },
            Arc::new(|| {}),
        );

        for _ in 0..100 {
            if poller.snapshot().generation >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        poller.refresh_now();
        for _ in 0..100 {
            if poller.snapshot().generation >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(poller.snapshot().generation, 2);
    }
}
