//! Keep-alive task
//!
//! The portal expires sessions that go silent, so every client runs exactly
//! one background task that pings it at a fixed interval. Login blocks until
//! the task's first ping has round-tripped, and the task idles between
//! cycles until the client is authenticated.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use reqwest::Method;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::transport::{Transport, TransportError};

/// Interval between liveness signals
pub const PING_INTERVAL: Duration = Duration::from_secs(5);

/// Observable state of the keep-alive task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepAliveStatus {
    /// The task has not been spawned yet
    NotStarted,
    /// The ping loop is running
    Running,
    /// A ping failed; the session is presumed dead
    Error(String),
    /// The task exited after a stop request
    Stopped,
}

struct Shared {
    transport: Arc<dyn Transport>,
    interval: Duration,
    cancel: CancellationToken,
    first_tx: watch::Sender<bool>,
    auth_rx: watch::Receiver<bool>,
    status: StdMutex<KeepAliveStatus>,
}

/// Handle to the background ping loop
///
/// Stopping cancels cooperatively and then joins the task, so once `stop`
/// returns no further signal will ever be sent.
pub(crate) struct KeepAlive {
    shared: Arc<Shared>,
    auth_tx: watch::Sender<bool>,
    first_rx: watch::Receiver<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl KeepAlive {
    pub(crate) fn new(transport: Arc<dyn Transport>, interval: Duration) -> Self {
        let (first_tx, first_rx) = watch::channel(false);
        let (auth_tx, auth_rx) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                transport,
                interval,
                cancel: CancellationToken::new(),
                first_tx,
                auth_rx,
                status: StdMutex::new(KeepAliveStatus::NotStarted),
            }),
            auth_tx,
            first_rx,
            handle: Mutex::new(None),
        }
    }

    /// Spawns the ping loop; no-op if it is already running
    pub(crate) async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return;
        }
        *self.shared.status.lock().expect("status lock poisoned") = KeepAliveStatus::Running;
        let shared = Arc::clone(&self.shared);
        *handle = Some(tokio::spawn(run(shared)));
        tracing::debug!("keep-alive task started");
    }

    /// Blocks until the first ping has succeeded, or the timeout elapses
    ///
    /// Returns false on timeout (including the case where the task died
    /// before ever completing a ping).
    pub(crate) async fn wait_first_signal(&self, timeout: Duration) -> bool {
        let mut first_rx = self.first_rx.clone();
        tokio::time::timeout(timeout, first_rx.wait_for(|done| *done))
            .await
            .map(|result| result.is_ok())
            .unwrap_or(false)
    }

    /// True once the first ping round-trip has completed
    pub(crate) fn first_signal_completed(&self) -> bool {
        *self.first_rx.borrow()
    }

    /// Releases the task into its authenticated-mode loop
    pub(crate) fn set_authenticated(&self) {
        self.auth_tx.send_replace(true);
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        *self.auth_tx.borrow()
    }

    pub(crate) fn status(&self) -> KeepAliveStatus {
        self.shared
            .status
            .lock()
            .expect("status lock poisoned")
            .clone()
    }

    /// Stops the task and waits for it to exit
    ///
    /// Idempotent; a no-op if the task was never started. Once this returns
    /// the task has been joined and no background work remains.
    pub(crate) async fn stop(&self) {
        let handle = self.handle.lock().await.take();
        let Some(handle) = handle else { return };

        self.shared.cancel.cancel();
        if handle.await.is_err() {
            tracing::warn!("keep-alive task panicked before join");
        }
        tracing::debug!("keep-alive task stopped");
    }
}

async fn run(shared: Arc<Shared>) {
    let mut auth_rx = shared.auth_rx.clone();

    // Cancellation is acted on only here, at the top of a cycle; an
    // in-flight ping is never interrupted.
    while !shared.cancel.is_cancelled() {
        if let Err(e) = send_ping(shared.transport.as_ref()).await {
            // Fatal: the session is presumed dead and the caller will see
            // the next business call fail. No retry.
            tracing::error!("keep-alive ping failed: {e}");
            *shared.status.lock().expect("status lock poisoned") =
                KeepAliveStatus::Error(e.to_string());
            return;
        }
        shared.first_tx.send_replace(true);

        tokio::select! {
            _ = tokio::time::sleep(shared.interval) => {}
            _ = shared.cancel.cancelled() => {}
        }

        if !*auth_rx.borrow() {
            tokio::select! {
                changed = auth_rx.wait_for(|authed| *authed) => {
                    // Controller gone; nothing can authenticate us anymore.
                    if changed.is_err() {
                        break;
                    }
                }
                _ = shared.cancel.cancelled() => {}
            }
        }
    }

    *shared.status.lock().expect("status lock poisoned") = KeepAliveStatus::Stopped;
}

async fn send_ping(transport: &dyn Transport) -> Result<(), TransportError> {
    let buster: f64 = rand::random();
    transport
        .send(Method::GET, &format!("/System/Ping?r={buster}"), None)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{PortalResponse, SessionState};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingTransport {
        pings: AtomicU32,
        fail: bool,
    }

    impl CountingTransport {
        fn new() -> Self {
            Self {
                pings: AtomicU32::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                pings: AtomicU32::new(0),
                fail: true,
            }
        }

        fn pings(&self) -> u32 {
            self.pings.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(
            &self,
            _method: Method,
            path_and_query: &str,
            _form: Option<&[(&str, String)]>,
        ) -> Result<PortalResponse, TransportError> {
            assert!(path_and_query.starts_with("/System/Ping?r="));
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TransportError::Status {
                    status: StatusCode::BAD_GATEWAY,
                    body: String::new(),
                });
            }
            Ok(PortalResponse {
                status: StatusCode::OK,
                body: String::new(),
            })
        }

        fn set_cookie(&self, _name: &str, _value: &str) {}

        fn export_state(&self) -> SessionState {
            SessionState::default()
        }

        fn import_state(&self, _state: SessionState) {}
    }

    #[tokio::test(start_paused = true)]
    async fn first_signal_gates_and_task_idles_until_authenticated() {
        let transport = Arc::new(CountingTransport::new());
        let keepalive = KeepAlive::new(transport.clone(), PING_INTERVAL);

        assert!(!keepalive.first_signal_completed());
        keepalive.start().await;
        assert!(keepalive.wait_first_signal(Duration::from_secs(15)).await);
        assert!(keepalive.first_signal_completed());
        assert_eq!(transport.pings(), 1);
        assert_eq!(keepalive.status(), KeepAliveStatus::Running);

        // Well past several intervals: still exactly one ping, because the
        // task is suspended waiting for authentication.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.pings(), 1);

        keepalive.set_authenticated();
        tokio::time::sleep(PING_INTERVAL * 3).await;
        assert!(transport.pings() > 1);

        keepalive.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_ping_after_stop_returns() {
        let transport = Arc::new(CountingTransport::new());
        let keepalive = KeepAlive::new(transport.clone(), PING_INTERVAL);

        keepalive.start().await;
        assert!(keepalive.wait_first_signal(Duration::from_secs(15)).await);
        keepalive.set_authenticated();
        tokio::time::sleep(PING_INTERVAL * 2).await;

        keepalive.stop().await;
        let observed = transport.pings();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.pings(), observed);
        assert_eq!(keepalive.status(), KeepAliveStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_unauthenticated_joins_cleanly() {
        let transport = Arc::new(CountingTransport::new());
        let keepalive = KeepAlive::new(transport.clone(), PING_INTERVAL);

        keepalive.start().await;
        assert!(keepalive.wait_first_signal(Duration::from_secs(15)).await);

        // The task is parked on the authentication gate; stop must still
        // return promptly and join it.
        keepalive.stop().await;
        assert_eq!(transport.pings(), 1);
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let transport = Arc::new(CountingTransport::new());
        let keepalive = KeepAlive::new(transport.clone(), PING_INTERVAL);

        keepalive.stop().await;
        keepalive.stop().await;
        assert_eq!(transport.pings(), 0);
        assert_eq!(keepalive.status(), KeepAliveStatus::NotStarted);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ping_is_fatal() {
        let transport = Arc::new(CountingTransport::failing());
        let keepalive = KeepAlive::new(transport.clone(), PING_INTERVAL);

        keepalive.start().await;
        assert!(!keepalive.wait_first_signal(Duration::from_secs(15)).await);
        assert_eq!(transport.pings(), 1);
        assert!(matches!(keepalive.status(), KeepAliveStatus::Error(_)));

        keepalive.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_spawns_one_task() {
        let transport = Arc::new(CountingTransport::new());
        let keepalive = KeepAlive::new(transport.clone(), PING_INTERVAL);

        keepalive.start().await;
        keepalive.start().await;
        assert!(keepalive.wait_first_signal(Duration::from_secs(15)).await);
        assert_eq!(transport.pings(), 1);

        keepalive.stop().await;
    }
}
