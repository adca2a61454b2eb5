//! Client module - authentication lifecycle and session ownership
//!
//! [`AlmsClient`] drives the portal's two-step form login, owns the one
//! background keep-alive task, and persists the session on success so later
//! runs can resume from cache.

mod keepalive;

pub use keepalive::{KeepAliveStatus, PING_INTERVAL};

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use thiserror::Error;

use crate::progress::ProgressClient;
use crate::security::Secret;
use crate::session::{SessionStore, StoreError};
use crate::transport::{PortalTransport, Transport, TransportError};

use keepalive::KeepAlive;

/// Form value the portal's own login page hardcodes for the timezone offset
const TIMEZONE_OFFSET: &str = "-180";

/// Cookie echoing the username back; the password step requires it
const USERNAME_COOKIE: &str = "CookUserName";

pub(crate) mod paths {
    pub(crate) const LOGIN_BEFORE: &str = "/Account/LoginBefore";
    pub(crate) const LOGIN_USERNAME_STEP: &str = "/Account/LoginBefore?returnUrl=%2FHome%2FIndex";
    pub(crate) const LOGIN_PASSWORD_STEP: &str = "/?returnUrl=%2FHome%2FIndex";
}

/// Portal account credentials
///
/// Immutable for the lifetime of a client. The username doubles as the
/// session-store key; the password is zeroed on drop and redacted in Debug.
#[derive(Debug)]
pub struct Credentials {
    username: String,
    password: Secret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> &str {
        self.password.as_str()
    }
}

/// Errors that can occur while establishing a session
#[derive(Debug, Error)]
pub enum AuthError {
    /// A handshake step failed at the HTTP level
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The keep-alive warm-up did not complete in time
    #[error("keep-alive warm-up did not complete within {0:?}")]
    FirstSignalTimeout(Duration),

    /// Saving or restoring the session failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Authenticated client for one ALMS account
///
/// Construction is cheap; nothing touches the network until [`login`] or
/// [`login_via_cache`]. Call [`dispose`] when done so the keep-alive task is
/// joined and no background work outlives the client.
///
/// [`login`]: AlmsClient::login
/// [`login_via_cache`]: AlmsClient::login_via_cache
/// [`dispose`]: AlmsClient::dispose
pub struct AlmsClient {
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    keepalive: KeepAlive,
    progress: ProgressClient,
}

impl AlmsClient {
    /// Creates a client for `https://<host>` with the default transport
    pub fn new(
        host: &str,
        credentials: Credentials,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, TransportError> {
        let transport: Arc<dyn Transport> = Arc::new(PortalTransport::new(host)?);
        Ok(Self::with_transport(transport, credentials, store))
    }

    /// Creates a client over an explicit transport (for testing)
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            keepalive: KeepAlive::new(Arc::clone(&transport), PING_INTERVAL),
            progress: ProgressClient::new(Arc::clone(&transport)),
            credentials,
            transport,
            store,
        }
    }

    /// Business operations over this client's session
    pub fn progress(&self) -> &ProgressClient {
        &self.progress
    }

    /// Performs the full login handshake
    ///
    /// Strict order, each step depending on state from the previous one:
    /// priming request, keep-alive warm-up (bounded by `timeout`), username
    /// step, password step. On success the keep-alive task switches into its
    /// authenticated loop and the session is persisted under the username.
    pub async fn login(&self, timeout: Duration) -> Result<(), AuthError> {
        tracing::info!(username = self.credentials.username(), "logging in");

        // Priming request: the portal hands out the initial cookies here.
        self.transport
            .send(Method::GET, paths::LOGIN_BEFORE, None)
            .await?;

        // The portal rejects login form submissions from a session that has
        // not pinged yet, so the first signal must round-trip before the
        // handshake continues.
        self.keepalive.start().await;
        if !self.keepalive.wait_first_signal(timeout).await {
            return Err(AuthError::FirstSignalTimeout(timeout));
        }

        let form = login_form(self.credentials.username());
        self.transport
            .send(Method::POST, paths::LOGIN_USERNAME_STEP, Some(&form))
            .await?;

        // The second step expects the username echoed back in a cookie and
        // an empty username field.
        self.transport
            .set_cookie(USERNAME_COOKIE, self.credentials.username());
        let mut form = login_form("");
        form.push(("Password", self.credentials.password().to_string()));
        self.transport
            .send(Method::POST, paths::LOGIN_PASSWORD_STEP, Some(&form))
            .await?;

        self.keepalive.set_authenticated();
        self.store
            .save(self.credentials.username(), &self.transport.export_state())?;

        tracing::info!("login complete, session persisted");
        Ok(())
    }

    /// Restores a previously saved session instead of authenticating
    ///
    /// Does not start the keep-alive task; callers that need continued
    /// liveness must log in normally.
    pub fn login_via_cache(&self) -> Result<(), AuthError> {
        let state = self.store.load(self.credentials.username())?;
        self.transport.import_state(state);
        tracing::info!(username = self.credentials.username(), "session restored from cache");
        Ok(())
    }

    /// True once the login handshake has completed successfully
    pub fn is_authenticated(&self) -> bool {
        self.keepalive.is_authenticated()
    }

    /// Current state of the background keep-alive task
    pub fn keepalive_status(&self) -> KeepAliveStatus {
        self.keepalive.status()
    }

    /// Stops the keep-alive task and waits for it to exit
    ///
    /// Idempotent, and safe to call before any login attempt (a no-op when
    /// the task was never started).
    pub async fn dispose(&self) {
        self.keepalive.stop().await;
    }
}

fn login_form(username: &str) -> Vec<(&'static str, String)> {
    vec![
        ("LocationName", String::new()),
        ("Latitude", String::new()),
        ("Longitude", String::new()),
        ("LoginChannel", String::new()),
        ("TimeZoneOffset", TIMEZONE_OFFSET.to_string()),
        ("UserName", username.to_string()),
    ]
}
