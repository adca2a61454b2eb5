//! Transport abstraction for the portal's HTTP surface
//!
//! Everything above this layer talks to the portal through the [`Transport`]
//! trait, so the auth controller and the progress client never touch reqwest
//! types and tests can substitute counting fakes.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the transport layer
///
/// There is no retry anywhere in this crate: a failed call aborts the
/// current operation and the caller decides what to do next.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure (DNS, TLS, connection reset)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The portal answered with a non-success status
    #[error("portal returned HTTP {status}")]
    Status {
        status: StatusCode,
        body: String,
    },
}

/// A successful (2xx) response from the portal
#[derive(Debug, Clone)]
pub struct PortalResponse {
    /// HTTP status code, always in the 2xx range
    pub status: StatusCode,
    /// Raw response body
    pub body: String,
}

/// A single session cookie tracked by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
}

impl SessionCookie {
    /// Formats the cookie for use in an HTTP Cookie header
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Opaque bag of transport state (the session cookies)
///
/// Produced by [`Transport::export_state`] and consumed only by the session
/// store and [`Transport::import_state`]. Owned by a single client; never
/// shared across client instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub(crate) cookies: Vec<SessionCookie>,
}

impl SessionState {
    /// Returns true if no cookies have been captured yet
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Looks up a cookie value by name
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }
}

/// Outbound HTTP semantics against the portal
///
/// Implementations carry the session cookies; every call may mutate them.
/// Form fields are submitted urlencoded in the request body regardless of
/// method, matching what the portal's own pages send.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns the response on any 2xx status
    ///
    /// A non-2xx status or a network failure surfaces as [`TransportError`];
    /// callers perform no automatic retry.
    async fn send(
        &self,
        method: Method,
        path_and_query: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<PortalResponse, TransportError>;

    /// Injects a cookie into the session, as if the portal had set it
    fn set_cookie(&self, name: &str, value: &str);

    /// Snapshots the current session state
    fn export_state(&self) -> SessionState;

    /// Replaces the session state with a previously exported snapshot
    fn import_state(&self, state: SessionState);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_value() {
        let cookie = SessionCookie {
            name: "ASP.NET_SessionId".into(),
            value: "abc123".into(),
        };
        assert_eq!(cookie.to_header_value(), "ASP.NET_SessionId=abc123");
    }

    #[test]
    fn state_lookup() {
        let state = SessionState {
            cookies: vec![
                SessionCookie {
                    name: "a".into(),
                    value: "1".into(),
                },
                SessionCookie {
                    name: "b".into(),
                    value: "2".into(),
                },
            ],
        };
        assert_eq!(state.cookie("b"), Some("2"));
        assert_eq!(state.cookie("c"), None);
        assert!(!state.is_empty());
        assert!(SessionState::default().is_empty());
    }

    #[test]
    fn state_serialization_round_trip() {
        let state = SessionState {
            cookies: vec![SessionCookie {
                name: "sid".into(),
                value: "x".into(),
            }],
        };
        let json = serde_json::to_string(&state).unwrap();
        let loaded: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, loaded);
    }
}
