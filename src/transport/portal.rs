//! reqwest-backed transport for an ALMS portal
//!
//! Carries the fixed browser-profile header set the portal expects and
//! tracks session cookies in a serializable container so a session can be
//! saved and resumed without re-authenticating.

use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use reqwest::{Client, Method};
use tokio::sync::Mutex;

use super::base::{PortalResponse, SessionCookie, SessionState, Transport, TransportError};

/// Browser profile the portal sees; it rejects obviously non-browser traffic.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/89.0.4389.90 Safari/537.36";
const SEC_CH_UA: &str = "\"Chromium\";v=\"89\", \";Not A Brand\";v=\"99\"";

/// HTTP transport bound to one portal host
///
/// Both the keep-alive task and the caller thread issue requests through the
/// same instance; an internal gate keeps at most one request in flight.
pub struct PortalTransport {
    base_url: String,
    client: Client,
    cookies: StdMutex<Vec<SessionCookie>>,
    // single-in-flight gate shared by the keep-alive task and business calls
    gate: Mutex<()>,
}

impl PortalTransport {
    /// Creates a transport for `https://<host>`
    pub fn new(host: &str) -> Result<Self, TransportError> {
        Self::with_base_url(&format!("https://{host}"))
    }

    /// Creates a transport against an explicit base URL (for testing)
    pub fn with_base_url(base_url: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .default_headers(browser_headers())
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cookies: StdMutex::new(Vec::new()),
            gate: Mutex::new(()),
        })
    }

    fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.lock().expect("cookie lock poisoned");
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(SessionCookie::to_header_value)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Records every Set-Cookie header of a response, newest value winning
    fn capture_cookies(&self, headers: &HeaderMap) {
        let mut cookies = self.cookies.lock().expect("cookie lock poisoned");
        for header in headers.get_all(SET_COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            upsert(&mut cookies, name.trim(), value.trim());
        }
    }
}

fn upsert(cookies: &mut Vec<SessionCookie>, name: &str, value: &str) {
    match cookies.iter_mut().find(|c| c.name == name) {
        Some(existing) => existing.value = value.to_string(),
        None => cookies.push(SessionCookie {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));
    headers.insert("sec-ch-ua", HeaderValue::from_static(SEC_CH_UA));
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers.insert("Connection", HeaderValue::from_static("close"));
    headers
}

#[async_trait]
impl Transport for PortalTransport {
    async fn send(
        &self,
        method: Method,
        path_and_query: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<PortalResponse, TransportError> {
        let _in_flight = self.gate.lock().await;

        let url = format!("{}{}", self.base_url, path_and_query);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(header) = self.cookie_header() {
            request = request.header(COOKIE, header);
        }
        if let Some(fields) = form {
            request = request.form(&fields);
        }

        let response = request.send().await?;
        self.capture_cookies(response.headers());

        let status = response.status();
        let body = response.text().await?;
        tracing::trace!(%method, path_and_query, %status, "portal request");

        if !status.is_success() {
            return Err(TransportError::Status { status, body });
        }
        Ok(PortalResponse { status, body })
    }

    fn set_cookie(&self, name: &str, value: &str) {
        let mut cookies = self.cookies.lock().expect("cookie lock poisoned");
        upsert(&mut cookies, name, value);
    }

    fn export_state(&self) -> SessionState {
        SessionState {
            cookies: self.cookies.lock().expect("cookie lock poisoned").clone(),
        }
    }

    fn import_state(&self, state: SessionState) {
        *self.cookies.lock().expect("cookie lock poisoned") = state.cookies;
    }
}
