//! almsbot - Marks ALMS video lessons as watched without streaming them
//!
//! Automates an ALMS learning portal: logs in with the portal's two-step
//! form handshake, keeps the session alive with the periodic ping the
//! portal demands, reads a course's progress, and posts synthetic
//! full-length viewing records for unfinished video lessons.
//!
//! ## Features
//!
//! - Two-step form login with a warmed-up session (the portal rejects
//!   logins from sessions that have not pinged yet)
//! - One background keep-alive task per client, joined deterministically on
//!   dispose
//! - Session persistence keyed by username, so later runs can resume
//!   without re-authenticating
//! - Progress scraping and video-completion submission
//!
//! ## Architecture
//!
//! The crate is organized into layers, leaves first:
//!
//! - **Transport**: outbound HTTP semantics (headers, cookies) behind a
//!   trait so tests can substitute fakes
//! - **Session**: opaque save/restore of transport state
//! - **Client**: the login handshake and the keep-alive task
//! - **Progress**: business calls (fetch progress, submit completion)
//! - **Security**: zeroize-on-drop handling for the password

pub mod client;
pub mod config;
pub mod progress;
pub mod security;
pub mod session;
pub mod transport;

pub use client::{AlmsClient, AuthError, Credentials, KeepAliveStatus};
pub use progress::{Activity, ProgressClient, ProgressError, ProgressSnapshot, TrackResult};
pub use security::Secret;
pub use session::{FileSessionStore, SessionStore, StoreError};
pub use transport::{PortalTransport, SessionState, Transport, TransportError};
