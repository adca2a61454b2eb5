//! Transport module - HTTP semantics against the portal
//!
//! Defines the [`Transport`] trait everything above this layer depends on,
//! plus the reqwest-backed [`PortalTransport`] used in production.

mod base;
mod portal;

pub use base::{PortalResponse, SessionCookie, SessionState, Transport, TransportError};
pub use portal::PortalTransport;
