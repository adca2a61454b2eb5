//! Session module - save/restore of authenticated portal sessions

mod store;

pub use store::{FileSessionStore, SessionStore, StoreError};
