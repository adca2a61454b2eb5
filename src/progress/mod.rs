//! Progress module - course progress and completion submission
//!
//! Sequential business calls over an authenticated transport: fetch a
//! course's progress snapshot, classify its activities, and synthesize
//! full-length viewing records for unfinished video lessons.

mod client;
mod model;

pub use client::{ProgressClient, ProgressError, TrackResult};
pub use model::{Activity, ActivityStatus, FlowData, FlowMeta, ProgressSnapshot, FINISHED_PROGRESS};
