//! Business calls against an authenticated session
//!
//! The progress page is scraped, not served as an API: the JSON lives in a
//! page-scoped script variable and the attempt id in an inline handler, so
//! both extractions depend on the portal's page structure and fail loudly
//! when it changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use thiserror::Error;

use crate::transport::{Transport, TransportError};

use super::model::{FlowData, ProgressSnapshot};

/// Marker preceding the embedded progress JSON on the activity index page
const DATASOURCE_MARKER: &str = "var datasource = ";
/// Markers bracketing the attempt id on the video-play page
const ATTEMPT_START: &str = "attemptId=";
const ATTEMPT_END: &str = "',";

/// Errors raised by progress and completion calls
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The page no longer carries the structure being scraped; the portal
    /// changed shape or the session is in an unexpected state
    #[error("marker {0:?} not found in portal response")]
    MissingMarker(&'static str),

    #[error("malformed portal payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result of a completion submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackResult {
    /// The lesson has no uploaded video; nothing was submitted
    NoVideo,
    /// The portal accepted the tracking payload; carries the raw response
    Submitted(String),
}

/// Issues the business-level requests over an authenticated transport
///
/// Calls are sequential and blocking by design; the portal does not tolerate
/// request bursts well. There is no authentication guard here: calling
/// before login simply fails at the transport level.
pub struct ProgressClient {
    transport: Arc<dyn Transport>,
}

impl ProgressClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetches and parses the progress snapshot for a course
    pub async fn get_class_progress(
        &self,
        course_id: &str,
    ) -> Result<ProgressSnapshot, ProgressError> {
        let response = self
            .transport
            .send(Method::GET, &format!("/Activity/Index/{course_id}"), None)
            .await?;
        let json = extract_datasource(&response.body)?;
        Ok(serde_json::from_str(json)?)
    }

    /// Fetches the player metadata for one play attempt
    pub async fn get_flow_data(
        &self,
        activity_id: &str,
        attempt_id: &str,
    ) -> Result<FlowData, ProgressError> {
        let form = [
            ("/Video/ManageInteraction?id", activity_id.to_string()),
            ("attemptId", attempt_id.to_string()),
        ];
        let response = self
            .transport
            .send(
                Method::POST,
                &format!("/Video/ManageInteraction?id={activity_id}&attemptId={attempt_id}"),
                Some(&form),
            )
            .await?;
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Submits a synthetic full-length viewing record for an activity
    ///
    /// Requests the play page to obtain a fresh attempt id, checks the video
    /// duration, and posts a tracking payload covering the whole video. A
    /// zero duration short-circuits to [`TrackResult::NoVideo`] without
    /// submitting anything.
    pub async fn submit_track(
        &self,
        activity_id: &str,
        enroll_id: &str,
    ) -> Result<TrackResult, ProgressError> {
        let form = [
            ("id", activity_id.to_string()),
            ("eId", enroll_id.to_string()),
            ("isPartialView", "True".to_string()),
        ];
        let response = self
            .transport
            .send(Method::GET, "/Video/Play", Some(&form))
            .await?;
        let attempt_id = extract_attempt_id(&response.body)?;

        let flow = self.get_flow_data(activity_id, attempt_id).await?;
        let duration = flow.meta.duration;
        if duration == 0 {
            tracing::info!(activity_id, "no video uploaded, skipping tracking");
            return Ok(TrackResult::NoVideo);
        }

        let form = [
            ("date", iso_millis(Utc::now())),
            ("duration", duration.to_string()),
            ("totalPartSec", duration.to_string()),
            ("viewParts", format!("[\"0-{duration}\"]")),
        ];
        let response = self
            .transport
            .send(
                Method::POST,
                &format!(
                    "/Video/SaveTracking?TrackingData=&id={activity_id}&AttemptId={attempt_id}&EnrollId={enroll_id}"
                ),
                Some(&form),
            )
            .await?;

        tracing::info!(activity_id, duration, "tracking submitted");
        Ok(TrackResult::Submitted(response.body))
    }
}

/// Pulls the page-scoped `datasource` JSON out of the activity index HTML
fn extract_datasource(body: &str) -> Result<&str, ProgressError> {
    let start = body
        .find(DATASOURCE_MARKER)
        .ok_or(ProgressError::MissingMarker(DATASOURCE_MARKER))?
        + DATASOURCE_MARKER.len();
    let rest = &body[start..];
    let end = rest
        .find("};")
        .ok_or(ProgressError::MissingMarker("};"))?;
    Ok(&rest[..=end])
}

/// Locates the portal-issued attempt id on the video-play page
fn extract_attempt_id(body: &str) -> Result<&str, ProgressError> {
    let start = body
        .find(ATTEMPT_START)
        .ok_or(ProgressError::MissingMarker(ATTEMPT_START))?
        + ATTEMPT_START.len();
    let rest = &body[start..];
    let end = rest
        .find(ATTEMPT_END)
        .ok_or(ProgressError::MissingMarker(ATTEMPT_END))?;
    Ok(&rest[..end])
}

/// Formats a UTC instant the way the portal's player does: ISO-8601 with
/// exactly millisecond precision and a trailing `Z`
fn iso_millis(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
