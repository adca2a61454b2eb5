//! Data model for the portal's progress pages
//!
//! The activity index embeds a JSON object with heterogeneous rows; some
//! carry no `status` or `type` at all. Those rows are skipped by the
//! classification helpers rather than treated as errors.

use serde::Deserialize;

/// Progress at or above which the portal counts a video as watched
pub const FINISHED_PROGRESS: f64 = 90.0;

/// The `datasource` object embedded in the activity index page
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub activities: Vec<Activity>,
}

/// One lesson/course item with its completion status
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(default)]
    pub enrollment_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub added_date: String,
    #[serde(rename = "UserName", default)]
    pub user_name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(rename = "type", default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub completion_type: Option<String>,
    #[serde(default)]
    pub status: Option<ActivityStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStatus {
    /// Completion percentage, 0-100
    #[serde(default)]
    pub progress: f64,
}

impl Activity {
    /// Whether this activity is eligible for a completion submission
    ///
    /// Eligible means: both `status` and `type` are present, the activity is
    /// active, its type is exactly "Video" and its completion type exactly
    /// "View". Anything else is skipped, never an error.
    pub fn is_trackable_video(&self) -> bool {
        self.status.is_some()
            && self.is_active
            && self.activity_type.as_deref() == Some("Video")
            && self.completion_type.as_deref() == Some("View")
    }

    /// Whether an eligible activity already counts as finished
    pub fn is_finished(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|status| status.progress >= FINISHED_PROGRESS)
    }
}

/// Response of the video-interaction endpoint; only the duration matters
#[derive(Debug, Clone, Deserialize)]
pub struct FlowData {
    #[serde(rename = "Meta")]
    pub meta: FlowMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowMeta {
    /// Video length in seconds; zero means no video was uploaded
    #[serde(rename = "Duration", default)]
    pub duration: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_activity(progress: f64) -> Activity {
        serde_json::from_value(serde_json::json!({
            "id": "a1",
            "enrollmentId": "e1",
            "name": "Week 1",
            "addedDate": "2021-03-15",
            "UserName": "Dr. Smith",
            "isActive": true,
            "type": "Video",
            "completionType": "View",
            "status": { "progress": progress }
        }))
        .unwrap()
    }

    #[test]
    fn trackable_video_is_classified() {
        let activity = video_activity(10.0);
        assert!(activity.is_trackable_video());
        assert!(!activity.is_finished());
    }

    #[test]
    fn finished_threshold_is_ninety_percent() {
        assert!(!video_activity(89.9).is_finished());
        assert!(video_activity(90.0).is_finished());
        assert!(video_activity(100.0).is_finished());
    }

    #[test]
    fn missing_status_or_type_is_skipped_not_an_error() {
        let bare: Activity = serde_json::from_value(serde_json::json!({
            "id": "a2",
            "enrollmentId": "e2",
            "isActive": true
        }))
        .unwrap();
        assert!(!bare.is_trackable_video());
        assert!(!bare.is_finished());
    }

    #[test]
    fn inactive_or_non_video_rows_are_not_trackable() {
        let mut inactive = video_activity(10.0);
        inactive.is_active = false;
        assert!(!inactive.is_trackable_video());

        let mut document = video_activity(10.0);
        document.activity_type = Some("Document".into());
        assert!(!document.is_trackable_video());

        let mut timed = video_activity(10.0);
        timed.completion_type = Some("Time".into());
        assert!(!timed.is_trackable_video());
    }

    #[test]
    fn flow_data_parses_portal_shape() {
        let flow: FlowData =
            serde_json::from_str(r#"{"Meta": {"Duration": 304}, "Other": 1}"#).unwrap();
        assert_eq!(flow.meta.duration, 304);
    }
}
