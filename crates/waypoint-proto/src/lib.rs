//! Wire contract for the Waypoint notification push channel and its REST
//! source of truth. Keeping the shapes in one crate stops the sync engine and
//! future dashboard surfaces from drifting apart.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Marker substring in a server `type` string that flags a record as urgent.
pub const URGENT_MARKER: &str = "URGENT";

/// Inbound push frame, tagged by the server-side discriminant.
///
/// The server is free to introduce new discriminants at any time; they decode
/// to [`PushFrame::Unknown`] instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushFrame {
    /// Invalidate client-side cached views; carries no payload.
    #[serde(rename = "REFRESH_PROJECTS")]
    RefreshProjects,
    /// Generic urgent alert.
    #[serde(rename = "URGENT_ALERT")]
    UrgentAlert {
        message: String,
        #[serde(default)]
        project_id: Option<String>,
    },
    /// A client submitted their onboarding form.
    #[serde(rename = "ONBOARDING_SUBMISSION")]
    OnboardingSubmission {
        message: String,
        #[serde(default)]
        project_id: Option<String>,
    },
    /// Discriminants this build does not know about yet.
    #[serde(other)]
    Unknown,
}

/// Server notification record as returned by `GET /api/notifications/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_read: bool,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl NotificationRecord {
    /// Whether the server `type` string carries the urgency marker.
    pub fn is_urgent(&self) -> bool {
        self.kind.to_ascii_uppercase().contains(URGENT_MARKER)
    }
}

/// Acknowledgment body returned by the mark-read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
