use time::OffsetDateTime;
use uuid::Uuid;
use waypoint_proto::NotificationRecord;

/// Notification severity as surfaced by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Urgent,
}

/// One entry in the client-local notification list.
///
/// Authoritative entries carry the server-assigned id; provisional entries
/// carry a locally minted one and live only until the next reconciliation
/// fetch supersedes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: OffsetDateTime,
    pub read: bool,
    /// Informational reference only; never dereferenced by the engine.
    pub source_project_id: Option<String>,
}

impl Notification {
    /// Synthesize a provisional entry for an alert-class push frame, ahead of
    /// the authoritative fetch.
    pub fn provisional(message: impl Into<String>, source_project_id: Option<String>) -> Self {
        Self {
            id: format!("pending-{}", Uuid::new_v4()),
            message: message.into(),
            kind: NotificationKind::Urgent,
            created_at: OffsetDateTime::now_utc(),
            read: false,
            source_project_id,
        }
    }
}

impl From<NotificationRecord> for Notification {
    fn from(record: NotificationRecord) -> Self {
        let kind = if record.is_urgent() {
            NotificationKind::Urgent
        } else {
            NotificationKind::Info
        };
        Self {
            id: record.id,
            message: record.message,
            kind,
            created_at: record.created_at,
            read: record.is_read,
            source_project_id: record.project_id,
        }
    }
}
