use std::time::Duration;

use time::OffsetDateTime;

use crate::config::Config;
use crate::model::{Notification, NotificationKind};

/// The single ephemeral surface element.
///
/// Message and id are captured at selection time, so a toast stays
/// displayable even after reconciliation supersedes the record it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub notification_id: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl Toast {
    pub fn capture(notification: &Notification) -> Self {
        Self {
            notification_id: notification.id.clone(),
            message: notification.message.clone(),
            kind: notification.kind,
        }
    }
}

/// Selects at most one notification for toast presentation.
#[derive(Debug, Clone)]
pub struct ToastPolicy {
    freshness: Duration,
    info_ttl: Duration,
}

impl ToastPolicy {
    pub fn new(freshness: Duration, info_ttl: Duration) -> Self {
        Self { freshness, info_ttl }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.toast_freshness, config.info_toast_ttl)
    }

    /// A notification qualifies while urgent, unread, and no older than the
    /// freshness window. The boundary is inclusive: an entry aged exactly one
    /// window still qualifies.
    pub fn qualifies(&self, notification: &Notification, now: OffsetDateTime) -> bool {
        notification.kind == NotificationKind::Urgent
            && !notification.read
            && now - notification.created_at <= self.freshness
    }

    /// The most recent qualifying entry wins; it supersedes whatever toast is
    /// currently visible.
    pub fn select<'a>(
        &self,
        notifications: &'a [Notification],
        now: OffsetDateTime,
    ) -> Option<&'a Notification> {
        notifications
            .iter()
            .filter(|n| self.qualifies(n, now))
            .max_by_key(|n| n.created_at)
    }

    /// Info toasts auto-dismiss; urgent toasts persist until acted on.
    pub fn auto_dismiss_after(&self, kind: NotificationKind) -> Option<Duration> {
        match kind {
            NotificationKind::Info => Some(self.info_ttl),
            NotificationKind::Urgent => None,
        }
    }
}
