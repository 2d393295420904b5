use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};
use waypoint_proto::PushFrame;

use crate::model::Notification;
use crate::store::NotificationStore;

/// Routes inbound push frames to their effects: refresh-signal bumps and
/// provisional notification synthesis.
///
/// Frames are handled strictly in arrival order. The refresh signal is a
/// counter whose value carries no meaning beyond "changed".
pub struct EventRouter {
    store: Arc<NotificationStore>,
    refresh: watch::Sender<u64>,
}

impl EventRouter {
    pub fn new(store: Arc<NotificationStore>, refresh: watch::Sender<u64>) -> Self {
        Self { store, refresh }
    }

    /// Classify one raw frame. Malformed payloads are logged and dropped;
    /// unknown discriminants are ignored. Neither is ever an error.
    pub fn route(&self, raw: &str) {
        let frame = match serde_json::from_str::<PushFrame>(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(target: "notify::events", error = %err, "dropping malformed push frame");
                return;
            }
        };
        match frame {
            PushFrame::RefreshProjects => self.request_refresh(),
            PushFrame::UrgentAlert {
                message,
                project_id,
            }
            | PushFrame::OnboardingSubmission {
                message,
                project_id,
            } => {
                // Surface the alert before the re-fetch round-trip resolves.
                self.store
                    .insert_provisional(Notification::provisional(message, project_id));
                self.request_refresh();
            }
            PushFrame::Unknown => {
                debug!(target: "notify::events", "ignoring unrecognized push frame");
            }
        }
    }

    /// Bump the refresh signal; also the session-activation fetch trigger.
    pub fn request_refresh(&self) {
        self.refresh.send_modify(|counter| *counter = counter.wrapping_add(1));
    }
}
