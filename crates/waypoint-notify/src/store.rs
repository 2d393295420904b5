use parking_lot::Mutex;
use tokio::sync::watch;

use crate::model::Notification;

/// Point-in-time view of the notification list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub notifications: Vec<Notification>,
    /// Always the count of unread entries in `notifications`; recomputed on
    /// every publish, never tracked independently.
    pub unread: usize,
}

/// The authoritative client-local notification list.
///
/// Single writer, many watch-subscribed readers. Every mutation publishes one
/// snapshot, so readers never observe an intermediate state.
pub struct NotificationStore {
    list: Mutex<Vec<Notification>>,
    tx: watch::Sender<Snapshot>,
}

impl NotificationStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self {
            list: Mutex::new(Vec::new()),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Wholesale reconciliation: the fetched set replaces everything,
    /// provisional entries included. Never merges by id.
    pub fn replace_all(&self, notifications: Vec<Notification>) {
        let mut list = self.list.lock();
        *list = notifications;
        self.publish(&list);
    }

    /// Prepend a locally synthesized entry ahead of the next fetch.
    pub fn insert_provisional(&self, notification: Notification) {
        let mut list = self.list.lock();
        list.insert(0, notification);
        self.publish(&list);
    }

    /// Optimistically flag one entry as read. Returns whether an entry
    /// matched; the caller decides whether an acknowledgment is due.
    pub fn mark_read(&self, id: &str) -> bool {
        let mut list = self.list.lock();
        let Some(entry) = list.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        entry.read = true;
        self.publish(&list);
        true
    }

    /// Optimistic list-wide acknowledgment. Read notifications are dismissed
    /// from the dashboard, so the list empties immediately.
    pub fn mark_all_read(&self) {
        let mut list = self.list.lock();
        list.clear();
        self.publish(&list);
    }

    fn publish(&self, list: &[Notification]) {
        let unread = list.iter().filter(|n| !n.read).count();
        self.tx.send_replace(Snapshot {
            notifications: list.to_vec(),
            unread,
        });
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}
