use std::sync::Arc;

use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::Session;
use crate::config::Config;
use crate::error::NotifyError;
use crate::events::EventRouter;
use crate::model::Notification;
use crate::rest::{NotificationApi, NotificationsClient};
use crate::store::{NotificationStore, Snapshot};
use crate::toast::{Toast, ToastPolicy};
use crate::transport::{notification_socket_url, ConnectionState, PushChannel};

struct Shared {
    base_url: Url,
    api: Arc<dyn NotificationApi>,
    store: Arc<NotificationStore>,
    policy: ToastPolicy,
    toast: watch::Sender<Option<Toast>>,
    connection: Arc<watch::Sender<ConnectionState>>,
    session: Mutex<Option<Session>>,
}

impl Shared {
    fn current_session(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    fn clear_toast_for(&self, id: &str) {
        let matches = self
            .toast
            .borrow()
            .as_ref()
            .map(|toast| toast.notification_id == id)
            .unwrap_or(false);
        if matches {
            self.toast.send_replace(None);
        }
    }
}

/// Owner of the synchronization pipeline: session gate feed in, observable
/// notification state out.
pub struct SyncEngine {
    config: Config,
    api: Arc<dyn NotificationApi>,
}

impl SyncEngine {
    pub fn new(config: Config, api: Arc<dyn NotificationApi>) -> Self {
        Self { config, api }
    }

    /// Production wiring against the configured REST backend.
    pub fn with_rest_client(config: Config) -> Result<Self, NotifyError> {
        let api = Arc::new(NotificationsClient::new(&config)?);
        Ok(Self::new(config, api))
    }

    /// Start synchronizing against a session presence feed (see
    /// [`crate::auth::SessionGate::subscribe`]).
    pub fn start(
        &self,
        sessions: watch::Receiver<Option<Session>>,
    ) -> Result<SyncHandle, NotifyError> {
        let base_url = self.config.api_base_url()?;
        let store = Arc::new(NotificationStore::new());
        let (toast_tx, _) = watch::channel(None);
        let (connection_tx, _) = watch::channel(ConnectionState::Absent);
        let (refresh_tx, refresh_rx) = watch::channel(0u64);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            base_url,
            api: self.api.clone(),
            store: store.clone(),
            policy: ToastPolicy::from_config(&self.config),
            toast: toast_tx,
            connection: Arc::new(connection_tx),
            session: Mutex::new(None),
        });
        let router = Arc::new(EventRouter::new(store, refresh_tx));

        let tasks = Tasks {
            router: tokio::spawn(run_router(router.clone(), frame_rx)),
            reconciler: tokio::spawn(run_reconciler(shared.clone(), refresh_rx)),
            toaster: tokio::spawn(run_toaster(shared.clone())),
            supervisor: tokio::spawn(run_supervisor(
                shared.clone(),
                router.clone(),
                frame_tx,
                sessions,
            )),
        };

        Ok(SyncHandle {
            shared,
            router,
            tasks: Arc::new(tasks),
        })
    }
}

/// Handle to a running engine: observable state plus the three mutating
/// operations. Cloneable; the tasks stop when the last clone is dropped.
#[derive(Clone)]
pub struct SyncHandle {
    shared: Arc<Shared>,
    router: Arc<EventRouter>,
    tasks: Arc<Tasks>,
}

impl SyncHandle {
    /// Notification list and unread count, as a watch subscription.
    pub fn notifications(&self) -> watch::Receiver<Snapshot> {
        self.shared.store.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.store.snapshot()
    }

    pub fn toast(&self) -> watch::Receiver<Option<Toast>> {
        self.shared.toast.subscribe()
    }

    pub fn current_toast(&self) -> Option<Toast> {
        self.shared.toast.borrow().clone()
    }

    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.shared.connection.subscribe()
    }

    /// Optimistically mark one notification read, then acknowledge it
    /// server-side. A failed acknowledgment never rolls the local state back.
    pub async fn mark_read(&self, id: &str) {
        let matched = self.shared.store.mark_read(id);
        self.shared.clear_toast_for(id);
        if !matched {
            debug!(
                target: "notify::engine",
                id = %id,
                "mark-read for an id not in the list; skipping acknowledgment"
            );
            return;
        }
        let Some(session) = self.shared.current_session() else {
            return;
        };
        if let Err(err) = self.shared.api.mark_read(&session, id).await {
            warn!(
                target: "notify::engine",
                id = %id,
                error = %err,
                "mark-read acknowledgment failed; keeping optimistic state"
            );
        }
    }

    /// Optimistically clear the whole list, then acknowledge server-side.
    pub async fn mark_all_read(&self) {
        self.shared.store.mark_all_read();
        // The list-wide acknowledgment covers the toast's entry too.
        self.shared.toast.send_replace(None);
        let Some(session) = self.shared.current_session() else {
            return;
        };
        if let Err(err) = self.shared.api.mark_all_read(&session).await {
            warn!(
                target: "notify::engine",
                error = %err,
                "mark-all-read acknowledgment failed; keeping optimistic state"
            );
        }
    }

    /// Dismissing a toast acknowledges the underlying notification; they are
    /// the same user action.
    pub async fn dismiss_toast(&self) {
        let Some(toast) = self.shared.toast.borrow().clone() else {
            return;
        };
        self.shared.toast.send_replace(None);
        self.mark_read(&toast.notification_id).await;
    }

    /// Stop synchronizing and release the push channel.
    pub fn shutdown(&self) {
        self.tasks.abort();
        self.shared.connection.send_replace(ConnectionState::Absent);
    }

    #[cfg(test)]
    pub(crate) fn inject_frame(&self, raw: &str) {
        self.router.route(raw);
    }
}

struct Tasks {
    supervisor: JoinHandle<()>,
    router: JoinHandle<()>,
    reconciler: JoinHandle<()>,
    toaster: JoinHandle<()>,
}

impl Tasks {
    fn abort(&self) {
        self.supervisor.abort();
        self.router.abort();
        self.reconciler.abort();
        self.toaster.abort();
    }
}

impl Drop for Tasks {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Session lifecycle: exactly one push channel per active session, closed on
/// every exit path. Opening a new channel closes the prior one first.
async fn run_supervisor(
    shared: Arc<Shared>,
    router: Arc<EventRouter>,
    frames: mpsc::UnboundedSender<String>,
    mut sessions: watch::Receiver<Option<Session>>,
) {
    let mut channel: Option<PushChannel> = None;
    let mut current: Option<Session> = None;
    loop {
        let next = sessions.borrow_and_update().clone();
        if next != current {
            if let Some(mut open) = channel.take() {
                open.close().await;
            }
            current = next;
            *shared.session.lock() = current.clone();
            match &current {
                Some(session) => {
                    info!(
                        target: "notify::engine",
                        user_id = %session.user_id,
                        "session active; synchronizing"
                    );
                    // The activation fetch does not wait on the channel.
                    router.request_refresh();
                    match open_channel(&shared, session, frames.clone()).await {
                        Ok(open) => channel = Some(open),
                        Err(err) => {
                            warn!(
                                target: "notify::transport",
                                error = %err,
                                "push channel unavailable; relying on pull refresh"
                            );
                        }
                    }
                }
                None => {
                    info!(target: "notify::engine", "session ended; push channel released");
                    shared.connection.send_replace(ConnectionState::Absent);
                }
            }
        }
        if sessions.changed().await.is_err() {
            break;
        }
    }
    if let Some(mut open) = channel.take() {
        open.close().await;
    }
    shared.connection.send_replace(ConnectionState::Absent);
}

async fn open_channel(
    shared: &Shared,
    session: &Session,
    frames: mpsc::UnboundedSender<String>,
) -> Result<PushChannel, NotifyError> {
    let url = notification_socket_url(&shared.base_url, session)?;
    PushChannel::connect(url, frames, shared.connection.clone()).await
}

async fn run_router(router: Arc<EventRouter>, mut frames: mpsc::UnboundedReceiver<String>) {
    while let Some(frame) = frames.recv().await {
        router.route(&frame);
    }
}

/// Pull-side reconciliation: every refresh signal change triggers one fetch,
/// applied wholesale. A failed fetch keeps the stale list; the next signal is
/// the retry trigger.
async fn run_reconciler(shared: Arc<Shared>, mut refresh: watch::Receiver<u64>) {
    while refresh.changed().await.is_ok() {
        reconcile(&shared).await;
    }
}

async fn reconcile(shared: &Shared) {
    let Some(session) = shared.current_session() else {
        return;
    };
    match shared.api.fetch_all(&session).await {
        Ok(records) => {
            let notifications: Vec<Notification> =
                records.into_iter().map(Notification::from).collect();
            debug!(
                target: "notify::engine",
                count = notifications.len(),
                "reconciled notification list"
            );
            shared.store.replace_all(notifications);
        }
        Err(err) => {
            warn!(
                target: "notify::engine",
                error = %err,
                "notification fetch failed; keeping stale list"
            );
        }
    }
}

/// Watches the merged list and keeps at most one toast visible. The most
/// recent qualifier supersedes the current toast; when nothing qualifies the
/// visible toast keeps its captured message and id.
async fn run_toaster(shared: Arc<Shared>) {
    let mut snapshots = shared.store.subscribe();
    let mut dismiss_at: Option<tokio::time::Instant> = None;
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let now = OffsetDateTime::now_utc();
                let candidate = shared
                    .policy
                    .select(&snapshot.notifications, now)
                    .map(Toast::capture);
                if let Some(toast) = candidate {
                    let supersedes = shared
                        .toast
                        .borrow()
                        .as_ref()
                        .map(|current| current.notification_id != toast.notification_id)
                        .unwrap_or(true);
                    if supersedes {
                        dismiss_at = shared
                            .policy
                            .auto_dismiss_after(toast.kind)
                            .map(|ttl| tokio::time::Instant::now() + ttl);
                        shared.toast.send_replace(Some(toast));
                    }
                }
            }
            _ = tokio::time::sleep_until(dismiss_at.unwrap_or_else(tokio::time::Instant::now)),
                if dismiss_at.is_some() =>
            {
                shared.toast.send_replace(None);
                dismiss_at = None;
            }
        }
    }
}
