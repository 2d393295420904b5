use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::{watch, Semaphore};
use waypoint_proto::NotificationRecord;

use crate::auth::Session;
use crate::error::NotifyError;
use crate::rest::NotificationApi;

/// Opt-in test logging, driven by `RUST_LOG` like the production stack.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn session() -> Session {
    Session {
        user_id: "u-1".into(),
        token: "tok-1".into(),
    }
}

pub fn record(id: &str, message: &str, kind: &str, is_read: bool) -> NotificationRecord {
    NotificationRecord {
        id: id.into(),
        message: message.into(),
        kind: kind.into(),
        created_at: OffsetDateTime::now_utc(),
        is_read,
        project_id: None,
    }
}

/// Await a watch channel until its value satisfies the predicate.
pub async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<T>,
    predicate: impl Fn(&T) -> bool,
) -> T {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let current = rx.borrow();
                if predicate(&current) {
                    return current.clone();
                }
            }
            rx.changed().await.expect("watch channel closed");
        }
    })
    .await
    .expect("condition not reached in time")
}

/// Scripted REST backend, after the session manager's mock-backend pattern.
/// Fetches can be gated behind permits so tests can observe provisional
/// state before the authoritative fetch lands.
pub struct MockApi {
    records: Mutex<Vec<NotificationRecord>>,
    fetch_gate: Semaphore,
    pub fail_acks: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub fetches: AtomicUsize,
    pub read_acks: Mutex<Vec<String>>,
    pub read_all_acks: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Self::gated(Semaphore::MAX_PERMITS)
    }

    /// A backend that answers only `permits` fetches until more are granted.
    pub fn gated(permits: usize) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            fetch_gate: Semaphore::new(permits),
            fail_acks: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            read_acks: Mutex::new(Vec::new()),
            read_all_acks: AtomicUsize::new(0),
        })
    }

    pub fn set_records(&self, records: Vec<NotificationRecord>) {
        *self.records.lock() = records;
    }

    pub fn allow_fetch(&self) {
        self.fetch_gate.add_permits(1);
    }
}

#[async_trait]
impl NotificationApi for MockApi {
    async fn fetch_all(&self, _session: &Session) -> Result<Vec<NotificationRecord>, NotifyError> {
        self.fetch_gate
            .acquire()
            .await
            .expect("fetch gate closed")
            .forget();
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(NotifyError::Server("fetch unavailable".into()));
        }
        Ok(self.records.lock().clone())
    }

    async fn mark_read(&self, _session: &Session, id: &str) -> Result<(), NotifyError> {
        self.read_acks.lock().push(id.to_string());
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(NotifyError::Server("acknowledgment rejected".into()));
        }
        Ok(())
    }

    async fn mark_all_read(&self, _session: &Session) -> Result<(), NotifyError> {
        self.read_all_acks.fetch_add(1, Ordering::SeqCst);
        if self.fail_acks.load(Ordering::SeqCst) {
            return Err(NotifyError::Server("acknowledgment rejected".into()));
        }
        Ok(())
    }
}
