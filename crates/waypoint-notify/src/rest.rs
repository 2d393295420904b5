use std::time::Duration;

use async_trait::async_trait;
use url::Url;
use waypoint_proto::{AckResponse, NotificationRecord};

use crate::auth::Session;
use crate::config::Config;
use crate::error::NotifyError;

/// REST access to the notification source of truth.
///
/// The engine only ever talks to the backend through this seam, so tests can
/// swap in a mock backend the same way production swaps in [`NotificationsClient`].
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn fetch_all(&self, session: &Session) -> Result<Vec<NotificationRecord>, NotifyError>;
    async fn mark_read(&self, session: &Session, id: &str) -> Result<(), NotifyError>;
    async fn mark_all_read(&self, session: &Session) -> Result<(), NotifyError>;
}

/// reqwest-backed production backend.
#[derive(Debug, Clone)]
pub struct NotificationsClient {
    client: reqwest::Client,
    base_url: Url,
}

impl NotificationsClient {
    pub fn new(config: &Config) -> Result<Self, NotifyError> {
        let base_url = config.api_base_url()?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(8))
            .build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, NotifyError> {
        self.base_url.join(path).map_err(|err| {
            NotifyError::InvalidConfig(format!("invalid notifications endpoint '{path}': {err}"))
        })
    }

    async fn post_ack(&self, session: &Session, path: &str) -> Result<(), NotifyError> {
        let endpoint = self.endpoint(path)?;
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&session.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::HttpStatus(response.status()));
        }
        let ack = response.json::<AckResponse>().await?;
        if !ack.success {
            return Err(NotifyError::Server(
                ack.message
                    .unwrap_or_else(|| "acknowledgment rejected".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationApi for NotificationsClient {
    async fn fetch_all(&self, session: &Session) -> Result<Vec<NotificationRecord>, NotifyError> {
        let endpoint = self.endpoint("api/notifications/")?;
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&session.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn mark_read(&self, session: &Session, id: &str) -> Result<(), NotifyError> {
        self.post_ack(session, &format!("api/notifications/{id}/read/"))
            .await
    }

    async fn mark_all_read(&self, session: &Session) -> Result<(), NotifyError> {
        self.post_ack(session, "api/notifications/read-all/").await
    }
}
