mod gate;

pub use gate::SessionGate;

use time::{Duration, OffsetDateTime};

/// Tokens are treated as expired slightly early to absorb clock skew.
const EXPIRY_SKEW: Duration = Duration::seconds(15);

/// Locally held credential with an optional expiry instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub expires_at: Option<OffsetDateTime>,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn expiring(token: impl Into<String>, expires_at: OffsetDateTime) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
        }
    }

    pub fn is_valid(&self, now: OffsetDateTime) -> bool {
        if self.token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now + EXPIRY_SKEW,
            None => true,
        }
    }
}

/// An authenticated synchronization session, observed by the engine through
/// presence or absence only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
}
