use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{Auth, KeyValue, PlatformError};

const SESSION_PREFIX: &str = "session:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Bearer-token sessions kept as `session:<token>` records in the key-value
/// store, so they share whichever backend the resumes live in.
pub struct SessionAuth {
    kv: Arc<dyn KeyValue>,
}

impl SessionAuth {
    pub fn new(kv: Arc<dyn KeyValue>) -> Self {
        Self { kv }
    }
}

fn session_key(token: &str) -> String {
    format!("{SESSION_PREFIX}{token}")
}

#[async_trait]
impl Auth for SessionAuth {
    async fn is_authenticated(&self, token: Option<&str>) -> Result<bool, PlatformError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        // a wildcard here would turn the lookup into a pattern in some backends
        if token.contains('*') {
            return Ok(false);
        }
        Ok(self.kv.get(&session_key(token)).await?.is_some())
    }

    async fn sign_in(&self) -> Result<Session, PlatformError> {
        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            signed_in_at: Utc::now(),
        };
        self.kv
            .set(&session_key(&session.token), &serde_json::to_string(&session)?)
            .await?;
        info!("Session opened");
        Ok(session)
    }

    async fn sign_out(&self, token: &str) -> Result<(), PlatformError> {
        if self.kv.delete(&session_key(token)).await? {
            info!("Session closed");
        }
        Ok(())
    }
}
