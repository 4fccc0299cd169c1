// [libs/infra/hermes-storage/src/client.rs]
//! Connection management for the libsql-backed store.

use crate::errors::StorageError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct StorageClient {
    driver: Arc<Database>,
    /// Keeps an in-memory database alive across connections; SQLite
    /// purges an in-memory database once its last connection closes.
    _memory_anchor: Option<Arc<Connection>>,
}

impl StorageClient {
    #[instrument(skip(auth_token))]
    pub async fn connect(url: &str, auth_token: Option<String>) -> Result<Self, StorageError> {
        if url.is_empty() {
            return Err(StorageError::Connection("DATABASE_URL is empty".into()));
        }

        info!("connecting to storage backend at {}", url);

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:") || url.contains("mode=memory");

        let driver = if is_remote {
            let token = auth_token.ok_or_else(|| {
                StorageError::Connection("remote storage requires an auth token".into())
            })?;
            Builder::new_remote(url.to_string(), token).build().await
        } else {
            Builder::new_local(url).build().await
        }
        .map_err(|e| StorageError::Connection(format!("driver initialization failed: {e}")))?;

        let driver = Arc::new(driver);
        let mut anchor = None;

        if is_memory {
            let anchor_conn = driver
                .connect()
                .map_err(|e| StorageError::Connection(format!("anchor connection failed: {e}")))?;
            apply_schema(&anchor_conn)
                .await
                .map_err(|e| StorageError::Connection(format!("schema migration failed: {e}")))?;
            anchor = Some(Arc::new(anchor_conn));
        } else {
            let bootstrap_conn = driver
                .connect()
                .map_err(|e| StorageError::Connection(format!("bootstrap connection failed: {e}")))?;
            apply_schema(&bootstrap_conn)
                .await
                .map_err(|e| StorageError::Connection(format!("schema migration failed: {e}")))?;
        }

        Ok(Self {
            driver,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, StorageError> {
        self.driver
            .connect()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_to_in_memory_database() {
        let client = StorageClient::connect(":memory:", None).await.unwrap();
        let conn = client.connection().unwrap();
        conn.execute("SELECT 1", ()).await.unwrap();
    }
}
