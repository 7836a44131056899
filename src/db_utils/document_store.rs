//! MongoDB document store
//!
//! Documents are written one at a time, so this handler is not used behind the
//! buffered writer.

use mongodb::bson::{self, Document};
use mongodb::{Client, Database};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::config_utils::local_file::local_load;
use crate::error::{HandlerError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Only "mongodb" is supported
    pub engine: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl DocumentStoreConfig {
    pub fn from_value(value: Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| HandlerError::Config(format!("invalid document store config: {}", e)))?;
        if config.engine != "mongodb" {
            return Err(HandlerError::UnsupportedEngine(config.engine));
        }
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_value(local_load(path)?)
    }

    pub fn connection_uri(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }
}

pub struct DocumentStore {
    config: DocumentStoreConfig,
    database: Database,
}

impl DocumentStore {
    /// Create a client for the configured server.
    ///
    /// The driver connects lazily, so an unreachable server only shows up on
    /// the first write.
    pub async fn connect(config: DocumentStoreConfig) -> Result<Self> {
        let client = Client::with_uri_str(config.connection_uri()).await?;
        let database = client.database(&config.database);
        Ok(Self { config, database })
    }

    pub async fn from_config_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::connect(DocumentStoreConfig::from_file(path)?).await
    }

    pub fn config(&self) -> &DocumentStoreConfig {
        &self.config
    }

    /// Insert one document into `collection`
    pub async fn write<T: Serialize>(&self, document: &T, collection: &str) -> Result<()> {
        info!(
            "Uploading to document store {}://{}/{}",
            self.config.engine, self.config.database, collection
        );
        let document: Document = bson::to_document(document)?;
        self.database
            .collection::<Document>(collection)
            .insert_one(document)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_uri() {
        let config = DocumentStoreConfig::from_value(json!({
            "engine": "mongodb",
            "host": "127.0.0.1",
            "port": 27017,
            "database": "market"
        }))
        .unwrap();
        assert_eq!(config.connection_uri(), "mongodb://127.0.0.1:27017");
    }

    #[test]
    fn test_other_engine_rejected() {
        let result = DocumentStoreConfig::from_value(json!({
            "engine": "couchdb",
            "host": "127.0.0.1",
            "port": 5984,
            "database": "market"
        }));
        assert!(matches!(result, Err(HandlerError::UnsupportedEngine(ref e)) if e == "couchdb"));
    }

    #[test]
    fn test_missing_port_is_config_error() {
        let result = DocumentStoreConfig::from_value(json!({
            "engine": "mongodb",
            "host": "127.0.0.1",
            "database": "market"
        }));
        assert!(matches!(result, Err(HandlerError::Config(_))));
    }

    #[tokio::test]
    async fn test_connect_is_lazy() {
        let config = DocumentStoreConfig::from_value(json!({
            "engine": "mongodb",
            "host": "127.0.0.1",
            "port": 27017,
            "database": "market"
        }))
        .unwrap();
        let store = DocumentStore::connect(config).await.unwrap();
        assert_eq!(store.config().database, "market");
    }
}
