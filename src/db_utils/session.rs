//! A loaded configuration together with the database it points at

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config_utils::local_file::ConfigHandler;
use crate::db_utils::database_handler::DatabaseHandler;
use crate::error::{HandlerError, Result};

/// Config key naming the database config file
pub const DATABASE_KEY: &str = "database";

pub struct Session {
    config: ConfigHandler,
    database: DatabaseHandler,
}

impl Session {
    /// Load `config_path` and connect to the database it names.
    ///
    /// Without a config, or when the config has no `database` key, the local
    /// SQLite database is used.
    pub async fn open<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        let config = ConfigHandler::new(config_path)?;
        let db_config_path = database_config_path(&config)?;
        if let Some(path) = &db_config_path {
            info!("Session database config {:?}", path);
        }
        let database = DatabaseHandler::from_config_path(db_config_path).await?;
        Ok(Self { config, database })
    }

    /// Build a session from parts that are already open
    pub fn with_database(config: ConfigHandler, database: DatabaseHandler) -> Self {
        Self { config, database }
    }

    /// Switch to the local SQLite database, closing the current pool
    pub async fn use_local_db(&mut self) -> Result<()> {
        let local = DatabaseHandler::connect(None).await?;
        let previous = std::mem::replace(&mut self.database, local);
        previous.close().await;
        Ok(())
    }

    pub fn config(&self) -> &ConfigHandler {
        &self.config
    }

    pub fn configs(&self) -> Option<&Value> {
        self.config.configs()
    }

    pub fn database(&self) -> &DatabaseHandler {
        &self.database
    }

    pub async fn close(self) {
        self.database.close().await;
    }
}

/// Resolve the `database` entry against the directory of the config file
fn database_config_path(config: &ConfigHandler) -> Result<Option<PathBuf>> {
    let Some(value) = config.get(DATABASE_KEY) else {
        return Ok(None);
    };
    let name = value.as_str().ok_or_else(|| {
        HandlerError::Config(format!("'{}' must be a path, got {}", DATABASE_KEY, value))
    })?;

    let path = Path::new(name);
    if path.is_absolute() {
        return Ok(Some(path.to_path_buf()));
    }
    let base = config
        .config_path()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new(""));
    Ok(Some(base.join(path)))
}
