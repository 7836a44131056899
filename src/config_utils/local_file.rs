//! Local configuration and data files
//!
//! Loads JSON, YAML and (with the `hdf5` feature) HDF5 files into a
//! `serde_json::Value`, and dumps values back to JSON or YAML. The format is
//! picked from the file extension.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{HandlerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Hdf5,
}

impl FileFormat {
    /// Detect the format from the extension of `path`
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("json") => Ok(FileFormat::Json),
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("h5") | Some("hd5") | Some("hdf5") => Ok(FileFormat::Hdf5),
            _ => Err(HandlerError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Load a configuration or data file from local storage
pub fn local_load<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    match FileFormat::from_path(path)? {
        FileFormat::Json => {
            let content = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        }
        FileFormat::Yaml => {
            let content = fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&content)?)
        }
        FileFormat::Hdf5 => load_hdf5(path),
    }
}

#[cfg(feature = "hdf5")]
fn load_hdf5(path: &Path) -> Result<Value> {
    crate::config_utils::hdf5_reader::hdf5_to_value(path)
}

#[cfg(not(feature = "hdf5"))]
fn load_hdf5(path: &Path) -> Result<Value> {
    Err(HandlerError::UnsupportedFormat(format!(
        "{} (built without the `hdf5` feature)",
        path.display()
    )))
}

/// Write `value` as JSON or YAML, depending on the extension of `path`
pub fn local_dump<P: AsRef<Path>>(path: P, value: &Value) -> Result<()> {
    let path = path.as_ref();
    let content = match FileFormat::from_path(path)? {
        FileFormat::Json => serde_json::to_string(value)?,
        FileFormat::Yaml => serde_yaml::to_string(value)?,
        FileFormat::Hdf5 => {
            return Err(HandlerError::UnsupportedFormat(path.display().to_string()))
        }
    };
    fs::write(path, content)?;
    Ok(())
}

/// Holds the configuration document loaded from `config_path`
#[derive(Debug, Clone, Default)]
pub struct ConfigHandler {
    config_path: Option<PathBuf>,
    configs: Option<Value>,
}

impl ConfigHandler {
    /// Load `config_path` if given; without a path the handler has no configs
    pub fn new<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => {
                let path = path.as_ref();
                info!("Loading configuration from {:?}", path);
                Ok(Self {
                    config_path: Some(path.to_path_buf()),
                    configs: Some(local_load(path)?),
                })
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_value(configs: Value) -> Self {
        Self {
            config_path: None,
            configs: Some(configs),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn configs(&self) -> Option<&Value> {
        self.configs.as_ref()
    }

    /// Look up a top-level key of the configuration
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.configs.as_ref().and_then(|c| c.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Save the current configs to `path`
    pub fn local_dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        local_dump(path, self.configs.as_ref().unwrap_or(&Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_load_json_and_yaml() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("conf.json");
        fs::write(&json_path, r#"{"engine": "sqlite", "database": "prices"}"#).unwrap();
        let yaml_path = dir.path().join("conf.yml");
        fs::write(&yaml_path, "engine: sqlite\ndatabase: prices\n").unwrap();

        let from_json = local_load(&json_path).unwrap();
        let from_yaml = local_load(&yaml_path).unwrap();
        assert_eq!(from_json, from_yaml);
        assert_eq!(from_json["database"], "prices");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf.toml");
        fs::write(&path, "engine = 'sqlite'").unwrap();
        assert!(matches!(local_load(&path), Err(HandlerError::UnsupportedFormat(_))));
        assert!(matches!(
            local_dump(&path, &json!({})),
            Err(HandlerError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_dump_then_load_yaml() {
        let dir = tempdir().unwrap();
        let handler = ConfigHandler::from_value(json!({
            "database": "db.yaml",
            "symbols": ["BTCUSDT", "ETHUSDT"],
            "capacity": 100
        }));
        let out = dir.path().join("out.yaml");
        handler.local_dump(&out).unwrap();

        let reloaded = ConfigHandler::new(Some(&out)).unwrap();
        assert_eq!(reloaded.configs(), handler.configs());
        assert_eq!(reloaded.config_path(), Some(out.as_path()));
        assert!(reloaded.contains_key("symbols"));
    }

    #[test]
    fn test_handler_without_path() {
        let handler = ConfigHandler::new(None::<&Path>).unwrap();
        assert!(handler.configs().is_none());
        assert!(handler.get("database").is_none());
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(FileFormat::from_path(Path::new("a.JSON")).unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("a.hdf5")).unwrap(), FileFormat::Hdf5);
    }

    #[cfg(not(feature = "hdf5"))]
    #[test]
    fn test_hdf5_without_feature() {
        let err = local_load("missing.h5").unwrap_err();
        assert!(matches!(err, HandlerError::UnsupportedFormat(_)));
    }
}
