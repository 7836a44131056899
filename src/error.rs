//! Error types shared by every handler in the crate

use thiserror::Error;

/// Errors raised by the handlers, sinks and the buffered writer
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// File extension not handled by the loader/dumper
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Database engine that cannot be connected to
    #[error("Unsupported database engine: {0}")]
    UnsupportedEngine(String),

    /// A record is missing a field the buffer expects
    #[error("Record is missing field '{0}'")]
    MissingField(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document store error: {0}")]
    DocumentStore(#[from] mongodb::error::Error),

    #[error("BSON serialization error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("Email error: {0}")]
    Email(String),

    /// Failure reported by a sink that is not one of the above
    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Logging setup error: {0}")]
    Logging(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = HandlerError::MissingField("ts".to_string());
        assert_eq!(err.to_string(), "Record is missing field 'ts'");

        let err = HandlerError::UnsupportedFormat("conf.toml".to_string());
        assert!(err.to_string().contains("conf.toml"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: HandlerError = io_err.into();
        assert!(matches!(err, HandlerError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: HandlerError = json_err.into();
        assert!(matches!(err, HandlerError::Json(_)));
    }

    #[test]
    fn test_question_mark_propagation() {
        fn inner() -> Result<()> {
            Err(HandlerError::Sink("boom".to_string()))?;
            Ok(())
        }
        assert!(inner().is_err());
    }
}
