pub mod error;
pub mod logging;

pub mod writer_utils {
    pub mod record;
    pub mod sink;
    pub mod writer;
    pub mod data_writer;
}

pub mod config_utils {
    pub mod local_file;
    #[cfg(feature = "hdf5")]
    pub mod hdf5_reader;
}

pub mod db_utils {
    pub mod dialect;
    pub mod database_config;
    pub mod database_handler;
    pub mod document_store;
    pub mod session;
}

pub mod file_utils {
    pub mod csv_file;
}

pub mod email_utils {
    pub mod email_handler;
}

pub use crate::error::{HandlerError, Result};
pub use crate::logging::init_logging;
pub use crate::writer_utils::record::{Buffer, Column, FieldValue, Record, TIMESTAMP_FORMAT};
pub use crate::writer_utils::sink::Sink;
pub use crate::writer_utils::writer::{write_json_lines, LineStats, Writer};
pub use crate::writer_utils::data_writer::{DataWriter, FlushFailurePolicy, DEFAULT_CAPACITY};
pub use crate::config_utils::local_file::{local_dump, local_load, ConfigHandler};
pub use crate::db_utils::dialect::Dialect;
pub use crate::db_utils::database_config::DatabaseConfig;
pub use crate::db_utils::database_handler::DatabaseHandler;
pub use crate::db_utils::document_store::{DocumentStore, DocumentStoreConfig};
pub use crate::db_utils::session::Session;
pub use crate::file_utils::csv_file::CsvFileSink;
pub use crate::email_utils::email_handler::EmailHandler;

// The record! macro is exported at crate root via #[macro_export]
