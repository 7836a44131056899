//! Sink trait definition
//!
//! A sink persists a whole [`Buffer`] in one call. The buffered writer hands
//! its batch to a sink whenever it flushes.

use async_trait::async_trait;

use crate::error::Result;
use crate::writer_utils::record::Buffer;

/// Destination able to persist a batch of buffered records
#[async_trait]
pub trait Sink: Send {
    /// Append every row of `buffer` to `destination` (table, collection or file name)
    async fn write(&mut self, buffer: &Buffer, destination: &str) -> Result<()>;
}

