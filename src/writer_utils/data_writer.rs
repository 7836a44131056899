//! Buffered stream writer
//!
//! Records arrive one at a time (e.g. one WebSocket message every ~100ms) and
//! are accumulated column-wise. Once the buffer holds `capacity` rows the whole
//! batch is handed to the sink in a single write and the buffer is reset.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{HandlerError, Result};
use crate::writer_utils::record::{Buffer, Record};
use crate::writer_utils::sink::Sink;
use crate::writer_utils::writer::Writer;

/// Default number of rows buffered before a flush
pub const DEFAULT_CAPACITY: usize = 100;

/// What happens to buffered rows when the sink rejects a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushFailurePolicy {
    /// Drop the batch and start over with an empty buffer
    #[default]
    Discard,
    /// Keep the batch; the next `write` or `flush` tries again
    Retain,
}

/// Buffered writer in front of a [`Sink`]
///
/// Not synchronized: callers sharing a writer across tasks must wrap it in a
/// mutex themselves.
pub struct DataWriter<S: Sink> {
    sink: S,
    table: String,
    capacity: usize,
    buffer: Buffer,
    on_failure: FlushFailurePolicy,
}

impl<S: Sink> DataWriter<S> {
    /// Create a writer buffering `fields` for `table`.
    ///
    /// Fails when `capacity` is zero or a field is listed twice.
    pub fn new<I, F>(sink: S, table: impl Into<String>, fields: I, capacity: usize) -> Result<Self>
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        if capacity == 0 {
            return Err(HandlerError::Config(
                "writer capacity must be greater than 0".to_string(),
            ));
        }

        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let mut seen = HashSet::new();
        if let Some(dup) = fields.iter().find(|f| !seen.insert(f.as_str())) {
            return Err(HandlerError::Config(format!("duplicate field '{}'", dup)));
        }

        Ok(Self {
            sink,
            table: table.into(),
            capacity,
            buffer: Buffer::new(fields),
            on_failure: FlushFailurePolicy::default(),
        })
    }

    pub fn with_failure_policy(mut self, policy: FlushFailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Empty every column of the buffer
    pub fn reset_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Append one record to the buffer without flushing.
    ///
    /// Unknown fields are dropped; a missing field is an error and leaves the
    /// buffer unchanged.
    pub fn append_buffer(&mut self, data: &Record) -> Result<()> {
        self.buffer.push_record(data)
    }

    /// Number of rows currently buffered
    pub fn buf_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Flush the buffer to the sink if it holds anything
    pub async fn flush(&mut self) -> Result<()> {
        if self.buf_size() == 0 {
            return Ok(());
        }

        debug!("Flushing {} rows to {}", self.buf_size(), self.table);
        match self.sink.write(&self.buffer, &self.table).await {
            Ok(()) => {
                self.reset_buffer();
                Ok(())
            }
            Err(e) => {
                match self.on_failure {
                    FlushFailurePolicy::Discard => {
                        warn!(
                            "Flush to {} failed, dropping {} buffered rows",
                            self.table,
                            self.buf_size()
                        );
                        self.reset_buffer();
                    }
                    FlushFailurePolicy::Retain => {
                        warn!(
                            "Flush to {} failed, keeping {} buffered rows",
                            self.table,
                            self.buf_size()
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Buffer one record and flush when the buffer is full
    pub async fn write(&mut self, data: &Record) -> Result<()> {
        self.append_buffer(data)?;
        if self.buf_size() >= self.capacity {
            self.flush().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Sink> Writer for DataWriter<S> {
    async fn write_record(&mut self, record: &Record) -> Result<()> {
        self.write(record).await
    }

    async fn flush_buffer(&mut self) -> Result<()> {
        self.flush().await
    }

    fn pending(&self) -> usize {
        self.buf_size()
    }
}

impl<S: Sink> Drop for DataWriter<S> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                "Buffer not empty on drop, {} records for {} will be lost",
                self.buffer.len(),
                self.table
            );
        }
    }
}
