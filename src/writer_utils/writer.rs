//! Record-at-a-time writing
//!
//! [`Writer`] is what producers see: push one record, force a flush, ask how
//! much is pending. [`write_json_lines`] drives any writer from a stream of
//! JSON objects, one per line.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::error::{HandlerError, Result};
use crate::writer_utils::record::Record;

#[async_trait]
pub trait Writer: Send {
    /// Accept one record, persisting earlier ones if the writer decides to
    async fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Persist everything still pending
    async fn flush_buffer(&mut self) -> Result<()>;

    /// Records accepted but not yet persisted
    fn pending(&self) -> usize;
}

/// Outcome of [`write_json_lines`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    pub stored: usize,
    pub skipped: usize,
}

/// Feed every line of `reader` to `writer` and flush the remainder at EOF.
///
/// Blank lines are ignored. Lines that are not JSON objects, and records
/// missing a field the writer expects, are logged and skipped. Any other
/// error stops the stream after one last flush attempt.
pub async fn write_json_lines<R, W>(reader: R, writer: &mut W) -> Result<LineStats>
where
    R: AsyncBufRead + Unpin + Send,
    W: Writer + ?Sized,
{
    let mut lines = reader.lines();
    let mut stats = LineStats::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: Record = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!("Line {}: not a JSON record, skipped: {}", line_no, e);
                stats.skipped += 1;
                continue;
            }
        };

        match writer.write_record(&record).await {
            Ok(()) => stats.stored += 1,
            Err(HandlerError::MissingField(field)) => {
                warn!("Line {}: missing field '{}', skipped", line_no, field);
                stats.skipped += 1;
            }
            Err(e) => {
                if let Err(flush_err) = writer.flush_buffer().await {
                    warn!("Flush after failed line {} also failed: {}", line_no, flush_err);
                }
                return Err(e);
            }
        }
    }

    writer.flush_buffer().await?;
    info!("Stored {} records, skipped {}", stats.stored, stats.skipped);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_utils::csv_file::CsvFileSink;
    use crate::writer_utils::data_writer::DataWriter;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_bad_record_does_not_lose_buffered_rows() {
        let dir = tempdir().unwrap();
        let sink = CsvFileSink::new(dir.path());
        let path = sink.file_path("ticks");
        let mut writer = DataWriter::new(sink, "ticks", ["t", "v"], 10).unwrap();

        let input: &[u8] =
            b"{\"t\":1,\"v\":10}\n{\"t\":2,\"v\":20}\n{\"t\":3}\nnot json\n\n{\"t\":4,\"v\":40}\n";
        let stats = write_json_lines(input, &mut writer).await.unwrap();

        assert_eq!(stats, LineStats { stored: 3, skipped: 2 });
        assert_eq!(writer.pending(), 0);
        assert_eq!(fs::read_to_string(path).unwrap(), "t,v\n1,10\n2,20\n4,40\n");
    }

    #[tokio::test]
    async fn test_flushes_at_capacity_and_at_eof() {
        let dir = tempdir().unwrap();
        let sink = CsvFileSink::new(dir.path());
        let path = sink.file_path("ticks");
        let mut writer = DataWriter::new(sink, "ticks", ["t"], 2).unwrap();

        let input: &[u8] = b"{\"t\":1}\n{\"t\":2}\n{\"t\":3}\n";
        let stats = write_json_lines(input, &mut writer).await.unwrap();

        assert_eq!(stats.stored, 3);
        assert_eq!(fs::read_to_string(path).unwrap(), "t\n1\n2\n3\n");
    }
}
