use anyhow::Result;
use chrono::{Duration, NaiveDate};
use store_handler::{record, DataWriter, DatabaseHandler, FlushFailurePolicy};

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Buffered writer into SQLite ===");

    let db = DatabaseHandler::open_sqlite("buffered_writer_demo.db").await?;
    let mut writer = DataWriter::new(db, "ticks", ["ts", "symbol", "price"], 3)?
        .with_failure_policy(FlushFailurePolicy::Retain);

    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow::anyhow!("invalid start time"))?;

    for i in 0..7i64 {
        let row = record! {
            "ts" => start + Duration::milliseconds(i * 250),
            "symbol" => "BTCUSDT",
            "price" => 42000.0 + i as f64,
            "ignored" => "dropped on append",
        };
        writer.write(&row).await?;
        println!("after write {}: {} buffered", i + 1, writer.buf_size());
    }

    // one record is still waiting
    writer.flush().await?;

    let result = writer
        .sink()
        .exec_sql("SELECT COUNT(*) AS n, MAX(price) AS top FROM ticks")
        .await?;
    for record in (0..result.len()).filter_map(|i| result.record(i)) {
        println!("{:?}", record);
    }

    writer.sink().close().await;
    Ok(())
}
