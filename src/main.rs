//! Store Handler
//!
//! Command line front end for loading config files, moving CSV data in and
//! out of databases, streaming JSON records through the buffered writer and
//! sending notification emails.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tracing::{info, warn};

use store_handler::file_utils::csv_file::write_csv;
use store_handler::{
    init_logging, local_dump, local_load, Buffer, CsvFileSink, DataWriter, DatabaseHandler,
    EmailHandler, Sink, DEFAULT_CAPACITY, write_json_lines,
};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "store-handler")]
#[command(author, version, about = "Buffered record storage for databases and files", long_about = None)]
struct Args {
    /// Append log output to this file as well as the console
    #[arg(long, value_name = "FILE", default_value = "handler.log", global = true)]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a JSON, YAML or HDF5 file as JSON
    Load {
        path: PathBuf,
    },
    /// Convert a config file between formats (by extension)
    Convert {
        input: PathBuf,
        output: PathBuf,
    },
    /// Replace a table with the contents of a CSV file
    ImportCsv {
        csv: PathBuf,
        /// Table name (defaults to the file stem)
        #[arg(short, long)]
        table: Option<String>,
        /// Database config file (defaults to the local SQLite database)
        #[arg(short, long, value_name = "FILE")]
        db_config: Option<PathBuf>,
    },
    /// Export a table to CSV
    ExportCsv {
        #[arg(short, long)]
        table: String,
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Header of the leading row-number column
        #[arg(long, default_value = "id")]
        primary_key: String,
        #[arg(short, long, value_name = "FILE")]
        db_config: Option<PathBuf>,
    },
    /// Run a SQL query and print the result as CSV
    Query {
        sql: String,
        /// Write the result to a CSV file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        #[arg(short, long, value_name = "FILE")]
        db_config: Option<PathBuf>,
    },
    /// Read JSON records from stdin (one per line) and store them in batches
    Record {
        #[arg(short, long)]
        table: String,
        /// Fields to keep, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
        /// Records per flush
        #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,
        #[arg(short, long, value_name = "FILE", conflicts_with = "csv_dir")]
        db_config: Option<PathBuf>,
        /// Append to `<DIR>/<table>.csv` instead of a database
        #[arg(long, value_name = "DIR")]
        csv_dir: Option<PathBuf>,
    },
    /// Send a plain-text email
    SendEmail {
        #[arg(long)]
        account: String,
        #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        text: String,
        /// SMTP host for providers without a built-in entry
        #[arg(long)]
        smtp_server: Option<String>,
        #[arg(long)]
        smtp_port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(Some(&args.log_file)).context("Failed to initialize logging")?;

    match args.command {
        Command::Load { path } => {
            let value = local_load(&path).context(format!("Failed to load {:?}", path))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Convert { input, output } => {
            let value = local_load(&input).context(format!("Failed to load {:?}", input))?;
            local_dump(&output, &value).context(format!("Failed to write {:?}", output))?;
            info!("Converted {:?} to {:?}", input, output);
        }
        Command::ImportCsv { csv, table, db_config } => {
            let table = match table {
                Some(t) => t,
                None => file_stem(&csv)?,
            };
            let db = connect(db_config.as_deref()).await?;
            let rows = db
                .read_csv(&csv, &table)
                .await
                .context(format!("Failed to import {:?}", csv))?;
            info!("Imported {} rows into {}", rows, table);
            db.close().await;
        }
        Command::ExportCsv { table, output, primary_key, db_config } => {
            let db = connect(db_config.as_deref()).await?;
            let rows = db
                .to_csv(&output, &table, &primary_key)
                .await
                .context(format!("Failed to export table {}", table))?;
            info!("Exported {} rows to {:?}", rows, output);
            db.close().await;
        }
        Command::Query { sql, output, db_config } => {
            let db = connect(db_config.as_deref()).await?;
            let result = db.exec_sql(&sql).await.context("Query failed")?;
            match output {
                Some(path) => write_csv(&path, &result, None)?,
                None => print_csv(&result)?,
            }
            db.close().await;
        }
        Command::Record { table, fields, capacity, db_config, csv_dir } => match csv_dir {
            Some(dir) => {
                let mut writer = DataWriter::new(CsvFileSink::new(dir), table, fields, capacity)?;
                record_stdin(&mut writer).await?;
            }
            None => {
                let db = connect(db_config.as_deref()).await?;
                let mut writer = DataWriter::new(db, table, fields, capacity)?;
                record_stdin(&mut writer).await?;
                writer.sink().close().await;
            }
        },
        Command::SendEmail { account, password, to, subject, text, smtp_server, smtp_port } => {
            let handler = match (smtp_server, smtp_port) {
                (Some(server), Some(port)) => EmailHandler::with_server(&account, &password, &server, port),
                (None, _) => EmailHandler::new(&account, &password)?,
                (Some(_), None) => bail!("--smtp-server requires --smtp-port"),
            };
            handler.send(&to, &subject, &text).await?;
        }
    }

    Ok(())
}

async fn connect(db_config: Option<&Path>) -> Result<DatabaseHandler> {
    DatabaseHandler::from_config_path(db_config)
        .await
        .context("Failed to connect to database")
}

fn file_stem(path: &Path) -> Result<String> {
    match path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => Ok(stem.to_string()),
        None => bail!("Cannot derive a table name from {:?}", path),
    }
}

fn print_csv(buffer: &Buffer) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(buffer.fields())?;
    for row in buffer.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Store JSON lines from stdin through `writer`
async fn record_stdin<S: Sink>(writer: &mut DataWriter<S>) -> Result<()> {
    let stats = write_json_lines(BufReader::new(tokio::io::stdin()), writer)
        .await
        .context(format!("Failed to store records in {}", writer.table()))?;
    if stats.skipped > 0 {
        warn!("{} input lines were skipped", stats.skipped);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_export_csv_index_defaults_to_id() {
        let args = Args::try_parse_from(["store-handler", "export-csv", "--table", "t", "--output", "t.csv"])
            .unwrap();
        match args.command {
            Command::ExportCsv { primary_key, .. } => assert_eq!(primary_key, "id"),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
