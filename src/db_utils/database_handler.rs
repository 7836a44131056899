//! Relational database handler
//!
//! Opens a connection pool from a [`DatabaseConfig`] (or the local SQLite
//! file when none is given) and moves column buffers in and out of tables.
//! SQLite, MySQL and PostgreSQL are reached through one `sqlx::AnyPool`.

use async_trait::async_trait;
use sqlx::any::{install_default_drivers, AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Executor, Row, Statement, Transaction};
use std::path::Path;
use tracing::info;

use crate::db_utils::database_config::{sqlite_url, DatabaseConfig, LOCAL_DB_PATH};
use crate::db_utils::dialect::{Dialect, SqlType};
use crate::error::{HandlerError, Result};
use crate::file_utils::csv_file::{read_csv_buffer, write_csv};
use crate::writer_utils::record::{Buffer, FieldValue};
use crate::writer_utils::sink::Sink;

/// Rows per INSERT statement
pub const CHUNK_SIZE: usize = 100;

const MAX_CONNECTIONS: u32 = 5;

pub struct DatabaseHandler {
    config: Option<DatabaseConfig>,
    dialect: Dialect,
    /// `host[:port]/database` or the SQLite file path, for log lines
    location: String,
    pool: AnyPool,
}

impl DatabaseHandler {
    /// Connect using `config`, or the local SQLite file when `config` is `None`
    pub async fn connect(config: Option<DatabaseConfig>) -> Result<Self> {
        let Some(config) = config else {
            return Self::open_sqlite(LOCAL_DB_PATH).await;
        };

        let dialect = config.dialect()?;
        let url = config.connection_url()?;
        if !dialect.has_driver() {
            return Err(HandlerError::UnsupportedEngine(format!(
                "{} (no driver available)",
                dialect
            )));
        }

        let location = if dialect.is_sqlite() {
            format!("{}.db", config.database)
        } else {
            config.location()
        };
        info!(
            "Connecting to {} database {}{}",
            dialect,
            location,
            config
                .connector
                .as_deref()
                .map(|c| format!(" (connector {})", c))
                .unwrap_or_default()
        );

        let pool = Self::open_pool(&url).await?;
        Ok(Self {
            config: Some(config),
            dialect,
            location,
            pool,
        })
    }

    /// Connect using the database config file at `path`, or locally without one
    pub async fn from_config_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let config = path.map(DatabaseConfig::from_file).transpose()?;
        Self::connect(config).await
    }

    /// Open (creating if needed) a SQLite database file
    pub async fn open_sqlite<P: AsRef<Path>>(path: P) -> Result<Self> {
        let location = path.as_ref().display().to_string();
        let pool = Self::open_pool(&sqlite_url(&location)).await?;
        Ok(Self {
            config: None,
            dialect: Dialect::Unspecified,
            location,
            pool,
        })
    }

    /// Load a CSV file into the local SQLite database.
    ///
    /// The table is named after the file stem unless `table` is given.
    pub async fn from_csv<P: AsRef<Path>>(csv_path: P, table: Option<&str>) -> Result<Self> {
        let csv_path = csv_path.as_ref();
        let table = match table {
            Some(t) => t.to_string(),
            None => csv_path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    HandlerError::Config(format!("cannot derive table name from {:?}", csv_path))
                })?
                .to_string(),
        };

        let handler = Self::open_sqlite(LOCAL_DB_PATH).await?;
        handler.read_csv(csv_path, &table).await?;
        Ok(handler)
    }

    async fn open_pool(url: &str) -> Result<AnyPool> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await?;
        Ok(pool)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn config(&self) -> Option<&DatabaseConfig> {
        self.config.as_ref()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Replace `table` with the contents of the CSV file at `path`
    pub async fn read_csv<P: AsRef<Path>>(&self, path: P, table: &str) -> Result<usize> {
        let path = path.as_ref();
        info!(
            "Loading csv {:?} into database {} at table {}",
            path, self.location, table
        );
        let buffer = read_csv_buffer(path)?;

        // MySQL commits DDL implicitly, elsewhere a failed insert restores the old table
        let mut tx = self.pool.begin().await?;
        let drop_sql = format!("DROP TABLE IF EXISTS {}", self.dialect.quote_ident(table));
        sqlx::query(&drop_sql).execute(&mut *tx).await?;
        insert_rows(&mut tx, self.dialect, &buffer, table).await?;
        tx.commit().await?;
        Ok(buffer.len())
    }

    /// Export `table` to a CSV file with a leading row-number column named `primary_key`
    pub async fn to_csv<P: AsRef<Path>>(&self, path: P, table: &str, primary_key: &str) -> Result<usize> {
        let sql = format!("SELECT * FROM {}", self.dialect.quote_ident(table));
        let buffer = self.exec_sql(&sql).await?;
        write_csv(path, &buffer, Some(primary_key))?;
        Ok(buffer.len())
    }

    /// Run a query and collect the result set column-wise
    pub async fn exec_sql(&self, sql: &str) -> Result<Buffer> {
        info!("Downloading from database {}", self.location);
        let rows: Vec<AnyRow> = sqlx::query(sql).fetch_all(&self.pool).await?;

        let mut buffer = match rows.first() {
            Some(first) => Buffer::new(first.columns().iter().map(|c| c.name().to_string())),
            // no rows to read names from, ask the prepared statement instead
            None => {
                let statement = (&self.pool).prepare(sql).await?;
                Buffer::new(statement.columns().iter().map(|c| c.name().to_string()))
            }
        };
        for row in &rows {
            let values = (0..row.len())
                .map(|i| decode_cell(row, i))
                .collect::<Result<Vec<_>>>()?;
            buffer.push_row(values)?;
        }
        Ok(buffer)
    }

    /// Append `data` to `table`, creating the table if it does not exist
    pub async fn write(&self, data: &Buffer, table: &str) -> Result<()> {
        info!("Uploading to database {}", self.location);
        self.insert_buffer(data, table).await
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_buffer(&self, data: &Buffer, table: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_rows(&mut tx, self.dialect, data, table).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Create `table` if needed and insert every row of `data`, `CHUNK_SIZE` rows per statement
async fn insert_rows(
    tx: &mut Transaction<'_, Any>,
    dialect: Dialect,
    data: &Buffer,
    table: &str,
) -> Result<()> {
    if data.columns().is_empty() {
        return Ok(());
    }

    let types = column_types(data);
    let fields: Vec<&str> = data.fields().collect();

    sqlx::query(&create_table_sql(dialect, data, table))
        .execute(&mut **tx)
        .await?;

    for chunk in data.chunks(CHUNK_SIZE) {
        let sql = insert_sql(dialect, table, &fields, &types, chunk.len());
        let mut query = sqlx::query(&sql);
        for row in chunk.rows() {
            for (value, ty) in row.into_iter().zip(&types) {
                query = bind_value(query, value, *ty, dialect);
            }
        }
        query.execute(&mut **tx).await?;
    }
    Ok(())
}

fn column_types(data: &Buffer) -> Vec<SqlType> {
    data.columns().iter().map(|c| SqlType::infer(&c.values)).collect()
}

/// `CREATE TABLE IF NOT EXISTS` statement matching the buffer's columns
pub fn create_table_sql(dialect: Dialect, data: &Buffer, table: &str) -> String {
    let columns: Vec<String> = data
        .columns()
        .iter()
        .zip(column_types(data))
        .map(|(c, ty)| format!("{} {}", dialect.quote_ident(&c.name), dialect.column_type(ty)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        dialect.quote_ident(table),
        columns.join(", ")
    )
}

/// Multi-row INSERT statement for `rows` rows
pub fn insert_sql(dialect: Dialect, table: &str, fields: &[&str], types: &[SqlType], rows: usize) -> String {
    let column_list: Vec<String> = fields.iter().map(|f| dialect.quote_ident(f)).collect();
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ",
        dialect.quote_ident(table),
        column_list.join(", ")
    );

    let bound_per_row = types.iter().filter(|t| **t != SqlType::Null).count();
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        let mut index = row * bound_per_row;
        let placeholders: Vec<String> = types
            .iter()
            .map(|ty| {
                if *ty != SqlType::Null {
                    index += 1;
                }
                dialect.placeholder(index, *ty)
            })
            .collect();
        sql.push('(');
        sql.push_str(&placeholders.join(", "));
        sql.push(')');
    }
    sql
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &FieldValue,
    column_type: SqlType,
    dialect: Dialect,
) -> Query<'q, Any, AnyArguments<'q>> {
    match (value, column_type) {
        // rendered as a NULL literal, nothing to bind
        (_, SqlType::Null) => query,
        (FieldValue::Null, SqlType::Boolean) => query.bind(Option::<bool>::None),
        (FieldValue::Null, SqlType::BigInt) => query.bind(Option::<i64>::None),
        (FieldValue::Null, SqlType::Double) => query.bind(Option::<f64>::None),
        (FieldValue::Null, _) => query.bind(Option::<String>::None),
        (FieldValue::Int(i), SqlType::Double) => query.bind(*i as f64),
        (v, SqlType::Text) if !matches!(v, FieldValue::Text(_)) => query.bind(v.to_string()),
        (FieldValue::Bool(b), _) => query.bind(*b),
        (FieldValue::Int(i), _) => query.bind(*i),
        (FieldValue::Float(f), _) => query.bind(*f),
        (FieldValue::Text(s), _) => query.bind(s.clone()),
        (FieldValue::Timestamp(ts), _) => query.bind(dialect.format_timestamp(ts)),
    }
}

/// Decode one cell, trying integer, float, text and bool in turn
fn decode_cell(row: &AnyRow, index: usize) -> Result<FieldValue> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.map_or(FieldValue::Null, FieldValue::Int));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v.map_or(FieldValue::Null, FieldValue::Float));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.map_or(FieldValue::Null, FieldValue::Text));
    }
    let v = row.try_get::<Option<bool>, _>(index)?;
    Ok(v.map_or(FieldValue::Null, FieldValue::Bool))
}

#[async_trait]
impl Sink for DatabaseHandler {
    async fn write(&mut self, buffer: &Buffer, destination: &str) -> Result<()> {
        DatabaseHandler::write(self, buffer, destination).await
    }
}
