//! Database dialects
//!
//! Lookup table from engine name to the SQL details that differ between
//! engines: timestamp precision, column types, identifier quoting and bind
//! placeholders.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use crate::error::HandlerError;
use crate::writer_utils::record::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// No configuration given, falls back to the local SQLite file
    Unspecified,
    Sqlite,
    Mysql,
    Postgresql,
    Oracle,
    Mssql,
}

/// How precisely an engine stores timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPrecision {
    Milliseconds,
    Seconds,
}

impl TimestampPrecision {
    pub fn format(&self) -> &'static str {
        match self {
            TimestampPrecision::Milliseconds => "%Y-%m-%d %H:%M:%S%.3f",
            TimestampPrecision::Seconds => "%Y-%m-%d %H:%M:%S",
        }
    }
}

/// Column type of a buffered field, inferred from its values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    BigInt,
    Double,
    Text,
    Timestamp,
    /// Every value is null; inserted as a `NULL` literal
    Null,
}

impl SqlType {
    fn of(value: &FieldValue) -> SqlType {
        match value {
            FieldValue::Null => SqlType::Null,
            FieldValue::Bool(_) => SqlType::Boolean,
            FieldValue::Int(_) => SqlType::BigInt,
            FieldValue::Float(_) => SqlType::Double,
            FieldValue::Text(_) => SqlType::Text,
            FieldValue::Timestamp(_) => SqlType::Timestamp,
        }
    }

    /// Narrowest type holding every value of a column.
    ///
    /// Integers mixed with floats widen to `Double`; any other mix is `Text`.
    pub fn infer(values: &[FieldValue]) -> SqlType {
        values.iter().map(SqlType::of).fold(SqlType::Null, SqlType::widen)
    }

    fn widen(self, other: SqlType) -> SqlType {
        match (self, other) {
            (SqlType::Null, t) | (t, SqlType::Null) => t,
            (a, b) if a == b => a,
            (SqlType::BigInt, SqlType::Double) | (SqlType::Double, SqlType::BigInt) => SqlType::Double,
            _ => SqlType::Text,
        }
    }
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Unspecified => "unspecified",
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
            Dialect::Postgresql => "postgresql",
            Dialect::Oracle => "oracle",
            Dialect::Mssql => "mssql",
        }
    }

    /// URL scheme understood by the connection layer
    pub fn scheme(&self) -> &'static str {
        match self {
            Dialect::Unspecified | Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
            Dialect::Postgresql => "postgres",
            Dialect::Oracle => "oracle",
            Dialect::Mssql => "mssql",
        }
    }

    pub fn is_sqlite(&self) -> bool {
        matches!(self, Dialect::Unspecified | Dialect::Sqlite)
    }

    /// Whether a driver for this engine is linked in
    pub fn has_driver(&self) -> bool {
        !matches!(self, Dialect::Oracle | Dialect::Mssql)
    }

    /// Oracle and MSSQL only keep whole seconds
    pub fn timestamp_precision(&self) -> TimestampPrecision {
        match self {
            Dialect::Oracle | Dialect::Mssql => TimestampPrecision::Seconds,
            _ => TimestampPrecision::Milliseconds,
        }
    }

    /// SQLite keeps timestamps as `YYYY-MM-DD HH:MM:SS.mmm` text
    pub fn timestamp_type(&self) -> &'static str {
        match self {
            Dialect::Mysql | Dialect::Postgresql => "TIMESTAMP(3)",
            Dialect::Unspecified | Dialect::Sqlite => "TEXT",
            Dialect::Oracle => "TIMESTAMP",
            Dialect::Mssql => "DATETIME",
        }
    }

    pub fn format_timestamp(&self, ts: &NaiveDateTime) -> String {
        ts.format(self.timestamp_precision().format()).to_string()
    }

    pub fn column_type(&self, sql_type: SqlType) -> &'static str {
        match sql_type {
            SqlType::Timestamp => self.timestamp_type(),
            SqlType::Text | SqlType::Null => match self {
                Dialect::Oracle => "CLOB",
                Dialect::Mssql => "NVARCHAR(MAX)",
                _ => "TEXT",
            },
            SqlType::BigInt => match self {
                Dialect::Unspecified | Dialect::Sqlite => "INTEGER",
                Dialect::Oracle => "NUMBER(19)",
                _ => "BIGINT",
            },
            SqlType::Double => match self {
                Dialect::Unspecified | Dialect::Sqlite => "REAL",
                Dialect::Mysql => "DOUBLE",
                Dialect::Postgresql | Dialect::Oracle => "DOUBLE PRECISION",
                Dialect::Mssql => "FLOAT",
            },
            SqlType::Boolean => match self {
                Dialect::Unspecified | Dialect::Sqlite => "INTEGER",
                Dialect::Oracle => "NUMBER(1)",
                Dialect::Mssql => "BIT",
                _ => "BOOLEAN",
            },
        }
    }

    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Mssql => format!("[{}]", ident.replace(']', "]]")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Bind placeholder for the 1-based parameter `index`.
    ///
    /// `Null` columns take no parameter and render as a literal.
    pub fn placeholder(&self, index: usize, sql_type: SqlType) -> String {
        match self {
            _ if sql_type == SqlType::Null => "NULL".to_string(),
            Dialect::Postgresql if sql_type == SqlType::Timestamp => {
                format!("CAST(${} AS {})", index, self.timestamp_type())
            }
            Dialect::Postgresql => format!("${}", index),
            Dialect::Oracle => format!(":{}", index),
            Dialect::Mssql => format!("@p{}", index),
            _ => "?".to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unspecified" => Ok(Dialect::Unspecified),
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::Mysql),
            "postgresql" | "postgres" => Ok(Dialect::Postgresql),
            "oracle" => Ok(Dialect::Oracle),
            "mssql" => Ok(Dialect::Mssql),
            other => Err(HandlerError::UnsupportedEngine(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_engine_names() {
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgresql);
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::Postgresql);
        assert!(matches!(
            "cassandra".parse::<Dialect>(),
            Err(HandlerError::UnsupportedEngine(_))
        ));
    }

    #[test]
    fn test_timestamp_mapping() {
        assert_eq!(Dialect::Mysql.timestamp_type(), "TIMESTAMP(3)");
        assert_eq!(Dialect::Postgresql.timestamp_type(), "TIMESTAMP(3)");
        assert_eq!(Dialect::Sqlite.timestamp_type(), "TEXT");
        assert_eq!(Dialect::Unspecified.timestamp_type(), "TEXT");
        assert_eq!(Dialect::Oracle.timestamp_type(), "TIMESTAMP");
        assert_eq!(Dialect::Mssql.timestamp_type(), "DATETIME");
    }

    #[test]
    fn test_timestamp_precision() {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_milli_opt(7, 8, 9, 123)
            .unwrap();
        assert_eq!(Dialect::Sqlite.format_timestamp(&ts), "2024-05-06 07:08:09.123");
        assert_eq!(Dialect::Mysql.format_timestamp(&ts), "2024-05-06 07:08:09.123");
        assert_eq!(Dialect::Oracle.format_timestamp(&ts), "2024-05-06 07:08:09");
        assert_eq!(Dialect::Mssql.format_timestamp(&ts), "2024-05-06 07:08:09");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Sqlite.placeholder(3, SqlType::BigInt), "?");
        assert_eq!(Dialect::Mysql.placeholder(1, SqlType::Timestamp), "?");
        assert_eq!(Dialect::Postgresql.placeholder(2, SqlType::Text), "$2");
        assert_eq!(
            Dialect::Postgresql.placeholder(4, SqlType::Timestamp),
            "CAST($4 AS TIMESTAMP(3))"
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(Dialect::Mysql.quote_ident("price"), "`price`");
        assert_eq!(Dialect::Sqlite.quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Dialect::Mssql.quote_ident("a]b"), "[a]]b]");
    }

    #[test]
    fn test_infer_sql_type() {
        assert_eq!(
            SqlType::infer(&[FieldValue::Null, FieldValue::Float(1.0)]),
            SqlType::Double
        );
        assert_eq!(SqlType::infer(&[FieldValue::Null]), SqlType::Null);
        assert_eq!(SqlType::infer(&[]), SqlType::Null);
    }

    #[test]
    fn test_int_then_float_widens_to_double() {
        let values = [FieldValue::Int(42000), FieldValue::Null, FieldValue::Float(42000.5)];
        assert_eq!(SqlType::infer(&values), SqlType::Double);
        assert_eq!(Dialect::Mysql.column_type(SqlType::infer(&values)), "DOUBLE");

        let mixed = [FieldValue::Int(1), FieldValue::Text("a".to_string())];
        assert_eq!(SqlType::infer(&mixed), SqlType::Text);
        assert_eq!(Dialect::Postgresql.placeholder(5, SqlType::Null), "NULL");
    }
}
