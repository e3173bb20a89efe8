//! Typed table access.
//!
//! Each persisted type implements [`Entity`], which names its table and
//! columns and converts to and from SQLite rows. [`Table`] then provides the
//! CRUD operations every store needs, checked against the entity type at
//! compile time. Store-specific queries live in inherent impls on
//! `Table<'_, E>` next to each entity.

use crate::models::{DiffKind, EnvelopeStatus, Priority, Progress, Visibility};
use crate::{Error, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, OptionalExtension, Params, Row, ToSql};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// A type persisted as one row of one table.
pub trait Entity: Sized {
    /// Table name.
    const TABLE: &'static str;

    /// Column names, primary key first. `values()` and `from_row()` use this order.
    const COLUMNS: &'static [&'static str];

    /// How many leading `COLUMNS` form the primary key. Single-key lookups
    /// (`get`, `require`, `exists`, `delete`) are only for entities keyed by
    /// one column; composite-keyed stores provide their own.
    const KEY_COLUMNS: usize = 1;

    /// Human name used in "not found" errors.
    const KIND: &'static str;

    /// Primary key value.
    fn key(&self) -> &str;

    /// Build the entity from a row selected with `COLUMNS`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Column values in `COLUMNS` order.
    fn values(&self) -> Result<Vec<Box<dyn ToSql>>>;
}

/// CRUD access to the table of entity `E`.
pub struct Table<'c, E> {
    pub(crate) conn: &'c Connection,
    _entity: PhantomData<E>,
}

impl<'c, E: Entity> Table<'c, E> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            _entity: PhantomData,
        }
    }

    fn select_sql(filter: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {}",
            E::COLUMNS.join(", "),
            E::TABLE,
            filter
        )
    }

    /// Insert a new row.
    pub fn insert(&self, entity: &E) -> Result<()> {
        let placeholders: Vec<String> = (1..=E::COLUMNS.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::TABLE,
            E::COLUMNS.join(", "),
            placeholders.join(", ")
        );
        let values = entity.values()?;
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        self.conn.execute(&sql, params.as_slice())?;
        Ok(())
    }

    /// Overwrite every column of an existing row.
    pub fn update(&self, entity: &E) -> Result<()> {
        let (key, rest) = E::COLUMNS.split_at(E::KEY_COLUMNS);
        let assignments: Vec<String> = rest
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + E::KEY_COLUMNS + 1))
            .collect();
        let filter: Vec<String> = key
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            E::TABLE,
            assignments.join(", "),
            filter.join(" AND ")
        );
        let values = entity.values()?;
        let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let changed = self.conn.execute(&sql, params.as_slice())?;
        if changed == 0 {
            return Err(Error::NotFound(format!(
                "{} not found: {}",
                E::KIND,
                entity.key()
            )));
        }
        Ok(())
    }

    /// Get a row by primary key.
    pub fn get(&self, key: &str) -> Result<Option<E>> {
        debug_assert_eq!(E::KEY_COLUMNS, 1, "{} has a composite key", E::TABLE);
        let sql = Self::select_sql(&format!("{} = ?1", E::COLUMNS[0]));
        Ok(self.conn.query_row(&sql, [key], E::from_row).optional()?)
    }

    /// Get a row by primary key, failing with `NotFound` if absent.
    pub fn require(&self, key: &str) -> Result<E> {
        self.get(key)?
            .ok_or_else(|| Error::NotFound(format!("{} not found: {}", E::KIND, key)))
    }

    /// Whether a row with this key exists.
    pub fn exists(&self, key: &str) -> Result<bool> {
        debug_assert_eq!(E::KEY_COLUMNS, 1, "{} has a composite key", E::TABLE);
        let sql = format!(
            "SELECT COUNT(*) > 0 FROM {} WHERE {} = ?1",
            E::TABLE,
            E::COLUMNS[0]
        );
        Ok(self.conn.query_row(&sql, [key], |row| row.get(0))?)
    }

    /// Delete a row by primary key. Returns whether a row was removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        debug_assert_eq!(E::KEY_COLUMNS, 1, "{} has a composite key", E::TABLE);
        let sql = format!("DELETE FROM {} WHERE {} = ?1", E::TABLE, E::COLUMNS[0]);
        Ok(self.conn.execute(&sql, [key])? > 0)
    }

    /// Select rows matching a SQL filter (may carry ORDER BY / LIMIT).
    pub fn find<P: Params>(&self, filter: &str, params: P) -> Result<Vec<E>> {
        let mut stmt = self.conn.prepare(&Self::select_sql(filter))?;
        let rows = stmt
            .query_map(params, E::from_row)?
            .collect::<rusqlite::Result<Vec<E>>>()?;
        Ok(rows)
    }

    /// First row matching a SQL filter.
    pub fn find_one<P: Params>(&self, filter: &str, params: P) -> Result<Option<E>> {
        let sql = Self::select_sql(&format!("{} LIMIT 1", filter));
        Ok(self.conn.query_row(&sql, params, E::from_row).optional()?)
    }

    /// Count rows matching a SQL filter.
    pub fn count<P: Params>(&self, filter: &str, params: P) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", E::TABLE, filter);
        let n: i64 = self.conn.query_row(&sql, params, |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// Serialize a value into a JSON text column.
pub(crate) fn to_json_column<T: Serialize + ?Sized>(value: &T) -> Result<Box<dyn ToSql>> {
    Ok(Box::new(serde_json::to_string(value)?))
}

/// Read a JSON text column.
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable JSON text column.
pub(crate) fn optional_json_column<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        serde_json::from_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Store a text enum by its canonical string.
macro_rules! sql_text_enum {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_str()))
                }
            }

            impl FromSql for $ty {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    value
                        .as_str()?
                        .parse()
                        .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
                }
            }
        )+
    };
}

sql_text_enum!(DiffKind, EnvelopeStatus, Priority, Progress, Visibility);
