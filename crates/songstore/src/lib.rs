//! SQLite sink for validated table sets.
//!
//! Each songform table becomes a SQL table of the same name, created on
//! first use from the declared schema. Storing a track again replaces its
//! earlier rows, so the database always holds the latest run per track.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use songform::{validate, Schema, Table, TableSet, TableSpec, Value, ValueType, EXTENDED_TABLES};
use tracing::{debug, info};

/// One row of the `runs` bookkeeping table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRun {
    pub track_id: String,
    pub comprehensive: bool,
    pub stored_at: String,
    pub table_count: usize,
}

/// Thread-safe via Mutex; a CLI run holds one connection.
pub struct TableStore {
    connection: Mutex<Connection>,
}

fn sql_type(ty: ValueType) -> &'static str {
    match ty {
        ValueType::Int | ValueType::Bool => "INTEGER",
        ValueType::Float => "REAL",
        ValueType::Str => "TEXT",
    }
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Str(s) => SqlValue::Text(s.clone()),
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn create_statement(spec: &TableSpec) -> String {
    let columns: Vec<String> = spec
        .columns
        .iter()
        .map(|c| {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", quote(&c.name), sql_type(c.ty), null)
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(&spec.name),
        columns.join(", ")
    )
}

/// Id of the single row of the `tracks` table.
fn track_id(tables: &TableSet) -> Result<String> {
    tables
        .get("tracks")
        .and_then(|t| t.column("track_id"))
        .and_then(|values| values.first())
        .and_then(Value::as_str)
        .map(str::to_string)
        .context("table set has no tracks.track_id")
}

/// Drop every row an earlier run of `track_id` stored, in any table.
fn clear_track(tx: &Transaction<'_>, track_id: &str) -> Result<usize> {
    let tables: Vec<String> = tx
        .prepare_cached("SELECT DISTINCT table_name FROM stored_rows WHERE track_id = ?1")?
        .query_map([track_id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()
        .context("listing tables of the previous run")?;

    let mut removed = 0;
    for table in &tables {
        removed += tx
            .execute(
                &format!(
                    "DELETE FROM {} WHERE rowid IN
                     (SELECT row_id FROM stored_rows WHERE track_id = ?1 AND table_name = ?2)",
                    quote(table)
                ),
                rusqlite::params![track_id, table],
            )
            .with_context(|| format!("clearing previous rows of {table}"))?;
    }
    tx.execute("DELETE FROM stored_rows WHERE track_id = ?1", [track_id])
        .context("clearing row ownership")?;
    if removed > 0 {
        debug!(track = %track_id, removed, "replaced earlier rows");
    }
    Ok(removed)
}

fn insert_rows(tx: &Transaction<'_>, table: &Table, track_id: &str) -> Result<usize> {
    if table.columns().is_empty() {
        return Ok(0);
    }
    let names: Vec<String> = table.columns().iter().map(|c| quote(&c.name)).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table.name()),
        names.join(", "),
        placeholders.join(", ")
    );
    let mut stmt = tx
        .prepare_cached(&sql)
        .with_context(|| format!("preparing insert into {}", table.name()))?;
    let mut owned = tx.prepare_cached(
        "INSERT INTO stored_rows (track_id, table_name, row_id) VALUES (?1, ?2, ?3)",
    )?;

    for row in 0..table.n_rows() {
        let values = table.columns().iter().map(|c| sql_value(&c.values[row]));
        let row_id = stmt
            .insert(rusqlite::params_from_iter(values))
            .with_context(|| format!("inserting row {row} of {}", table.name()))?;
        owned
            .execute(rusqlite::params![track_id, table.name(), row_id])
            .with_context(|| format!("recording row {row} of {}", table.name()))?;
    }
    Ok(table.n_rows())
}

impl TableStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let connection = Connection::open(db_path).context("opening songform database")?;

        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS runs (
                    track_id      TEXT NOT NULL PRIMARY KEY,
                    comprehensive INTEGER NOT NULL,
                    stored_at     TEXT NOT NULL,
                    table_count   INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS stored_rows (
                    track_id   TEXT NOT NULL,
                    table_name TEXT NOT NULL,
                    row_id     INTEGER NOT NULL,
                    PRIMARY KEY (table_name, row_id)
                );
                CREATE INDEX IF NOT EXISTS stored_rows_track ON stored_rows (track_id);",
            )
            .context("creating bookkeeping tables")?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Validate and store a table set. Every row an earlier run of the same
    /// track id stored is removed first; rows of other tracks are never
    /// touched, whatever their ids look like. Returns the number of rows
    /// written.
    pub fn put(&self, tables: &TableSet, schema: &Schema) -> Result<usize> {
        if let Err(err) = validate(tables, schema) {
            bail!("refusing to store unvalidated tables: {err}");
        }
        let track_id = track_id(tables)?;
        let comprehensive = EXTENDED_TABLES.iter().any(|name| tables.get(name).is_some());

        let mut conn = self
            .connection
            .lock()
            .map_err(|_| anyhow::anyhow!("store mutex poisoned"))?;
        let tx = conn.transaction().context("starting store transaction")?;

        clear_track(&tx, &track_id)?;
        let mut written = 0;
        for table in tables.tables() {
            let spec = schema
                .table(table.name())
                .with_context(|| format!("table {} is not declared", table.name()))?;
            tx.execute(&create_statement(spec), [])
                .with_context(|| format!("creating table {}", table.name()))?;
            written += insert_rows(&tx, table, &track_id)?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO runs (track_id, comprehensive, stored_at, table_count)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                track_id,
                comprehensive,
                chrono::Utc::now().to_rfc3339(),
                tables.len() as i64
            ],
        )
        .context("recording run")?;
        tx.commit().context("committing stored tables")?;

        info!(track = %track_id, tables = tables.len(), rows = written, "stored table set");
        Ok(written)
    }

    /// Rows currently held in `table`; zero when it was never created.
    pub fn row_count(&self, table: &str) -> Result<usize> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| anyhow::anyhow!("store mutex poisoned"))?;

        let exists: bool = conn
            .prepare_cached("SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
            .query_row([table], |row| row.get(0))?;
        if !exists {
            return Ok(0);
        }

        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote(table)), [], |row| {
                row.get(0)
            })
            .with_context(|| format!("counting rows of {table}"))?;
        Ok(count as usize)
    }

    /// Stored runs, most recent first.
    pub fn runs(&self) -> Result<Vec<StoredRun>> {
        let conn = self
            .connection
            .lock()
            .map_err(|_| anyhow::anyhow!("store mutex poisoned"))?;

        let mut stmt = conn.prepare_cached(
            "SELECT track_id, comprehensive, stored_at, table_count FROM runs
             ORDER BY stored_at DESC, track_id",
        )?;
        let runs = stmt
            .query_map([], |row| {
                Ok(StoredRun {
                    track_id: row.get(0)?,
                    comprehensive: row.get(1)?,
                    stored_at: row.get(2)?,
                    table_count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("reading runs")?;
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use songform::{process, Column, Mode, Timeline};
    use tempfile::TempDir;

    const FIXTURE: &str = include_str!("../../songform/tests/fixtures/two_sections.json");

    fn timeline(title: &str) -> Timeline {
        let mut doc: serde_json::Value = serde_json::from_str(FIXTURE).unwrap();
        doc["title"] = title.into();
        serde_json::from_value(doc).unwrap()
    }

    fn open() -> (TempDir, TableStore) {
        let dir = TempDir::new().unwrap();
        let store = TableStore::open(&dir.path().join("nested/songform.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn fresh_store_is_empty() {
        let (_dir, store) = open();
        assert_eq!(store.row_count("notes").unwrap(), 0);
        assert!(store.runs().unwrap().is_empty());
    }

    #[test]
    fn put_writes_every_row() {
        let (_dir, store) = open();
        let tables = process(&timeline("Song"), Mode::Comprehensive).unwrap();

        let written = store.put(&tables, Schema::standard()).unwrap();
        let expected: usize = tables.tables().iter().map(Table::n_rows).sum();
        assert_eq!(written, expected);
        assert_eq!(store.row_count("notes").unwrap(), 6);
        assert_eq!(store.row_count("tracks_form").unwrap(), 1);

        let runs = store.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].comprehensive);
        assert_eq!(runs[0].table_count, 15);
    }

    #[test]
    fn storing_a_track_again_replaces_its_rows() {
        let (_dir, store) = open();
        let first = process(&timeline("Song"), Mode::Basic).unwrap();
        let other = process(&timeline("Other Song"), Mode::Basic).unwrap();

        store.put(&first, Schema::standard()).unwrap();
        store.put(&other, Schema::standard()).unwrap();
        store.put(&first, Schema::standard()).unwrap();

        assert_eq!(store.row_count("tracks").unwrap(), 2);
        assert_eq!(store.row_count("notes").unwrap(), 12);
        assert_eq!(store.runs().unwrap().len(), 2);
    }

    #[test]
    fn invalid_tables_are_refused() {
        let (_dir, store) = open();
        let tables: TableSet = process(&timeline("Song"), Mode::Basic)
            .unwrap()
            .tables()
            .iter()
            .map(|table| {
                let mut columns: Vec<Column> = table.columns().to_vec();
                if table.name() == "notes" {
                    columns[0].values.pop();
                }
                Table::with_columns(table.name(), columns)
            })
            .collect();

        let err = store.put(&tables, Schema::standard()).unwrap_err();
        assert!(err.to_string().contains("notes"), "{err}");
        assert_eq!(store.row_count("tracks").unwrap(), 0);
    }
}
