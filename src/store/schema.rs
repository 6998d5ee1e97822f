use anyhow::{Context, Result, bail};
use rusqlite::Connection;

use crate::methodology::Phase;
use crate::util::now_utc_string;

pub(super) const DB_SCHEMA_VERSION: &str = "1.0.0";

/// Declared type family of a column, as SQLite reports it in `table_info`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    fn sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }

    /// SQLite's own affinity rules, reduced to the three families used here.
    fn of_declared(declared: &str) -> Option<Self> {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Some(Self::Integer)
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Some(Self::Text)
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Some(Self::Real)
        } else {
            None
        }
    }

    fn accepts(self, found: Option<Affinity>) -> bool {
        match (self, found) {
            // untyped / NUMERIC columns hold anything we write
            (_, None) => true,
            (Self::Real, Some(Self::Integer)) => true,
            (expected, Some(found)) => expected == found,
        }
    }
}

struct ColumnSpec {
    name: &'static str,
    affinity: Affinity,
    default_sql: &'static str,
}

const METADATA_COLUMNS: [ColumnSpec; 11] = [
    ColumnSpec {
        name: "project_name",
        affinity: Affinity::Text,
        default_sql: "''",
    },
    ColumnSpec {
        name: "manager_name",
        affinity: Affinity::Text,
        default_sql: "''",
    },
    ColumnSpec {
        name: "opportunity",
        affinity: Affinity::Text,
        default_sql: "''",
    },
    ColumnSpec {
        name: "contracted_hours",
        affinity: Affinity::Real,
        default_sql: "0",
    },
    ColumnSpec {
        name: "scope_type",
        affinity: Affinity::Text,
        default_sql: "''",
    },
    ColumnSpec {
        name: "start_date",
        affinity: Affinity::Text,
        default_sql: "''",
    },
    ColumnSpec {
        name: "end_date",
        affinity: Affinity::Text,
        default_sql: "''",
    },
    ColumnSpec {
        name: "production_date",
        affinity: Affinity::Text,
        default_sql: "''",
    },
    ColumnSpec {
        name: "verifier_name",
        affinity: Affinity::Text,
        default_sql: "''",
    },
    ColumnSpec {
        name: "notes",
        affinity: Affinity::Text,
        default_sql: "NULL",
    },
    ColumnSpec {
        name: "created_at",
        affinity: Affinity::Text,
        default_sql: "NULL",
    },
];

pub(super) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

/// Creates or upgrades the schema. Returns whether anything was created or added.
pub(super) fn ensure_schema(connection: &Connection) -> Result<bool> {
    let existed = table_exists(connection, "snapshots")?;
    let phase_columns: String = Phase::ALL
        .iter()
        .map(|phase| format!(",\n          {} REAL NOT NULL DEFAULT 0", phase.column()))
        .collect();

    connection
        .execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS snapshots (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              project_name TEXT NOT NULL,
              manager_name TEXT NOT NULL DEFAULT '',
              opportunity TEXT NOT NULL DEFAULT '',
              contracted_hours REAL NOT NULL DEFAULT 0,
              scope_type TEXT NOT NULL DEFAULT '',
              start_date TEXT NOT NULL DEFAULT '',
              end_date TEXT NOT NULL DEFAULT '',
              production_date TEXT NOT NULL DEFAULT '',
              verifier_name TEXT NOT NULL DEFAULT '',
              notes TEXT,
              created_at TEXT NOT NULL{phase_columns}
            );
            "
        ))
        .context("failed to create snapshot tables")?;

    verify_identity_column(connection)?;

    let mut migrated = !existed;
    for column in &METADATA_COLUMNS {
        migrated |= ensure_column(
            connection,
            "snapshots",
            column.name,
            column.affinity,
            column.default_sql,
        )?;
    }
    for phase in Phase::ALL {
        migrated |= ensure_column(connection, "snapshots", phase.column(), Affinity::Real, "0")?;
    }

    connection
        .execute_batch(
            "
            CREATE INDEX IF NOT EXISTS idx_snapshots_project_created
              ON snapshots(project_name, created_at);
            ",
        )
        .context("failed to create snapshot indexes")?;

    let recorded = read_schema_version(connection)?;
    if migrated || recorded.as_deref() != Some(DB_SCHEMA_VERSION) {
        connection.execute(
            "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            [DB_SCHEMA_VERSION],
        )?;
        touch_updated_at(connection)?;
        tracing::info!(
            previous_version = recorded.as_deref().unwrap_or("none"),
            version = DB_SCHEMA_VERSION,
            "snapshot schema migrated"
        );
        return Ok(true);
    }

    Ok(false)
}

/// Records a write to the database. Only migrations and saves call this.
pub(super) fn touch_updated_at(connection: &Connection) -> Result<()> {
    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            [now_utc_string()],
        )
        .context("failed to record db_updated_at")?;
    Ok(())
}

pub(super) fn read_updated_at(connection: &Connection) -> Result<Option<String>> {
    read_metadata_value(connection, "db_updated_at")
}

pub(super) fn read_schema_version(connection: &Connection) -> Result<Option<String>> {
    read_metadata_value(connection, "db_schema_version")
}

fn read_metadata_value(connection: &Connection, key: &str) -> Result<Option<String>> {
    let mut statement = connection.prepare("SELECT value FROM metadata WHERE key = ?1")?;
    let mut rows = statement.query([key])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

fn table_exists(connection: &Connection, table_name: &str) -> Result<bool> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn table_columns(connection: &Connection, table_name: &str) -> Result<Vec<(String, String, bool)>> {
    let pragma_sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to inspect schema for table {table_name}"))?;

    let mut rows = statement.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        let declared: String = row.get(2)?;
        let primary_key: i64 = row.get(5)?;
        columns.push((name, declared, primary_key > 0));
    }

    Ok(columns)
}

fn verify_identity_column(connection: &Connection) -> Result<()> {
    let columns = table_columns(connection, "snapshots")?;
    let identity = columns.iter().find(|(name, _, _)| name == "id");

    match identity {
        Some((_, declared, true)) if declared.eq_ignore_ascii_case("INTEGER") => Ok(()),
        Some((_, declared, _)) => bail!(
            "schema drift: snapshots.id is declared {declared:?} and is not an INTEGER PRIMARY KEY; refusing to migrate"
        ),
        None => bail!("schema drift: snapshots table has no id column; refusing to migrate"),
    }
}

/// Adds the column when missing; reports a type conflict instead of rewriting it.
/// Returns true when the column was added.
fn ensure_column(
    connection: &Connection,
    table_name: &str,
    column_name: &str,
    affinity: Affinity,
    default_sql: &str,
) -> Result<bool> {
    let columns = table_columns(connection, table_name)?;

    if let Some((_, declared, _)) = columns.iter().find(|(name, _, _)| name == column_name) {
        if !affinity.accepts(Affinity::of_declared(declared)) {
            bail!(
                "schema drift: {table_name}.{column_name} is declared {declared:?}, expected {}",
                affinity.sql()
            );
        }
        return Ok(false);
    }

    let alter_sql = format!(
        "ALTER TABLE {table_name} ADD COLUMN {column_name} {} DEFAULT {default_sql}",
        affinity.sql()
    );
    connection
        .execute(&alter_sql, [])
        .with_context(|| format!("failed to add column {column_name} on {table_name}"))?;
    tracing::info!(table = table_name, column = column_name, "added missing column");

    Ok(true)
}
