use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, Row, ToSql, params, params_from_iter};
use tracing::{info, warn};

use crate::methodology::Phase;
use crate::model::{PhasePercentages, ProjectMetadata, ProjectSnapshot, ScopeType, SnapshotId};
use crate::util::ensure_directory;

mod schema;
#[cfg(test)]
mod tests;

use schema::{
    configure_connection, ensure_schema, read_schema_version, read_updated_at, touch_updated_at,
};

// Older files may hold NULLs in columns that predate the NOT NULL defaults.
const SNAPSHOT_METADATA_SELECT: &str = "
    id,
    COALESCE(project_name, ''),
    COALESCE(manager_name, ''),
    COALESCE(opportunity, ''),
    COALESCE(contracted_hours, 0),
    COALESCE(scope_type, ''),
    COALESCE(start_date, ''),
    COALESCE(end_date, ''),
    COALESCE(production_date, ''),
    COALESCE(verifier_name, ''),
    notes,
    COALESCE(created_at, '1970-01-01 00:00:00+00:00')";

/// Count of leading columns in [`SNAPSHOT_METADATA_SELECT`]; phase columns follow.
const PHASE_COLUMN_OFFSET: usize = 12;

/// File-backed store of immutable project snapshots.
///
/// Opened explicitly and handed to the commands that need it; closing it
/// flushes the WAL and releases the file.
pub struct SnapshotStore {
    connection: Connection,
    path: Option<PathBuf>,
}

impl SnapshotStore {
    /// Opens the file for writing, creating it and its directory when missing.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }

        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)
            .with_context(|| format!("failed to prepare snapshot schema in {}", path.display()))?;

        info!(path = %path.display(), "opened snapshot store");
        Ok(Self {
            connection,
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a file that must already exist. `None` when there is no file yet.
    ///
    /// Used by the read-only commands so that listing or inspecting never
    /// creates a database. Pending migrations still run.
    pub fn open_existing(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }

        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open {}", path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)
            .with_context(|| format!("failed to prepare snapshot schema in {}", path.display()))?;

        info!(path = %path.display(), "opened snapshot store");
        Ok(Some(Self {
            connection,
            path: Some(path.to_path_buf()),
        }))
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory snapshot store")?;
        ensure_schema(&connection)?;
        Ok(Self {
            connection,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<Option<String>> {
        read_schema_version(&self.connection)
    }

    /// Time of the last save or migration.
    pub fn updated_at(&self) -> Result<Option<String>> {
        read_updated_at(&self.connection)
    }

    /// Appends one snapshot row. The row is written in a single transaction.
    pub fn save(
        &mut self,
        metadata: &ProjectMetadata,
        percentages: &PhasePercentages,
    ) -> Result<SnapshotId> {
        let project_name = metadata.name.trim();
        if project_name.is_empty() {
            bail!("project name is required to save a snapshot");
        }
        percentages.ensure_complete()?;

        let created_at = Utc::now();
        let mut values: Vec<Box<dyn ToSql>> = vec![
            Box::new(project_name.to_string()),
            Box::new(metadata.manager.clone()),
            Box::new(metadata.opportunity.clone()),
            Box::new(metadata.contracted_hours),
            Box::new(metadata.scope_type.as_str()),
            Box::new(metadata.start_date.clone()),
            Box::new(metadata.end_date.clone()),
            Box::new(metadata.production_date.clone()),
            Box::new(metadata.verifier.clone()),
            Box::new(metadata.notes_text().map(ToOwned::to_owned)),
            Box::new(created_at),
        ];
        for phase in Phase::ALL {
            values.push(Box::new(percentages.get_or_zero(phase)));
        }

        let phase_columns: Vec<&str> = Phase::ALL.iter().map(|phase| phase.column()).collect();
        let placeholders: Vec<String> =
            (1..=values.len()).map(|index| format!("?{index}")).collect();
        let insert_sql = format!(
            "
            INSERT INTO snapshots(
              project_name, manager_name, opportunity, contracted_hours, scope_type,
              start_date, end_date, production_date, verifier_name, notes, created_at,
              {}
            )
            VALUES({})
            ",
            phase_columns.join(", "),
            placeholders.join(", ")
        );

        let tx = self.connection.transaction()?;
        {
            let mut statement = tx.prepare(&insert_sql)?;
            statement
                .execute(params_from_iter(values.iter()))
                .with_context(|| format!("failed to insert snapshot for {project_name}"))?;
        }
        let id = SnapshotId(tx.last_insert_rowid());
        touch_updated_at(&tx)?;
        tx.commit().context("failed to commit snapshot")?;

        info!(
            snapshot_id = %id,
            project = project_name,
            created_at = %created_at,
            "saved snapshot"
        );
        Ok(id)
    }

    pub fn list_distinct_project_names(&self) -> Result<Vec<String>> {
        let mut statement = self.connection.prepare(
            "
            SELECT DISTINCT project_name
            FROM snapshots
            WHERE project_name <> ''
            ORDER BY project_name ASC
            ",
        )?;

        let mut rows = statement.query([])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }

        Ok(names)
    }

    pub fn latest_snapshot(&self, project_name: &str) -> Result<Option<ProjectSnapshot>> {
        Ok(self.query_snapshots(project_name, Some(1))?.into_iter().next())
    }

    /// Every snapshot of a project, newest first.
    pub fn history(&self, project_name: &str) -> Result<Vec<ProjectSnapshot>> {
        self.query_snapshots(project_name, None)
    }

    pub fn snapshot_count(&self) -> Result<i64> {
        let count = self
            .connection
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn close(self) -> Result<()> {
        let path = self.path.clone();
        self.connection
            .close()
            .map_err(|(_, err)| err)
            .context("failed to close snapshot store")?;
        if let Some(path) = path {
            info!(path = %path.display(), "closed snapshot store");
        }
        Ok(())
    }

    fn query_snapshots(
        &self,
        project_name: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ProjectSnapshot>> {
        let phase_columns: Vec<&str> = Phase::ALL.iter().map(|phase| phase.column()).collect();
        let limit_sql = limit.map(|n| format!("LIMIT {n}")).unwrap_or_default();
        let select_sql = format!(
            "
            SELECT {SNAPSHOT_METADATA_SELECT}, {}
            FROM snapshots
            WHERE project_name = ?1
            ORDER BY created_at DESC, id DESC
            {limit_sql}
            ",
            phase_columns.join(", ")
        );

        let mut statement = self.connection.prepare(&select_sql)?;
        let mut rows = statement.query(params![project_name.trim()])?;
        let mut snapshots = Vec::new();
        while let Some(row) = rows.next()? {
            snapshots.push(snapshot_from_row(row)?);
        }

        Ok(snapshots)
    }
}

fn snapshot_from_row(row: &Row<'_>) -> Result<ProjectSnapshot> {
    let id = SnapshotId(row.get(0)?);
    let scope_raw: String = row.get(5)?;
    let scope_type = ScopeType::parse(&scope_raw).unwrap_or_else(|| {
        warn!(snapshot_id = %id, scope_type = %scope_raw, "unknown scope type, using default");
        ScopeType::default()
    });
    let created_at: DateTime<Utc> = row.get(11)?;

    let project = ProjectMetadata {
        name: row.get(1)?,
        manager: row.get(2)?,
        opportunity: row.get(3)?,
        contracted_hours: row.get(4)?,
        scope_type,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        production_date: row.get(8)?,
        verifier: row.get(9)?,
        notes: row.get(10)?,
    };

    let mut percentages = PhasePercentages::new();
    for (offset, phase) in Phase::ALL.into_iter().enumerate() {
        let percent: Option<f64> = row.get(PHASE_COLUMN_OFFSET + offset)?;
        percentages.insert(phase, percent.unwrap_or(0.0));
    }

    Ok(ProjectSnapshot {
        id,
        created_at,
        project,
        percentages,
    })
}
