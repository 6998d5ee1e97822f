use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store::SnapshotStore;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();
    let reports_dir = args.store.data_dir.join("reports");

    info!(data_dir = %args.store.data_dir.display(), "status requested");

    match SnapshotStore::open_existing(&db_path)? {
        Some(store) => {
            let schema_version = store.schema_version()?.unwrap_or_default();
            let updated_at = store.updated_at()?.unwrap_or_default();
            let snapshots = store.snapshot_count()?;
            let projects = store.list_distinct_project_names()?.len();
            store.close()?;

            info!(
                path = %db_path.display(),
                schema_version = %schema_version,
                updated_at = %updated_at,
                snapshots,
                projects,
                "database status"
            );
        }
        None => warn!(path = %db_path.display(), "database file missing"),
    }

    if reports_dir.is_dir() {
        let mut report_count = 0usize;
        for entry in fs::read_dir(&reports_dir)
            .with_context(|| format!("failed to read {}", reports_dir.display()))?
        {
            let entry = entry?;
            let is_pdf = entry
                .path()
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
            if is_pdf {
                report_count += 1;
            }
        }
        info!(path = %reports_dir.display(), reports = report_count, "report directory status");
    } else {
        warn!(path = %reports_dir.display(), "report directory missing");
    }

    Ok(())
}
