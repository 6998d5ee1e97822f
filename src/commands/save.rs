use anyhow::Result;
use tracing::info;

use super::checklist;
use crate::cli::SaveArgs;
use crate::store::SnapshotStore;

pub fn run(args: SaveArgs) -> Result<()> {
    let loaded = checklist::load(&args.checklist, &args.methodology)?;
    checklist::require_valid_project(&loaded.project)?;

    let mut store = SnapshotStore::open(&args.store.resolved_db_path())?;
    let id = store.save(&loaded.project, &loaded.card.percentages())?;
    let db_path = store.path().map(|path| path.display().to_string()).unwrap_or_default();
    store.close()?;

    info!(
        snapshot_id = %id,
        path = %db_path,
        project = %loaded.project.name.trim(),
        global_percent = %format!("{:.1}", loaded.card.global_percent),
        "snapshot saved"
    );
    println!("{id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{MethodologyArgs, StoreArgs};
    use crate::methodology::Methodology;
    use crate::model::{ChecklistFile, ProjectMetadata};
    use crate::scoring::ChecklistState;
    use crate::util::write_json_pretty;

    fn save_args(data_dir: &std::path::Path, checklist: std::path::PathBuf) -> SaveArgs {
        SaveArgs {
            store: StoreArgs {
                data_dir: data_dir.to_path_buf(),
                db_path: None,
            },
            methodology: MethodologyArgs { methodology: None },
            checklist,
        }
    }

    fn write_checklist(path: &std::path::Path, name: &str) {
        let methodology = Methodology::standard();
        let file = ChecklistFile {
            project: ProjectMetadata {
                name: name.to_string(),
                ..ProjectMetadata::default()
            },
            phases: ChecklistState::new(&methodology).to_entries(&methodology),
        };
        write_json_pretty(path, &file).expect("write checklist");
    }

    #[test]
    fn blank_name_fails_before_the_database_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let checklist = dir.path().join("form.json");
        write_checklist(&checklist, "  ");
        let data_dir = dir.path().join("data");

        let args = save_args(&data_dir, checklist);
        let db_path = args.store.resolved_db_path();
        assert!(run(args).is_err());
        assert!(!db_path.exists());
        assert!(!data_dir.exists());
    }

    #[test]
    fn valid_checklist_is_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let checklist = dir.path().join("form.json");
        write_checklist(&checklist, "Hospital X");
        let data_dir = dir.path().join("data");

        let args = save_args(&data_dir, checklist);
        let db_path = args.store.resolved_db_path();
        run(args).expect("save");

        let store = SnapshotStore::open_existing(&db_path)
            .expect("open")
            .expect("database created");
        assert_eq!(store.snapshot_count().expect("count"), 1);
        assert_eq!(store.list_distinct_project_names().expect("names"), ["Hospital X"]);
    }
}
