use super::*;

fn metadata(name: &str) -> ProjectMetadata {
    ProjectMetadata {
        name: name.to_string(),
        manager: "Ana Souza".to_string(),
        opportunity: "CRM-2291".to_string(),
        contracted_hours: 640.0,
        scope_type: ScopeType::Migracao,
        start_date: "03/02/2025".to_string(),
        end_date: "30/09/2025".to_string(),
        production_date: "01/08/2025".to_string(),
        verifier: "Carlos Lima".to_string(),
        notes: Some("Cliente solicitou replanejamento".to_string()),
    }
}

fn percentages(values: [f64; Phase::COUNT]) -> PhasePercentages {
    Phase::ALL.into_iter().zip(values).collect()
}

#[test]
fn save_then_latest_round_trips_percentages_and_metadata() {
    let mut store = SnapshotStore::open_in_memory().expect("store");
    let input = percentages([100.0, 50.0, 0.0, 75.0, 25.0, 100.0, 100.0 / 3.0]);

    let id = store.save(&metadata("Hospital X"), &input).expect("save");
    let snapshot = store
        .latest_snapshot("Hospital X")
        .expect("query")
        .expect("snapshot present");

    assert_eq!(snapshot.id, id);
    assert_eq!(snapshot.percentages, input);
    assert_eq!(snapshot.project, metadata("Hospital X"));
}

#[test]
fn latest_snapshot_prefers_most_recent_row() {
    let mut store = SnapshotStore::open_in_memory().expect("store");
    store
        .save(&metadata("Hospital X"), &percentages([0.0; Phase::COUNT]))
        .expect("first save");
    let second = store
        .save(&metadata("Hospital X"), &percentages([50.0; Phase::COUNT]))
        .expect("second save");

    let latest = store
        .latest_snapshot("Hospital X")
        .expect("query")
        .expect("snapshot present");
    assert_eq!(latest.id, second);
    assert_eq!(latest.percentages.get(Phase::GoLive), Some(50.0));

    let history = store.history("Hospital X").expect("history");
    assert_eq!(history.len(), 2);
    assert!(history[0].created_at >= history[1].created_at);
    assert_eq!(history[0].id, second);
}

#[test]
fn distinct_project_names_have_no_duplicates() {
    let mut store = SnapshotStore::open_in_memory().expect("store");
    let values = percentages([10.0; Phase::COUNT]);
    store.save(&metadata("Hospital X"), &values).expect("save");
    store.save(&metadata("Hospital X"), &values).expect("save");
    store.save(&metadata("Clinic Y"), &values).expect("save");

    let names = store.list_distinct_project_names().expect("names");
    assert_eq!(names, vec!["Clinic Y".to_string(), "Hospital X".to_string()]);
    assert_eq!(store.snapshot_count().expect("count"), 3);
}

#[test]
fn latest_snapshot_for_unknown_project_is_none() {
    let store = SnapshotStore::open_in_memory().expect("store");
    assert!(store.latest_snapshot("Nowhere").expect("query").is_none());
}

#[test]
fn save_rejects_blank_name_without_writing() {
    let mut store = SnapshotStore::open_in_memory().expect("store");
    let err = store
        .save(&metadata("  "), &percentages([0.0; Phase::COUNT]))
        .unwrap_err();
    assert!(err.to_string().contains("project name"));
    assert_eq!(store.snapshot_count().expect("count"), 0);
}

#[test]
fn save_rejects_incomplete_percentages_without_writing() {
    let mut store = SnapshotStore::open_in_memory().expect("store");
    let partial: PhasePercentages = [(Phase::Planning, 10.0)].into_iter().collect();
    assert!(store.save(&metadata("Hospital X"), &partial).is_err());
    assert_eq!(store.snapshot_count().expect("count"), 0);
}

#[test]
fn blank_notes_are_stored_as_null() {
    let mut store = SnapshotStore::open_in_memory().expect("store");
    let mut project = metadata("Clinic Y");
    project.notes = Some("   ".to_string());
    store
        .save(&project, &percentages([0.0; Phase::COUNT]))
        .expect("save");

    let snapshot = store
        .latest_snapshot("Clinic Y")
        .expect("query")
        .expect("snapshot present");
    assert!(snapshot.project.notes.is_none());
}

#[test]
fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("checklist.sqlite");

    let mut store = SnapshotStore::open(&path).expect("open");
    store
        .save(&metadata("Hospital X"), &percentages([20.0; Phase::COUNT]))
        .expect("save");
    store.close().expect("close");

    let store = SnapshotStore::open(&path).expect("reopen");
    assert_eq!(store.list_distinct_project_names().expect("names"), ["Hospital X"]);
    assert_eq!(store.schema_version().expect("version").as_deref(), Some("1.0.0"));
}

#[test]
fn legacy_table_gains_missing_columns_without_losing_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("legacy.sqlite");
    {
        let connection = Connection::open(&path).expect("legacy open");
        connection
            .execute_batch(
                "
                CREATE TABLE snapshots (
                  id INTEGER PRIMARY KEY,
                  project_name TEXT,
                  created_at TEXT,
                  go_live_percent FLOAT
                );
                INSERT INTO snapshots(project_name, created_at, go_live_percent)
                VALUES('Hospital X', '2024-05-01 10:00:00+00:00', 80.0);
                ",
            )
            .expect("legacy schema");
    }

    let store = SnapshotStore::open_existing(&path)
        .expect("migrating open")
        .expect("file exists");
    assert!(store.updated_at().expect("updated_at").is_some());
    let snapshot = store
        .latest_snapshot("Hospital X")
        .expect("query")
        .expect("legacy row kept");
    assert_eq!(snapshot.percentages.get(Phase::GoLive), Some(80.0));
    assert_eq!(snapshot.percentages.get(Phase::Planning), Some(0.0));
    assert_eq!(snapshot.project.manager, "");
    assert!(snapshot.project.notes.is_none());
}

#[test]
fn incompatible_phase_column_is_reported_not_rebuilt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("drift.sqlite");
    {
        let connection = Connection::open(&path).expect("drift open");
        connection
            .execute_batch(
                "
                CREATE TABLE snapshots (
                  id INTEGER PRIMARY KEY,
                  project_name TEXT,
                  created_at TEXT,
                  go_live_percent TEXT
                );
                INSERT INTO snapshots(project_name, created_at, go_live_percent)
                VALUES('Hospital X', '2024-05-01 10:00:00+00:00', 'done');
                ",
            )
            .expect("drift schema");
    }

    let err = match SnapshotStore::open(&path) {
        Ok(_) => panic!("drifted schema should be rejected"),
        Err(err) => err,
    };
    assert!(format!("{err:#}").contains("schema drift"));

    let connection = Connection::open(&path).expect("reopen raw");
    let rows: i64 = connection
        .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))
        .expect("count");
    assert_eq!(rows, 1);
}

#[test]
fn open_existing_does_not_create_a_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent").join("checklist.sqlite");

    assert!(SnapshotStore::open_existing(&path).expect("open").is_none());
    assert!(!path.exists());
    assert!(!dir.path().join("absent").exists());
}

#[test]
fn reads_leave_updated_at_alone_and_saves_refresh_it() {
    const STALE: &str = "2000-01-01T00:00:00Z";
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("checklist.sqlite");

    let mut store = SnapshotStore::open(&path).expect("open");
    store
        .save(&metadata("Hospital X"), &percentages([40.0; Phase::COUNT]))
        .expect("save");
    store.close().expect("close");
    {
        let connection = Connection::open(&path).expect("raw open");
        connection
            .execute("UPDATE metadata SET value = ?1 WHERE key = 'db_updated_at'", [STALE])
            .expect("backdate");
    }

    let store = SnapshotStore::open_existing(&path)
        .expect("open existing")
        .expect("file exists");
    assert_eq!(store.list_distinct_project_names().expect("names"), ["Hospital X"]);
    assert!(store.latest_snapshot("Hospital X").expect("latest").is_some());
    assert_eq!(store.history("Hospital X").expect("history").len(), 1);
    assert_eq!(store.updated_at().expect("updated_at").as_deref(), Some(STALE));
    store.close().expect("close");

    let mut store = SnapshotStore::open(&path).expect("reopen for write");
    assert_eq!(store.updated_at().expect("updated_at").as_deref(), Some(STALE));
    store
        .save(&metadata("Hospital X"), &percentages([60.0; Phase::COUNT]))
        .expect("second save");
    let refreshed = store.updated_at().expect("updated_at").expect("present");
    assert_ne!(refreshed, STALE);
}
