use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::warn;

use crate::cli::{ProjectsArgs, ShowArgs, StoreArgs};
use crate::methodology::Phase;
use crate::model::ProjectSnapshot;
use crate::store::SnapshotStore;

/// Store for the query commands. A missing database file reads as empty.
fn open_for_query(store_args: &StoreArgs) -> Result<Option<SnapshotStore>> {
    let db_path = store_args.resolved_db_path();
    let store = SnapshotStore::open_existing(&db_path)?;
    if store.is_none() {
        warn!(path = %db_path.display(), "snapshot database missing, nothing saved yet");
    }
    Ok(store)
}

pub fn run_projects(args: ProjectsArgs) -> Result<()> {
    let names = match open_for_query(&args.store)? {
        Some(store) => {
            let names = store.list_distinct_project_names()?;
            store.close()?;
            names
        }
        None => Vec::new(),
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &names)
            .context("failed to serialize project list")?;
        writeln!(output)?;
    } else {
        for name in &names {
            writeln!(output, "{name}")?;
        }
    }
    output.flush()?;
    Ok(())
}

pub fn run_show(args: ShowArgs) -> Result<()> {
    let latest = match open_for_query(&args.store)? {
        Some(store) => {
            let latest = store.latest_snapshot(&args.project)?;
            store.close()?;
            latest
        }
        None => None,
    };

    let Some(snapshot) = latest else {
        warn!(project = %args.project, "no snapshot saved for project");
        return Ok(());
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &snapshot)
            .context("failed to serialize snapshot")?;
        writeln!(output)?;
    } else {
        write_snapshot(&mut output, &snapshot)?;
    }
    output.flush()?;
    Ok(())
}

pub fn run_history(args: ShowArgs) -> Result<()> {
    let history = match open_for_query(&args.store)? {
        Some(store) => {
            let history = store.history(&args.project)?;
            store.close()?;
            history
        }
        None => Vec::new(),
    };

    if history.is_empty() {
        warn!(project = %args.project, "no snapshot saved for project");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &history)
            .context("failed to serialize snapshot history")?;
        writeln!(output)?;
    } else {
        for snapshot in &history {
            let phases: Vec<String> = Phase::ALL
                .iter()
                .map(|phase| {
                    format!(
                        "{}={:.0}",
                        phase.short_label(),
                        snapshot.percentages.get_or_zero(*phase)
                    )
                })
                .collect();
            writeln!(
                output,
                "#{}\t{}\tglobal={:.1}%\t{}",
                snapshot.id,
                snapshot.created_at.with_timezone(&Local).format("%d/%m/%Y %H:%M"),
                snapshot.percentages.mean(),
                phases.join(" ")
            )?;
        }
    }
    output.flush()?;
    Ok(())
}

fn write_snapshot(output: &mut impl Write, snapshot: &ProjectSnapshot) -> Result<()> {
    let project = &snapshot.project;
    writeln!(
        output,
        "Snapshot #{} saved {}",
        snapshot.id,
        snapshot.created_at.with_timezone(&Local).format("%d/%m/%Y %H:%M")
    )?;
    writeln!(output, "Project: {}", project.name)?;
    writeln!(output, "Manager: {}", project.manager)?;
    writeln!(output, "Opportunity: {}", project.opportunity)?;
    writeln!(output, "Contracted hours: {:.1}", project.contracted_hours)?;
    writeln!(output, "Scope: {}", project.scope_type)?;
    writeln!(
        output,
        "Dates: start {} | end {} | production {}",
        project.start_date, project.end_date, project.production_date
    )?;
    writeln!(output, "Verifier: {}", project.verifier)?;
    if let Some(notes) = project.notes_text() {
        writeln!(output, "Notes: {notes}")?;
    }
    for phase in Phase::ALL {
        writeln!(
            output,
            "{:<24}\t{:>5.1}%",
            phase.label(),
            snapshot.percentages.get_or_zero(phase)
        )?;
    }
    writeln!(output, "Global average: {:.1}%", snapshot.percentages.mean())?;
    Ok(())
}
