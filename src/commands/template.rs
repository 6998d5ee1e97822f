use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::TemplateArgs;
use crate::methodology::Methodology;
use crate::model::{ChecklistFile, ProjectMetadata};
use crate::scoring::ChecklistState;
use crate::store::SnapshotStore;
use crate::util::write_json_pretty;

pub fn run(args: TemplateArgs) -> Result<()> {
    let methodology = Methodology::load_or_standard(args.methodology.path())?;

    let project = match args.project.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => prefill_project(&args, name)?,
        _ => ProjectMetadata::default(),
    };

    let template = build_template(&methodology, project);

    match &args.output {
        Some(path) => {
            write_json_pretty(path, &template)?;
            info!(path = %path.display(), "wrote checklist template");
        }
        None => {
            let mut output = io::BufWriter::new(io::stdout().lock());
            serde_json::to_writer_pretty(&mut output, &template)
                .context("failed to serialize checklist template")?;
            writeln!(output)?;
            output.flush()?;
        }
    }

    Ok(())
}

/// Metadata of the latest snapshot when one exists, otherwise just the name.
fn prefill_project(args: &TemplateArgs, name: &str) -> Result<ProjectMetadata> {
    let db_path = args.store.resolved_db_path();
    let Some(store) = SnapshotStore::open_existing(&db_path)? else {
        warn!(path = %db_path.display(), "snapshot database missing, template not pre-filled");
        return Ok(ProjectMetadata {
            name: name.to_string(),
            ..ProjectMetadata::default()
        });
    };

    let latest = store.latest_snapshot(name)?;
    store.close()?;

    match latest {
        Some(snapshot) => {
            info!(project = name, snapshot_id = %snapshot.id, "pre-filled template from snapshot");
            Ok(snapshot.project)
        }
        None => {
            warn!(project = name, "no snapshot saved for project, template not pre-filled");
            Ok(ProjectMetadata {
                name: name.to_string(),
                ..ProjectMetadata::default()
            })
        }
    }
}

pub fn build_template(methodology: &Methodology, project: ProjectMetadata) -> ChecklistFile {
    let state = ChecklistState::new(methodology);
    ChecklistFile {
        project,
        phases: state.to_entries(methodology),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methodology::Phase;

    #[test]
    fn template_lists_every_document_not_done() {
        let methodology = Methodology::standard();
        let template = build_template(&methodology, ProjectMetadata::default());

        assert_eq!(template.phases.len(), Phase::COUNT);
        let total: usize = template.phases.values().map(Vec::len).sum();
        assert_eq!(total, methodology.document_count());
        assert!(template.phases.values().flatten().all(|entry| !entry.done));
    }

    #[test]
    fn template_reloads_into_an_empty_state() {
        let methodology = Methodology::standard();
        let template = build_template(&methodology, ProjectMetadata::default());
        let raw = serde_json::to_string(&template).expect("serialize");
        let parsed: ChecklistFile = serde_json::from_str(&raw).expect("parse");

        let state = ChecklistState::from_entries(&methodology, &parsed.phases).expect("resolve");
        assert_eq!(state, ChecklistState::new(&methodology));
    }
}
