use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::MethodologyArgs;
use crate::methodology::Methodology;
use crate::model::{ChecklistFile, ProjectMetadata};
use crate::scoring::{ChecklistState, PhasePending, ScoreCard, pending_documents, score};
use crate::util::read_json;

/// A checklist file resolved against the methodology and scored.
#[derive(Debug)]
pub struct LoadedChecklist {
    pub project: ProjectMetadata,
    pub card: ScoreCard,
    pub pending: Vec<PhasePending>,
}

pub fn load(path: &Path, methodology_args: &MethodologyArgs) -> Result<LoadedChecklist> {
    let methodology = Methodology::load_or_standard(methodology_args.path())?;
    let file: ChecklistFile = read_json(path)?;

    let state = ChecklistState::from_entries(&methodology, &file.phases)
        .with_context(|| format!("invalid checklist {}", path.display()))?;
    let card = score(&methodology, &state);
    let pending = pending_documents(&methodology, &state);

    info!(
        path = %path.display(),
        project = %file.project.name,
        documents = methodology.document_count(),
        global_percent = %format!("{:.1}", card.global_percent),
        "loaded checklist"
    );

    Ok(LoadedChecklist {
        project: file.project,
        card,
        pending,
    })
}

/// Hard validation for commands that persist or publish the project.
pub fn require_valid_project(project: &ProjectMetadata) -> Result<()> {
    for warning in project.validate()? {
        warn!(project = %project.name, "{warning}");
    }
    Ok(())
}
