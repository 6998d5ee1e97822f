use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use super::checklist::{self, LoadedChecklist};
use crate::cli::ScoreArgs;
use crate::scoring::{PhasePending, PhaseScore};

#[derive(Serialize)]
struct ScoreResponse<'a> {
    project: &'a str,
    global_percent: f64,
    phases: &'a [PhaseScore],
    pending: &'a [PhasePending],
}

pub fn run(args: ScoreArgs) -> Result<()> {
    let loaded = checklist::load(&args.checklist, &args.methodology)?;

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        let response = ScoreResponse {
            project: &loaded.project.name,
            global_percent: loaded.card.global_percent,
            phases: &loaded.card.phases,
            pending: &loaded.pending,
        };
        serde_json::to_writer_pretty(&mut output, &response)
            .context("failed to serialize score json output")?;
        writeln!(output)?;
    } else {
        write_scores(&mut output, &loaded)?;
    }
    output.flush()?;
    Ok(())
}

pub fn write_scores(output: &mut impl Write, loaded: &LoadedChecklist) -> Result<()> {
    let project = if loaded.project.name.trim().is_empty() {
        "(unnamed project)"
    } else {
        loaded.project.name.trim()
    };
    writeln!(output, "Project: {project}")?;

    for phase_score in &loaded.card.phases {
        let applicable = if phase_score.is_applicable() { "" } else { " (n/a)" };
        writeln!(
            output,
            "{:<24}\t{:>3}/{:<3}\t{:>5.1}%{applicable}",
            phase_score.phase.label(),
            phase_score.completed,
            phase_score.total,
            phase_score.percent
        )?;
    }
    writeln!(output, "Global average: {:.1}%", loaded.card.global_percent)?;

    if loaded.pending.is_empty() {
        writeln!(output, "No pending documents")?;
        return Ok(());
    }

    writeln!(output, "Pending documents:")?;
    for pending in &loaded.pending {
        writeln!(output, "> {} ({:.1}%):", pending.phase.label(), pending.percent)?;
        for document in &pending.documents {
            writeln!(output, "\t- {document}")?;
        }
    }
    Ok(())
}
