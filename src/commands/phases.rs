use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::PhasesArgs;
use crate::methodology::{Methodology, Phase};

#[derive(Serialize)]
struct PhaseRow<'a> {
    key: &'static str,
    label: &'static str,
    column: &'static str,
    documents: &'a [String],
}

pub fn run(args: PhasesArgs) -> Result<()> {
    let methodology = Methodology::load_or_standard(args.methodology.path())?;
    let rows: Vec<PhaseRow<'_>> = methodology
        .phases()
        .iter()
        .map(|entry| PhaseRow {
            key: entry.phase.key(),
            label: entry.phase.label(),
            column: entry.phase.column(),
            documents: &entry.documents,
        })
        .collect();

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &rows)
            .context("failed to serialize methodology json output")?;
        writeln!(output)?;
    } else {
        for (index, row) in rows.iter().enumerate() {
            writeln!(
                output,
                "{}. {} ({}) - {} documents",
                index + 1,
                row.label,
                row.key,
                row.documents.len()
            )?;
            for document in row.documents {
                writeln!(output, "\t- {document}")?;
            }
        }
        writeln!(
            output,
            "Total: {} phases, {} documents",
            Phase::COUNT,
            methodology.document_count()
        )?;
    }
    output.flush()?;
    Ok(())
}
