use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::methodology::Phase;
use crate::model::{PhasePercentages, ProjectMetadata};
use crate::scoring::PhasePending;
use crate::util::sha256_hex;

mod assets;
mod chart;
mod layout;
mod pdf;

pub use chart::ProgressMarker;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub logo_path: Option<PathBuf>,
    pub verification_url: Option<String>,
    pub watermark: bool,
    pub generated_at: DateTime<Local>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            logo_path: None,
            verification_url: None,
            watermark: true,
            generated_at: Local::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseStatus {
    pub phase: Phase,
    pub percent: f64,
    pub marker: ProgressMarker,
}

/// Everything the rendered document states, independent of page layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutline {
    pub title: String,
    pub fields: Vec<(String, String)>,
    pub global_percent: f64,
    pub phases: Vec<PhaseStatus>,
    pub percentages: PhasePercentages,
    pub notes: Option<String>,
    pub pendencies: Vec<PhasePending>,
    pub digest: String,
    pub verification_link: Option<String>,
}

impl ReportOutline {
    pub fn build(
        project: &ProjectMetadata,
        percentages: &PhasePercentages,
        pending: &[PhasePending],
        verification_url: Option<&str>,
    ) -> Result<Self> {
        let digest = verification_digest(project, percentages)?;
        let fields = vec![
            ("PROJETO".to_string(), project.name.trim().to_uppercase()),
            ("CRM".to_string(), project.opportunity.clone()),
            ("GP".to_string(), project.manager.clone()),
            ("INÍCIO".to_string(), project.start_date.clone()),
            ("TÉRMINO".to_string(), project.end_date.clone()),
            ("PRODUÇÃO".to_string(), project.production_date.clone()),
            ("ESCOPO".to_string(), project.scope_type.label().to_string()),
            ("HORAS".to_string(), format!("{:.1}", project.contracted_hours)),
            ("VALIDADOR".to_string(), project.verifier.clone()),
        ];

        let phases = Phase::ALL
            .iter()
            .map(|phase| {
                let percent = percentages.get_or_zero(*phase);
                PhaseStatus {
                    phase: *phase,
                    percent,
                    marker: ProgressMarker::from_percent(percent),
                }
            })
            .collect();

        // a phase at 100 % has nothing pending, whatever the caller passed
        let pendencies = pending
            .iter()
            .filter(|entry| {
                !entry.documents.is_empty() && percentages.get_or_zero(entry.phase) < 100.0
            })
            .cloned()
            .collect();

        let verification_link = verification_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| {
                let separator = if url.contains('?') { '&' } else { '?' };
                format!("{url}{separator}digest={digest}")
            });

        Ok(Self {
            title: "STATUS REPORT - CHECKLIST DE METODOLOGIA".to_string(),
            fields,
            global_percent: percentages.mean(),
            phases,
            percentages: percentages.clone(),
            notes: project.notes_text().map(ToOwned::to_owned),
            pendencies,
            digest,
            verification_link,
        })
    }
}

#[derive(Serialize)]
struct DigestPayload<'a> {
    project: &'a ProjectMetadata,
    percentages: &'a PhasePercentages,
}

/// SHA-256 over the canonical JSON of the report's inputs.
pub fn verification_digest(
    project: &ProjectMetadata,
    percentages: &PhasePercentages,
) -> Result<String> {
    let payload = serde_json::to_vec(&DigestPayload {
        project,
        percentages,
    })
    .context("failed to serialize report digest payload")?;
    Ok(sha256_hex(&payload))
}

/// `Report_<project>.pdf`, restricted to portable file-name characters.
pub fn report_file_name(project_name: &str) -> Result<String> {
    let pattern = Regex::new(r"[^A-Za-z0-9._-]+").context("failed to compile file name regex")?;
    let sanitized = pattern.replace_all(project_name.trim(), "_");
    let stem = sanitized.trim_matches('_');
    let stem = if stem.is_empty() { "projeto" } else { stem };
    Ok(format!("Report_{stem}.pdf"))
}

/// Renders the status report as PDF bytes.
pub fn compose_report(
    project: &ProjectMetadata,
    percentages: &PhasePercentages,
    pending: &[PhasePending],
    options: &ReportOptions,
) -> Result<Vec<u8>> {
    let outline = ReportOutline::build(
        project,
        percentages,
        pending,
        options.verification_url.as_deref(),
    )?;
    let logo = assets::load_logo(options.logo_path.as_deref());

    let bytes = layout::render(&outline, logo, options)?;
    info!(
        project = %project.name,
        bytes = bytes.len(),
        pending_phases = outline.pendencies.len(),
        "composed report"
    );
    Ok(bytes)
}
