use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Local};
use tracing::{info, warn};

use super::checklist;
use crate::cli::ReportArgs;
use crate::report::{ReportOptions, compose_report, report_file_name};
use crate::util::write_bytes;

pub fn run(args: ReportArgs) -> Result<()> {
    let loaded = checklist::load(&args.checklist, &args.methodology)?;
    checklist::require_valid_project(&loaded.project)?;

    let output_path = output_path(&args, &loaded.project.name)?;
    let options = report_options(&args, Local::now());
    if options.verification_url.is_none() {
        warn!("no verification url given, authenticity code omitted");
    }

    let percentages = loaded.card.percentages();
    let bytes = compose_report(&loaded.project, &percentages, &loaded.pending, &options)?;
    write_bytes(&output_path, &bytes)?;

    info!(
        path = %output_path.display(),
        bytes = bytes.len(),
        global_percent = %format!("{:.1}", loaded.card.global_percent),
        "wrote status report"
    );
    println!("{}", output_path.display());
    Ok(())
}

/// `--output`, or `<data-dir>/reports/Report_<project>.pdf`.
fn output_path(args: &ReportArgs, project_name: &str) -> Result<PathBuf> {
    match &args.output {
        Some(path) => Ok(path.clone()),
        None => Ok(args
            .store
            .data_dir
            .join("reports")
            .join(report_file_name(project_name)?)),
    }
}

fn report_options(args: &ReportArgs, generated_at: DateTime<Local>) -> ReportOptions {
    ReportOptions {
        logo_path: Some(logo_path(args)),
        verification_url: args.verification_url.clone(),
        watermark: !args.no_watermark,
        generated_at,
    }
}

fn logo_path(args: &ReportArgs) -> PathBuf {
    args.logo
        .clone()
        .unwrap_or_else(|| args.store.data_dir.join("branding").join("logo.png"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Commands};

    fn parse(extra: &[&str]) -> ReportArgs {
        let mut argv = vec![
            "delivery-checklist",
            "report",
            "--data-dir",
            "/srv/hub",
            "--checklist",
            "form.json",
        ];
        argv.extend_from_slice(extra);
        let cli = Cli::try_parse_from(argv).expect("args parse");
        let Commands::Report(args) = cli.command else {
            panic!("expected report command");
        };
        args
    }

    #[test]
    fn default_output_lands_in_reports_dir_with_sanitized_name() {
        let args = parse(&[]);
        let path = output_path(&args, "Hospital São Lucas").expect("path");
        assert_eq!(path, PathBuf::from("/srv/hub/reports/Report_Hospital_S_o_Lucas.pdf"));
    }

    #[test]
    fn explicit_output_is_used_verbatim() {
        let args = parse(&["--output", "/tmp/out/status.pdf"]);
        let path = output_path(&args, "Hospital X").expect("path");
        assert_eq!(path, PathBuf::from("/tmp/out/status.pdf"));
    }

    #[test]
    fn options_default_to_branding_logo_and_watermark() {
        let args = parse(&[]);
        let generated_at = Local::now();
        let options = report_options(&args, generated_at);

        assert_eq!(options.logo_path, Some(PathBuf::from("/srv/hub/branding/logo.png")));
        assert!(options.watermark);
        assert!(options.verification_url.is_none());
        assert_eq!(options.generated_at, generated_at);
    }

    #[test]
    fn options_follow_explicit_flags() {
        let args = parse(&[
            "--logo",
            "/tmp/brand.png",
            "--verification-url",
            "https://hub.example.test/valida",
            "--no-watermark",
        ]);
        let options = report_options(&args, Local::now());

        assert_eq!(options.logo_path, Some(PathBuf::from("/tmp/brand.png")));
        assert!(!options.watermark);
        assert_eq!(
            options.verification_url.as_deref(),
            Some("https://hub.example.test/valida")
        );
    }
}
