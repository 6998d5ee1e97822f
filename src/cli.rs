use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "delivery-checklist",
    version,
    about = "Project methodology checklist: phase scoring, snapshots and status reports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the methodology table
    Phases(PhasesArgs),
    /// Write a blank checklist, pre-filled from the latest snapshot of a project
    Template(TemplateArgs),
    /// Score a checklist file
    Score(ScoreArgs),
    /// Score a checklist file and save a snapshot
    Save(SaveArgs),
    /// List saved project names
    Projects(ProjectsArgs),
    /// Show the latest snapshot of a project
    Show(ShowArgs),
    /// List every snapshot of a project, newest first
    History(ShowArgs),
    /// Render the PDF status report for a checklist file
    Report(ReportArgs),
    /// Summarize the snapshot database
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, env = "CHECKLIST_DATA_DIR", default_value = ".cache/delivery-checklist")]
    pub data_dir: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

impl StoreArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("checklist.sqlite"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct MethodologyArgs {
    /// JSON file replacing the built-in phase → document table
    #[arg(long)]
    pub methodology: Option<PathBuf>,
}

impl MethodologyArgs {
    pub fn path(&self) -> Option<&Path> {
        self.methodology.as_deref()
    }
}

#[derive(Args, Debug, Clone)]
pub struct PhasesArgs {
    #[command(flatten)]
    pub methodology: MethodologyArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TemplateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub methodology: MethodologyArgs,

    #[arg(long)]
    pub project: Option<String>,

    /// Defaults to stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub methodology: MethodologyArgs,

    #[arg(long)]
    pub checklist: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SaveArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub methodology: MethodologyArgs,

    #[arg(long)]
    pub checklist: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub project: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub methodology: MethodologyArgs,

    #[arg(long)]
    pub checklist: PathBuf,

    /// Defaults to <data-dir>/reports/Report_<project>.pdf
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Defaults to <data-dir>/branding/logo.png; skipped when missing
    #[arg(long)]
    pub logo: Option<PathBuf>,

    /// Base URL encoded in the QR authenticity code
    #[arg(long)]
    pub verification_url: Option<String>,

    #[arg(long, default_value_t = false)]
    pub no_watermark: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_defaults_under_data_dir() {
        let cli = Cli::try_parse_from([
            "delivery-checklist",
            "status",
            "--data-dir",
            "/tmp/hub",
        ])
        .expect("args parse");
        let Commands::Status(args) = cli.command else {
            panic!("expected status command");
        };
        assert_eq!(args.store.resolved_db_path(), PathBuf::from("/tmp/hub/checklist.sqlite"));
    }

    #[test]
    fn report_flags_parse() {
        let cli = Cli::try_parse_from([
            "delivery-checklist",
            "report",
            "--checklist",
            "form.json",
            "--verification-url",
            "https://hub.example.test/valida",
            "--no-watermark",
        ])
        .expect("args parse");
        let Commands::Report(args) = cli.command else {
            panic!("expected report command");
        };
        assert!(args.no_watermark);
        assert_eq!(args.checklist, PathBuf::from("form.json"));
        assert!(args.logo.is_none());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
