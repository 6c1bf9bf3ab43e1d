mod logging;
mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use gradesheet::config::{load_config, Config};
use gradesheet::pipeline::{BatchRunner, FnProgress, PipelineConfig, PipelineState, Workspace};
use gradesheet::Assignment;

#[derive(Parser)]
#[command(name = "gradesheet", version, about = "Batch grader for spreadsheet homework")]
struct Cli {
    /// Emit logs as JSON lines instead of text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a submission bundle and grade every student in it.
    Grade {
        /// LMS download: a .zip archive or an extracted directory.
        bundle: PathBuf,

        /// Course label used for the workspace folders, e.g. "MAT-144 501".
        #[arg(short, long)]
        course: String,

        /// Config file (.json, .yaml or .yml).
        #[arg(long, env = "GRADESHEET_CONFIG")]
        config: Option<PathBuf>,

        /// Overrides the configured assignment.
        #[arg(short, long)]
        assignment: Option<Assignment>,

        /// Overrides the configured workspace root.
        #[arg(long, env = "GRADESHEET_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Print the class summary as JSON when done.
        #[arg(long)]
        json: bool,
    },

    /// Create the workspace folders and report where the template belongs.
    Init {
        #[arg(long, env = "GRADESHEET_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long, env = "GRADESHEET_WORKSPACE")]
        workspace: Option<PathBuf>,
    },

    /// Validate a config file and print the resolved settings.
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json)?;

    match cli.command {
        Command::Grade {
            bundle,
            course,
            config,
            assignment,
            workspace,
            json,
        } => {
            let config = resolve_config(config, assignment, workspace)?;
            grade(bundle, course, config, json).await
        }
        Command::Init { config, workspace } => {
            let config = resolve_config(config, None, workspace)?;
            init(&config)
        }
        Command::CheckConfig { path } => {
            let config = load_config(&path)
                .with_context(|| format!("Invalid config {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn resolve_config(
    path: Option<PathBuf>,
    assignment: Option<Assignment>,
    workspace: Option<PathBuf>,
) -> anyhow::Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => load_config(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(assignment) = assignment {
        config.assignment = assignment;
    }
    if let Some(workspace) = workspace {
        config.workspace_root = workspace;
    }
    Ok(PipelineConfig::from_config(&config))
}

fn init(config: &PipelineConfig) -> anyhow::Result<()> {
    let workspace = Workspace::new(&config.workspace_root);
    workspace.ensure_assets()?;
    info!("Workspace ready at {}", workspace.root().display());
    if config.template_path.is_file() {
        println!("Template found: {}", config.template_path.display());
    } else {
        println!(
            "Copy the {} grading template to {}",
            config.assignment,
            config.template_path.display()
        );
    }
    Ok(())
}

async fn grade(
    bundle: PathBuf,
    course: String,
    config: PipelineConfig,
    json: bool,
) -> anyhow::Result<()> {
    let state = PipelineState::new();

    let signal_state = Arc::clone(&state);
    ctrlc::set_handler(move || {
        if signal_state.request_cancel().is_ok() {
            eprintln!("Stopping after the current student...");
        }
    })
    .context("Failed to install Ctrl-C handler")?;

    let runner = BatchRunner::from_config(Arc::new(config));
    let run_state = Arc::clone(&state);
    let ctx = tokio::task::spawn_blocking(move || {
        let progress = FnProgress(report::log_event);
        runner.run(&bundle, &course, &run_state, &progress)
    })
    .await
    .context("Grading task panicked")??;

    let snapshot = state.snapshot();
    if json {
        let report = report::BatchReport::new(&ctx, &snapshot);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report::print_summary(&ctx, &snapshot);
    }

    if ctx.counters.graded == 0 && ctx.counters.errors > 0 {
        bail!("No student could be graded");
    }
    Ok(())
}
