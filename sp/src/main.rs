//! StudyPlan - assignment brief to study roadmap
//!
//! CLI entry point for the interactive shell and batch commands.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use studyplan::cli::{Cli, Command};
use studyplan::config::Config;
use studyplan::repl::{self, CtrlCGuard};
use studyplan::{Shell, ShellState};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("studyplan")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("studyplan.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("StudyPlan loaded config: model={}", config.gemini.model);

    // Credentials are checked before any command runs
    let shell = match Shell::from_config(&config) {
        Ok(shell) => shell,
        Err(e) if e.is_fatal() => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None => repl::run_interactive(shell, None).await,
        Some(Command::Repl { project }) => repl::run_interactive(shell, project).await,
        Some(Command::Plan { pdf, project, save }) => cmd_plan(&shell, &pdf, project.as_deref(), save).await,
        Some(Command::Projects) => cmd_projects(&shell),
        Some(Command::Submit { pdf }) => cmd_submit(&shell, &pdf),
    }
}

async fn cmd_plan(shell: &Shell, pdf: &Path, project: Option<&str>, save: bool) -> Result<()> {
    debug!(?pdf, ?project, save, "cmd_plan: called");
    let mut state = ShellState::default();
    if let Some(name) = project {
        shell.set_project_name(&mut state, name)?;
    }

    eprintln!("{}", "Uploading brief...".dimmed());
    let ctrl_c = CtrlCGuard::new();
    let result = shell
        .upload_brief(&mut state, pdf, ctrl_c.token(), |p| {
            eprintln!("{}", format!("Processed {}/{} file(s)", p.completed, p.total).dimmed());
        })
        .await;
    drop(ctrl_c);

    let outcome = match result {
        Ok(reply) => {
            println!("{}", reply);
            if save {
                shell
                    .step_completed(&state)
                    .map(|path| eprintln!("{} Saved '{}' to {}", "✓".green(), state.active_project, path.display()))
            } else {
                Ok(())
            }
        }
        Err(e) => Err(e),
    };

    shell.shutdown(&mut state).await;
    if let Err(e) = &outcome
        && let Some(hint) = shell.hint(e)
    {
        eprintln!("{}", hint.yellow());
    }
    Ok(outcome?)
}

fn cmd_projects(shell: &Shell) -> Result<()> {
    debug!("cmd_projects: called");
    let report = shell.old_projects()?;
    if report.projects.is_empty() {
        println!("No saved projects");
    }
    for (name, history) in &report.projects {
        println!("{} {}", name.cyan(), format!("({} turns)", history.len()).dimmed());
    }
    for e in &report.errors {
        eprintln!("{} {}", "✗".red(), e);
    }
    Ok(())
}

fn cmd_submit(shell: &Shell, pdf: &Path) -> Result<()> {
    debug!(?pdf, "cmd_submit: called");
    let receipt = shell.submit_assignment(pdf)?;
    println!(
        "{} Assignment '{}' uploaded successfully ({} bytes)",
        "✓".green(),
        receipt.file_name,
        receipt.size
    );
    Ok(())
}
