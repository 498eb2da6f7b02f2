//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// StudyPlan - assignment brief to study roadmap
#[derive(Parser)]
#[command(
    name = "sp",
    about = "Turn an assignment brief PDF into a step-by-step study plan",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute (defaults to repl)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the interactive shell
    Repl {
        /// Name of the project to start with
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Upload a brief and print the roadmap (batch mode)
    Plan {
        /// Path to the brief PDF
        pdf: PathBuf,

        /// Project name
        #[arg(short, long)]
        project: Option<String>,

        /// Save the conversation once the roadmap is generated
        #[arg(short, long)]
        save: bool,
    },

    /// List saved projects
    Projects,

    /// Submit a completed assignment PDF
    Submit {
        /// Path to the assignment PDF
        pdf: PathBuf,
    },
}
