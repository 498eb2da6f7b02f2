use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use projectstore::cli::{Cli, Command};
use projectstore::config::Config;
use projectstore::{Part, ProjectStore, Role};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_path = cli.store.unwrap_or(config.store_path);

    info!("projectstore starting: {}", store_path.display());

    match cli.command {
        Command::List => {
            let store = ProjectStore::open(&store_path)?;
            let report = store.load_all()?;
            if report.projects.is_empty() {
                println!("No projects found");
            }
            for (name, history) in &report.projects {
                println!("{} {}", name.cyan(), format!("({} turns)", history.len()).dimmed());
            }
            for e in &report.errors {
                eprintln!("{} {}", "✗".red(), e);
            }
        }
        Command::Show { name } => {
            let store = ProjectStore::open(&store_path)?;
            let record = store.load(&name)?;
            println!("Project: {}", record.name.cyan());
            if let Some(saved_at) = record.saved_at {
                println!("Saved: {}", saved_at.to_rfc3339().dimmed());
            }
            for turn in &record.history {
                let role = match turn.role() {
                    Role::User => "user".bright_green(),
                    Role::Model => "model".bright_blue(),
                };
                println!();
                println!("{}:", role);
                for part in turn.parts() {
                    match part {
                        Part::Text { text } => println!("{}", text),
                        Part::File { .. } => println!("{}", format!("[file: {}]", part.label()).dimmed()),
                    }
                }
            }
        }
        Command::Path => {
            println!("{}", store_path.display());
        }
    }

    Ok(())
}
