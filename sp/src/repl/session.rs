//! REPL session management

use std::path::PathBuf;

use colored::Colorize;
use eyre::Result;
use projectstore::{Part, Role};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use super::CtrlCGuard;

use crate::activation::WaitProgress;
use crate::error::PlanError;
use crate::shell::{Shell, ShellState, View};

/// Interactive REPL session
pub struct ReplSession {
    shell: Shell,
    state: ShellState,
}

impl ReplSession {
    pub fn new(shell: Shell) -> Self {
        Self {
            shell,
            state: ShellState::default(),
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self, initial_project: Option<String>) -> Result<()> {
        if let Some(name) = initial_project
            && let Err(e) = self.shell.set_project_name(&mut self.state, &name)
        {
            self.report(&e);
        }

        self.print_welcome();

        // Create readline editor for proper line editing
        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let prompt = format!("{} {} ", self.state.active_project.dimmed(), ">".bright_green());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input).await {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.ask(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!();
                    break;
                }
                Err(err) => {
                    self.shell.shutdown(&mut self.state).await;
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        self.shell.shutdown(&mut self.state).await;
        println!("Goodbye!");
        Ok(())
    }

    fn report(&self, e: &PlanError) {
        println!("{} {}", "Error:".red(), e);
        if let Some(hint) = self.shell.hint(e) {
            println!("{}", hint.yellow());
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Agentic Assignment Evaluator".bright_cyan().bold());
        self.print_status();
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn print_status(&self) {
        println!("{} {}", "Active Project:".bold(), self.state.active_project.cyan());
        println!("{} {}", "View:".bold(), self.state.view.to_string().cyan());
        match self.state.session() {
            Some(session) => println!("{} {} turns", "Conversation:".bold(), session.turn_count()),
            None => println!("{} {}", "Conversation:".bold(), "none".dimmed()),
        }
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input, ""),
        };
        debug!(%cmd, "handle_slash_command: called");

        match cmd {
            "/help" | "/h" => self.print_help(),
            "/quit" | "/q" | "/exit" => return SlashResult::Quit,
            "/status" | "/s" => self.print_status(),
            "/view" | "/v" => self.switch_view(rest),
            "/name" | "/n" => self.rename(rest),
            "/upload" | "/u" => match self.state.view {
                View::UploadBrief => self.upload_brief(rest).await,
                View::SubmitAssignment => self.submit(rest),
            },
            "/submit" => self.submit(rest),
            "/ask" | "/a" => self.ask(rest).await,
            "/done" | "/d" => self.step_completed(),
            "/projects" | "/p" => self.list_projects(),
            "/open" | "/o" => self.open_project(rest).await,
            "/history" => self.print_history(),
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Navigation:".bright_cyan());
        println!("  {:18} Switch view (upload | submit)", "/view <name>".yellow());
        println!("  {:18} Show active project and view", "/status".yellow());
        println!("  {:18} Exit", "/quit".yellow());
        println!("  {:18} Cancel a running upload or question", "Ctrl-C".yellow());
        println!();
        println!("{}", "Upload Brief:".bright_cyan());
        println!("  {:18} Name the active project", "/name <project>".yellow());
        println!("  {:18} Upload a brief PDF and get a roadmap", "/upload <pdf>".yellow());
        println!("  {:18} Ask a follow-up (or just type)", "/ask <text>".yellow());
        println!("  {:18} Step completed: save the project", "/done".yellow());
        println!("  {:18} Show the conversation", "/history".yellow());
        println!();
        println!("{}", "Submit Assignment:".bright_cyan());
        println!("  {:18} Submit a completed assignment PDF", "/submit <pdf>".yellow());
        println!();
        println!("{}", "Old Projects:".bright_cyan());
        println!("  {:18} List saved projects", "/projects".yellow());
        println!("  {:18} Reopen a saved project", "/open <project>".yellow());
        println!();
    }

    fn switch_view(&mut self, arg: &str) {
        match arg.parse::<View>() {
            Ok(view) => {
                self.state.view = view;
                println!("{} {}", "View:".bold(), view.to_string().cyan());
            }
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    fn rename(&mut self, arg: &str) {
        match self.shell.set_project_name(&mut self.state, unquote(arg)) {
            Ok(()) => println!("{} {}", "Active Project:".bold(), self.state.active_project.cyan()),
            Err(e) => self.report(&e),
        }
    }

    async fn upload_brief(&mut self, arg: &str) {
        let Some(path) = path_arg(arg) else {
            println!("{} /upload <path to brief.pdf>", "Usage:".yellow());
            return;
        };

        println!("{}", "Uploading brief...".dimmed());

        let ctrl_c = CtrlCGuard::new();
        let result = self
            .shell
            .upload_brief(&mut self.state, &path, ctrl_c.token(), |p: WaitProgress| {
                println!("{}", format!("Processed {}/{} file(s)", p.completed, p.total).dimmed());
            })
            .await;
        drop(ctrl_c);

        match result {
            Ok(reply) => {
                println!("{} File '{}' processed", "✓".green(), path.display());
                println!();
                println!("{}", reply);
                println!();
                println!(
                    "Mark progress with {} or ask a follow-up with {}",
                    "/done".yellow(),
                    "/ask".yellow()
                );
            }
            Err(e) => self.report(&e),
        }
    }

    fn submit(&self, arg: &str) {
        let Some(path) = path_arg(arg) else {
            println!("{} /submit <path to assignment.pdf>", "Usage:".yellow());
            return;
        };

        match self.shell.submit_assignment(&path) {
            Ok(receipt) => {
                println!(
                    "{} Assignment '{}' uploaded successfully ({} bytes)",
                    "✓".green(),
                    receipt.file_name,
                    receipt.size
                );
                println!("{}", "Evaluation is not available yet.".dimmed());
            }
            Err(e) => self.report(&e),
        }
    }

    async fn ask(&mut self, text: &str) {
        if text.is_empty() {
            println!("{} /ask <question>", "Usage:".yellow());
            return;
        }

        println!("{}", "Thinking...".dimmed());
        let ctrl_c = CtrlCGuard::new();
        let result = self.shell.follow_up(&mut self.state, text, ctrl_c.token()).await;
        drop(ctrl_c);
        match result {
            Ok(reply) => {
                println!();
                println!("{}", reply);
                println!();
            }
            Err(e) => self.report(&e),
        }
    }

    fn step_completed(&self) {
        match self.shell.step_completed(&self.state) {
            Ok(path) => println!(
                "{} Saved '{}' to {}",
                "✓".green(),
                self.state.active_project,
                path.display().to_string().dimmed()
            ),
            Err(e) => self.report(&e),
        }
    }

    fn list_projects(&self) {
        let report = match self.shell.old_projects() {
            Ok(report) => report,
            Err(e) => {
                self.report(&e);
                return;
            }
        };

        println!();
        println!("{}", "Old Projects:".bright_cyan());
        if report.projects.is_empty() {
            println!("  {}", "No saved projects.".dimmed());
        }
        for (name, history) in &report.projects {
            let marker = if *name == self.state.active_project { "*" } else { " " };
            println!("{} {} {}", marker, name.cyan(), format!("({} turns)", history.len()).dimmed());
        }
        for e in &report.errors {
            println!("  {} {}", "✗".red(), e);
        }
        println!();
        println!("Reopen one with {}", "/open <project>".yellow());
    }

    async fn open_project(&mut self, arg: &str) {
        let name = unquote(arg);
        if name.is_empty() {
            println!("{} /open <project>", "Usage:".yellow());
            return;
        }

        match self.shell.open_project(&mut self.state, name).await {
            Ok(turns) => {
                println!(
                    "{} Opened '{}' ({} turns)",
                    "✓".green(),
                    self.state.active_project.cyan(),
                    turns
                );
                if let Some(reply) = self.state.session().and_then(|s| s.last_reply()) {
                    println!();
                    println!("{}", reply);
                    println!();
                }
            }
            Err(e) => self.report(&e),
        }
    }

    fn print_history(&self) {
        let history = self.state.history();
        if history.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        for (i, turn) in history.iter().enumerate() {
            let role = match turn.role() {
                Role::User => "User".bright_green(),
                Role::Model => "Model".bright_blue(),
            };
            let preview = turn
                .parts()
                .iter()
                .map(|part| match part {
                    Part::Text { text } => {
                        let preview: String = text.chars().take(60).collect();
                        if text.chars().count() > 60 { format!("{}...", preview) } else { preview }
                    }
                    Part::File { .. } => format!("[file: {}]", part.label()),
                })
                .collect::<Vec<_>>()
                .join(" ");
            println!("  {}. {}: {}", i + 1, role, preview.replace('\n', " "));
        }
        println!();
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}

/// Strip one layer of matching quotes
fn unquote(arg: &str) -> &str {
    let arg = arg.trim();
    for q in ['"', '\''] {
        if arg.len() >= 2 && arg.starts_with(q) && arg.ends_with(q) {
            return &arg[1..arg.len() - 1];
        }
    }
    arg
}

fn path_arg(arg: &str) -> Option<PathBuf> {
    let arg = unquote(arg);
    if arg.is_empty() {
        return None;
    }
    if let Some(rest) = arg.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return Some(home.join(rest));
    }
    Some(PathBuf::from(arg))
}
