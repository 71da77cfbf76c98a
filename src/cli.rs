//! Command line for managing tasks and reading stats without the tray.

use crate::models::{NewTask, Task, TaskId, DEFAULT_PROJECT};
use crate::persistence::Database;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::Write;

#[derive(Parser)]
#[command(name = "focusbar", version, about = "A menubar Pomodoro timer")]
pub struct Cli {
    /// Runs the tray app when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Task management
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Focus session statistics
    Stats,
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Project the task belongs to
        #[arg(long, default_value = DEFAULT_PROJECT)]
        project: String,
        /// Estimated pomodoros
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=20))]
        estimate: u32,
    },
    /// List tasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// Mark a task done
    Done {
        /// Task ID
        id: TaskId,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: TaskId,
    },
}

pub fn run(
    command: Command,
    db: &Database,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Task { action } => run_task(action, db, out),
        Command::Stats => {
            let analytics = db.analytics(Local::now().date_naive())?;
            writeln!(out, "{}", serde_json::to_string_pretty(&analytics)?)?;
            Ok(())
        }
    }
}

fn run_task(
    action: TaskAction,
    db: &Database,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TaskAction::Add {
            title,
            project,
            estimate,
        } => {
            let task = db.add_task(&NewTask {
                title,
                project,
                estimated_pomodoros: estimate,
            })?;
            writeln!(out, "Task created: {}", task.id)?;
        }
        TaskAction::List { all } => {
            let tasks = if all { db.all_tasks()? } else { db.open_tasks()? };
            for task in &tasks {
                writeln!(out, "{}", format_task_line(task))?;
            }
        }
        TaskAction::Done { id } => {
            db.complete_task(id)?;
            writeln!(out, "Task {} done", id)?;
        }
        TaskAction::Delete { id } => {
            db.delete_task(id)?;
            writeln!(out, "Task {} deleted", id)?;
        }
    }
    Ok(())
}

fn format_task_line(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    format!(
        "[{}] {:>4}  {}  ({}/{})  {}",
        mark, task.id, task.title, task.completed_pomodoros, task.estimated_pomodoros, task.project
    )
}
