use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use harness::config::Config;
use harness::core::{BlockedTask, Task, TaskId};
use harness::orchestration::{ProgressReport, TaskCoordinator};
use harness::{hlog, hlog_error, Result};

/// Harness - task coordination for AI coding agents
#[derive(Parser, Debug)]
#[command(name = "harness")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    HARNESS_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Project root containing .claude/feature_list.json
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Enable debug logging (writes to ~/.harness/harness.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the task an agent should work on next (does not claim it)
    Next {
        /// Agent type, e.g. frontend or backend
        agent: Option<String>,
    },

    /// Claim a specific task (pending -> in_progress)
    Claim { id: String },

    /// Select the next eligible task and claim it in one step
    ClaimNext { agent: Option<String> },

    /// Mark a claimed task as completed
    Complete {
        id: String,

        /// Implementation notes to record with the task
        #[arg(long)]
        notes: Option<String>,
    },

    /// Mark a claimed task as failed
    Fail {
        id: String,

        /// What went wrong
        #[arg(long)]
        error: String,
    },

    /// Set a task's status by name (in_progress, completed, failed)
    Update {
        id: String,
        status: String,
        notes: Option<String>,
    },

    /// Show overall progress (default)
    Progress,

    /// List pending tasks that are waiting on dependencies
    Blocked,

    /// Recommend what to do next
    Suggest,

    /// Print the planner's parallel execution groups
    Groups,

    /// Show a single task
    Show { id: String },

    /// Print every task in dependency order
    Order,

    /// Print the effective settings from .claude/harness.toml
    Config {
        /// Write the effective settings, defaults included, to .claude/harness.toml
        #[arg(long)]
        write: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    harness::log::init_with_debug(cli.debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            hlog_error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let coordinator = TaskCoordinator::open(&cli.root)?;
    let json = cli.json;

    match cli.command.unwrap_or(Command::Progress) {
        Command::Next { agent } => run_next(&coordinator, agent.as_deref(), json),
        Command::Claim { id } => {
            hlog!("Claim command: id={}", id);
            let task = coordinator.claim_task(&TaskId::new(id))?;
            print_task(&task, json)
        }
        Command::ClaimNext { agent } => run_claim_next(&coordinator, agent.as_deref(), json),
        Command::Complete { id, notes } => {
            hlog!("Complete command: id={}", id);
            let task = coordinator.complete_task(&TaskId::new(id), notes.as_deref())?;
            print_task(&task, json)
        }
        Command::Fail { id, error } => {
            hlog!("Fail command: id={}", id);
            let task = coordinator.fail_task(&TaskId::new(id), &error)?;
            print_failure(&coordinator, &task, json)
        }
        Command::Update { id, status, notes } => {
            hlog!("Update command: id={} status={}", id, status);
            let task = coordinator.update_status(&TaskId::new(id), &status, notes.as_deref())?;
            if task.is_failed() {
                return print_failure(&coordinator, &task, json);
            }
            print_task(&task, json)
        }
        Command::Progress => run_progress(&coordinator.get_progress()?, json),
        Command::Blocked => run_blocked(&coordinator.get_blocked_tasks()?, json),
        Command::Suggest => run_suggest(&coordinator.get_progress()?, json),
        Command::Groups => {
            let groups = coordinator.parallel_groups()?;
            if json {
                return print_json(&groups);
            }
            if groups.is_empty() {
                println!("No parallel groups defined");
            }
            for (i, group) in groups.iter().enumerate() {
                println!("Group {}: {}", i + 1, group);
            }
            Ok(())
        }
        Command::Show { id } => {
            let task = coordinator.get_task(&TaskId::new(id))?;
            print_task(&task, json)
        }
        Command::Order => {
            let order = coordinator.execution_order()?;
            if json {
                return print_json(&order);
            }
            for (i, id) in order.iter().enumerate() {
                println!("{:>3}. {}", i + 1, id);
            }
            Ok(())
        }
        Command::Config { write } => run_config(&cli.root, write, json),
    }
}

fn run_config(root: &Path, write: bool, json: bool) -> Result<()> {
    let config = Config::load(root)?;
    if write {
        hlog!("Config command: writing {}", Config::config_path(root).display());
        config.save(root)?;
    }
    if json {
        return print_json(&config);
    }
    print!("{}", toml::to_string_pretty(&config)?);
    if write {
        println!("# written to {}", Config::config_path(root).display());
    }
    Ok(())
}

fn run_next(coordinator: &TaskCoordinator, agent: Option<&str>, json: bool) -> Result<()> {
    match coordinator.get_next_task(agent)? {
        Some(task) => print_task(&task, json),
        None if json => print_json(&serde_json::Value::Null),
        None => {
            println!("No available tasks");
            Ok(())
        }
    }
}

fn run_claim_next(coordinator: &TaskCoordinator, agent: Option<&str>, json: bool) -> Result<()> {
    hlog!("Claim-next command: agent={:?}", agent);
    match coordinator.claim_next(agent)? {
        Some(task) => print_task(&task, json),
        None if json => print_json(&serde_json::Value::Null),
        None => {
            println!("No available tasks");
            Ok(())
        }
    }
}

fn run_progress(report: &ProgressReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    println!("Project progress: {}%", report.percentage);
    println!("  Completed:   {}", report.completed);
    println!("  In progress: {}", report.in_progress);
    println!("  Failed:      {}", report.failed);
    println!("  Pending:     {}", report.pending);
    println!();

    if !report.categories.is_empty() {
        println!("By category:");
        for (category, stats) in &report.categories {
            println!(
                "  {}: {}/{} ({:.0}%)",
                category,
                stats.completed,
                stats.total,
                stats.percentage()
            );
        }
        println!();
    }

    if !report.agents.is_empty() {
        println!("By agent:");
        for (agent, stats) in &report.agents {
            println!(
                "  {}: {}/{} ({:.0}%)",
                agent,
                stats.completed,
                stats.total,
                stats.percentage()
            );
        }
    }
    Ok(())
}

fn run_blocked(blocked: &[BlockedTask], json: bool) -> Result<()> {
    if json {
        return print_json(&blocked);
    }
    if blocked.is_empty() {
        println!("No blocked tasks");
        return Ok(());
    }

    for entry in blocked {
        let waiting: Vec<&str> = entry.unsatisfied.iter().map(TaskId::as_str).collect();
        println!("{}  waiting on: {}", entry.task.id, waiting.join(", "));
        if let Some(reason) = &entry.unsatisfiable {
            println!("    can never run: {}", reason);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct Suggestion<'a> {
    can_continue: bool,
    parallel_execution_possible: bool,
    recommended_action: &'a str,
    available_tasks: usize,
    blocked_tasks: usize,
    progress_percentage: f64,
    project_ready: bool,
}

fn run_suggest(report: &ProgressReport, json: bool) -> Result<()> {
    if json {
        return print_json(&Suggestion {
            can_continue: report.eligible > 0,
            parallel_execution_possible: report.parallel_possible,
            recommended_action: report.recommended_action.as_str(),
            available_tasks: report.eligible,
            blocked_tasks: report.blocked,
            progress_percentage: report.percentage,
            project_ready: report.project_ready,
        });
    }

    println!("Recommended action: {}", report.recommended_action);
    println!("  {}", report.recommended_action.describe());
    println!(
        "  {} eligible, {} blocked, {}% complete{}",
        report.eligible,
        report.blocked,
        report.percentage,
        if report.project_ready { " (project ready)" } else { "" }
    );
    Ok(())
}

#[derive(Serialize)]
struct FailureReport<'a> {
    task: &'a Task,
    stranded: &'a [TaskId],
}

/// Print a failed task and the pending tasks its failure made unreachable.
fn print_failure(coordinator: &TaskCoordinator, task: &Task, json: bool) -> Result<()> {
    let stranded = coordinator.stranded_by(&task.id)?;
    if json {
        return print_json(&FailureReport {
            task,
            stranded: &stranded,
        });
    }

    print_task(task, false)?;
    if !stranded.is_empty() {
        let ids: Vec<&str> = stranded.iter().map(TaskId::as_str).collect();
        println!("  stranded:   {}", ids.join(", "));
    }
    Ok(())
}

fn print_task(task: &Task, json: bool) -> Result<()> {
    if json {
        return print_json(task);
    }

    match task.name() {
        Some(name) => println!("{}  {}", task.id, name),
        None => println!("{}", task.id),
    }
    println!("  status:     {}", task.status);
    if let Some(agent) = &task.agent_assigned {
        println!("  agent:      {}", agent);
    }
    if let Some(priority) = task.priority {
        println!("  priority:   {}", priority);
    }
    println!("  complexity: {}", task.complexity().as_str());
    if !task.dependencies.is_empty() {
        let deps: Vec<&str> = task.dependencies.iter().map(TaskId::as_str).collect();
        println!("  depends on: {}", deps.join(", "));
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
