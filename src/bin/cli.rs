use std::io::{self, Write};

use chrono::NaiveDate;
use polars::prelude::{DataFrame, PolarsResult};
use schedule_engine::persistence::{
    load_snapshot_from_csv, load_snapshot_from_json, save_snapshot_to_csv, save_snapshot_to_json,
};
use schedule_engine::report::render_df_as_text_table;
use schedule_engine::{
    AutoScheduleOutcome, DependencyEdge, DependencyType, ProjectMetadata, ProjectSnapshot,
    ScheduleMode, TaskId, TaskRecord, engine, logging,
};

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  show                               Show tasks and dependencies\n  add <id> <name> <duration> [parent_id]\n                                     Add a task\n  assign <id> <assignee>             Set a task's assignee\n  start <YYYY-MM-DD>                 Set the project start\n  deadline <YYYY-MM-DD|none>         Set or clear the project deadline\n  link <pred> <succ> [type] [lag]    Add a dependency (type fs|ss|ff|sf)\n  validate                           Check the dependency graph for cycles\n  cpm                                Compute the critical path\n  schedule [asap|alap]               Compute new dates (not applied)\n  apply                              Apply the last computed schedule\n  progress <id> <pct>                Set leaf progress and roll it up\n  rollup                             Recompute all summary progress\n  save <json|csv> <path>             Persist the project to disk\n  load <json|csv> <path>             Load a project from disk\n  quit|exit                          Exit"
    );
}

fn print_df(df: PolarsResult<DataFrame>) {
    match df {
        Ok(df) => println!("{}", render_df_as_text_table(&df)),
        Err(e) => println!("Error rendering table: {e}"),
    }
}

fn show(project: &ProjectSnapshot) {
    print_df(project.tasks_dataframe());
    if project.edges.is_empty() {
        println!("No dependencies.");
    } else {
        println!("Dependencies:");
        for edge in &project.edges {
            println!("  {edge}");
        }
    }
}

fn parse_date(input: Option<&str>) -> Option<NaiveDate> {
    input.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

fn parse_id(input: Option<&str>) -> Option<TaskId> {
    input.and_then(|s| s.parse::<i64>().ok()).map(TaskId)
}

fn main() {
    logging::init_logging(None);

    let mut project = ProjectSnapshot::new(ProjectMetadata::default());
    let mut pending: Option<AutoScheduleOutcome> = None;

    println!("Schedule Engine (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "show" => show(&project),
            "add" => {
                let (Some(id), Some(name), Some(duration)) = (
                    parse_id(parts.next()),
                    parts.next(),
                    parts.next().and_then(|s| s.parse::<i64>().ok()),
                ) else {
                    println!("Usage: add <id> <name> <duration> [parent_id]");
                    continue;
                };
                let mut task =
                    TaskRecord::new(id, project.project_id(), name).with_duration(duration);
                task.parent_id = parse_id(parts.next());
                match project.add_task(task) {
                    Ok(()) => println!("Added task {id}."),
                    Err(e) => println!("Error adding task: {e}"),
                }
            }
            "assign" => {
                let (Some(id), Some(assignee)) = (parse_id(parts.next()), parts.next()) else {
                    println!("Usage: assign <id> <assignee>");
                    continue;
                };
                match project.tasks.iter_mut().find(|t| t.id == id) {
                    Some(task) => {
                        task.assignee_id = Some(assignee.to_string());
                        println!("Task {id} assigned to {assignee}.");
                    }
                    None => println!("Task {id} not found."),
                }
            }
            "start" => match parse_date(parts.next()) {
                Some(date) => {
                    project.metadata.project_start = Some(date);
                    println!("Project start set to {date}.");
                }
                None => println!("Usage: start <YYYY-MM-DD>"),
            },
            "deadline" => match parts.next() {
                Some("none") => {
                    project.metadata.deadline = None;
                    println!("Deadline cleared.");
                }
                other => match parse_date(other) {
                    Some(date) => {
                        project.metadata.deadline = Some(date);
                        println!("Deadline set to {date}.");
                    }
                    None => println!("Usage: deadline <YYYY-MM-DD|none>"),
                },
            },
            "link" => {
                let (Some(pred), Some(succ)) = (parse_id(parts.next()), parse_id(parts.next()))
                else {
                    println!("Usage: link <pred> <succ> [type] [lag]");
                    continue;
                };
                let dependency_type = match parts.next().map(str::parse::<DependencyType>) {
                    None => DependencyType::FinishToStart,
                    Some(Ok(kind)) => kind,
                    Some(Err(e)) => {
                        println!("{e}");
                        continue;
                    }
                };
                let lag = match parts.next().map(str::parse::<i64>) {
                    None => 0,
                    Some(Ok(lag)) => lag,
                    Some(Err(_)) => {
                        println!("Invalid lag");
                        continue;
                    }
                };
                let edge = DependencyEdge::new(pred, succ, dependency_type, lag);
                match project.add_dependency(edge.clone()) {
                    Ok(()) => println!("Dependency added: {edge}"),
                    Err(e) => println!("Rejected: {e}"),
                }
            }
            "validate" => match engine::validate_graph(&project.tasks, &project.edges) {
                Ok(acyclic) => println!(
                    "Graph is acyclic ({} tasks, {} dependencies).",
                    acyclic.task_count, acyclic.edge_count
                ),
                Err(e) => println!("Invalid graph: {e}"),
            },
            "cpm" => match project.critical_path() {
                Ok(report) => {
                    print_df(report.to_dataframe());
                    let critical: Vec<String> = report
                        .critical_task_ids
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    println!("Critical tasks: {}", critical.join(", "));
                    println!(
                        "Project: {} to {} ({} working days)",
                        report.project_start, report.project_finish, report.total_duration
                    );
                    for warning in &report.warnings {
                        println!("Warning: {warning:?}");
                    }
                }
                Err(e) => println!("Error computing critical path: {e}"),
            },
            "schedule" => {
                let mode = match parts.next().map(str::parse::<ScheduleMode>) {
                    None => ScheduleMode::AsapForward,
                    Some(Ok(mode)) => mode,
                    Some(Err(e)) => {
                        println!("{e}");
                        continue;
                    }
                };
                match project.auto_schedule(mode) {
                    Ok(outcome) => {
                        println!(
                            "{} change(s), {} conflict(s).",
                            outcome.changes.len(),
                            outcome.conflicts.len()
                        );
                        if !outcome.changes.is_empty() {
                            print_df(outcome.changes_dataframe());
                        }
                        if !outcome.conflicts.is_empty() {
                            print_df(outcome.conflicts_dataframe());
                        }
                        pending = Some(outcome);
                    }
                    Err(e) => println!("Error scheduling: {e}"),
                }
            }
            "apply" => match pending.take() {
                Some(outcome) => {
                    let applied = project.apply_changes(&outcome.changes);
                    println!("Applied {applied} change(s).");
                }
                None => println!("Nothing to apply; run 'schedule' first."),
            },
            "progress" => {
                let (Some(id), Some(pct)) = (
                    parse_id(parts.next()),
                    parts.next().and_then(|s| s.parse::<u8>().ok()),
                ) else {
                    println!("Usage: progress <id> <pct>");
                    continue;
                };
                match project.set_progress(id, pct) {
                    Ok(updates) => {
                        for update in updates {
                            println!("Task {}: {}% -> {}%", update.task_id, update.old, update.new);
                        }
                    }
                    Err(e) => println!("Error updating progress: {e}"),
                }
            }
            "rollup" => match project.rollup_progress() {
                Ok(updates) => println!("Rollup updated {} task(s).", updates.len()),
                Err(e) => println!("Error rolling up progress: {e}"),
            },
            "save" => {
                let (Some(format), Some(path)) = (parts.next(), parts.next()) else {
                    println!("Usage: save <json|csv> <path>");
                    continue;
                };
                let result = match format {
                    "json" => save_snapshot_to_json(&project, path),
                    "csv" => save_snapshot_to_csv(&project, path),
                    _ => {
                        println!("Unknown format '{format}'");
                        continue;
                    }
                };
                match result {
                    Ok(()) => println!("Project saved to {path}"),
                    Err(e) => println!("Error saving project: {e}"),
                }
            }
            "load" => {
                let (Some(format), Some(path)) = (parts.next(), parts.next()) else {
                    println!("Usage: load <json|csv> <path>");
                    continue;
                };
                let result = match format {
                    "json" => load_snapshot_from_json(path),
                    "csv" => load_snapshot_from_csv(path),
                    _ => {
                        println!("Unknown format '{format}'");
                        continue;
                    }
                };
                match result {
                    Ok(loaded) => {
                        project = loaded;
                        pending = None;
                        println!("Project loaded from {path}");
                        show(&project);
                    }
                    Err(e) => println!("Error loading project: {e}"),
                }
            }
            other => println!("Unknown command '{other}'; type 'help'."),
        }
    }
}
