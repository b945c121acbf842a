// src/lib.rs

pub mod archive;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod model;
pub mod storage;
pub mod types;

use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::cli::{CliArgs, Command, DepthArgs, FilterArgs};
use crate::config::load_or_default;
use crate::dag::Reached;
use crate::engine::Engine;
use crate::model::{FilterState, NewTask, Task};
use crate::types::{parse_task_id, short_id};

pub use crate::engine::{PruneResult, TaskQueue};
pub use crate::errors::{ErrorKind, TaskGraphError};
pub use crate::model::TaskStatus;

/// High-level entry point used by `main.rs`.
///
/// Loads the config, opens the engine and runs exactly one subcommand.
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(&args.config)?;
    if let Some(db) = &args.db {
        cfg.storage.path = db.clone();
    }
    debug!(db = %cfg.storage.path.display(), "opening engine");

    let engine = Engine::open(&cfg).await?;
    let queue = engine.queue();
    let traversal = engine.traversal();
    let json = args.json;

    match args.command {
        Command::Add(add) => {
            let mut req = NewTask::new(add.description, add.agent_type, add.source);
            for raw in &add.after {
                req = req.after(parse_task_id(raw)?);
            }
            req.summary = add.summary;
            req.feature_branch = add.feature_branch;
            req.estimated_duration = add.estimate_ms.map(Duration::from_millis);
            req.priority = add.priority;
            print_task(json, &queue.enqueue(req).await?)?;
        }
        Command::Start { id } => print_task(json, &queue.start(parse_task_id(&id)?).await?)?,
        Command::Complete { id } => {
            print_task(json, &queue.complete(parse_task_id(&id)?).await?)?
        }
        Command::Fail { id, reason } => {
            print_task(json, &queue.fail(parse_task_id(&id)?, &reason).await?)?
        }
        Command::Cancel { id } => print_task(json, &queue.cancel(parse_task_id(&id)?).await?)?,
        Command::Unblock { id } => print_task(json, &queue.unblock(parse_task_id(&id)?).await?)?,
        Command::Depend {
            dependent,
            prerequisite,
            replace,
        } => {
            let dependent = parse_task_id(&dependent)?;
            let prerequisite = parse_task_id(&prerequisite)?;
            let task = match replace {
                Some(old) => {
                    queue
                        .replace_dependency(dependent, parse_task_id(&old)?, prerequisite)
                        .await?
                }
                None => queue.add_dependency(dependent, prerequisite).await?,
            };
            print_task(json, &task)?;
        }
        Command::Undepend {
            dependent,
            prerequisite,
        } => {
            let task = queue
                .remove_dependency(parse_task_id(&dependent)?, parse_task_id(&prerequisite)?)
                .await?;
            print_task(json, &task)?;
        }
        Command::List(filter) => {
            let tasks = queue.list_filtered(&build_filter(&filter)?).await?;
            print_tasks(json, &tasks)?;
        }
        Command::Show { id } => {
            let id = parse_task_id(&id)?;
            let task = queue.get(id).await?;
            let history = queue.history(id).await?;
            if json {
                print_json(&serde_json::json!({ "task": task, "history": history }))?;
            } else {
                print_task(false, &task)?;
                for entry in history {
                    let from = entry.from_status.map(|s| s.to_string()).unwrap_or_default();
                    println!(
                        "  {} {:>9} -> {:<9} {}",
                        entry.recorded_at.to_rfc3339(),
                        from,
                        entry.to_status,
                        entry.note.unwrap_or_default()
                    );
                }
            }
        }
        Command::Ancestors(DepthArgs { id, max_depth }) => {
            let reached = traversal.ancestors(parse_task_id(&id)?, max_depth).await?;
            print_reached(json, &reached)?;
        }
        Command::Descendants(DepthArgs { id, max_depth }) => {
            let reached = traversal.descendants(parse_task_id(&id)?, max_depth).await?;
            print_reached(json, &reached)?;
        }
        Command::CriticalPath { id } => {
            let path = traversal.critical_path(parse_task_id(&id)?).await?;
            if json {
                print_json(&path)?;
            } else {
                for task in &path.tasks {
                    println!("{}", task_line(task));
                }
                println!(
                    "total: {:.3}s",
                    Duration::from_millis(path.total_duration_ms).as_secs_f64()
                );
            }
        }
        Command::Orphans => print_tasks(json, &traversal.orphaned().await?)?,
        Command::Leaves => print_tasks(json, &traversal.leaves().await?)?,
        Command::Tree(DepthArgs { id, max_depth }) => {
            let tree = traversal.render_tree(parse_task_id(&id)?, max_depth).await?;
            if json {
                print_json(&serde_json::json!({ "tree": tree }))?;
            } else {
                print!("{tree}");
            }
        }
        Command::Prune {
            filter,
            recursive,
            dry_run,
        } => {
            let result = queue
                .prune(&build_filter(&filter)?, recursive, dry_run)
                .await?;
            print_prune(json, &result)?;
        }
        Command::Verify { path } => {
            let report = engine.archiver().verify(&path).await?;
            if json {
                print_json(&report)?;
            } else {
                println!("{}: {}", report.path.display(), if report.valid { "valid" } else { "INVALID" });
                println!("  version:      {}", report.version.as_deref().unwrap_or("?"));
                println!("  tasks:        {}", report.task_count);
                println!("  dependencies: {}", report.dependency_count);
                println!("  size:         {} bytes", report.file_size);
                println!("  blake3:       {}", report.checksum);
                for err in &report.errors {
                    println!("  error: {err}");
                }
            }
            if !report.valid {
                anyhow::bail!("archive {} failed verification", report.path.display());
            }
        }
    }

    Ok(())
}

fn build_filter(args: &FilterArgs) -> Result<FilterState> {
    let mut builder = FilterState::builder();
    if let Some(raw) = &args.status {
        builder = builder.statuses_from_str(raw)?;
    }
    if let Some(needle) = &args.agent_type {
        builder = builder.agent_type(needle);
    }
    if let Some(needle) = &args.feature_branch {
        builder = builder.feature_branch(needle);
    }
    if let Some(needle) = &args.search {
        builder = builder.search(needle);
    }
    Ok(builder.build())
}

fn task_line(task: &Task) -> String {
    format!(
        "{} [{}] {} ({})",
        short_id(&task.id),
        task.status,
        task.description,
        task.agent_type
    )
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_task(json: bool, task: &Task) -> Result<()> {
    if json {
        return print_json(task);
    }
    println!("{}", task.id);
    println!("{}", task_line(task));
    Ok(())
}

fn print_tasks(json: bool, tasks: &[Task]) -> Result<()> {
    if json {
        return print_json(tasks);
    }
    for task in tasks {
        println!("{}", task_line(task));
    }
    Ok(())
}

fn print_reached(json: bool, reached: &[Reached]) -> Result<()> {
    if json {
        return print_json(reached);
    }
    for r in reached {
        println!("{:>3}  {}", r.depth, task_line(&r.task));
    }
    Ok(())
}

fn print_prune(json: bool, result: &PruneResult) -> Result<()> {
    if json {
        return print_json(result);
    }
    let verb = if result.dry_run { "would delete" } else { "deleted" };
    println!("{verb} {} task(s)", result.tasks.len());
    print!("{}", result.preview);
    for skip in &result.skipped {
        println!("skipped {}: {}", short_id(&skip.task_id), skip.reason);
    }
    if let Some(path) = &result.archive_path {
        println!("archive: {}", path.display());
    }
    Ok(())
}
