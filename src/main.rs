mod cli;
mod core;
mod execution;
mod persistence;
mod runner;
mod stages;

use anyhow::{Context, Result};
use cli::commands::{DiagnoseCommand, HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use cli::output::*;
use cli::{Cli, Command};
use core::ExecutionStatus;
use execution::{BuildEvent, ExecutionEngine};
use persistence::{create_summary, ExecutionSummary, PersistenceBackend};
use runner::ShellRunner;
use std::collections::HashMap;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_build(cmd).await?,
        Command::Validate(cmd) => validate_plan(cmd)?,
        Command::Diagnose(cmd) => diagnose(cmd)?,
        Command::List(cmd) => list_projects(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// `RELPIPE_*` variables from the process environment
fn env_overrides() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("RELPIPE_"))
        .collect()
}

async fn run_build(cmd: &RunCommand) -> Result<()> {
    // Load the plan and apply environment overrides
    let mut plan =
        core::config::BuildPlan::from_file(&cmd.file).context("Failed to load build plan")?;
    plan.apply_overrides(&env_overrides())?;
    if let Some(workdir) = &cmd.workdir {
        plan.workdir = Some(workdir.clone());
    }

    // Apply variable overrides
    for (key, value) in &cmd.variable {
        plan.variables.insert(key.clone(), value.clone());
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    println!(
        "{} Loaded plan: {} {} for {}",
        INFO,
        style(&plan.project).bold(),
        style(&plan.tag).cyan(),
        style(&plan.platform).dim()
    );

    let mut pipeline = plan.to_pipeline();

    // Set up persistence
    let store: Option<Box<dyn PersistenceBackend>> = if cmd.no_history {
        None
    } else {
        open_store().await?
    };

    // Create execution engine over the real shell runner
    let engine = ExecutionEngine::new(ShellRunner::new());

    // Console output: event lines above a stage progress bar
    let progress = create_progress_bar(pipeline.stage_ids().len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        bar.println(format_build_event(&event));
        if matches!(
            event,
            BuildEvent::StageCompleted { .. } | BuildEvent::StageFailed { .. }
        ) {
            bar.inc(1);
        }
    });

    engine.execute(&mut pipeline).await;
    progress.finish_and_clear();

    // Save to history
    if let Some(store) = &store {
        let summary = create_summary(&pipeline);
        store.save_execution(&summary).await?;
        println!(
            "{} Execution saved to history (ID: {})",
            INFO,
            style(&summary.execution_id.to_string()[..8]).dim()
        );
    }

    // Print final status
    if pipeline.state.status == ExecutionStatus::Completed {
        println!(
            "\n{} {} {} built {}",
            CHECK,
            style(&pipeline.plan.project).bold(),
            style(&pipeline.plan.tag).cyan(),
            style("successfully").green()
        );
        if let Some(artifact) = &pipeline.artifact {
            println!("{} Artifact: {}", PACKAGE, style(artifact).bold());
        }
    } else {
        println!(
            "\n{} {} {} {}",
            CROSS,
            style(&pipeline.plan.project).bold(),
            style(&pipeline.plan.tag).cyan(),
            style("failed").red()
        );
        std::process::exit(1);
    }

    Ok(())
}

fn validate_plan(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating build plan...", INFO);

    let result = core::config::BuildPlan::from_file(&cmd.file);

    match result {
        Ok(plan) => {
            println!("{} Build plan is valid!", CHECK);
            println!("  Project: {}", style(&plan.project).bold());
            println!("  Tag: {}", style(&plan.tag).cyan());
            println!("  Platform: {}", style(&plan.platform).cyan());
            println!(
                "  Stages: {}",
                style(core::pipeline::stage_ids_for_plan(&plan).join(", ")).cyan()
            );
            println!("  Artifact: {}", style(plan.artifact_name()).bold());

            if cmd.json {
                let json = serde_json::to_string_pretty(&plan)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

fn diagnose(cmd: &DiagnoseCommand) -> Result<()> {
    let mut plan =
        core::config::BuildPlan::from_file(&cmd.file).context("Failed to load build plan")?;
    plan.apply_overrides(&env_overrides())?;

    let ctx = core::BuildContext::new(plan);
    if !ctx.source_dir.is_dir() {
        println!(
            "{} No checkout found at {}",
            WARN,
            style(ctx.source_dir.display()).bold()
        );
        std::process::exit(1);
    }

    let excerpts = stages::diagnostics::collect(&ctx.plan.diagnostics, &ctx.source_dir);

    if cmd.json {
        let data: Vec<serde_json::Value> = excerpts
            .iter()
            .map(|e| {
                serde_json::json!({
                    "path": e.path.display().to_string(),
                    "total_matches": e.total_matches,
                    "head": e.head,
                    "tail": e.tail,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "excerpts": data }))?
        );
        return Ok(());
    }

    if excerpts.is_empty() {
        println!("{} No matching error lines found in build logs", INFO);
    } else {
        println!(
            "{} Error lines found in {} build log(s):",
            INFO,
            excerpts.len()
        );
        for excerpt in &excerpts {
            println!("{}", format_log_excerpt(excerpt));
        }
    }

    Ok(())
}

async fn list_projects(cmd: &ListCommand) -> Result<()> {
    let store = match open_store().await? {
        Some(store) => store,
        None => {
            println!("{} Build without the sqlite feature keeps no history", WARN);
            return Ok(());
        }
    };
    let projects = store.list_projects().await?;

    if projects.is_empty() {
        println!("{} No projects found in history", INFO);
        return Ok(());
    }

    println!("{} Projects in history:", INFO);

    for project in &projects {
        let executions = store.list_executions(project).await?;

        if cmd.with_counts {
            let completed = executions
                .iter()
                .filter(|e| e.status == ExecutionStatus::Completed)
                .count();
            let failed = executions
                .iter()
                .filter(|e| e.status == ExecutionStatus::Failed)
                .count();
            println!(
                "  {} ({} builds: {} succeeded, {} failed)",
                style(project).bold(),
                style(executions.len()).cyan(),
                style(completed).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(project).bold());
        }
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for project in &projects {
            let executions = store.list_executions(project).await.ok();
            json_data.push(serde_json::json!({
                "project": project,
                "build_count": executions.as_ref().map(|e| e.len()).unwrap_or(0)
            }));
        }
        let data = serde_json::json!({ "projects": json_data });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = match open_store().await? {
        Some(store) => store,
        None => {
            println!("{} Build without the sqlite feature keeps no history", WARN);
            return Ok(());
        }
    };

    // If a specific execution ID is requested
    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id =
            uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;
        let summary = store.load_execution(exec_id).await?;

        match summary {
            Some(summary) => {
                print_execution_details(&summary, cmd.verbose)?;
            }
            None => {
                println!("{} Execution not found", WARN);
            }
        }
        return Ok(());
    }

    // List builds for one project or all
    let executions = if let Some(project) = &cmd.project {
        store.list_executions(project).await?
    } else {
        let projects = store.list_projects().await?;
        let mut all_execs = Vec::new();
        for project in &projects {
            all_execs.extend(store.list_executions(project).await?);
        }
        all_execs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_execs.into_iter().take(cmd.limit).collect()
    };

    if executions.is_empty() {
        println!("{} No builds found", INFO);
        return Ok(());
    }

    println!("{} Build history (showing latest {}):", INFO, cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        for summary in &executions {
            println!("  {}", format_execution_summary(summary));
        }
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<Option<Box<dyn PersistenceBackend>>> {
    let store = persistence::SqliteExecutionStore::with_default_path().await?;
    Ok(Some(Box::new(store)))
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<Option<Box<dyn PersistenceBackend>>> {
    Ok(None)
}

fn print_execution_details(summary: &ExecutionSummary, verbose: bool) -> Result<()> {
    println!("{} Build Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Project: {}", style(&summary.project).bold());
    println!("  Tag: {}", style(&summary.tag).cyan());
    println!("  Platform: {}", style(&summary.platform).cyan());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Progress: {} ({}/{})",
        style(format!("{:.0}%", summary.progress * 100.0)).cyan(),
        summary.completed_stages,
        summary.total_stages
    );
    if let Some(artifact) = &summary.artifact {
        println!("  Artifact: {}", style(artifact).bold());
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
