//! CLI output formatting

use crate::{
    core::{ExecutionStatus, StageState},
    execution::BuildEvent,
    persistence::ExecutionSummary,
    stages::LogExcerpt,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "# ");

/// Create a progress bar over the stage count
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a stage state for display
pub fn format_stage_state(state: &StageState) -> String {
    match state {
        StageState::Pending => style("PENDING").dim().to_string(),
        StageState::Running { .. } => style("RUNNING").yellow().to_string(),
        StageState::Completed { .. } => style("COMPLETED").green().to_string(),
        StageState::Failed { .. } => style("FAILED").red().to_string(),
        StageState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        _ => INFO,
    };

    format!(
        "{} {} - {} {} [{}] - {} ({}/{}) - {}",
        status_icon,
        style(&summary.execution_id.to_string()[..8]).dim(),
        style(&summary.project).bold(),
        style(&summary.tag).cyan(),
        style(&summary.platform).dim(),
        format_status(summary.status),
        summary.completed_stages,
        summary.total_stages,
        style(format!("{:.0}%", summary.progress * 100.0)).cyan()
    )
}

/// Format a build event for display
pub fn format_build_event(event: &BuildEvent) -> String {
    match event {
        BuildEvent::PipelineStarted {
            execution_id,
            project,
            tag,
        } => format!(
            "{} Building {} at {} ({})",
            ROCKET,
            style(project).bold(),
            style(tag).cyan(),
            style(&execution_id.to_string()[..8]).dim()
        ),
        BuildEvent::StageStarted { stage_name, .. } => {
            format!("{} {}", SPINNER, style(stage_name).cyan())
        }
        BuildEvent::StageCompleted { stage_id, summary } => {
            format!(
                "{} {} - {}",
                CHECK,
                style(stage_id).green(),
                style(summary).dim()
            )
        }
        BuildEvent::StageWarning { stage_id, warning } => {
            format!("{} {}: {}", WARN, style(stage_id).yellow(), warning)
        }
        BuildEvent::StageFailed { stage_id, error } => {
            format!("{} {}: {}", CROSS, style(stage_id).red(), style(error).dim())
        }
        BuildEvent::DiagnosticsCollected { excerpts, .. } => {
            if excerpts.is_empty() {
                format!("{} No matching error lines found in build logs", INFO)
            } else {
                format!(
                    "{} Error lines found in {} build log(s):\n{}",
                    INFO,
                    excerpts.len(),
                    excerpts
                        .iter()
                        .map(format_log_excerpt)
                        .collect::<Vec<_>>()
                        .join("\n")
                )
            }
        }
        BuildEvent::PipelineCompleted {
            execution_id,
            status,
            artifact,
        } => match (status, artifact) {
            (ExecutionStatus::Completed, Some(artifact)) => format!(
                "{} Build ({}) completed: {}",
                PACKAGE,
                style(&execution_id.to_string()[..8]).dim(),
                style(artifact).bold()
            ),
            (ExecutionStatus::Failed, _) => format!(
                "{} Build ({}) {}",
                INFO,
                style(&execution_id.to_string()[..8]).dim(),
                style("failed").red()
            ),
            (status, _) => format!(
                "{} Build ({}) {:?}",
                INFO,
                style(&execution_id.to_string()[..8]).dim(),
                status
            ),
        },
    }
}

/// Format one log excerpt for display
pub fn format_log_excerpt(excerpt: &LogExcerpt) -> String {
    let mut out = format!(
        "  {} ({} matching line{})",
        style(excerpt.path.display()).bold(),
        excerpt.total_matches,
        if excerpt.total_matches == 1 { "" } else { "s" }
    );

    for line in &excerpt.head {
        out.push_str(&format!("\n    {}", line));
    }
    if !excerpt.tail.is_empty() {
        let elided = excerpt.total_matches - excerpt.head.len() - excerpt.tail.len();
        out.push_str(&format!(
            "\n    {}",
            style(format!("... {} more ...", elided)).dim()
        ));
        for line in &excerpt.tail {
            out.push_str(&format!("\n    {}", line));
        }
    }

    out
}
