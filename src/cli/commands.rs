//! CLI command definitions

use clap::Args;

/// Run a build plan
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the build plan YAML file
    #[arg(short, long)]
    pub file: String,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Working directory override (wins over the plan and RELPIPE_WORKDIR)
    #[arg(short, long)]
    pub workdir: Option<std::path::PathBuf>,

    /// Don't save the execution to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a build plan
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the build plan YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Scan the plan's log locations in an existing checkout
#[derive(Debug, Args, Clone)]
pub struct DiagnoseCommand {
    /// Path to the build plan YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List projects with recorded builds
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show build counts per project
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show build history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Project name to filter by
    #[arg(short, long)]
    pub project: Option<String>,

    /// Number of recent builds to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific execution by ID
    #[arg(long)]
    pub execution_id: Option<String>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
