//! Failure diagnostics
//!
//! When a build stage fails, candidate log locations are scanned for
//! lines matching the plan's error pattern and bounded head/tail excerpts
//! are surfaced. This is a diagnostic aid for the human re-running the
//! pipeline, never a recovery mechanism.

use crate::core::config::{DiagnosticsConfig, LogLocation};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Matching lines from one log file, bounded head/tail
#[derive(Debug, Clone)]
pub struct LogExcerpt {
    /// The log file scanned
    pub path: PathBuf,

    /// Total number of matching lines in the file
    pub total_matches: usize,

    /// First N matching lines
    pub head: Vec<String>,

    /// Last N matching lines (empty when head already covers everything)
    pub tail: Vec<String>,
}

/// Scan the configured log locations under `source_dir`.
///
/// Unreadable or missing logs are skipped; the pipeline already failed
/// and diagnostics must not mask the original error.
pub fn collect(config: &DiagnosticsConfig, source_dir: &Path) -> Vec<LogExcerpt> {
    let pattern = match Regex::new(&config.error_pattern) {
        Ok(p) => p,
        // Validated at plan load; a bad pattern here only loses excerpts.
        Err(_) => return Vec::new(),
    };

    let mut excerpts = Vec::new();

    for location in &config.logs {
        match location {
            LogLocation::File { path } => {
                let path = source_dir.join(path);
                if let Some(excerpt) = scan_file(&path, &pattern, config.excerpt_lines) {
                    excerpts.push(excerpt);
                }
            }
            LogLocation::Matching { dir, name_pattern } => {
                let name_regex = match Regex::new(name_pattern) {
                    Ok(r) => r,
                    Err(_) => continue,
                };
                let dir = source_dir.join(dir);
                if !dir.is_dir() {
                    debug!("Log directory {} not present", dir.display());
                    continue;
                }

                let mut candidates: Vec<PathBuf> = WalkDir::new(&dir)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| {
                        e.file_name()
                            .to_str()
                            .is_some_and(|name| name_regex.is_match(name))
                    })
                    .map(|e| e.into_path())
                    .collect();
                candidates.sort();

                for candidate in candidates {
                    if let Some(excerpt) = scan_file(&candidate, &pattern, config.excerpt_lines) {
                        excerpts.push(excerpt);
                    }
                }
            }
        }
    }

    excerpts
}

fn scan_file(path: &Path, pattern: &Regex, bound: usize) -> Option<LogExcerpt> {
    let content = fs::read_to_string(path).ok()?;

    let matches: Vec<String> = content
        .lines()
        .filter(|line| pattern.is_match(line))
        .map(|line| line.to_string())
        .collect();

    if matches.is_empty() {
        return None;
    }

    let total = matches.len();
    let (head, tail) = if total <= bound * 2 {
        (matches, Vec::new())
    } else {
        let head = matches[..bound].to_vec();
        let tail = matches[total - bound..].to_vec();
        (head, tail)
    };

    Some(LogExcerpt {
        path: path.to_path_buf(),
        total_matches: total,
        head,
        tail,
    })
}
