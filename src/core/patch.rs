//! Source patch engine
//!
//! Patches are exact text substitutions applied to named files in the
//! freshly checked-out tree, in the order they appear in the plan. Each
//! patch declares its criticality: a `required` patch whose context is
//! missing fails the pipeline, an optional one is logged and skipped.
//! Upstream tags drift, so not every fix is load-bearing for every tag.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// A single text-substitution patch against a file in the source tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    /// File to patch, relative to the source tree root
    pub file: String,

    /// Exact text expected in the pre-patch file
    pub find: String,

    /// Replacement text
    pub replace: String,

    /// Whether missing context is fatal
    #[serde(default)]
    pub required: bool,

    /// Optional note shown in logs when the patch is applied
    #[serde(default)]
    pub reason: Option<String>,
}

/// Outcome of applying a single patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The expected context was found and replaced
    Applied,
    /// The replacement text is already present; nothing to do
    AlreadyApplied,
    /// Neither the expected context nor the replacement was found
    ContextMissing,
}

/// Apply one patch to the tree rooted at `root`.
///
/// Substitutes the first occurrence of `find` with `replace`. A file that
/// already contains the replacement (and no longer the original context)
/// counts as already applied, so re-running against a cached checkout is a
/// no-op. A missing file counts as missing context.
pub fn apply_patch(root: &Path, patch: &PatchConfig) -> io::Result<PatchOutcome> {
    let path = root.join(&patch.file);

    if !path.is_file() {
        return Ok(PatchOutcome::ContextMissing);
    }

    let content = fs::read_to_string(&path)?;

    if let Some(pos) = content.find(&patch.find) {
        let mut patched = String::with_capacity(content.len());
        patched.push_str(&content[..pos]);
        patched.push_str(&patch.replace);
        patched.push_str(&content[pos + patch.find.len()..]);
        fs::write(&path, patched)?;
        return Ok(PatchOutcome::Applied);
    }

    if content.contains(&patch.replace) {
        return Ok(PatchOutcome::AlreadyApplied);
    }

    Ok(PatchOutcome::ContextMissing)
}
