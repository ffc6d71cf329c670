//! Post-build filesystem fixups
//!
//! Upstream dependency builds leave the install tree in shapes the main
//! build does not expect: a GC library installing headers flat instead of
//! nested, OpenSSL installing libraries outside the searched path, MSVC
//! import libraries named differently than FFmpeg's hardcoded expectation.
//! Each fixup copies files only when the problem signature is present and
//! the desired state is absent, so running them unconditionally on every
//! build is safe.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A declarative post-build repair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixupConfig {
    /// Copy headers from a flat install directory into the nested layout
    /// the main build includes from (e.g. `include/` -> `include/gc/`).
    CopyHeaders {
        from: PathBuf,
        to: PathBuf,
        #[serde(default = "default_header_extension")]
        extension: String,
    },

    /// Mirror libraries into a directory the main build actually searches.
    MirrorLibs {
        from: PathBuf,
        to: PathBuf,
        /// Filename patterns to mirror; `*` prefix matches a suffix
        /// (`*.lib`), anything else is an exact name. Empty means all files.
        #[serde(default)]
        patterns: Vec<String>,
    },

    /// Copy import libraries under the names a dependent build expects
    /// (e.g. `libssl.lib` -> `ssl.lib`).
    RenameImportLibs {
        dir: PathBuf,
        renames: BTreeMap<String, String>,
    },
}

fn default_header_extension() -> String {
    "h".to_string()
}

/// Outcome of applying a single fixup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixupOutcome {
    /// Copied `n` files into place
    Applied(usize),
    /// Desired state already present; nothing copied
    AlreadyInPlace,
    /// Problem signature absent (source directory missing)
    SourceMissing,
}

impl FixupConfig {
    /// Short label for logs and stage summaries
    pub fn label(&self) -> String {
        match self {
            FixupConfig::CopyHeaders { from, to, .. } => {
                format!("copy_headers {} -> {}", from.display(), to.display())
            }
            FixupConfig::MirrorLibs { from, to, .. } => {
                format!("mirror_libs {} -> {}", from.display(), to.display())
            }
            FixupConfig::RenameImportLibs { dir, .. } => {
                format!("rename_import_libs in {}", dir.display())
            }
        }
    }

    /// Apply the fixup against the tree rooted at `root`.
    pub fn apply(&self, root: &Path) -> io::Result<FixupOutcome> {
        match self {
            FixupConfig::CopyHeaders {
                from,
                to,
                extension,
            } => {
                let from = root.join(from);
                if !from.is_dir() {
                    return Ok(FixupOutcome::SourceMissing);
                }
                let to = root.join(to);
                let mut copied = 0;
                for entry in sorted_entries(&from)? {
                    if !entry.is_file() {
                        continue;
                    }
                    if entry.extension().and_then(|e| e.to_str()) != Some(extension.as_str()) {
                        continue;
                    }
                    let name = entry.file_name().unwrap_or_default();
                    let dest = to.join(name);
                    if dest.exists() {
                        continue;
                    }
                    fs::create_dir_all(&to)?;
                    fs::copy(&entry, &dest)?;
                    copied += 1;
                }
                Ok(done(copied))
            }
            FixupConfig::MirrorLibs { from, to, patterns } => {
                let from = root.join(from);
                if !from.is_dir() {
                    return Ok(FixupOutcome::SourceMissing);
                }
                let to = root.join(to);
                let mut copied = 0;
                for entry in sorted_entries(&from)? {
                    if !entry.is_file() {
                        continue;
                    }
                    let name = match entry.file_name().and_then(|n| n.to_str()) {
                        Some(n) => n.to_string(),
                        None => continue,
                    };
                    if !patterns.is_empty() && !patterns.iter().any(|p| matches_pattern(p, &name)) {
                        continue;
                    }
                    let dest = to.join(&name);
                    if dest.exists() {
                        continue;
                    }
                    fs::create_dir_all(&to)?;
                    fs::copy(&entry, &dest)?;
                    copied += 1;
                }
                Ok(done(copied))
            }
            FixupConfig::RenameImportLibs { dir, renames } => {
                let dir = root.join(dir);
                if !dir.is_dir() {
                    return Ok(FixupOutcome::SourceMissing);
                }
                let mut copied = 0;
                for (produced, expected) in renames {
                    let src = dir.join(produced);
                    let dest = dir.join(expected);
                    if !src.is_file() || dest.exists() {
                        continue;
                    }
                    fs::copy(&src, &dest)?;
                    copied += 1;
                }
                Ok(done(copied))
            }
        }
    }
}

fn done(copied: usize) -> FixupOutcome {
    if copied == 0 {
        FixupOutcome::AlreadyInPlace
    } else {
        FixupOutcome::Applied(copied)
    }
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == pattern,
    }
}
