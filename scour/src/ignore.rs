//! Gitignore-style exclusion rules: an ordered rule list loaded from a
//! line-oriented file, evaluated with last-match-wins semantics so later
//! rules (including negations) override earlier ones.

use crate::patterns::matches_glob;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One parsed line of an ignore file.
///
/// The control characters (`!`, trailing `/`, leading `/`) are stripped
/// before the pattern is stored.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    pub pattern: String,
    /// Set by a leading `!`: a matching entry is re-included.
    pub negation: bool,
    /// Set by a trailing `/`: the rule only matches directories.
    pub directory_only: bool,
    /// Set by a leading `/`: the rule only matches relative to the root.
    pub anchored: bool,
}

/// Ordered sequence of [`IgnoreRule`], insertion order = file order.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
    /// Loads rules from a line-oriented ignore file.
    ///
    /// An unreadable file is not an error; the matcher simply holds zero
    /// rules and every path passes.
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!("ignore file {} not loaded: {}", path.display(), e);
                return Self::default();
            }
        };
        Self::parse(&contents)
    }

    /// Parses ignore rules from text, one rule per line.
    pub fn parse(contents: &str) -> Self {
        let mut rules = Vec::new();
        for line in contents.lines() {
            let mut line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let negation = if let Some(rest) = line.strip_prefix('!') {
                line = rest;
                true
            } else {
                false
            };
            let directory_only = if let Some(rest) = line.strip_suffix('/') {
                line = rest;
                true
            } else {
                false
            };
            let anchored = if let Some(rest) = line.strip_prefix('/') {
                line = rest;
                true
            } else {
                false
            };
            rules.push(IgnoreRule {
                pattern: line.to_string(),
                negation,
                directory_only,
                anchored,
            });
        }
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Returns whether `entry` is excluded relative to `root`.
    ///
    /// Every rule is evaluated in file order; each matching rule sets the
    /// running verdict (`true`, or `false` for a negation), and the verdict
    /// after the last matching rule wins. `is_dir` comes from the traversal
    /// step rather than a fresh metadata query.
    pub fn is_ignored(&self, root: &Path, entry: &Path, is_dir: bool) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        let rel = relative_slash_path(root, entry);
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut ignored = false;
        for rule in &self.rules {
            if match_rule(rule, &rel, &name, is_dir) {
                ignored = !rule.negation;
            }
        }
        ignored
    }
}

/// Computes `entry` relative to `root` with forward-slash separators.
/// Falls back to the entry's own path when it is not under `root`.
fn relative_slash_path(root: &Path, entry: &Path) -> String {
    let rel = entry.strip_prefix(root).unwrap_or(entry);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn match_rule(rule: &IgnoreRule, rel: &str, name: &str, is_dir: bool) -> bool {
    if rule.directory_only && !is_dir {
        return false;
    }

    if rule.anchored {
        return matches_glob(rel, &rule.pattern, false);
    }

    // Unanchored: full relative path, base name, or any single segment.
    if matches_glob(rel, &rule.pattern, false) {
        return true;
    }
    if matches_glob(name, &rule.pattern, false) {
        return true;
    }
    rel.split('/')
        .any(|segment| matches_glob(segment, &rule.pattern, false))
}
