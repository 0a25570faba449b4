use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::ignore::IgnoreMatcher;

/// Configuration for one search run, immutable after parsing.
///
/// Can be loaded from YAML files at three locations in order of
/// precedence:
/// 1. Custom config file specified via `--config`
/// 2. Local `.scour.yaml` in the current directory
/// 3. Global `$HOME/.config/scour/config.yaml`
///
/// CLI arguments take precedence over config file values; the merging
/// behavior is defined in [`SearchOptions::merge_with_cli`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Report directories whose name matches the pattern.
    #[serde(default)]
    pub find_dirs: bool,

    /// Report files whose name matches the pattern.
    #[serde(default)]
    pub find_files: bool,

    /// Search file contents for the pattern as a substring.
    #[serde(default)]
    pub content_substr: bool,

    /// Search file contents with the regex pattern.
    #[serde(default)]
    pub content_regex: bool,

    /// Search raw bytes, including binary files; presence-only results.
    #[serde(default)]
    pub raw_bytes: bool,

    /// Name pattern (glob text, or fuzzy target when `fuzzy` is set),
    /// also the substring for content search.
    #[serde(default)]
    pub pattern: String,

    /// Content regex pattern, independent of `pattern`.
    #[serde(default)]
    pub regex_pattern: String,

    /// Case-insensitive matching for names and contents.
    #[serde(default)]
    pub case_insensitive: bool,

    /// Use edit-distance name matching instead of glob.
    #[serde(default)]
    pub fuzzy: bool,

    /// Maximum edit distance for a fuzzy name match; `None` means the
    /// default of [`DEFAULT_FUZZY_THRESHOLD`].
    #[serde(default)]
    pub fuzzy_threshold: Option<usize>,

    /// Worker-pool size for content scanning; `None` means one worker
    /// per CPU. Kept as an `Option` so a value from a config file
    /// survives [`merge_with_cli`] when the CLI omits the flag.
    ///
    /// [`merge_with_cli`]: SearchOptions::merge_with_cli
    #[serde(default)]
    pub threads: Option<NonZeroUsize>,

    /// Root directories to walk; empty means the current directory.
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Ignore-rule file loaded before the run starts.
    #[serde(default)]
    pub ignore_file: Option<PathBuf>,

    /// Show a periodic status line during the run.
    #[serde(default)]
    pub progress: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Loaded ignore rules; built from `ignore_file` by [`load_ignore`].
    ///
    /// [`load_ignore`]: SearchOptions::load_ignore
    #[serde(skip)]
    pub ignore: IgnoreMatcher,
}

/// Edit distance allowed by fuzzy name matching when no threshold is set.
pub const DEFAULT_FUZZY_THRESHOLD: usize = 2;

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            find_dirs: false,
            find_files: false,
            content_substr: false,
            content_regex: false,
            raw_bytes: false,
            pattern: String::new(),
            regex_pattern: String::new(),
            case_insensitive: false,
            fuzzy: false,
            fuzzy_threshold: None,
            threads: None,
            roots: Vec::new(),
            ignore_file: None,
            progress: false,
            log_level: default_log_level(),
            ignore: IgnoreMatcher::default(),
        }
    }
}

impl SearchOptions {
    /// Loads configuration from the default locations.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally including a specific file.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("scour/config.yaml")),
            // Local config
            Some(PathBuf::from(".scour.yaml")),
            // Custom config
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments over configuration file values.
    pub fn merge_with_cli(mut self, cli: SearchOptions) -> Self {
        self.find_dirs |= cli.find_dirs;
        self.find_files |= cli.find_files;
        self.content_substr |= cli.content_substr;
        self.content_regex |= cli.content_regex;
        self.raw_bytes |= cli.raw_bytes;
        self.case_insensitive |= cli.case_insensitive;
        self.fuzzy |= cli.fuzzy;
        self.progress |= cli.progress;
        if !cli.pattern.is_empty() {
            self.pattern = cli.pattern;
        }
        if !cli.regex_pattern.is_empty() {
            self.regex_pattern = cli.regex_pattern;
        }
        // Only override when the flag was actually given, so config
        // file values survive the merge for omitted flags.
        if cli.fuzzy_threshold.is_some() {
            self.fuzzy_threshold = cli.fuzzy_threshold;
        }
        if cli.threads.is_some() {
            self.threads = cli.threads;
        }
        if !cli.roots.is_empty() {
            self.roots = cli.roots;
        }
        if cli.ignore_file.is_some() {
            self.ignore_file = cli.ignore_file;
        }
        if cli.log_level != default_log_level() {
            self.log_level = cli.log_level;
        }
        self
    }

    /// Builds the ignore matcher from `ignore_file`, if any.
    pub fn load_ignore(&mut self) {
        if let Some(path) = &self.ignore_file {
            self.ignore = IgnoreMatcher::load(path);
        }
    }

    /// Worker-pool size, one worker per CPU when unset.
    pub fn thread_count(&self) -> usize {
        self.threads
            .map(NonZeroUsize::get)
            .unwrap_or_else(|| num_cpus::get().max(1))
    }

    /// Fuzzy edit-distance threshold with the default applied.
    pub fn fuzzy_distance(&self) -> usize {
        self.fuzzy_threshold.unwrap_or(DEFAULT_FUZZY_THRESHOLD)
    }

    /// Whether any content-search mode is enabled.
    pub fn wants_content_search(&self) -> bool {
        self.content_substr || self.content_regex || self.raw_bytes
    }

    /// Root list with the default current directory applied.
    pub fn effective_roots(&self) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.roots.clone()
        }
    }
}
