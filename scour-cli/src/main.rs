use clap::Parser;
use colored::Colorize;
use scour::{SearchError, SearchMatch, SearchOptions, Searcher};
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Concurrent filesystem name and content search.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Match directory names against this pattern
    #[arg(short = 'd', long = "dirs", value_name = "PATTERN")]
    dirs: Option<String>,

    /// Match file names against this pattern
    #[arg(short = 'f', long = "files", value_name = "PATTERN")]
    files: Option<String>,

    /// Search file contents for this substring
    #[arg(short = 'z', long = "content", value_name = "PATTERN")]
    content: Option<String>,

    /// Search file contents with this regular expression
    #[arg(short = 'R', long = "regex", value_name = "REGEX")]
    regex: Option<String>,

    /// Search raw bytes, including binary files (presence only)
    #[arg(short = 'b', long = "raw", value_name = "PATTERN")]
    raw: Option<String>,

    /// Use edit-distance name matching instead of glob
    #[arg(long)]
    fuzzy: bool,

    /// Maximum edit distance for a fuzzy match (default 2)
    #[arg(long, value_name = "N")]
    fuzzy_threshold: Option<usize>,

    /// Case-insensitive matching
    #[arg(short = 'i', long = "ignore-case")]
    ignore_case: bool,

    /// Number of worker threads (0 is treated as 1)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Ignore-rule file (gitignore-style)
    #[arg(long, value_name = "PATH")]
    ignore_file: Option<PathBuf>,

    /// Emit one JSON object per result
    #[arg(long)]
    json: bool,

    /// Emit all results as a single JSON array
    #[arg(long)]
    json_array: bool,

    /// Disable ANSI color in plain output
    #[arg(long)]
    no_color: bool,

    /// Show a periodic status line while searching
    #[arg(long)]
    progress: bool,

    /// Configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Root directories to search (default: current directory)
    roots: Vec<PathBuf>,
}

impl Cli {
    fn into_options(self) -> anyhow::Result<SearchOptions> {
        let mut cli_opts = SearchOptions::default();

        if let Some(pattern) = &self.dirs {
            cli_opts.find_dirs = true;
            cli_opts.pattern = pattern.clone();
        }
        if let Some(pattern) = &self.files {
            cli_opts.find_files = true;
            cli_opts.pattern = pattern.clone();
        }
        if let Some(pattern) = &self.content {
            cli_opts.content_substr = true;
            cli_opts.pattern = pattern.clone();
        }
        if let Some(pattern) = &self.raw {
            cli_opts.raw_bytes = true;
            cli_opts.pattern = pattern.clone();
        }
        if let Some(regex) = &self.regex {
            cli_opts.content_regex = true;
            cli_opts.regex_pattern = regex.clone();
        }
        cli_opts.fuzzy = self.fuzzy;
        cli_opts.fuzzy_threshold = self.fuzzy_threshold;
        cli_opts.case_insensitive = self.ignore_case;
        cli_opts.progress = self.progress;
        if let Some(threads) = self.threads {
            cli_opts.threads =
                Some(NonZeroUsize::new(threads).unwrap_or_else(|| NonZeroUsize::new(1).unwrap()));
        }
        cli_opts.ignore_file = self.ignore_file.clone();
        cli_opts.roots = self.roots.clone();

        let mut opts = SearchOptions::load_from(self.config.as_deref())
            .map_err(|e| SearchError::config_error(e.to_string()))?
            .merge_with_cli(cli_opts);
        opts.load_ignore();
        Ok(opts)
    }
}

/// Output format for the printer.
#[derive(Clone, Copy, PartialEq)]
enum OutputFormat {
    Plain,
    Json,
    JsonArray,
}

/// Serializes concurrent callback invocations onto stdout.
///
/// The search callback runs on the traversal thread and on every worker
/// thread, so all writes go through one mutex-guarded state.
struct Printer {
    format: OutputFormat,
    color: bool,
    highlight: String,
    state: Mutex<PrinterState>,
}

struct PrinterState {
    out: io::Stdout,
    first: bool,
}

impl Printer {
    fn new(format: OutputFormat, color: bool, highlight: String) -> Self {
        Self {
            format,
            color,
            highlight,
            state: Mutex::new(PrinterState {
                out: io::stdout(),
                first: true,
            }),
        }
    }

    fn print(&self, m: &SearchMatch) {
        let mut state = self.state.lock().unwrap();
        let first = state.first;
        state.first = false;

        let line = match self.format {
            OutputFormat::Plain => self.format_plain(m),
            OutputFormat::Json | OutputFormat::JsonArray => {
                serde_json::to_string(m).unwrap_or_default()
            }
        };

        let result = if self.format == OutputFormat::JsonArray {
            if first {
                write!(state.out, "[\n{line}")
            } else {
                write!(state.out, ",\n{line}")
            }
        } else {
            writeln!(state.out, "{line}")
        };
        // A closed pipe (e.g. `scour ... | head`) is not an error worth
        // reporting.
        let _ = result;
    }

    fn format_plain(&self, m: &SearchMatch) -> String {
        match (&m.line, m.line_number) {
            (Some(line), Some(no)) => {
                let text = if self.color {
                    ansi_highlight(line, &self.highlight)
                } else {
                    line.clone()
                };
                format!("{}:{}: {}", m.path.display(), no, text)
            }
            _ => m.path.display().to_string(),
        }
    }

    /// Closes the JSON array, if one was opened.
    fn finish(&self) {
        if self.format == OutputFormat::JsonArray {
            let mut state = self.state.lock().unwrap();
            let _ = if state.first {
                writeln!(state.out, "[]")
            } else {
                writeln!(state.out, "\n]")
            };
        }
    }
}

/// Highlights the first occurrence of `needle` in `line`, trying a
/// case-sensitive find first, then case-insensitive.
fn ansi_highlight(line: &str, needle: &str) -> String {
    if needle.is_empty() {
        return line.to_string();
    }
    let pos = line.find(needle).or_else(|| {
        let line_low = line.to_lowercase();
        let needle_low = needle.to_lowercase();
        line_low.find(&needle_low)
    });
    match pos {
        // Offsets from a lowercase-folded find may not align with the
        // original string; only highlight when the slice is valid.
        Some(pos)
            if pos + needle.len() <= line.len()
                && line.is_char_boundary(pos)
                && line.is_char_boundary(pos + needle.len()) =>
        {
            let matched = &line[pos..pos + needle.len()];
            format!(
                "{}{}{}",
                &line[..pos],
                matched.red().bold(),
                &line[pos + needle.len()..]
            )
        }
        _ => line.to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_array {
        OutputFormat::JsonArray
    } else if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };
    let color = !cli.no_color;

    let opts = cli.into_options()?;
    if !opts.find_dirs && !opts.find_files && !opts.wants_content_search() {
        anyhow::bail!("no search mode selected; pass -d, -f, -z, -R, or -b");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(opts.log_level.clone())),
        )
        .with_writer(io::stderr)
        .init();

    tracing::debug!(
        "searching roots {:?} with {} workers",
        opts.effective_roots(),
        opts.thread_count()
    );

    let highlight = opts.pattern.clone();
    let printer = Arc::new(Printer::new(format, color, highlight));

    let print_sink = Arc::clone(&printer);
    Searcher::new(opts).run(move |m| print_sink.print(&m));

    printer.finish();
    Ok(())
}
