use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// One reported match: either a name match (no line) or a content match.
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    /// Path of the matching file or directory.
    pub path: PathBuf,
    /// Whether the match is a directory name.
    pub is_dir: bool,
    /// Matched line text; `None` for a name-only or raw-byte match.
    pub line: Option<String>,
    /// 1-based line number; `None` when not applicable.
    pub line_number: Option<usize>,
}

impl SearchMatch {
    /// A file or directory whose name matched.
    pub fn name_match(path: PathBuf, is_dir: bool) -> Self {
        Self {
            path,
            is_dir,
            line: None,
            line_number: None,
        }
    }

    /// A content match with its enclosing line.
    pub fn content_match(path: PathBuf, line: String, line_number: usize) -> Self {
        Self {
            path,
            is_dir: false,
            line: Some(line),
            line_number: Some(line_number),
        }
    }

    /// A raw-byte presence match; "line" is meaningless for binary data.
    pub fn presence_match(path: PathBuf) -> Self {
        Self {
            path,
            is_dir: false,
            line: None,
            line_number: None,
        }
    }
}

/// Result sink invoked for every match as soon as it is found.
///
/// Content matches are reported from worker threads, so the sink is called
/// concurrently and must serialize any shared output resource itself.
pub type ResultSink = Arc<dyn Fn(SearchMatch) + Send + Sync>;
