//! scour - concurrent filesystem name and content search
//!
//! Given one or more root directories, a name pattern and/or content
//! pattern, scour walks the tree, applies gitignore-style exclusion
//! rules, and reports matching file/directory names and matching lines
//! inside file contents.
//!
//! # Architecture
//!
//! One traversal thread enumerates directory entries, consults the
//! [`ignore::IgnoreMatcher`] per entry (pruning ignored subtrees), and
//! performs name matching inline. Files eligible for content search are
//! dispatched to a fixed [`pool::WorkerPool`]; workers memory-map each
//! file and scan it with the [`scanner::ContentScanner`]. Every match is
//! pushed to the caller's callback as soon as it is found, from whichever
//! thread found it.

pub mod config;
pub mod errors;
pub mod ignore;
pub mod patterns;
pub mod pool;
pub mod progress;
pub mod results;
pub mod scanner;
pub mod search;

pub use config::SearchOptions;
pub use errors::{SearchError, SearchResult};
pub use ignore::{IgnoreMatcher, IgnoreRule};
pub use results::{ResultSink, SearchMatch};
pub use search::Searcher;
