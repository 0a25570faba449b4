//! The search driver: walks each root directory on the calling thread,
//! filters entries through the ignore rules, matches names inline, and
//! farms content scans out to the worker pool. Every match is pushed to
//! the caller's sink as soon as it is found; `run` returns only after all
//! submitted scans have completed.

use regex::bytes::RegexBuilder;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SearchOptions;
use crate::errors::{SearchError, SearchResult};
use crate::patterns::{levenshtein, matches_glob};
use crate::pool::WorkerPool;
use crate::progress::{ProgressCounters, ProgressReporter};
use crate::results::{ResultSink, SearchMatch};
use crate::scanner::{ContentScanner, ScanMode};

/// Drives one search run over the configured roots.
pub struct Searcher {
    opt: SearchOptions,
}

impl Searcher {
    pub fn new(opt: SearchOptions) -> Self {
        Self { opt }
    }

    /// Runs the search, invoking `callback` for every match.
    ///
    /// The callback is invoked from the traversal thread for name matches
    /// and from worker threads for content matches, so it must be safe to
    /// call concurrently and serialize any shared output itself.
    pub fn run<F>(&self, callback: F)
    where
        F: Fn(SearchMatch) + Send + Sync + 'static,
    {
        self.run_with_sink(Arc::new(callback));
    }

    /// Same as [`run`](Self::run) with a pre-built shared sink.
    pub fn run_with_sink(&self, sink: ResultSink) {
        info!(
            "starting search, pattern={:?} regex={:?} roots={:?}",
            self.opt.pattern, self.opt.regex_pattern, self.opt.roots
        );

        let scanner = match self.build_scanner() {
            Ok(scanner) => scanner.map(Arc::new),
            Err(e) => {
                warn!("content search disabled for this run: {e}");
                None
            }
        };
        let counters = Arc::new(ProgressCounters::default());
        let reporter = self
            .opt
            .progress
            .then(|| ProgressReporter::start(Arc::clone(&counters)));

        let pool = WorkerPool::new(self.opt.thread_count());

        for root in self.opt.effective_roots() {
            if !root.exists() {
                debug!("root {} does not exist, skipping", root.display());
                continue;
            }
            self.walk_dir(&root, &root, &pool, &scanner, &sink, &counters);
        }

        // Block once, after all roots: every queued scan finishes before
        // the run is considered complete.
        pool.join();

        if let Some(reporter) = reporter {
            reporter.stop();
        }

        info!(
            "search complete: {} entries seen, {} files scanned",
            counters.entries_seen(),
            counters.files_processed()
        );
    }

    /// Builds the content scanner for this run, compiling the regex once
    /// before any task is submitted. A regex that fails to compile yields
    /// [`SearchError::InvalidPattern`]; the caller disables regex-content
    /// mode for the run rather than aborting.
    fn build_scanner(&self) -> SearchResult<Option<ContentScanner>> {
        if self.opt.raw_bytes {
            return Ok(Some(ContentScanner::new(
                ScanMode::RawBytes(self.opt.pattern.clone().into_bytes()),
                self.opt.case_insensitive,
            )));
        }
        if self.opt.content_substr {
            return Ok(Some(ContentScanner::new(
                ScanMode::Substring(self.opt.pattern.clone()),
                self.opt.case_insensitive,
            )));
        }
        if self.opt.content_regex && !self.opt.regex_pattern.is_empty() {
            let re = RegexBuilder::new(&self.opt.regex_pattern)
                .case_insensitive(self.opt.case_insensitive)
                .build()
                .map_err(|e| {
                    SearchError::invalid_pattern(format!("{}: {e}", self.opt.regex_pattern))
                })?;
            return Ok(Some(ContentScanner::new(
                ScanMode::Regex(re),
                self.opt.case_insensitive,
            )));
        }
        Ok(None)
    }

    fn walk_dir(
        &self,
        root: &Path,
        dir: &Path,
        pool: &WorkerPool,
        scanner: &Option<Arc<ContentScanner>>,
        sink: &ResultSink,
        counters: &Arc<ProgressCounters>,
    ) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                // Permission-denied subtrees are skipped, not fatal.
                debug!("cannot read {}: {}", dir.display(), e);
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("unreadable entry under {}: {}", dir.display(), e);
                    continue;
                }
            };
            counters.record_entry();

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    debug!("cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };
            let is_dir = file_type.is_dir();

            // An ignored directory is never descended into.
            if self.opt.ignore.is_ignored(root, &path, is_dir) {
                debug!("ignored: {}", path.display());
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();

            if is_dir {
                if self.opt.find_dirs && self.name_matches(&name) {
                    sink(SearchMatch::name_match(path.clone(), true));
                }
                self.walk_dir(root, &path, pool, scanner, sink, counters);
                continue;
            }

            if file_type.is_file() {
                // Name match and content match are independent; both may
                // fire for the same file.
                if self.opt.find_files && self.name_matches(&name) {
                    sink(SearchMatch::name_match(path.clone(), false));
                }

                if let Some(scanner) = scanner {
                    let scanner = Arc::clone(scanner);
                    let sink = Arc::clone(sink);
                    let counters = Arc::clone(counters);
                    pool.submit(move || {
                        if let Err(e) = scanner.scan_file(&path, |m| sink(m)) {
                            debug!("scan of {} skipped: {}", path.display(), e);
                        }
                        counters.record_file_processed();
                    });
                }
            }
        }
    }

    /// Compares the entry's base name against the name pattern, using the
    /// fuzzy matcher or the glob matcher, never both.
    fn name_matches(&self, name: &str) -> bool {
        if self.opt.fuzzy {
            levenshtein(name, &self.opt.pattern) <= self.opt.fuzzy_distance()
        } else {
            matches_glob(name, &self.opt.pattern, self.opt.case_insensitive)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::num::NonZeroUsize;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    use crate::ignore::IgnoreMatcher;

    fn run_and_collect(opt: SearchOptions) -> Vec<SearchMatch> {
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink_found = Arc::clone(&found);
        Searcher::new(opt).run(move |m| sink_found.lock().unwrap().push(m));
        let mut results = Arc::try_unwrap(found).unwrap().into_inner().unwrap();
        results.sort_by(|a, b| a.path.cmp(&b.path).then(a.line_number.cmp(&b.line_number)));
        results
    }

    fn base_options(root: &Path) -> SearchOptions {
        SearchOptions {
            roots: vec![root.to_path_buf()],
            threads: NonZeroUsize::new(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_file_name_glob_search() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.log"), "x").unwrap();
        fs::write(dir.path().join("app.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/deep.log"), "x").unwrap();

        let opt = SearchOptions {
            find_files: true,
            pattern: "*.log".to_string(),
            ..base_options(dir.path())
        };
        let results = run_and_collect(opt);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|m| !m.is_dir && m.line.is_none()));
    }

    #[test]
    fn test_dir_name_search_never_scans_content() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/build"), "build").unwrap();

        let opt = SearchOptions {
            find_dirs: true,
            pattern: "build".to_string(),
            ..base_options(dir.path())
        };
        let results = run_and_collect(opt);
        // The directory and the identically-named file both exist; only
        // the directory is reported.
        assert_eq!(results.len(), 1);
        assert!(results[0].is_dir);
    }

    #[test]
    fn test_fuzzy_file_name_search() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("kitten"), "x").unwrap();
        fs::write(dir.path().join("sitting"), "x").unwrap();
        fs::write(dir.path().join("mitten"), "x").unwrap();

        let opt = SearchOptions {
            find_files: true,
            fuzzy: true,
            fuzzy_threshold: Some(1),
            pattern: "kitten".to_string(),
            ..base_options(dir.path())
        };
        let results = run_and_collect(opt);
        let names: Vec<_> = results
            .iter()
            .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["kitten", "mitten"]);
    }

    #[test]
    fn test_content_search_end_to_end_with_ignore_rescue() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.log"), "ERROR: boom\n").unwrap();
        fs::create_dir(dir.path().join("keep")).unwrap();
        fs::write(dir.path().join("keep/b.log"), "ok\n").unwrap();

        let opt = SearchOptions {
            content_substr: true,
            pattern: "ERROR".to_string(),
            ignore: IgnoreMatcher::parse("*.log\n!keep/*.log\n"),
            ..base_options(dir.path())
        };
        let results = run_and_collect(opt);
        // a.log is excluded by *.log; keep/b.log is rescued but has no
        // match, so nothing is reported.
        assert!(results.is_empty());

        let opt = SearchOptions {
            content_substr: true,
            pattern: "ERROR".to_string(),
            ignore: IgnoreMatcher::parse("!*.log\n"),
            ..base_options(dir.path())
        };
        let results = run_and_collect(opt);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line.as_deref(), Some("ERROR: boom"));
        assert_eq!(results[0].line_number, Some(1));
    }

    #[test]
    fn test_ignored_directory_is_pruned() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/hit.txt"), "needle\n").unwrap();
        fs::write(dir.path().join("hit.txt"), "needle\n").unwrap();

        let opt = SearchOptions {
            content_substr: true,
            pattern: "needle".to_string(),
            ignore: IgnoreMatcher::parse("node_modules/\n"),
            ..base_options(dir.path())
        };
        let results = run_and_collect(opt);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, dir.path().join("hit.txt"));
    }

    #[test]
    fn test_name_and_content_match_fire_independently() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "some notes\n").unwrap();

        let opt = SearchOptions {
            find_files: true,
            content_substr: true,
            pattern: "notes*".to_string(),
            ..base_options(dir.path())
        };
        // Name matches the glob; the raw pattern text "notes*" does not
        // occur in the content, so only the name match fires.
        let results = run_and_collect(opt);
        let name_matches: Vec<_> = results.iter().filter(|m| m.line.is_none()).collect();
        assert_eq!(name_matches.len(), 1);
    }

    #[test]
    fn test_invalid_regex_disables_content_search() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "anything\n").unwrap();

        let opt = SearchOptions {
            content_regex: true,
            regex_pattern: "(unclosed".to_string(),
            ..base_options(dir.path())
        };
        let results = run_and_collect(opt);
        assert!(results.is_empty());
    }

    #[test]
    fn test_invalid_regex_reports_invalid_pattern_error() {
        let opt = SearchOptions {
            content_regex: true,
            regex_pattern: "(unclosed".to_string(),
            ..Default::default()
        };
        let err = Searcher::new(opt).build_scanner().unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern(_)));
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn test_regex_content_search() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("src.rs"), "fn main() {}\nfn helper() {}\n").unwrap();

        let opt = SearchOptions {
            content_regex: true,
            regex_pattern: r"fn \w+\(\)".to_string(),
            ..base_options(dir.path())
        };
        let results = run_and_collect(opt);
        // Regex mode reports the first match per file only.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line_number, Some(1));
    }

    #[test]
    fn test_nonexistent_root_skipped_silently() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "needle\n").unwrap();

        let opt = SearchOptions {
            content_substr: true,
            pattern: "needle".to_string(),
            roots: vec![PathBuf::from("/nonexistent/root"), dir.path().to_path_buf()],
            threads: NonZeroUsize::new(1),
            ..Default::default()
        };
        let results = run_and_collect(opt);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_multiple_roots() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        fs::write(dir_a.path().join("a.txt"), "needle\n").unwrap();
        fs::write(dir_b.path().join("b.txt"), "needle\n").unwrap();

        let opt = SearchOptions {
            content_substr: true,
            pattern: "needle".to_string(),
            roots: vec![dir_a.path().to_path_buf(), dir_b.path().to_path_buf()],
            threads: NonZeroUsize::new(4),
            ..Default::default()
        };
        let results = run_and_collect(opt);
        assert_eq!(results.len(), 2);
    }
}
