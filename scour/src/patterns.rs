//! Pattern-matching primitives shared by name matching, ignore rules,
//! and the content scanner: glob translation, fuzzy (edit distance)
//! matching, a binary-content heuristic, and a portable byte search.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Compiled glob patterns, keyed by (pattern, case-insensitive). A failed
/// compile is cached as `None` so the pattern is treated as never matching
/// without retrying the compile on every candidate.
static GLOB_CACHE: Lazy<DashMap<(String, bool), Option<Arc<Regex>>>> = Lazy::new(DashMap::new);

/// Number of leading bytes inspected by the binary-content heuristic.
const BINARY_CHECK_LEN: usize = 512;

/// Translates a shell-style glob into an anchored regular expression.
///
/// `*` matches any run of characters, including across path separators
/// (`**` therefore behaves the same as `*`); `?` matches exactly one
/// character; everything else is matched literally.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '.' => out.push_str("\\."),
            '\\' => out.push_str("\\\\"),
            '^' | '$' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '|' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('$');
    out
}

/// Performs a full-string glob match against `text`.
///
/// A pattern that fails to compile matches nothing; glob errors are never
/// fatal.
pub fn matches_glob(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let key = (pattern.to_string(), case_insensitive);
    let compiled = if let Some(entry) = GLOB_CACHE.get(&key) {
        entry.value().clone()
    } else {
        let translated = glob_to_regex(pattern);
        let compiled = match regex::RegexBuilder::new(&translated)
            .case_insensitive(case_insensitive)
            .build()
        {
            Ok(re) => Some(Arc::new(re)),
            Err(e) => {
                debug!("glob pattern {:?} failed to compile: {}", pattern, e);
                None
            }
        };
        GLOB_CACHE.insert(key, compiled.clone());
        compiled
    };

    match compiled {
        Some(re) => re.is_match(text),
        None => false,
    }
}

/// Computes the Levenshtein edit distance between `a` and `b`.
///
/// Single-character insertions, deletions, and substitutions each cost 1.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two rolling rows of length |b|+1.
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Classifies a file as binary if any NUL byte appears in its first 512
/// bytes. An unreadable file is treated as binary so the content scanner
/// skips it.
pub fn looks_like_binary(path: &Path) -> bool {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return true,
    };
    let mut buf = [0u8; BINARY_CHECK_LEN];
    let n = match file.read(&mut buf) {
        Ok(n) => n,
        Err(_) => return true,
    };
    buf[..n].contains(&0)
}

/// Locates the first occurrence of `needle` in `haystack`.
///
/// First-byte filter followed by a full comparison at each candidate
/// offset; an empty needle matches at offset 0.
pub fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if haystack.len() < needle.len() {
        return None;
    }
    let first = needle[0];
    for i in 0..=haystack.len() - needle.len() {
        if haystack[i] == first && &haystack[i..i + needle.len()] == needle {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_glob_to_regex_translation() {
        assert_eq!(glob_to_regex("*.txt"), "^.*\\.txt$");
        assert_eq!(glob_to_regex("a?c"), "^a.c$");
        assert_eq!(glob_to_regex("a+b"), "^a\\+b$");
        assert_eq!(glob_to_regex("dir/**"), "^dir/.*.*$");
    }

    #[test]
    fn test_matches_glob_star_crosses_separators() {
        assert!(matches_glob("a.txt", "*.txt", false));
        assert!(matches_glob("a/b.txt", "*.txt", false));
        assert!(!matches_glob("a.txtx", "*.txt", false));
    }

    #[test]
    fn test_matches_glob_question_mark() {
        assert!(matches_glob("abc", "a?c", false));
        assert!(!matches_glob("abbc", "a?c", false));
    }

    #[test]
    fn test_matches_glob_is_full_match() {
        assert!(!matches_glob("prefix_build", "build", false));
        assert!(matches_glob("build", "build", false));
    }

    #[test]
    fn test_matches_glob_case_insensitive() {
        assert!(matches_glob("README.TXT", "*.txt", true));
        assert!(!matches_glob("README.TXT", "*.txt", false));
    }

    #[test]
    fn test_glob_cache_repeated_lookups() {
        for _ in 0..3 {
            assert!(matches_glob("cache.me", "cache.*", false));
        }
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn test_looks_like_binary() {
        let dir = tempdir().unwrap();

        let bin_path = dir.path().join("blob.bin");
        let mut f = File::create(&bin_path).unwrap();
        f.write_all(b"abc\0def").unwrap();
        assert!(looks_like_binary(&bin_path));

        let text_path = dir.path().join("notes.txt");
        let mut f = File::create(&text_path).unwrap();
        // Longer than the checked prefix so only the prefix decides.
        f.write_all("plain text\n".repeat(100).as_bytes()).unwrap();
        assert!(!looks_like_binary(&text_path));
    }

    #[test]
    fn test_binary_heuristic_ignores_nul_past_prefix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("late_nul.dat");
        let mut f = File::create(&path).unwrap();
        f.write_all(&vec![b'a'; 600]).unwrap();
        f.write_all(&[0]).unwrap();
        assert!(!looks_like_binary(&path));
    }

    #[test]
    fn test_find_bytes() {
        assert_eq!(find_bytes(b"hello world", b"world"), Some(6));
        assert_eq!(find_bytes(b"hello world", b"hello"), Some(0));
        assert_eq!(find_bytes(b"hello", b"world"), None);
        assert_eq!(find_bytes(b"hi", b"high"), None);
        assert_eq!(find_bytes(b"anything", b""), Some(0));
        assert_eq!(find_bytes(b"aab", b"ab"), Some(1));
    }
}
