//! Raw candidate cleanup ahead of scoring.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::core::Candidate;

/// Path fragments identifying system or toolchain headers
const SYSTEM_PATH_MARKERS: &[&str] = &[
    "/usr/include",
    "/usr/lib/gcc",
    "/usr/lib/clang",
    "/usr/local/include",
    "/System/Library",
    "/Library/Developer/CommandLineTools",
    "/Applications/Xcode.app",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeStats {
    pub input: usize,
    pub system_paths: usize,
    pub invalid_lines: usize,
    pub duplicates: usize,
}

pub fn is_system_path(path: &Path) -> bool {
    let text = path.to_string_lossy();
    text.is_empty()
        || text == "unknown"
        || SYSTEM_PATH_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Keeps the first candidate for each `(file, line, function)` key
pub fn dedup_by_key(candidates: Vec<Candidate>) -> (Vec<Candidate>, usize) {
    let mut seen = HashSet::new();
    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.key()))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Drops system-header and line-less candidates, then deduplicates
pub fn sanitize(candidates: Vec<Candidate>) -> (Vec<Candidate>, SanitizeStats) {
    let mut stats = SanitizeStats {
        input: candidates.len(),
        ..Default::default()
    };

    let located: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| {
            if is_system_path(&c.file) {
                stats.system_paths += 1;
                false
            } else if c.line == 0 {
                stats.invalid_lines += 1;
                false
            } else {
                true
            }
        })
        .collect();

    let (kept, duplicates) = dedup_by_key(located);
    stats.duplicates = duplicates;
    debug!(?stats, kept = kept.len(), "Sanitized raw candidates");
    (kept, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PatternType;
    use pretty_assertions::assert_eq;

    fn candidate(file: &str, line: usize, function: &str) -> Candidate {
        Candidate::new(file, line, function, PatternType::SimpleLoop)
    }

    #[test]
    fn test_dedup_five_with_one_duplicate() {
        let candidates = vec![
            candidate("a.c", 1, "f"),
            candidate("a.c", 5, "g"),
            candidate("a.c", 9, "h"),
            candidate("a.c", 5, "g").with_reason("second report"),
            candidate("b.c", 5, "g"),
        ];
        let (kept, removed) = dedup_by_key(candidates);
        assert_eq!(kept.len(), 4);
        assert_eq!(removed, 1);
        assert_eq!(kept[1].reason, "");
    }

    #[test]
    fn test_sanitize_drops_system_and_invalid() {
        let candidates = vec![
            candidate("/usr/include/c++/11/bits/stl_algo.h", 40, "sort"),
            candidate("unknown", 3, "f"),
            candidate("src/k.c", 0, "f"),
            candidate("src/k.c", 12, "f"),
            candidate("src/k.c", 12, "f"),
        ];
        let (kept, stats) = sanitize(candidates);
        assert_eq!(kept.len(), 1);
        assert_eq!(
            stats,
            SanitizeStats {
                input: 5,
                system_paths: 2,
                invalid_lines: 1,
                duplicates: 1,
            }
        );
    }
}
