//! Reference corpus of known-good directive usages, scanned once at startup.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::core::{Error, PatternType, Result};

use super::normalize_directive;

const SOURCE_EXTENSIONS: &[&str] = &["c", "cpp", "cc", "cxx"];
const DIRECTIVE_MARKER: &str = "#pragma omp";

/// Category a reference directive was filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Vectorizable,
    ParallelLoop,
    Reduction,
    TaskParallel,
    Sections,
    EmbarrassinglyParallel,
    General,
}

impl PatternCategory {
    /// Category from the reference file's relative path and its directive
    pub fn classify(relative_path: &str, directive: &str) -> Self {
        let lowered = directive.to_lowercase();
        if relative_path.contains("SIMD") || lowered.contains("simd") {
            Self::Vectorizable
        } else if relative_path.contains("parallel_for") || lowered.contains("parallel for") {
            Self::ParallelLoop
        } else if relative_path.contains("reduction") || lowered.contains("reduction") {
            Self::Reduction
        } else if relative_path.contains("task") || lowered.contains("task") {
            Self::TaskParallel
        } else if relative_path.contains("sections") || lowered.contains("sections") {
            Self::Sections
        } else if lowered.contains("parallel") {
            Self::EmbarrassinglyParallel
        } else {
            Self::General
        }
    }

    pub fn family(&self) -> PatternFamily {
        match self {
            Self::Vectorizable => PatternFamily::LoopVectorizable,
            Self::ParallelLoop | Self::EmbarrassinglyParallel => PatternFamily::LoopParallel,
            Self::Reduction => PatternFamily::Reduction,
            Self::TaskParallel => PatternFamily::TaskParallel,
            Self::Sections | Self::General => PatternFamily::Other,
        }
    }
}

/// Coarse grouping used when matching candidates to references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFamily {
    LoopVectorizable,
    LoopParallel,
    Reduction,
    TaskParallel,
    Other,
}

impl PatternFamily {
    pub fn is_loop(&self) -> bool {
        matches!(self, Self::LoopVectorizable | Self::LoopParallel)
    }

    /// Family hint for a candidate pattern type. Risky and unknown
    /// candidates carry no hint and match references of any family.
    pub fn from_pattern(pattern: PatternType) -> Option<Self> {
        match pattern {
            PatternType::Vectorizable => Some(Self::LoopVectorizable),
            PatternType::EmbarrassinglyParallel | PatternType::SimpleLoop => {
                Some(Self::LoopParallel)
            }
            PatternType::Reduction => Some(Self::Reduction),
            PatternType::Risky | PatternType::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePattern {
    /// Directive line as written in the reference source
    pub directive: String,
    pub normalized: String,
    pub context: String,
    /// Path relative to the corpus root
    pub source_file: String,
    pub line: usize,
    pub category: PatternCategory,
    pub description: String,
}

impl ReferencePattern {
    pub fn family(&self) -> PatternFamily {
        self.category.family()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceCorpus {
    root: PathBuf,
    patterns: Vec<ReferencePattern>,
}

impl ReferenceCorpus {
    /// Scans every C/C++ source under `root` for directive lines.
    pub fn load(root: &Path, context_lines: usize) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::file_system("reference corpus not found", root));
        }
        info!("Loading reference directives from {}", root.display());

        let files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping corpus entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_source_file(path))
            .collect();

        let patterns: Vec<ReferencePattern> = files
            .par_iter()
            .flat_map_iter(|path| match fs::read(path) {
                Ok(bytes) => {
                    let content = String::from_utf8_lossy(&bytes);
                    let relative = relative_name(root, path);
                    extract_patterns(&content, &relative, context_lines)
                }
                Err(e) => {
                    warn!("Could not read {}: {}", path.display(), e);
                    Vec::new()
                }
            })
            .collect();

        info!(
            "Loaded {} reference directives from {} files",
            patterns.len(),
            files.len()
        );
        Ok(Self {
            root: root.to_path_buf(),
            patterns,
        })
    }

    pub fn from_patterns(root: impl Into<PathBuf>, patterns: Vec<ReferencePattern>) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn patterns(&self) -> &[ReferencePattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn examples(&self, category: PatternCategory) -> Vec<&ReferencePattern> {
        self.patterns
            .iter()
            .filter(|p| p.category == category)
            .collect()
    }

    /// Distinct normalized directives of a category, most frequent first
    pub fn recommendations(&self, category: PatternCategory) -> Vec<String> {
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (order, pattern) in self.examples(category).into_iter().enumerate() {
            let entry = counts.entry(pattern.normalized.as_str()).or_insert((0, order));
            entry.0 += 1;
        }
        let mut ranked: Vec<_> = counts.into_iter().collect();
        ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_b.cmp(count_a).then(first_a.cmp(first_b))
        });
        ranked.into_iter().map(|(d, _)| d.to_string()).collect()
    }

    pub fn counts_by_category(&self) -> BTreeMap<PatternCategory, usize> {
        let mut counts = BTreeMap::new();
        for pattern in &self.patterns {
            *counts.entry(pattern.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn source_file_count(&self) -> usize {
        self.patterns
            .iter()
            .map(|p| p.source_file.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

pub(crate) fn extract_patterns(
    content: &str,
    relative: &str,
    context_lines: usize,
) -> Vec<ReferencePattern> {
    let lines: Vec<&str> = content.lines().collect();
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(DIRECTIVE_MARKER))
        .map(|(index, line)| {
            let start = index.saturating_sub(context_lines);
            let end = (index + context_lines + 1).min(lines.len());
            let context = lines[start..end].join("\n");
            let directive = line.trim().to_string();
            ReferencePattern {
                normalized: normalize_directive(&directive),
                category: PatternCategory::classify(relative, &directive),
                description: describe(&lines[start..end]),
                directive,
                context,
                source_file: relative.to_string(),
                line: index + 1,
            }
        })
        .collect()
}

/// Comment text around a reference directive
fn describe(context: &[&str]) -> String {
    let comments: Vec<String> = context
        .iter()
        .map(|line| line.trim())
        .filter(|line| line.starts_with("//") || line.starts_with("/*"))
        .map(|line| {
            line.trim_start_matches('/')
                .trim_start_matches('*')
                .trim_end_matches("*/")
                .trim()
                .to_string()
        })
        .filter(|text| !text.is_empty() && !text.starts_with('='))
        .collect();

    if comments.is_empty() {
        "reference directive example".to_string()
    } else {
        comments.join(" ")
    }
}
