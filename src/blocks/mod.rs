//! Block partitioning: segments a file into nested loop blocks, tags each with
//! a parallelization potential, and records which blocks contain which.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use crate::source::{self, LoopSpan, SourceText};

static ELEMENT_ARITHMETIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+(?:\[[^\]]*\])+\s*=[^=;]*[+\-*/]").unwrap());
static COMPOUND_ACCUMULATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\s*(?:\+|\*)=").unwrap());
static SELF_ACCUMULATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\w+)\s*=\s*(\w+)\s*[+*]").unwrap());
static OFFSET_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\w|\])\[\s*\w+\s*[+-]\s*\d+\s*\]").unwrap());

const REDUCTION_KEYWORDS: &[&str] = &["sum", "total", "count", "accumulate"];

/// Call-shaped occurrences above this count signal a dependency
const DEPENDENCY_CALL_LIMIT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    SimpleLoop,
    NestedLoops,
    VectorizableLoop,
    ReductionLoop,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SimpleLoop => "simple_loop",
            Self::NestedLoops => "nested_loops",
            Self::VectorizableLoop => "vectorizable_loop",
            Self::ReductionLoop => "reduction_loop",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelPotential {
    Excellent,
    Good,
    Moderate,
    Limited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Index of this block within its partition
    pub id: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub block_type: BlockType,
    pub nesting_level: usize,
    pub potential: ParallelPotential,
    /// Offset indexing or heavy call use was seen in the block
    pub has_dependency: bool,
    pub notes: Vec<String>,
    /// Ids of every block strictly contained in this one
    pub children: BTreeSet<usize>,
}

impl CodeBlock {
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn span(&self) -> usize {
        self.end_line - self.start_line
    }

    fn strictly_contains(&self, other: &CodeBlock) -> bool {
        self.id != other.id
            && self.start_line <= other.start_line
            && other.end_line <= self.end_line
            && (self.start_line, self.end_line) != (other.start_line, other.end_line)
    }
}

/// All blocks of one file with containment established
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockPartition {
    pub blocks: Vec<CodeBlock>,
}

impl BlockPartition {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&CodeBlock> {
        self.blocks.get(id)
    }

    /// Innermost block containing `line`. Ties on span go to the block that
    /// starts later.
    pub fn smallest_enclosing(&self, line: usize) -> Option<&CodeBlock> {
        self.blocks
            .iter()
            .filter(|b| b.contains_line(line))
            .min_by(|a, b| {
                a.span()
                    .cmp(&b.span())
                    .then(b.start_line.cmp(&a.start_line))
            })
    }

    pub fn summary(&self) -> BlockSummary {
        let mut by_potential = BTreeMap::new();
        for block in &self.blocks {
            *by_potential.entry(block.potential).or_insert(0) += 1;
        }
        let excellent = by_potential
            .get(&ParallelPotential::Excellent)
            .copied()
            .unwrap_or(0);
        let good = by_potential.get(&ParallelPotential::Good).copied().unwrap_or(0);
        BlockSummary {
            total_blocks: self.blocks.len(),
            parallelizable_blocks: excellent + good,
            by_potential,
            block_types: self.blocks.iter().map(|b| b.block_type).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub total_blocks: usize,
    pub parallelizable_blocks: usize,
    pub by_potential: BTreeMap<ParallelPotential, usize>,
    pub block_types: BTreeSet<BlockType>,
}

#[derive(Debug, Default)]
pub struct BlockPartitioner;

impl BlockPartitioner {
    pub fn new() -> Self {
        Self
    }

    /// Every brace-delimited loop of `source`, nested loops included.
    pub fn partition(&self, source: &str) -> BlockPartition {
        let text = SourceText::new(source);
        let mut spans: Vec<LoopSpan> = text
            .loop_headers()
            .filter_map(|header| text.loop_span(header))
            .collect();
        spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut blocks: Vec<CodeBlock> = spans
            .into_iter()
            .enumerate()
            .map(|(id, span)| classify_block(id, &text, span))
            .collect();

        establish_hierarchy(&mut blocks);
        debug!("Identified {} code blocks", blocks.len());
        BlockPartition { blocks }
    }
}

fn classify_block(id: usize, text: &SourceText<'_>, span: LoopSpan) -> CodeBlock {
    let lines = text.span_lines(span.start, span.end);
    let nesting_level = loop_nesting(lines);
    let code = lines.join("\n").to_lowercase();

    let block_type = if nesting_level >= 2 {
        BlockType::NestedLoops
    } else if code.contains("vector") || ELEMENT_ARITHMETIC.is_match(&code) {
        BlockType::VectorizableLoop
    } else if has_accumulation(&code) {
        BlockType::ReductionLoop
    } else {
        BlockType::SimpleLoop
    };

    let has_dependency =
        OFFSET_INDEX.is_match(&code) || source::call_count(&code) > DEPENDENCY_CALL_LIMIT;
    let (potential, notes) = assess(block_type, has_dependency);

    CodeBlock {
        id,
        start_line: span.start,
        end_line: span.end,
        block_type,
        nesting_level,
        potential,
        has_dependency,
        notes,
        children: BTreeSet::new(),
    }
}

fn loop_nesting(lines: &[&str]) -> usize {
    let mut current = 0usize;
    let mut max = 0usize;
    for line in lines {
        current += source::loop_keyword_count(line);
        max = max.max(current);
        current = current.saturating_sub(line.matches('}').count());
    }
    max
}

fn has_accumulation(code: &str) -> bool {
    if COMPOUND_ACCUMULATION.is_match(code) {
        return true;
    }
    let self_update = SELF_ACCUMULATION
        .captures_iter(code)
        .any(|c| c.get(1).map(|m| m.as_str()) == c.get(2).map(|m| m.as_str()));
    self_update || REDUCTION_KEYWORDS.iter().any(|kw| code.contains(kw))
}

fn assess(block_type: BlockType, has_dependency: bool) -> (ParallelPotential, Vec<String>) {
    match (block_type, has_dependency) {
        (BlockType::NestedLoops, true) => (
            ParallelPotential::Limited,
            notes(&[
                "Nested loop structure detected",
                "Data dependencies may limit parallelization",
                "Consider loop interchange or blocking",
                "Inner loop may be vectorizable if dependencies are in outer loop only",
            ]),
        ),
        (BlockType::NestedLoops, false) => (
            ParallelPotential::Good,
            notes(&[
                "Nested loop structure with good parallelization potential",
                "Outer loop can use #pragma omp parallel for",
                "Inner loop can use #pragma omp simd for vectorization",
                "Consider collapse(2) for better load balancing",
            ]),
        ),
        (BlockType::VectorizableLoop, true) => (
            ParallelPotential::Limited,
            notes(&[
                "Arithmetic-heavy loop with a possible loop-carried dependency",
                "Verify index offsets before applying #pragma omp simd",
            ]),
        ),
        (BlockType::VectorizableLoop, false) => (
            ParallelPotential::Excellent,
            notes(&[
                "Arithmetic-heavy loop suitable for vectorization",
                "Use #pragma omp simd for SIMD parallelization",
                "Good candidate for compiler auto-vectorization",
                "Check for alignment and loop bounds",
            ]),
        ),
        (BlockType::ReductionLoop, true) => (
            ParallelPotential::Limited,
            notes(&[
                "Reduction pattern detected alongside a possible dependency",
                "Confirm the accumulator is the only carried value",
            ]),
        ),
        (BlockType::ReductionLoop, false) => (
            ParallelPotential::Good,
            notes(&[
                "Reduction pattern detected",
                "Use #pragma omp parallel for reduction(+:variable)",
                "Ensure reduction variable is properly identified",
                "Good scalability with thread count",
            ]),
        ),
        (BlockType::SimpleLoop, _) => (
            ParallelPotential::Moderate,
            notes(&[
                "Simple loop structure",
                "Basic parallelization with #pragma omp parallel for",
                "Check for data dependencies",
                "Verify thread safety of operations",
            ]),
        ),
    }
}

fn notes(items: &[&str]) -> Vec<String> {
    items.iter().map(|n| n.to_string()).collect()
}

fn establish_hierarchy(blocks: &mut [CodeBlock]) {
    let children: Vec<BTreeSet<usize>> = blocks
        .iter()
        .map(|outer| {
            blocks
                .iter()
                .filter(|inner| outer.strictly_contains(inner))
                .map(|inner| inner.id)
                .collect()
        })
        .collect();
    for (block, kids) in blocks.iter_mut().zip(children) {
        block.children = kids;
    }
}
