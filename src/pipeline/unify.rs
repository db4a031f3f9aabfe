//! The UNIFY_BLOCKS phase.
//!
//! Classified candidates are grouped by their smallest enclosing block and
//! every member receives the block's consensus label, so one block never
//! gives contradictory advice. Candidates outside every block are untouched.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::blocks::{BlockPartition, BlockType, CodeBlock, ParallelPotential};
use crate::core::{Candidate, Classification};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifyStats {
    pub blocks_unified: usize,
    /// Blocks whose members disagreed before unification
    pub blocks_with_conflicts: usize,
    /// Member labels changed by unification
    pub conflicts_resolved: usize,
}

/// Consensus label for a block given its members' labels.
///
/// Any unsafe member wins outright. Otherwise a block whose own heuristics
/// flagged a dependency, or whose potential is limited, needs a runtime
/// check. A unanimous safe verdict survives only on blocks with real
/// potential, and reduction blocks also need a `reduction(` clause among
/// their members' directives. Every other mix is a runtime check.
pub fn consensus(block: &CodeBlock, members: &[&Candidate]) -> Classification {
    if members
        .iter()
        .any(|c| c.classification.is_some_and(|label| label.is_unsafe()))
    {
        return Classification::NotParallel;
    }

    if block.has_dependency || block.potential == ParallelPotential::Limited {
        return Classification::RequiresRuntimeCheck;
    }

    let unanimous_safe = !members.is_empty()
        && members
            .iter()
            .all(|c| c.classification == Some(Classification::SafeParallel));
    if !unanimous_safe {
        return Classification::RequiresRuntimeCheck;
    }

    if block.block_type == BlockType::ReductionLoop
        && !members
            .iter()
            .any(|c| c.suggested_directive.contains("reduction("))
    {
        return Classification::RequiresRuntimeCheck;
    }

    Classification::SafeParallel
}

pub fn unify_blocks(candidates: &mut [Candidate], partition: &BlockPartition) -> UnifyStats {
    let mut stats = UnifyStats::default();

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        if let Some(block) = partition.smallest_enclosing(candidate.line) {
            groups.entry(block.id).or_default().push(idx);
        }
    }

    for (block_id, members) in groups {
        let Some(block) = partition.get(block_id) else {
            continue;
        };

        let labels: BTreeSet<Option<Classification>> =
            members.iter().map(|&i| candidates[i].classification).collect();
        let label = {
            let refs: Vec<&Candidate> = members.iter().map(|&i| &candidates[i]).collect();
            consensus(block, &refs)
        };

        stats.blocks_unified += 1;
        if labels.len() > 1 {
            stats.blocks_with_conflicts += 1;
        }

        for &idx in &members {
            let candidate = &mut candidates[idx];
            if candidate.classification != Some(label) {
                stats.conflicts_resolved += 1;
            }
            candidate.classification = Some(label);
            candidate.notes.push(format!(
                "Unified with block {} ({}, lines {}-{}): {}",
                block.id, block.block_type, block.start_line, block.end_line, label
            ));
        }
        debug!(
            block = block.id,
            members = members.len(),
            consensus = %label,
            "Unified block"
        );
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockPartitioner;
    use crate::core::PatternType;
    use indoc::indoc;

    fn classified(line: usize, label: Classification) -> Candidate {
        let mut candidate = Candidate::new("k.c", line, "k", PatternType::SimpleLoop);
        candidate.classification = Some(label);
        candidate
    }

    const NESTED_WITH_DEPENDENCY: &str = indoc! {"
        void smooth(double **a, int n, int m) {
            for (int i = 0; i < n; i++) {
                for (int j = 0; j < m; j++) {
                    a[i][j] = a[i][j+1] * 0.5;
                }
            }
        }
    "};

    #[test]
    fn test_dependency_block_never_safe() {
        let partition = BlockPartitioner::new().partition(NESTED_WITH_DEPENDENCY);
        let inner = partition.smallest_enclosing(4).unwrap();
        assert_eq!(inner.potential, ParallelPotential::Limited);

        let mut candidates = vec![
            classified(3, Classification::SafeParallel),
            classified(4, Classification::SafeParallel),
        ];
        unify_blocks(&mut candidates, &partition);
        for candidate in &candidates {
            assert_eq!(candidate.classification, Some(Classification::RequiresRuntimeCheck));
        }
    }

    const SIMPLE: &str = indoc! {"
        void scale(float *a, float s, int n) {
            for (int i = 0; i < n; i++) {
                a[i] = a[i] * s;
            }
        }

        int helper(int x) {
            return x + 1;
        }
    "};

    #[test]
    fn test_unsafe_member_wins_and_members_agree() {
        let partition = BlockPartitioner::new().partition(SIMPLE);
        let mut candidates = vec![
            classified(2, Classification::SafeParallel),
            classified(3, Classification::LogicIssue),
            classified(8, Classification::SafeParallel),
        ];
        let stats = unify_blocks(&mut candidates, &partition);

        assert_eq!(candidates[0].classification, Some(Classification::NotParallel));
        assert_eq!(candidates[1].classification, Some(Classification::NotParallel));
        // line 8 is outside every loop block
        assert_eq!(candidates[2].classification, Some(Classification::SafeParallel));
        assert!(candidates[2].notes.is_empty());
        assert_eq!(
            stats,
            UnifyStats {
                blocks_unified: 1,
                blocks_with_conflicts: 1,
                conflicts_resolved: 2,
            }
        );
    }

    #[test]
    fn test_unanimous_safe_block_stays_safe() {
        let partition = BlockPartitioner::new().partition(SIMPLE);
        let mut candidates = vec![
            classified(2, Classification::SafeParallel),
            classified(3, Classification::SafeParallel),
        ];
        let stats = unify_blocks(&mut candidates, &partition);
        assert!(candidates
            .iter()
            .all(|c| c.classification == Some(Classification::SafeParallel)));
        assert_eq!(stats.conflicts_resolved, 0);
    }

    #[test]
    fn test_mixed_labels_become_runtime_check() {
        let partition = BlockPartitioner::new().partition(SIMPLE);
        let mut candidates = vec![
            classified(2, Classification::SafeParallel),
            classified(3, Classification::RequiresRuntimeCheck),
        ];
        unify_blocks(&mut candidates, &partition);
        assert!(candidates
            .iter()
            .all(|c| c.classification == Some(Classification::RequiresRuntimeCheck)));
    }

    #[test]
    fn test_reduction_block_requires_reduction_clause() {
        let source = indoc! {"
            double total(double *a, int n) {
                double sum = 0;
                for (int i = 0; i < n; i++) {
                    sum += a[i];
                }
                return sum;
            }
        "};
        let partition = BlockPartitioner::new().partition(source);
        assert_eq!(partition.smallest_enclosing(4).unwrap().block_type, BlockType::ReductionLoop);

        let mut without_clause = vec![classified(3, Classification::SafeParallel)
            .with_directive("#pragma omp parallel for")];
        unify_blocks(&mut without_clause, &partition);
        assert_eq!(without_clause[0].classification, Some(Classification::RequiresRuntimeCheck));

        let mut with_clause = vec![classified(3, Classification::SafeParallel)
            .with_directive("#pragma omp parallel for reduction(+:sum)")];
        unify_blocks(&mut with_clause, &partition);
        assert_eq!(with_clause[0].classification, Some(Classification::SafeParallel));
    }
}
