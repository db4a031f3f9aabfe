//! The CLASSIFY phase: cache-checked classifier calls for prioritized
//! candidates and heuristic verdicts for the rest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::cache::{short_hash, ResultCache, StructuralFingerprint};
use crate::collaborators::{
    parse_classifier_response, ClassificationRequest, Classifier, CollaboratorError, ParsedResponse,
};
use crate::config::PipelineConfig;
use crate::core::{Candidate, Classification, ClassifierVerdict, IssueType, PatternType, VerdictSource};
use crate::source::SourceText;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyStats {
    /// Candidates selected for classification
    pub requested: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Distinct fingerprints sent to the classifier
    pub classified_items: usize,
    pub classifier_calls: usize,
    pub fallbacks: usize,
}

#[derive(Debug, Default)]
pub struct ClassifyOutcome {
    pub candidates: Vec<Candidate>,
    pub stats: ClassifyStats,
    /// Set when at least one classifier batch failed outright
    pub degraded: Option<String>,
}

struct Prepared {
    candidate: Candidate,
    snippet: String,
    fingerprint: StructuralFingerprint,
}

/// Classifier-free verdict derived from the scored confidence
pub fn heuristic_verdict(candidate: &Candidate) -> ClassifierVerdict {
    let confidence = candidate.confidence;
    let classification = if confidence >= 0.8 {
        Classification::SafeParallel
    } else if confidence >= 0.6 {
        Classification::RequiresRuntimeCheck
    } else {
        Classification::NotParallel
    };

    ClassifierVerdict {
        classification,
        reasoning: format!(
            "Static analysis identifies this as {} with confidence {:.2}",
            candidate.pattern_type, confidence
        ),
        confidence,
        transformations: suggested_transformations(candidate.pattern_type),
        tests_recommended: suggested_tests(candidate.pattern_type, confidence),
        issue_type: IssueType::NoIssue,
        source: VerdictSource::Heuristic,
    }
}

fn suggested_transformations(pattern: PatternType) -> Vec<String> {
    let suggestions: &[&str] = match pattern {
        PatternType::EmbarrassinglyParallel => &["#pragma omp parallel for"],
        PatternType::Vectorizable => &["#pragma omp simd", "Enable compiler auto-vectorization"],
        PatternType::Reduction => &["#pragma omp parallel for reduction(+:sum)"],
        PatternType::SimpleLoop => &["#pragma omp parallel for", "Verify data dependencies first"],
        PatternType::Risky | PatternType::Unknown => &["Manual parallelization analysis required"],
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}

fn suggested_tests(pattern: PatternType, confidence: f64) -> Vec<String> {
    let mut tests = Vec::new();
    if confidence < 0.7 {
        tests.push("Thorough dependency analysis required".to_string());
    }
    tests.push("Compare parallel vs sequential results".to_string());
    tests.push("Performance benchmarking".to_string());
    match pattern {
        PatternType::Reduction => tests.push("Test with different reduction operations".to_string()),
        PatternType::Vectorizable => tests.push("Verify SIMD instruction generation".to_string()),
        _ => {}
    }
    tests
}

/// Applies heuristic verdicts to candidates that were not selected
pub fn apply_heuristic_verdicts(candidates: &mut [Candidate]) {
    for candidate in candidates.iter_mut() {
        let verdict = heuristic_verdict(candidate);
        candidate.apply_verdict(verdict);
    }
}

async fn call_classifier(
    classifier: Arc<dyn Classifier>,
    batch: Vec<ClassificationRequest>,
) -> Result<ParsedResponse, CollaboratorError> {
    let expected = batch.len();
    let response = tokio::task::spawn_blocking(move || classifier.classify(&batch))
        .await
        .map_err(|e| CollaboratorError::Failed(format!("classifier task failed: {}", e)))??;
    Ok(parse_classifier_response(&response, expected))
}

/// Classifies `selected` candidates. Candidates sharing a fingerprint share
/// one classifier item. Locks are taken in hash order and held until the
/// results are stored, so concurrent files never classify the same
/// structure twice and never deadlock on each other.
pub async fn classify_selected(
    selected: Vec<Candidate>,
    source: &SourceText<'_>,
    cache: &ResultCache,
    classifier: Arc<dyn Classifier>,
    config: &PipelineConfig,
) -> ClassifyOutcome {
    let mut outcome = ClassifyOutcome {
        stats: ClassifyStats {
            requested: selected.len(),
            ..Default::default()
        },
        ..Default::default()
    };
    if selected.is_empty() {
        return outcome;
    }

    let mut prepared: Vec<Prepared> = selected
        .into_iter()
        .map(|candidate| {
            let snippet = source.snippet(
                candidate.line,
                config.classifier_context_lines,
                config.snippet_chars,
            );
            let fingerprint = StructuralFingerprint::extract(&snippet, candidate.pattern_type);
            Prepared {
                candidate,
                snippet,
                fingerprint,
            }
        })
        .collect();

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, item) in prepared.iter().enumerate() {
        groups.entry(item.fingerprint.hash()).or_default().push(idx);
    }

    let mut guards = Vec::new();
    if cache.is_enabled() {
        for hash in groups.keys() {
            guards.push(cache.lock(hash).await);
        }
    }

    let mut misses: Vec<(String, usize)> = Vec::new();
    for (hash, members) in &groups {
        let representative = members[0];
        match cache.lookup_fingerprint(&prepared[representative].fingerprint) {
            Some(hit) => {
                outcome.stats.cache_hits += members.len();
                let verdict = hit.payload.with_source(VerdictSource::Cache);
                for &idx in members {
                    prepared[idx].candidate.apply_verdict(verdict.clone());
                }
            }
            None => {
                outcome.stats.cache_misses += members.len();
                misses.push((hash.clone(), representative));
            }
        }
    }

    let batch_size = config.batch_size.max(1);
    for chunk in misses.chunks(batch_size) {
        let batch: Vec<ClassificationRequest> = chunk
            .iter()
            .map(|(_, idx)| {
                let item = &prepared[*idx];
                ClassificationRequest::from_candidate(&item.candidate, item.snippet.clone())
            })
            .collect();

        outcome.stats.classifier_calls += 1;
        outcome.stats.classified_items += batch.len();
        let parsed = match call_classifier(Arc::clone(&classifier), batch).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Classifier batch failed, using fallback verdicts: {}", e);
                outcome.degraded = Some(e.to_string());
                ParsedResponse::all_fallback(chunk.len())
            }
        };
        outcome.stats.fallbacks += parsed.fallbacks;

        for ((hash, representative), verdict) in chunk.iter().zip(parsed.verdicts) {
            if verdict.source != VerdictSource::Fallback {
                let item = &prepared[*representative];
                if let Err(e) =
                    cache.store_fingerprint(item.fingerprint.clone(), &item.snippet, verdict.clone())
                {
                    error!("Failed to persist cache entry {}: {}", short_hash(hash), e);
                }
            }
            for &idx in &groups[hash] {
                prepared[idx].candidate.apply_verdict(verdict.clone());
            }
        }
    }
    drop(guards);
    cache.release_idle_locks();

    debug!(stats = ?outcome.stats, "Classification complete");
    outcome.candidates = prepared.into_iter().map(|p| p.candidate).collect();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use indoc::indoc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SOURCE: &str = indoc! {"
        void add(float *a, float *b, float *c, int n) {
            for (int i = 0; i < n; i++) {
                c[i] = a[i] + b[i];
            }
        }
    "};

    struct CountingClassifier {
        calls: AtomicUsize,
        response: String,
    }

    impl Classifier for CountingClassifier {
        fn classify(&self, _batch: &[ClassificationRequest]) -> Result<String, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn safe_response() -> String {
        r#"{"candidate_1": {"classification": "safe_parallel", "confidence": 0.9}}"#.to_string()
    }

    fn candidate(line: usize, confidence: f64) -> Candidate {
        let mut candidate = Candidate::new("add.c", line, "add", PatternType::Vectorizable);
        candidate.confidence = confidence;
        candidate
    }

    #[test]
    fn test_heuristic_tiers() {
        assert_eq!(
            heuristic_verdict(&candidate(2, 0.85)).classification,
            Classification::SafeParallel
        );
        assert_eq!(
            heuristic_verdict(&candidate(2, 0.65)).classification,
            Classification::RequiresRuntimeCheck
        );
        let low = heuristic_verdict(&candidate(2, 0.3));
        assert_eq!(low.classification, Classification::NotParallel);
        assert_eq!(low.source, VerdictSource::Heuristic);
        assert_eq!(low.tests_recommended[0], "Thorough dependency analysis required");
        assert!(low.tests_recommended.contains(&"Verify SIMD instruction generation".to_string()));
    }

    #[tokio::test]
    async fn test_second_run_is_served_from_cache() {
        let cache = ResultCache::in_memory(CacheConfig::default());
        let classifier = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
            response: safe_response(),
        });
        let source = SourceText::new(SOURCE);
        let config = PipelineConfig::default();

        let first = classify_selected(
            vec![candidate(2, 0.9)],
            &source,
            &cache,
            classifier.clone(),
            &config,
        )
        .await;
        assert_eq!(first.stats.cache_misses, 1);
        assert_eq!(
            first.candidates[0].classification,
            Some(Classification::SafeParallel)
        );

        let second =
            classify_selected(vec![candidate(2, 0.9)], &source, &cache, classifier.clone(), &config)
                .await;
        assert_eq!(second.stats.cache_hits, 1);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        let verdict = second.candidates[0].verdict.as_ref().unwrap();
        assert_eq!(verdict.source, VerdictSource::Cache);
    }

    #[tokio::test]
    async fn test_identical_structures_share_one_item() {
        let cache = ResultCache::in_memory(CacheConfig::default());
        let classifier = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
            response: safe_response(),
        });
        let source = SourceText::new(SOURCE);
        let outcome = classify_selected(
            vec![candidate(2, 0.9), candidate(2, 0.8)],
            &source,
            &cache,
            classifier,
            &PipelineConfig::default(),
        )
        .await;
        assert_eq!(outcome.stats.classified_items, 1);
        assert!(outcome
            .candidates
            .iter()
            .all(|c| c.classification == Some(Classification::SafeParallel)));
    }

    #[tokio::test]
    async fn test_locks_are_released_after_classification() {
        let cache = ResultCache::in_memory(CacheConfig::default());
        let classifier = Arc::new(CountingClassifier {
            calls: AtomicUsize::new(0),
            response: safe_response(),
        });
        let source = SourceText::new(SOURCE);
        let config = PipelineConfig::default();

        for _ in 0..20 {
            classify_selected(vec![candidate(2, 0.9)], &source, &cache, classifier.clone(), &config)
                .await;
            classify_selected(
                vec![candidate(2, 0.9)],
                &source,
                &cache,
                Arc::new(crate::collaborators::UnavailableClassifier),
                &config,
            )
            .await;
        }
        assert_eq!(cache.lock_count(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_classifier_falls_back_and_is_not_cached() {
        let cache = ResultCache::in_memory(CacheConfig::default());
        let source = SourceText::new(SOURCE);
        let outcome = classify_selected(
            vec![candidate(2, 0.9)],
            &source,
            &cache,
            Arc::new(crate::collaborators::UnavailableClassifier),
            &PipelineConfig::default(),
        )
        .await;
        assert!(outcome.degraded.is_some());
        assert_eq!(outcome.stats.fallbacks, 1);
        assert_eq!(
            outcome.candidates[0].verdict,
            Some(ClassifierVerdict::fallback())
        );
        assert!(cache.is_empty());
    }
}
