use indoc::indoc;
use parascore::collaborators::ClassificationRequest;
use parascore::config::ValidationMode;
use parascore::pipeline::{PhaseOutcome, PipelineState};
use parascore::{
    CandidateDetector, Classification, Classifier, CollaboratorError, Language, ParascoreConfig,
    Pipeline, ReportFileDetector, ResultCache,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const SMOOTH: &str = indoc! {"
    void smooth(double **a, int n, int m) {
        for (int i = 0; i < n; i++) {
            for (int j = 0; j < m; j++) {
                a[i][j] = a[i][j+1] * 0.5;
            }
        }
    }
"};

const SCALE: &str = indoc! {"
    void scale(float *a, float *b, float s, int n) {
        for (int i = 0; i < n; i++) {
            b[i] = a[i] * s + 1.0f;
        }
    }
"};

/// Answers every item with the same label and counts calls
struct ScriptedClassifier {
    label: &'static str,
    calls: Arc<AtomicUsize>,
}

impl ScriptedClassifier {
    fn new(label: &'static str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                label,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, batch: &[ClassificationRequest]) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut items = serde_json::Map::new();
        for index in 1..=batch.len() {
            items.insert(
                format!("candidate_{index}"),
                json!({
                    "classification": self.label,
                    "reasoning": "scripted",
                    "confidence": 0.9,
                    "transformations": [],
                    "tests_recommended": [],
                    "logic_issue_type": "none"
                }),
            );
        }
        Ok(format!("<think>batch of {}</think>\n{}", batch.len(), json!(items)))
    }
}

fn config() -> ParascoreConfig {
    let mut config = ParascoreConfig::default();
    config.validation.mode = ValidationMode::SyntaxOnly;
    // tests hand in their own cache; keep the user cache directory untouched
    config.cache.enabled = false;
    config
}

fn write_source(dir: &Path, name: &str, source: &str, candidates: serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    let report = ReportFileDetector::default().report_path(&path);
    fs::write(report, serde_json::to_string_pretty(&candidates).unwrap()).unwrap();
    path
}

fn candidate(path: &Path, line: i64, function: &str, kind: &str, patch: &str) -> serde_json::Value {
    json!({
        "file": path.display().to_string(),
        "line": line,
        "function": function,
        "candidate_type": kind,
        "reason": "independent iterations",
        "suggested_patch": patch
    })
}

#[tokio::test]
async fn test_dependency_block_unified_to_runtime_check() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("smooth.c");
    let candidates = json!([
        candidate(&path, 3, "smooth", "embarrassingly_parallel", "#pragma omp parallel for"),
        candidate(&path, 4, "smooth", "embarrassingly_parallel", "#pragma omp parallel for"),
        candidate(&path, 4, "smooth", "embarrassingly_parallel", "#pragma omp parallel for"),
        candidate(Path::new("/usr/include/math.h"), 120, "pow", "simple_loop", ""),
    ]);
    let path = write_source(temp.path(), "smooth.c", SMOOTH, candidates);

    let (classifier, calls) = ScriptedClassifier::new("safe_parallel");
    let pipeline = Pipeline::builder(config())
        .detector(ReportFileDetector::default())
        .classifier(classifier)
        .cache(Arc::new(ResultCache::in_memory(Default::default())))
        .build();
    let report = pipeline.analyze_file(&path).await.unwrap();

    assert_eq!(report.language, Language::C);
    assert_eq!(report.sanitize.system_paths, 1);
    assert_eq!(report.sanitize.duplicates, 1);
    assert_eq!(report.candidates.len(), 2);
    // both candidates share one structural fingerprint
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.classify.classified_items, 1);

    for candidate in &report.candidates {
        assert_eq!(candidate.classification, Some(Classification::RequiresRuntimeCheck));
        assert!(candidate.notes.iter().any(|n| n.starts_with("Unified with block")));
        let combined = candidate.combined_confidence.unwrap();
        assert!((0.0..=1.0).contains(&combined));
    }
    assert_eq!(report.unify.blocks_unified, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_missing_detector_report_yields_empty_result() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("scale.c");
    fs::write(&path, SCALE).unwrap();

    let pipeline = Pipeline::builder(config())
        .detector(ReportFileDetector::default())
        .cache(Arc::new(ResultCache::in_memory(Default::default())))
        .build();
    let report = pipeline.analyze_file(&path).await.unwrap();

    assert!(report.candidates.is_empty());
    assert!(matches!(
        report.phase(PipelineState::RawCandidates).map(|p| &p.outcome),
        Some(PhaseOutcome::Degraded { .. })
    ));
    assert_eq!(report.problems().count(), 1);
    assert_eq!(report.hotspot_summary.total_hotspots, report.hotspots.len());
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let pipeline = Pipeline::new(config());
    assert!(pipeline.analyze_file(Path::new("/nonexistent/k.c")).await.is_err());
}

#[tokio::test]
async fn test_report_serializes_with_every_phase() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("scale.c");
    let candidates = json!([candidate(&path, 2, "scale", "vectorizable", "#pragma omp simd")]);
    let path = write_source(temp.path(), "scale.c", SCALE, candidates);

    let (classifier, _) = ScriptedClassifier::new("safe_parallel");
    let pipeline = Pipeline::builder(config())
        .detector(ReportFileDetector::default())
        .classifier(classifier)
        .cache(Arc::new(ResultCache::in_memory(Default::default())))
        .build();
    let report = pipeline.analyze_file(&path).await.unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["phases"].as_array().unwrap().len(), PipelineState::ORDER.len());
    assert_eq!(value["phases"][0]["state"], "detect_hotspots");
    assert_eq!(value["phases"][0]["outcome"]["status"], "completed");
    assert_eq!(value["candidates"][0]["classification"], "safe_parallel");
    assert_eq!(value["timed_out"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_files_share_one_classification() {
    let temp = TempDir::new().unwrap();
    let mut paths = Vec::new();
    for name in ["first.c", "second.c", "third.c"] {
        let path = temp.path().join(name);
        let candidates = json!([candidate(&path, 2, "scale", "vectorizable", "#pragma omp simd")]);
        paths.push(write_source(temp.path(), name, SCALE, candidates));
    }

    let (classifier, calls) = ScriptedClassifier::new("safe_parallel");
    let pipeline = Arc::new(
        Pipeline::builder(config())
            .detector(ReportFileDetector::default())
            .classifier(classifier)
            .cache(Arc::new(ResultCache::in_memory(Default::default())))
            .build(),
    );
    let results = pipeline.analyze_files(paths.clone()).await;

    assert_eq!(results.len(), 3);
    let reports: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    for (report, path) in reports.iter().zip(&paths) {
        assert_eq!(&report.file, path);
        assert_eq!(report.candidates.len(), 1);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let hits: usize = reports.iter().map(|r| r.classify.cache_hits).sum();
    assert_eq!(hits, 2);
}

struct PanickingDetector;

impl CandidateDetector for PanickingDetector {
    fn detect(&self, _path: &Path, _language: Language) -> Result<Vec<parascore::Candidate>, CollaboratorError> {
        panic!("detector bug");
    }
}

#[tokio::test]
async fn test_panicking_detector_is_degraded() {
    let pipeline = Pipeline::builder(config()).detector(PanickingDetector).build();
    let report = pipeline.analyze_source(Path::new("scale.c"), SCALE).await;
    assert!(report.candidates.is_empty());
    assert!(!report.is_clean());
}
