//! Per-file orchestration of the analysis phases.
//!
//! Each file runs through the states of [`PipelineState`] in order. The
//! detector and classifier calls are the only suspension points; every other
//! phase is a synchronous transform of the previous phase's output. Phases
//! never fail the run: collaborator problems are recorded as a
//! [`PhaseOutcome`] on the file's report.

pub mod builder;
pub mod classify;
pub mod finalize;
pub mod report;
pub mod sanitize;
pub mod state;
pub mod unify;

pub use builder::PipelineBuilder;
pub use classify::{ClassifyOutcome, ClassifyStats};
pub use finalize::{combined_confidence, finalize};
pub use report::FileAnalysis;
pub use sanitize::SanitizeStats;
pub use state::{PhaseOutcome, PhaseRecord, PipelineState};
pub use unify::{unify_blocks, UnifyStats};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

use crate::blocks::BlockPartitioner;
use crate::cache::ResultCache;
use crate::collaborators::{CandidateDetector, Classifier, CollaboratorError};
use crate::config::ParascoreConfig;
use crate::core::{Candidate, Classification, Error, Language, Result};
use crate::hotspot::{self, HotspotDetector};
use crate::scoring::{prioritize, ConfidenceDistribution, ConfidenceScorer};
use crate::source::SourceText;

/// Note attached to candidates returned from a timed-out run
pub const ENHANCEMENT_SKIPPED: &str = "enhancement skipped: analysis timed out";

pub struct Pipeline {
    config: ParascoreConfig,
    hotspots: HotspotDetector,
    partitioner: BlockPartitioner,
    scorer: ConfidenceScorer,
    cache: Arc<ResultCache>,
    detector: Arc<dyn CandidateDetector>,
    classifier: Arc<dyn Classifier>,
}

/// Mutable progress of one file. Survives a timeout so partial results can
/// be returned.
struct RunState {
    report: FileAnalysis,
    current: PipelineState,
    started: Instant,
    /// Candidates retained by scoring, before any classification
    scored: Vec<Candidate>,
}

impl RunState {
    fn new(path: &Path) -> Self {
        Self {
            report: FileAnalysis::new(path, Language::from_path(path)),
            current: PipelineState::DetectHotspots,
            started: Instant::now(),
            scored: Vec::new(),
        }
    }

    fn enter(&mut self, state: PipelineState) {
        self.current = state;
        self.started = Instant::now();
    }

    fn record(&mut self, outcome: PhaseOutcome, items: usize) {
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(phase = %self.current, items, elapsed_ms, "Phase finished");
        self.report.phases.push(PhaseRecord {
            state: self.current,
            outcome,
            elapsed_ms,
            items,
        });
    }

    /// Closes the current phase as timed out and returns the scored
    /// candidates, each marked for a runtime check.
    fn into_timed_out(mut self) -> FileAnalysis {
        self.record(PhaseOutcome::TimedOut, 0);
        let candidates = self
            .scored
            .into_iter()
            .map(|mut candidate| {
                candidate.classification = Some(Classification::RequiresRuntimeCheck);
                candidate.verdict = None;
                candidate.notes.push(ENHANCEMENT_SKIPPED.to_string());
                candidate
            })
            .collect();
        self.report.candidates = finalize(candidates, 0.0);
        self.report.timed_out = true;
        self.report
    }
}

impl Pipeline {
    pub fn new(config: ParascoreConfig) -> Self {
        PipelineBuilder::new(config).build()
    }

    pub fn builder(config: ParascoreConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &ParascoreConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    /// Reads and analyses one file
    pub async fn analyze_file(&self, path: &Path) -> Result<FileAnalysis> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
        Ok(self.analyze_source(path, &source).await)
    }

    /// Analyses `source` as the contents of `path`. Never fails; a timeout
    /// returns the candidates scored so far.
    pub async fn analyze_source(&self, path: &Path, source: &str) -> FileAnalysis {
        let span = info_span!("analyze_file", file = %path.display());
        async {
            let mut state = RunState::new(path);
            let budget = self.config.pipeline.file_timeout();
            let finished = tokio::time::timeout(budget, self.run(path, source, &mut state)).await;

            match finished {
                Ok(()) => {
                    info!(
                        candidates = state.report.candidates.len(),
                        "File analysis complete"
                    );
                    state.report
                }
                Err(_) => {
                    warn!(
                        phase = %state.current,
                        timeout_secs = budget.as_secs(),
                        "File analysis timed out, returning scored candidates"
                    );
                    state.into_timed_out()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, path: &Path, source: &str, state: &mut RunState) {
        let text = SourceText::new(source);

        state.enter(PipelineState::DetectHotspots);
        let hotspots = self.hotspots.detect(source);
        state.report.hotspot_summary = hotspot::summarize(&hotspots);
        state.record(PhaseOutcome::Completed, hotspots.len());

        state.enter(PipelineState::PartitionBlocks);
        let partition = self.partitioner.partition(source);
        state.report.block_summary = partition.summary();
        state.report.blocks = partition.blocks.clone();
        state.record(PhaseOutcome::Completed, partition.len());

        state.enter(PipelineState::RawCandidates);
        let language = state.report.language;
        let (raw, outcome) = match self.detect(path, language).await {
            Ok(raw) => (raw, PhaseOutcome::Completed),
            Err(e) => {
                warn!("Detector failed, continuing without candidates: {}", e);
                (Vec::new(), PhaseOutcome::degraded(e.to_string()))
            }
        };
        let (candidates, sanitize_stats) = sanitize::sanitize(raw);
        state.report.sanitize = sanitize_stats;
        state.record(outcome, candidates.len());

        state.enter(PipelineState::FilterByHotspot);
        let filtered = self.hotspots.filter_candidates(candidates, &hotspots);
        state.report.hotspot_filter = Some(filtered.mode);
        state.report.hotspots = hotspots;
        state.record(PhaseOutcome::Completed, filtered.candidates.len());

        state.enter(PipelineState::ScoreConfidence);
        let scored = self
            .scorer
            .filter_by_confidence(filtered.candidates, Some(&text));
        state.report.confidence = scored.stats;
        state.report.distribution = ConfidenceDistribution::from_candidates(&scored.candidates);
        state.scored = scored.candidates.clone();
        state.record(PhaseOutcome::Completed, scored.candidates.len());

        state.enter(PipelineState::Prioritize);
        let selection = prioritize(scored.candidates, self.config.pipeline.max_classified);
        let mut deferred = selection.deferred;
        classify::apply_heuristic_verdicts(&mut deferred);
        state.record(PhaseOutcome::Completed, selection.selected.len());

        state.enter(PipelineState::Classify);
        let classified = classify::classify_selected(
            selection.selected,
            &text,
            &self.cache,
            Arc::clone(&self.classifier),
            &self.config.pipeline,
        )
        .await;
        state.report.classify = classified.stats;
        let outcome = match classified.degraded {
            Some(reason) => PhaseOutcome::degraded(reason),
            None => PhaseOutcome::Completed,
        };
        let mut candidates = classified.candidates;
        candidates.extend(deferred);
        state.record(outcome, candidates.len());

        state.enter(PipelineState::UnifyBlocks);
        state.report.unify = unify_blocks(&mut candidates, &partition);
        state.record(PhaseOutcome::Completed, state.report.unify.blocks_unified);

        state.enter(PipelineState::Finalize);
        let finished = finalize(candidates, self.config.pipeline.min_final_confidence);
        state.record(PhaseOutcome::Completed, finished.len());
        state.report.candidates = finished;
    }

    async fn detect(
        &self,
        path: &Path,
        language: Language,
    ) -> std::result::Result<Vec<Candidate>, CollaboratorError> {
        let detector = Arc::clone(&self.detector);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || detector.detect(&path, language))
            .await
            .map_err(|e| CollaboratorError::Failed(format!("detector task failed: {}", e)))?
    }

    /// Analyses `paths` concurrently, at most `max_concurrent_files` at a
    /// time. Results keep the input order.
    pub async fn analyze_files(self: &Arc<Self>, paths: Vec<PathBuf>) -> Vec<Result<FileAnalysis>> {
        let permits = Arc::new(Semaphore::new(self.config.pipeline.max_concurrent_files.max(1)));
        let mut tasks = JoinSet::new();

        for (index, path) in paths.iter().cloned().enumerate() {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let pipeline = Arc::clone(self);
            tasks.spawn(async move {
                let result = pipeline.analyze_file(&path).await;
                drop(permit);
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<FileAnalysis>>> = paths.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => error!("File analysis task failed: {}", e),
            }
        }

        results
            .into_iter()
            .zip(paths)
            .map(|(result, path)| {
                result.unwrap_or_else(|| {
                    Err(Error::file_system("analysis task did not complete", path))
                })
            })
            .collect()
    }

    /// Persists cache usage counts
    pub fn shutdown(&self) -> Result<()> {
        self.cache.flush()
    }
}
