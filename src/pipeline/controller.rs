//! Batch execution over a task source.
//!
//! Each dispatched pair moves `Processing -> {Succeeded, Skipped}`. Pairs run
//! concurrently up to `max_concurrency`, but results are merged back in input
//! order. A panic or persistence failure on one pair is recorded against that
//! pair only.

use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::generation::SectionGenerator;
use crate::render::PreviewWriter;
use crate::storage::{PersistOutcome, PersistenceSink, PREVIEW_ONLY};
use crate::units::{ConversionPairTask, SourceRow};

use super::assembler::{routing_slug, DocumentAssembler, PageDocument};
use super::config::PipelineConfig;
use super::orchestrator::{RegenerationBudget, RegenerationOrchestrator};

/// A pair (or input row) that did not produce a committed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTask {
    /// Pair identity, or `line N` for rows that never became a task.
    pub label: String,
    pub task: Option<ConversionPairTask>,
    pub reason: String,
}

/// Aggregate outcome of one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchRunResult {
    /// Documents committed (or previewed), in input order.
    pub succeeded: Vec<PageDocument>,
    /// Skipped pairs and malformed rows, in input order.
    pub skipped: Vec<SkippedTask>,
    /// `(slug, reason)` for previews that could not be written.
    pub render_failures: Vec<(String, String)>,
}

impl BatchRunResult {
    /// Succeeded documents flagged for review.
    pub fn degraded_count(&self) -> usize {
        self.succeeded.iter().filter(|d| d.needs_review()).count()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            succeeded: self.succeeded.len(),
            degraded: self.degraded_count(),
            skipped: self.skipped.len(),
            succeeded_slugs: self.succeeded.iter().map(|d| d.routing_slug.clone()).collect(),
            skip_reasons: self
                .skipped
                .iter()
                .map(|s| SkipReason {
                    label: s.label.clone(),
                    reason: s.reason.clone(),
                })
                .collect(),
            render_failures: self.render_failures.len(),
        }
    }
}

/// End-of-run report printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub degraded: usize,
    pub skipped: usize,
    pub succeeded_slugs: Vec<String>,
    pub skip_reasons: Vec<SkipReason>,
    pub render_failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkipReason {
    pub label: String,
    pub reason: String,
}

enum TaskOutcome {
    Succeeded(PageDocument),
    Skipped(String),
}

struct TaskReport {
    task: ConversionPairTask,
    outcome: TaskOutcome,
    render_failure: Option<(String, String)>,
}

enum Slot {
    Malformed(SkippedTask),
    Dispatched(usize),
}

/// Runs conversion pairs through generation, assembly, preview and persistence.
pub struct BatchController {
    config: PipelineConfig,
    generator: Arc<dyn SectionGenerator>,
    sink: PersistenceSink,
    assembler: DocumentAssembler,
    previews: Option<PreviewWriter>,
}

impl BatchController {
    pub fn new(
        config: PipelineConfig,
        generator: Arc<dyn SectionGenerator>,
        sink: PersistenceSink,
    ) -> Self {
        let assembler = DocumentAssembler::from_config(&config);
        let previews = config.preview_dir.clone().map(PreviewWriter::new);
        Self {
            config,
            generator,
            sink,
            assembler,
            previews,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process rows until the input ends or `pair_limit` pairs are dispatched.
    ///
    /// Malformed rows are recorded as skipped and do not count toward the
    /// limit. Once the limit is reached no further rows are read.
    pub async fn run<I>(&self, rows: I) -> BatchRunResult
    where
        I: IntoIterator<Item = SourceRow>,
    {
        let budget = Arc::new(RegenerationBudget::from_option(
            self.config.regeneration_budget,
        ));
        let orchestrator =
            RegenerationOrchestrator::new(self.generator.clone(), self.config.retry)
                .with_budget(budget);
        let semaphore = Semaphore::new(self.config.max_concurrency.max(1));

        let mut slots = Vec::new();
        let mut pending = Vec::new();
        let mut rows = rows.into_iter();

        loop {
            if self
                .config
                .pair_limit
                .is_some_and(|limit| pending.len() >= limit)
            {
                tracing::info!(limit = pending.len(), "Pair limit reached, not reading further rows");
                break;
            }
            let Some(row) = rows.next() else {
                break;
            };

            match row {
                SourceRow::Malformed { line, reason } => {
                    tracing::warn!(line, reason = %reason, "Skipping malformed input row");
                    slots.push(Slot::Malformed(SkippedTask {
                        label: format!("line {}", line),
                        task: None,
                        reason,
                    }));
                }
                SourceRow::Task(task) => {
                    slots.push(Slot::Dispatched(pending.len()));
                    pending.push(self.guarded(&orchestrator, &semaphore, task));
                }
            }
        }

        tracing::info!(
            pairs = pending.len(),
            concurrency = self.config.max_concurrency,
            preview_only = self.sink.is_preview_only(),
            "Starting batch"
        );

        let mut reports: Vec<Option<TaskReport>> = futures::future::join_all(pending)
            .await
            .into_iter()
            .map(Some)
            .collect();

        let mut result = BatchRunResult::default();
        for slot in slots {
            match slot {
                Slot::Malformed(skipped) => result.skipped.push(skipped),
                Slot::Dispatched(index) => {
                    let Some(report) = reports.get_mut(index).and_then(Option::take) else {
                        continue;
                    };
                    if let Some(failure) = report.render_failure {
                        result.render_failures.push(failure);
                    }
                    match report.outcome {
                        TaskOutcome::Succeeded(document) => result.succeeded.push(document),
                        TaskOutcome::Skipped(reason) => result.skipped.push(SkippedTask {
                            label: report.task.identity().to_string(),
                            task: Some(report.task),
                            reason,
                        }),
                    }
                }
            }
        }

        tracing::info!(
            succeeded = result.succeeded.len(),
            degraded = result.degraded_count(),
            skipped = result.skipped.len(),
            render_failures = result.render_failures.len(),
            "Batch finished"
        );
        result
    }

    /// Process one pair under the concurrency limit, converting a panic into
    /// a skip.
    async fn guarded(
        &self,
        orchestrator: &RegenerationOrchestrator,
        semaphore: &Semaphore,
        task: ConversionPairTask,
    ) -> TaskReport {
        let Ok(_permit) = semaphore.acquire().await else {
            return TaskReport {
                task,
                outcome: TaskOutcome::Skipped("scheduler closed".to_string()),
                render_failure: None,
            };
        };

        let processing = AssertUnwindSafe(self.process(orchestrator, &task)).catch_unwind();
        match processing.await {
            Ok((outcome, render_failure)) => TaskReport {
                task,
                outcome,
                render_failure,
            },
            Err(panic) => {
                let reason = format!("processing panicked: {}", panic_message(panic.as_ref()));
                tracing::error!(pair = %task.identity(), reason = %reason, "Task aborted");
                TaskReport {
                    task,
                    outcome: TaskOutcome::Skipped(reason),
                    render_failure: None,
                }
            }
        }
    }

    async fn process(
        &self,
        orchestrator: &RegenerationOrchestrator,
        task: &ConversionPairTask,
    ) -> (TaskOutcome, Option<(String, String)>) {
        let slug = routing_slug(task.from_code(), task.to_code());
        tracing::info!(slug = %slug, pair = %task.identity(), "Processing pair");

        let sections = orchestrator
            .produce(task, &self.config.policies, self.config.effective_max_passes())
            .await;
        let document = self.assembler.assemble(task, sections);

        let render_failure = self.previews.as_ref().and_then(|writer| {
            writer.write(&document).err().map(|err| {
                tracing::warn!(slug = %slug, error = %err, "Preview not written");
                (slug.clone(), err.to_string())
            })
        });

        if document.needs_review() && !self.config.persist_degraded && !self.sink.is_preview_only() {
            let reason = format!("needs review: {}", document.review_summary());
            tracing::warn!(slug = %slug, reason = %reason, "Withholding document");
            return (TaskOutcome::Skipped(reason), render_failure);
        }

        let outcome = match self.sink.upsert(&document).await {
            PersistOutcome::Committed => {
                tracing::info!(slug = %slug, needs_review = document.needs_review(), "Committed");
                TaskOutcome::Succeeded(document)
            }
            PersistOutcome::Skipped(reason) if reason == PREVIEW_ONLY => {
                tracing::info!(slug = %slug, needs_review = document.needs_review(), "Previewed");
                TaskOutcome::Succeeded(document)
            }
            PersistOutcome::Skipped(reason) => TaskOutcome::Skipped(reason),
        };
        (outcome, render_failure)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
