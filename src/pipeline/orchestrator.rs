//! Section-scoped regeneration.
//!
//! [`RegenerationOrchestrator::produce`] drafts every section of a page
//! (a conversion page by default, or the landing page),
//! validates each one, and then regenerates only the sections that missed
//! their length window until they comply or run out of passes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::GenerationError;
use crate::generation::{generate_with_backoff, PageSubject, RetryPolicy, SectionGenerator};
use crate::sections::{
    check_body, LengthIssue, LengthStatus, SectionBody, SectionKey, SectionPolicy,
};
use crate::units::ConversionPairTask;

/// Final state of one section after orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Compliant,
    TooShort,
    TooLong,
    /// The generator failed on the last attempt rather than returning text.
    GenerationFailed,
}

impl SectionStatus {
    pub fn is_compliant(&self) -> bool {
        matches!(self, SectionStatus::Compliant)
    }
}

impl From<LengthStatus> for SectionStatus {
    fn from(status: LengthStatus) -> Self {
        match status {
            LengthStatus::Compliant => SectionStatus::Compliant,
            LengthStatus::TooShort => SectionStatus::TooShort,
            LengthStatus::TooLong => SectionStatus::TooLong,
        }
    }
}

impl fmt::Display for SectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SectionStatus::Compliant => "compliant",
            SectionStatus::TooShort => "too_short",
            SectionStatus::TooLong => "too_long",
            SectionStatus::GenerationFailed => "generation_failed",
        };
        f.write_str(s)
    }
}

/// Outcome for one section of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionResult {
    pub key: SectionKey,
    /// Latest body produced; kept from an earlier pass if a later one failed.
    pub body: SectionBody,
    pub word_count: usize,
    pub status: SectionStatus,
    /// Generation passes spent, counting the initial draft.
    pub passes_used: usize,
    /// Length problems of the current body.
    pub issues: Vec<LengthIssue>,
    /// Last generation error, if the last pass failed.
    pub error: Option<String>,
}

impl SectionResult {
    pub fn is_compliant(&self) -> bool {
        self.status.is_compliant()
    }

    /// One-line summary for logs and reports.
    pub fn summary(&self) -> String {
        match (&self.error, self.status) {
            (Some(err), SectionStatus::GenerationFailed) => {
                format!("{}: generation failed ({})", self.key, err)
            }
            _ if self.issues.is_empty() => format!("{}: {} words", self.key, self.word_count),
            _ => self
                .issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Section results of one page, in page order.
pub type SectionResults = BTreeMap<SectionKey, SectionResult>;

/// Batch-wide cap on regeneration calls, shared by every task in a run.
#[derive(Debug, Default)]
pub struct RegenerationBudget {
    remaining: Option<AtomicUsize>,
}

impl RegenerationBudget {
    pub fn unlimited() -> Self {
        Self { remaining: None }
    }

    pub fn limited(calls: usize) -> Self {
        Self {
            remaining: Some(AtomicUsize::new(calls)),
        }
    }

    pub fn from_option(calls: Option<usize>) -> Self {
        calls.map_or_else(Self::unlimited, Self::limited)
    }

    /// Reserve one regeneration; `false` once the budget is spent.
    pub fn try_take(&self) -> bool {
        match &self.remaining {
            None => true,
            Some(remaining) => remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok(),
        }
    }

    /// Calls left, or `None` when unlimited.
    pub fn remaining(&self) -> Option<usize> {
        self.remaining.as_ref().map(|r| r.load(Ordering::SeqCst))
    }
}

struct SectionState {
    policy: SectionPolicy,
    result: SectionResult,
    /// Cleared after a `Rejected` failure.
    retryable: bool,
}

impl SectionState {
    fn needs_pass(&self, max_passes: usize) -> bool {
        self.retryable && !self.result.is_compliant() && self.result.passes_used < max_passes
    }

    fn apply(&mut self, outcome: Result<SectionBody, GenerationError>) {
        match outcome {
            Ok(body) => {
                let check = check_body(&body, &self.policy);
                self.result.body = body;
                self.result.word_count = check.word_count;
                self.result.status = check.status.into();
                self.result.issues = check.issues;
                self.result.error = None;
            }
            Err(err) => {
                if !err.is_transient() {
                    self.retryable = false;
                }
                self.result.status = SectionStatus::GenerationFailed;
                self.result.error = Some(err.to_string());
            }
        }
    }
}

/// Drives generation and targeted regeneration for one page at a time.
pub struct RegenerationOrchestrator<S: PageSubject = ConversionPairTask> {
    generator: Arc<dyn SectionGenerator<S>>,
    retry: RetryPolicy,
    budget: Arc<RegenerationBudget>,
}

impl<S: PageSubject> RegenerationOrchestrator<S> {
    pub fn new(generator: Arc<dyn SectionGenerator<S>>, retry: RetryPolicy) -> Self {
        Self {
            generator,
            retry,
            budget: Arc::new(RegenerationBudget::unlimited()),
        }
    }

    /// Share a regeneration budget with other orchestrators of the same run.
    pub fn with_budget(mut self, budget: Arc<RegenerationBudget>) -> Self {
        self.budget = budget;
        self
    }

    /// Produce one result per policy entry.
    ///
    /// Every section is drafted once (`passes_used == 1`). Sections that are
    /// not compliant are then regenerated one pass at a time, each on its
    /// own, until they comply, reach `max_fix_passes`, are rejected by the
    /// generator, or the shared budget runs out. A `max_fix_passes` of 0 is
    /// treated as 1.
    pub async fn produce(
        &self,
        subject: &S,
        policies: &[SectionPolicy],
        max_fix_passes: usize,
    ) -> SectionResults {
        let max_passes = max_fix_passes.max(1);
        let page = subject.label();
        let mut states = Vec::with_capacity(policies.len());

        for policy in policies {
            let outcome =
                generate_with_backoff(self.generator.as_ref(), subject, policy.key, &self.retry)
                    .await;
            let mut state = SectionState {
                policy: *policy,
                result: SectionResult {
                    key: policy.key,
                    body: SectionBody::empty_for(policy),
                    word_count: 0,
                    status: SectionStatus::GenerationFailed,
                    passes_used: 1,
                    issues: Vec::new(),
                    error: None,
                },
                retryable: true,
            };
            state.apply(outcome);
            tracing::debug!(
                page = %page,
                section = %policy.key,
                words = state.result.word_count,
                status = %state.result.status,
                "Drafted section"
            );
            states.push(state);
        }

        let mut pass = 1;
        'passes: loop {
            let pending: Vec<usize> = states
                .iter()
                .enumerate()
                .filter(|(_, s)| s.needs_pass(max_passes))
                .map(|(i, _)| i)
                .collect();
            if pending.is_empty() {
                break;
            }
            pass += 1;

            tracing::info!(
                page = %page,
                pass,
                sections = pending.len(),
                "Regenerating non-compliant sections"
            );

            for index in pending {
                if !self.budget.try_take() {
                    tracing::warn!(page = %page, "Regeneration budget exhausted");
                    break 'passes;
                }

                let state = &mut states[index];
                let key = state.policy.key;
                let outcome =
                    generate_with_backoff(self.generator.as_ref(), subject, key, &self.retry).await;
                state.result.passes_used += 1;
                state.apply(outcome);

                tracing::debug!(
                    page = %page,
                    section = %key,
                    passes = state.result.passes_used,
                    words = state.result.word_count,
                    status = %state.result.status,
                    "Regenerated section"
                );
            }
        }

        for state in &states {
            if !state.result.is_compliant() {
                tracing::warn!(
                    page = %page,
                    section = %state.result.key,
                    passes = state.result.passes_used,
                    detail = %state.result.summary(),
                    "Section left non-compliant"
                );
            }
        }

        states
            .into_iter()
            .map(|s| (s.result.key, s.result))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    type Script = VecDeque<Result<SectionBody, GenerationError>>;

    /// Pops scripted outcomes per section; repeats the last one when drained.
    struct ScriptedGenerator {
        scripts: Mutex<HashMap<SectionKey, Script>>,
        calls: Mutex<Vec<SectionKey>>,
    }

    impl ScriptedGenerator {
        fn new(scripts: Vec<(SectionKey, Vec<Result<SectionBody, GenerationError>>)>) -> Self {
            Self {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(k, v)| (k, v.into_iter().collect()))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_for(&self, key: SectionKey) -> usize {
            self.calls.lock().unwrap().iter().filter(|k| **k == key).count()
        }
    }

    #[async_trait]
    impl SectionGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _task: &ConversionPairTask,
            key: SectionKey,
        ) -> Result<SectionBody, GenerationError> {
            self.calls.lock().unwrap().push(key);
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.get_mut(&key).expect("scripted section");
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    fn prose(words: usize) -> Result<SectionBody, GenerationError> {
        Ok(SectionBody::Prose(format!("<p>{}</p>", vec!["w"; words].join(" "))))
    }

    fn task() -> ConversionPairTask {
        ConversionPairTask::new(
            "SQ_M",
            "SQ_FT",
            "Square Meter",
            "Square Feet",
            10.7639,
            "Pan-India",
            "Pan-India",
            Some("Mumbai".to_string()),
        )
        .unwrap()
    }

    fn window() -> Vec<SectionPolicy> {
        vec![SectionPolicy::prose(SectionKey::WhyConvert, 200, 300)]
    }

    fn orchestrator(generator: Arc<ScriptedGenerator>) -> RegenerationOrchestrator {
        let generator: Arc<dyn SectionGenerator> = generator;
        RegenerationOrchestrator::new(generator, RetryPolicy::immediate(1))
    }

    #[tokio::test]
    async fn test_compliant_draft_is_not_regenerated() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            SectionKey::WhyConvert,
            vec![prose(250)],
        )]));
        let results = orchestrator(generator.clone())
            .produce(&task(), &window(), 3)
            .await;

        let result = &results[&SectionKey::WhyConvert];
        assert_eq!(result.status, SectionStatus::Compliant);
        assert_eq!(result.passes_used, 1);
        assert_eq!(generator.calls_for(SectionKey::WhyConvert), 1);
    }

    #[tokio::test]
    async fn test_short_draft_is_fixed_in_one_pass() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            SectionKey::WhyConvert,
            vec![prose(150), prose(240)],
        )]));
        let results = orchestrator(generator).produce(&task(), &window(), 3).await;

        let result = &results[&SectionKey::WhyConvert];
        assert_eq!(result.status, SectionStatus::Compliant);
        assert_eq!(result.word_count, 240);
        assert_eq!(result.passes_used, 2);
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn test_passes_never_exceed_cap() {
        for max in 1..=4 {
            let generator = Arc::new(ScriptedGenerator::new(vec![(
                SectionKey::WhyConvert,
                vec![prose(150)],
            )]));
            let results = orchestrator(generator.clone())
                .produce(&task(), &window(), max)
                .await;
            let result = &results[&SectionKey::WhyConvert];
            assert_eq!(result.status, SectionStatus::TooShort);
            assert_eq!(result.passes_used, max);
            assert_eq!(generator.calls_for(SectionKey::WhyConvert), max);
        }
    }

    #[tokio::test]
    async fn test_only_failing_sections_are_regenerated() {
        let policies = vec![
            SectionPolicy::prose(SectionKey::WhyConvert, 200, 300),
            SectionPolicy::prose(SectionKey::Examples, 90, 200),
        ];
        let generator = Arc::new(ScriptedGenerator::new(vec![
            (SectionKey::WhyConvert, vec![prose(400), prose(260)]),
            (SectionKey::Examples, vec![prose(100)]),
        ]));
        let results = orchestrator(generator.clone())
            .produce(&task(), &policies, 3)
            .await;

        assert_eq!(generator.calls_for(SectionKey::WhyConvert), 2);
        assert_eq!(generator.calls_for(SectionKey::Examples), 1);
        assert!(results.values().all(SectionResult::is_compliant));
        assert_eq!(
            results.keys().copied().collect::<Vec<_>>(),
            vec![SectionKey::WhyConvert, SectionKey::Examples]
        );
    }

    #[tokio::test]
    async fn test_rejected_section_is_not_retried() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            SectionKey::WhyConvert,
            vec![Err(GenerationError::Rejected("policy".to_string()))],
        )]));
        let results = orchestrator(generator.clone())
            .produce(&task(), &window(), 3)
            .await;

        let result = &results[&SectionKey::WhyConvert];
        assert_eq!(result.status, SectionStatus::GenerationFailed);
        assert_eq!(result.passes_used, 1);
        assert!(result.body.is_empty());
        assert_eq!(generator.calls_for(SectionKey::WhyConvert), 1);
        assert!(result.summary().contains("generation failed"));
    }

    #[tokio::test]
    async fn test_unavailable_section_recovers_in_a_later_pass() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            SectionKey::WhyConvert,
            vec![
                Err(GenerationError::Unavailable("503".to_string())),
                prose(220),
            ],
        )]));
        let results = orchestrator(generator).produce(&task(), &window(), 2).await;

        let result = &results[&SectionKey::WhyConvert];
        assert_eq!(result.status, SectionStatus::Compliant);
        assert_eq!(result.passes_used, 2);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_failed_regeneration_keeps_previous_body() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            SectionKey::WhyConvert,
            vec![
                prose(150),
                Err(GenerationError::Rejected("refused".to_string())),
            ],
        )]));
        let results = orchestrator(generator.clone())
            .produce(&task(), &window(), 5)
            .await;

        let result = &results[&SectionKey::WhyConvert];
        assert_eq!(result.status, SectionStatus::GenerationFailed);
        assert_eq!(result.word_count, 150);
        assert!(!result.body.is_empty());
        assert_eq!(result.passes_used, 2);
        assert_eq!(generator.calls_for(SectionKey::WhyConvert), 2);
    }

    #[tokio::test]
    async fn test_budget_stops_regeneration() {
        let generator = Arc::new(ScriptedGenerator::new(vec![(
            SectionKey::WhyConvert,
            vec![prose(150)],
        )]));
        let budget = Arc::new(RegenerationBudget::limited(1));
        let results = orchestrator(generator.clone())
            .with_budget(budget.clone())
            .produce(&task(), &window(), 5)
            .await;

        assert_eq!(results[&SectionKey::WhyConvert].passes_used, 2);
        assert_eq!(budget.remaining(), Some(0));
        assert!(!budget.try_take());
    }

    #[test]
    fn test_unlimited_budget() {
        let budget = RegenerationBudget::from_option(None);
        assert!(budget.try_take());
        assert_eq!(budget.remaining(), None);
    }
}
