//! Evidence-of-work gate
//!
//! Sits in front of lesson completion for configured modules: the
//! completion callback only runs once the learner has a satisfying
//! evidence submission on record. A submitted record is terminal; the
//! gate never re-prompts for that lesson. Persistence is local-first:
//! the remote send is best-effort and can never block progress.

pub mod submit;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EvidenceConfig;
use crate::store::{PersistentStore, StorageBackend};
use crate::types::{LessonKey, ProfileResolver};
use submit::{send_best_effort, RemoteSink, SubmitOutcome};

/// Storage namespace for this subsystem's keys.
pub const SUBSYSTEM: &str = "evidence";

/// Persisted evidence state for one lesson
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub submitted: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub session_id: Option<Uuid>,
    pub scratch_url: Option<String>,
    pub what_learned: String,
    pub what_created: String,
    /// True when the remote send failed or was not configured
    pub offline_submit: bool,
}

/// Field values collected from the learner
#[derive(Debug, Clone, Default)]
pub struct EvidenceDraft {
    pub scratch_url: Option<String>,
    pub what_learned: String,
    pub what_created: String,
}

/// A user-facing validation failure; fully recoverable by fixing input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("'Ce ai invatat' must be at least {0} characters")]
    WhatLearnedTooShort(usize),
    #[error("'Ce ai creat' must be at least {0} characters")]
    WhatCreatedTooShort(usize),
    #[error("the project URL does not look like a valid project link")]
    InvalidProjectUrl,
}

/// What happened when a completion attempt hit the gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Module not in the required list; callback ran immediately
    NotRequired,
    /// Evidence already on record; callback ran immediately
    AlreadySubmitted,
    /// Fresh evidence saved (and best-effort sent); callback ran
    Submitted { offline: bool },
    /// Learner deferred; no record written, callback not run
    Deferred,
    /// Submission failed validation; no record written, callback not run
    Invalid(Vec<Violation>),
}

/// Collaborator that collects evidence from the learner (a form in the
/// real UI, stdin in the CLI, a stub in tests)
pub trait EvidencePrompt {
    fn collect(&mut self, lesson: &LessonKey) -> PromptResponse;
}

/// Learner's response to the collection prompt
#[derive(Debug, Clone)]
pub enum PromptResponse {
    Submitted(EvidenceDraft),
    Deferred,
}

pub struct EvidenceGate {
    store: PersistentStore,
    profiles: Arc<dyn ProfileResolver>,
    config: EvidenceConfig,
    sink: Arc<dyn RemoteSink>,
    url_pattern: OnceCell<Option<Regex>>,
}

impl EvidenceGate {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        profiles: Arc<dyn ProfileResolver>,
        config: EvidenceConfig,
        sink: Arc<dyn RemoteSink>,
    ) -> Self {
        Self {
            store: PersistentStore::new(backend, SUBSYSTEM),
            profiles,
            config,
            sink,
            url_pattern: OnceCell::new(),
        }
    }

    /// Whether lessons of this module require evidence before completion
    pub fn is_required(&self, module: &str) -> bool {
        self.config.required_modules.iter().any(|m| m == module)
    }

    /// Stored record for a lesson (default when never touched)
    pub fn record_for(&self, lesson: &LessonKey) -> EvidenceRecord {
        let profile = self.profiles.active_profile_id();
        self.store.load(&profile, Some(&lesson.storage_suffix()))
    }

    pub fn is_submitted(&self, lesson: &LessonKey) -> bool {
        self.record_for(lesson).submitted
    }

    /// Run a completion attempt through the gate.
    ///
    /// When the module is not gated, or evidence is already on record,
    /// `on_complete` runs synchronously in the same call with no prompt.
    /// Otherwise the prompt collaborator collects a draft: a valid
    /// submission is saved locally (and best-effort sent) before
    /// `on_complete` runs; a defer or an invalid draft writes nothing and
    /// never runs the callback.
    pub fn gate<F: FnOnce()>(
        &self,
        lesson: &LessonKey,
        prompt: &mut dyn EvidencePrompt,
        on_complete: F,
    ) -> GateOutcome {
        if !self.is_required(&lesson.module) {
            on_complete();
            return GateOutcome::NotRequired;
        }
        if self.is_submitted(lesson) {
            on_complete();
            return GateOutcome::AlreadySubmitted;
        }

        match prompt.collect(lesson) {
            PromptResponse::Deferred => GateOutcome::Deferred,
            PromptResponse::Submitted(draft) => {
                let violations = self.validate(&draft);
                if !violations.is_empty() {
                    return GateOutcome::Invalid(violations);
                }
                let outcome = self.submit(lesson, &draft);
                on_complete();
                GateOutcome::Submitted {
                    offline: outcome.is_offline(),
                }
            }
        }
    }

    /// Check a draft against the configured rules.
    ///
    /// An empty project URL is permitted; only a non-empty URL is matched
    /// against the configured shape.
    pub fn validate(&self, draft: &EvidenceDraft) -> Vec<Violation> {
        let min = self.config.min_text_length;
        let mut violations = Vec::new();

        if draft.what_learned.trim().chars().count() < min {
            violations.push(Violation::WhatLearnedTooShort(min));
        }
        if draft.what_created.trim().chars().count() < min {
            violations.push(Violation::WhatCreatedTooShort(min));
        }
        if let Some(url) = draft.scratch_url.as_deref() {
            let url = url.trim();
            if !url.is_empty() {
                match self.url_pattern() {
                    Some(pattern) if pattern.is_match(url) => {}
                    Some(_) => violations.push(Violation::InvalidProjectUrl),
                    // Unusable configured pattern: don't block the learner
                    None => {}
                }
            }
        }
        violations
    }

    /// Persist the evidence locally and attempt the best-effort remote
    /// send. The local record is written `submitted = true` regardless of
    /// the remote outcome; `offline_submit` flags a failed or absent
    /// remote send.
    pub fn submit(&self, lesson: &LessonKey, draft: &EvidenceDraft) -> SubmitOutcome {
        let profile = self.profiles.active_profile_id();
        let session_id = Uuid::new_v4();

        let fields = vec![
            ("lesson".to_string(), lesson.to_string()),
            ("session".to_string(), session_id.to_string()),
            ("what_learned".to_string(), draft.what_learned.clone()),
            ("what_created".to_string(), draft.what_created.clone()),
            (
                "scratch_url".to_string(),
                draft.scratch_url.clone().unwrap_or_default(),
            ),
        ];
        let outcome = send_best_effort(self.sink.as_ref(), &fields);

        let record = EvidenceRecord {
            submitted: true,
            timestamp: Some(Utc::now()),
            session_id: Some(session_id),
            scratch_url: draft.scratch_url.clone().filter(|u| !u.trim().is_empty()),
            what_learned: draft.what_learned.clone(),
            what_created: draft.what_created.clone(),
            offline_submit: outcome.is_offline(),
        };
        self.store
            .save(&profile, Some(&lesson.storage_suffix()), &record);

        info!(
            "Evidence for {} saved (offline={})",
            lesson,
            outcome.is_offline()
        );
        outcome
    }

    /// Delete all evidence state for the active profile
    pub fn reset(&self) {
        let profile = self.profiles.active_profile_id();
        self.store.reset(&profile);
    }

    fn url_pattern(&self) -> Option<&Regex> {
        self.url_pattern
            .get_or_init(|| match Regex::new(&self.config.project_url_pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(
                        "Configured project URL pattern is invalid ({}), skipping URL checks",
                        e
                    );
                    None
                }
            })
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::submit::DisabledSink;
    use super::*;
    use crate::store::MemoryStorage;
    use crate::types::FixedProfile;

    struct StubPrompt {
        response: PromptResponse,
        calls: usize,
    }

    impl StubPrompt {
        fn submitting(draft: EvidenceDraft) -> Self {
            Self {
                response: PromptResponse::Submitted(draft),
                calls: 0,
            }
        }

        fn deferring() -> Self {
            Self {
                response: PromptResponse::Deferred,
                calls: 0,
            }
        }
    }

    impl EvidencePrompt for StubPrompt {
        fn collect(&mut self, _lesson: &LessonKey) -> PromptResponse {
            self.calls += 1;
            self.response.clone()
        }
    }

    fn gate() -> EvidenceGate {
        EvidenceGate::new(
            MemoryStorage::new(),
            FixedProfile::new("elev1"),
            EvidenceConfig::default(),
            Arc::new(DisabledSink),
        )
    }

    fn valid_draft() -> EvidenceDraft {
        EvidenceDraft {
            scratch_url: Some("https://scratch.mit.edu/projects/123456".to_string()),
            what_learned: "Am invatat sa folosesc bucle repeat in Scratch.".to_string(),
            what_created: "Am creat un joc cu un personaj care sare.".to_string(),
        }
    }

    #[test]
    fn test_ungated_module_completes_synchronously() {
        let gate = gate();
        let mut prompt = StubPrompt::deferring();
        let mut completed = false;

        let outcome = gate.gate(
            &LessonKey::new("cls5", "m3-word", "lectia1"),
            &mut prompt,
            || completed = true,
        );

        assert_eq!(outcome, GateOutcome::NotRequired);
        assert!(completed);
        assert_eq!(prompt.calls, 0);
        // No record is created for ungated lessons
        assert!(!gate.is_submitted(&LessonKey::new("cls5", "m3-word", "lectia1")));
    }

    #[test]
    fn test_defer_blocks_completion_without_record() {
        let gate = gate();
        let lesson = LessonKey::new("cls6", "m2-scratch", "lectia1");
        let mut prompt = StubPrompt::deferring();
        let mut completed = false;

        let outcome = gate.gate(&lesson, &mut prompt, || completed = true);

        assert_eq!(outcome, GateOutcome::Deferred);
        assert!(!completed);
        assert!(!gate.is_submitted(&lesson));
    }

    #[test]
    fn test_offline_submission_still_terminal() {
        let gate = gate();
        let lesson = LessonKey::new("cls6", "m2-scratch", "lectia1");

        let mut prompt = StubPrompt::submitting(valid_draft());
        let mut completed = false;
        let outcome = gate.gate(&lesson, &mut prompt, || completed = true);

        // DisabledSink fails every deliver; local state still wins
        assert_eq!(outcome, GateOutcome::Submitted { offline: true });
        assert!(completed);

        let record = gate.record_for(&lesson);
        assert!(record.submitted);
        assert!(record.offline_submit);
        assert!(record.session_id.is_some());

        // Next gate call never re-prompts
        let mut prompt = StubPrompt::deferring();
        let mut completed_again = false;
        let outcome = gate.gate(&lesson, &mut prompt, || completed_again = true);
        assert_eq!(outcome, GateOutcome::AlreadySubmitted);
        assert!(completed_again);
        assert_eq!(prompt.calls, 0);
    }

    #[test]
    fn test_invalid_draft_blocks_and_writes_nothing() {
        let gate = gate();
        let lesson = LessonKey::new("cls6", "m2-scratch", "lectia1");
        let mut prompt = StubPrompt::submitting(EvidenceDraft {
            scratch_url: Some("https://example.com/nope".to_string()),
            what_learned: "prea scurt".to_string(),
            what_created: "si asta".to_string(),
        });
        let mut completed = false;

        let outcome = gate.gate(&lesson, &mut prompt, || completed = true);

        match outcome {
            GateOutcome::Invalid(violations) => {
                assert_eq!(violations.len(), 3);
                assert!(violations.contains(&Violation::InvalidProjectUrl));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
        assert!(!completed);
        assert!(!gate.is_submitted(&lesson));
    }

    #[test]
    fn test_empty_url_is_permitted() {
        let gate = gate();
        let mut draft = valid_draft();
        draft.scratch_url = None;
        assert!(gate.validate(&draft).is_empty());

        draft.scratch_url = Some("   ".to_string());
        assert!(gate.validate(&draft).is_empty());
    }

    #[test]
    fn test_url_shape_enforced_when_present() {
        let gate = gate();
        let mut draft = valid_draft();
        draft.scratch_url = Some("https://scratch.mit.edu/projects/abc".to_string());
        assert_eq!(gate.validate(&draft), vec![Violation::InvalidProjectUrl]);
    }

    #[test]
    fn test_violation_messages_are_user_facing() {
        let v = Violation::WhatLearnedTooShort(20);
        assert!(v.to_string().contains("20"));
    }
}
