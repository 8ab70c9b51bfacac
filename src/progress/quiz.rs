//! Quiz scoring
//!
//! Records per-question correctness for one lesson's quiz. The contract
//! is only a `(question_index, is_correct)` pair, so any quiz-rendering
//! strategy can drive it: the index may come from an element id, DOM
//! order or an explicit callback argument.
//!
//! First answer wins: once a question index has a recorded outcome, later
//! answers to it are ignored. Repeated guessing can never inflate the
//! score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::events::{EventBus, EventPayload, QUIZ_PROGRESS};
use crate::store::{PersistentStore, StorageBackend};
use crate::types::{LessonKey, ProfileResolver};

/// Storage namespace for this subsystem's keys.
pub const SUBSYSTEM: &str = "quiz";

/// Persisted outcome map for one lesson's quiz attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizAttemptRecord {
    pub answered_questions: BTreeMap<usize, bool>,
    pub correct_count: usize,
    pub total_questions: usize,
}

/// Scoring summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizStatus {
    pub total_correct: usize,
    pub total_questions: usize,
    pub answered: usize,
    pub percentage: u32,
    pub is_complete: bool,
}

/// Tracks one lesson's quiz for the active profile
pub struct QuizScorer {
    store: PersistentStore,
    events: Arc<EventBus>,
    profiles: Arc<dyn ProfileResolver>,
    lesson: LessonKey,
    total_questions: usize,
}

impl QuizScorer {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        events: Arc<EventBus>,
        profiles: Arc<dyn ProfileResolver>,
        lesson: LessonKey,
        total_questions: usize,
    ) -> Self {
        Self {
            store: PersistentStore::new(backend, SUBSYSTEM),
            events,
            profiles,
            lesson,
            total_questions,
        }
    }

    fn load(&self) -> QuizAttemptRecord {
        let profile = self.profiles.active_profile_id();
        let mut record: QuizAttemptRecord =
            self.store.load(&profile, Some(&self.lesson.storage_suffix()));
        record.total_questions = self.total_questions;
        record
    }

    /// Record an answer outcome; a no-op if the question was already
    /// answered. Returns whether the answer was accepted.
    pub fn record_answer(&self, question_index: usize, is_correct: bool) -> bool {
        let profile = self.profiles.active_profile_id();
        let mut record = self.load();

        if record.answered_questions.contains_key(&question_index) {
            return false;
        }

        record.answered_questions.insert(question_index, is_correct);
        record.correct_count = record.answered_questions.values().filter(|c| **c).count();
        self.store
            .save(&profile, Some(&self.lesson.storage_suffix()), &record);

        let status = self.status_of(&record);
        let payload = EventPayload::new(
            &self.lesson.to_string(),
            serde_json::json!({
                "questionIndex": question_index,
                "isCorrect": is_correct,
                "totalCorrect": status.total_correct,
                "answered": status.answered,
                "totalQuestions": status.total_questions,
                "isComplete": status.is_complete,
            }),
        );
        self.events.publish(QUIZ_PROGRESS, &payload);
        true
    }

    pub fn status(&self) -> QuizStatus {
        let record = self.load();
        self.status_of(&record)
    }

    fn status_of(&self, record: &QuizAttemptRecord) -> QuizStatus {
        let answered = record.answered_questions.len();
        let percentage = if self.total_questions > 0 {
            ((record.correct_count as f64 / self.total_questions as f64) * 100.0).round() as u32
        } else {
            0
        };
        QuizStatus {
            total_correct: record.correct_count,
            total_questions: self.total_questions,
            answered,
            percentage,
            is_complete: answered >= self.total_questions,
        }
    }

    /// Clear this lesson's attempt
    pub fn reset(&self) {
        let profile = self.profiles.active_profile_id();
        let record = QuizAttemptRecord {
            total_questions: self.total_questions,
            ..QuizAttemptRecord::default()
        };
        self.store
            .save(&profile, Some(&self.lesson.storage_suffix()), &record);
    }
}
