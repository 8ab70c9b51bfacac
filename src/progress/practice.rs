//! Practice exercise tracking
//!
//! Stores free-text answers per exercise and derives completion from a
//! length heuristic: an answer counts once its trimmed text reaches 10
//! characters. Exercises are discovered by the presentation collaborator;
//! the tracker only knows how many it was told exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::events::{EventBus, EventPayload, PRACTICE_PROGRESS_SAVED};
use crate::gamification::Gamification;
use crate::store::{PersistentStore, StorageBackend};
use crate::types::{LessonKey, ProfileResolver};

/// Storage namespace for this subsystem's keys.
pub const SUBSYSTEM: &str = "practice";

/// Trimmed answer length at which an exercise counts as completed
pub const MIN_ANSWER_CHARS: usize = 10;
/// XP awarded per completed exercise
pub const XP_PER_EXERCISE: u32 = 15;

/// Persisted answers and derived counters for one lesson
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeRecord {
    pub answers: BTreeMap<String, String>,
    pub completed_count: usize,
    pub total: usize,
    pub xp: u32,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Completion summary returned to callers and carried on events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PracticeStatus {
    pub total: usize,
    pub completed: usize,
    pub percentage: u32,
    pub is_complete: bool,
    pub xp: u32,
}

/// Tracks one lesson's practice exercises for the active profile
pub struct PracticeTracker {
    store: PersistentStore,
    events: Arc<EventBus>,
    profiles: Arc<dyn ProfileResolver>,
    gamification: Arc<dyn Gamification>,
    lesson: LessonKey,
    total: usize,
}

impl PracticeTracker {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        events: Arc<EventBus>,
        profiles: Arc<dyn ProfileResolver>,
        gamification: Arc<dyn Gamification>,
        lesson: LessonKey,
        total_exercises: usize,
    ) -> Self {
        Self {
            store: PersistentStore::new(backend, SUBSYSTEM),
            events,
            profiles,
            gamification,
            lesson,
            total: total_exercises,
        }
    }

    fn load(&self) -> PracticeRecord {
        let profile = self.profiles.active_profile_id();
        let mut record: PracticeRecord =
            self.store.load(&profile, Some(&self.lesson.storage_suffix()));
        record.total = self.total;
        record
    }

    /// Store an answer and recompute derived counters.
    ///
    /// The text is trimmed once on write and stored verbatim thereafter.
    pub fn record_answer(&self, exercise_id: &str, text: &str) {
        let profile = self.profiles.active_profile_id();
        let mut record = self.load();
        let previous_completed = record.completed_count;

        record
            .answers
            .insert(exercise_id.to_string(), text.trim().to_string());
        record.completed_count = record
            .answers
            .values()
            .filter(|answer| answer.chars().count() >= MIN_ANSWER_CHARS)
            .count();
        record.xp = (record.completed_count as u32) * XP_PER_EXERCISE;
        record.timestamp = Some(Utc::now());

        self.store
            .save(&profile, Some(&self.lesson.storage_suffix()), &record);

        if record.completed_count > previous_completed {
            let gained = (record.completed_count - previous_completed) as u32 * XP_PER_EXERCISE;
            self.gamification.add_xp(gained, "practice");
        }

        self.publish_status(&self.status_of(&record));
    }

    /// Stored answer for one exercise, if any
    pub fn answer(&self, exercise_id: &str) -> Option<String> {
        self.load().answers.get(exercise_id).cloned()
    }

    /// Current completion summary
    pub fn completion_status(&self) -> PracticeStatus {
        let record = self.load();
        self.status_of(&record)
    }

    fn status_of(&self, record: &PracticeRecord) -> PracticeStatus {
        let total = self.total;
        let completed = record.completed_count;
        let percentage = if total > 0 {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };
        PracticeStatus {
            total,
            completed,
            percentage,
            // A lesson with zero exercises is never complete
            is_complete: completed >= total && total > 0,
            xp: record.xp,
        }
    }

    /// Clear all answers for this lesson and re-publish a zeroed event
    pub fn reset(&self) {
        let profile = self.profiles.active_profile_id();
        let record = PracticeRecord {
            total: self.total,
            ..PracticeRecord::default()
        };
        self.store
            .save(&profile, Some(&self.lesson.storage_suffix()), &record);
        self.publish_status(&self.status_of(&record));
    }

    fn publish_status(&self, status: &PracticeStatus) {
        let payload = EventPayload::new(
            &self.lesson.to_string(),
            serde_json::json!({
                "completed": status.completed,
                "total": status.total,
                "isComplete": status.is_complete,
                "xp": status.xp,
                "percentage": status.percentage,
            }),
        );
        self.events.publish(PRACTICE_PROGRESS_SAVED, &payload);
    }
}
