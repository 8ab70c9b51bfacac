//! Proficiency engine
//!
//! Assigns a difficulty tier per lesson code, scores quiz attempts
//! against tier-specific thresholds, computes XP rewards and a next-tier
//! suggestion, and aggregates progress across modules and the whole
//! curriculum.

pub mod content;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::events::{EventBus, EventPayload, LEVEL_CHANGED};
use crate::gamification::Gamification;
use crate::store::{PersistentStore, StorageBackend};
use crate::types::{Level, ProfileResolver};

/// Storage namespace for this subsystem's keys.
pub const SUBSYSTEM: &str = "proficiency";

/// Base XP for passing a quiz, before the tier multiplier
pub const BASE_XP_QUIZ_PASS: u32 = 50;
/// Additional base XP for a perfect score, before the tier multiplier
pub const BASE_XP_QUIZ_PERFECT: u32 = 100;

/// Score fraction at or above which a tier upgrade is suggested
const SUGGEST_UP_AT: f64 = 0.95;
/// Score fraction below which a tier downgrade is suggested
const SUGGEST_DOWN_BELOW: f64 = 0.50;

/// Lesson codes have the shape `GRADE-M<module>-L<lesson>`
static LESSON_CODE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+-M\d+-L\d+$").expect("lesson code regex"));

/// One scored quiz attempt, appended to the per-lesson history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub level: Level,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub passed: bool,
    pub xp_earned: u32,
    pub timestamp: DateTime<Utc>,
}

/// Persisted proficiency state for one lesson code.
///
/// `quiz_results` is append-only; history is never rewritten, so every
/// attempt stays auditable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProficiencyRecord {
    pub level: Option<Level>,
    pub selected_at: Option<DateTime<Utc>>,
    pub quiz_results: Vec<QuizResult>,
}

/// Outcome of scoring one quiz attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub passed: bool,
    pub xp_earned: u32,
    pub suggested_level: Level,
    pub percentage: f64,
}

/// Module rollup: lessons with at least one passed attempt, tallied by
/// their currently selected level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleProgress {
    pub completed: usize,
    pub total: usize,
    pub by_level: BTreeMap<Level, usize>,
}

/// Curriculum-wide rollup, judged by each lesson's most recent attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverallStats {
    pub total_lessons: usize,
    pub passed_lessons: usize,
    /// Mean score fraction of the most recent attempt per lesson
    pub average_score: f64,
    /// XP summed over every recorded attempt
    pub total_xp: u32,
}

pub struct ProficiencyEngine {
    store: PersistentStore,
    events: Arc<EventBus>,
    profiles: Arc<dyn ProfileResolver>,
    gamification: Arc<dyn Gamification>,
}

impl ProficiencyEngine {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        events: Arc<EventBus>,
        profiles: Arc<dyn ProfileResolver>,
        gamification: Arc<dyn Gamification>,
    ) -> Self {
        Self {
            store: PersistentStore::new(backend, SUBSYSTEM),
            events,
            profiles,
            gamification,
        }
    }

    /// Current record for a lesson code (default when never touched)
    pub fn record(&self, lesson_code: &str) -> ProficiencyRecord {
        let profile = self.profiles.active_profile_id();
        self.store.load(&profile, Some(lesson_code))
    }

    /// Currently selected level, if any
    pub fn level(&self, lesson_code: &str) -> Option<Level> {
        self.record(lesson_code).level
    }

    /// Select a tier for a lesson and publish `levelChanged`.
    ///
    /// Unknown level names are rejected upstream by [`Level`]'s parser;
    /// a typed level always succeeds here.
    pub fn set_level(&self, lesson_code: &str, level: Level) {
        let profile = self.profiles.active_profile_id();
        let mut record: ProficiencyRecord = self.store.load(&profile, Some(lesson_code));
        record.level = Some(level);
        record.selected_at = Some(Utc::now());
        self.store.save(&profile, Some(lesson_code), &record);

        info!("Level for {} set to {} ('{}')", lesson_code, level, profile);
        let payload = EventPayload::new(
            lesson_code,
            serde_json::json!({ "level": level.as_str() }),
        );
        self.events.publish(LEVEL_CHANGED, &payload);
    }

    /// Score a quiz attempt at a given tier and append it to the
    /// lesson's history.
    ///
    /// The suggestion is advisory only; it never changes the selected
    /// level. Callers act on it through [`Self::set_level`].
    pub fn record_quiz_score(
        &self,
        lesson_code: &str,
        level: Level,
        score: u32,
        total: u32,
    ) -> ScoreOutcome {
        // Clamped so an over-count (score > total) never pushes the
        // stored ratio past 1.0.
        let percentage = if total > 0 {
            (f64::from(score) / f64::from(total)).min(1.0)
        } else {
            0.0
        };
        let passed = percentage >= level.pass_threshold();

        let mut xp_earned = 0u32;
        if passed {
            xp_earned += (f64::from(BASE_XP_QUIZ_PASS) * level.xp_multiplier()).round() as u32;
            if percentage >= 1.0 {
                xp_earned +=
                    (f64::from(BASE_XP_QUIZ_PERFECT) * level.xp_multiplier()).round() as u32;
            }
        }

        let suggested_level = if percentage >= SUGGEST_UP_AT {
            level.next_up()
        } else if percentage < SUGGEST_DOWN_BELOW {
            level.next_down()
        } else {
            level
        };

        let profile = self.profiles.active_profile_id();
        let mut record: ProficiencyRecord = self.store.load(&profile, Some(lesson_code));
        record.quiz_results.push(QuizResult {
            level,
            score,
            total,
            percentage,
            passed,
            xp_earned,
            timestamp: Utc::now(),
        });
        self.store.save(&profile, Some(lesson_code), &record);

        if xp_earned > 0 {
            self.gamification.add_xp(xp_earned, "quiz");
        }
        info!(
            "Quiz {} at {}: {}/{} ({:.0}%) passed={} xp={}",
            lesson_code, level, score, total, percentage * 100.0, passed, xp_earned
        );

        ScoreOutcome {
            passed,
            xp_earned,
            suggested_level,
            percentage,
        }
    }

    /// Rollup for one module: scans every lesson code with the
    /// `"{grade}-M{index}-"` prefix.
    ///
    /// `by_level` tallies completed lessons by their currently selected
    /// level, not the level of the passing attempt. The two can diverge
    /// when the learner changes level after passing; preserved as-is from
    /// the source behavior.
    pub fn module_progress(&self, grade: &str, module_index: u32) -> ModuleProgress {
        let profile = self.profiles.active_profile_id();
        let prefix = format!("{}-M{}-", grade, module_index);

        let mut progress = ModuleProgress::default();
        for code in self.store.suffixes(&profile) {
            if !code.starts_with(&prefix) {
                continue;
            }
            let record: ProficiencyRecord = self.store.load(&profile, Some(&code));
            progress.total += 1;
            if record.quiz_results.iter().any(|r| r.passed) {
                progress.completed += 1;
                if let Some(level) = record.level {
                    *progress.by_level.entry(level).or_insert(0) += 1;
                }
            }
        }
        progress
    }

    /// Curriculum-wide stats over every lesson code matching the
    /// `GRADE-M<module>-L<lesson>` shape.
    ///
    /// Pass/fail and the average score use each lesson's most recent
    /// attempt, not its best one: recency over best score, by policy.
    pub fn overall_stats(&self) -> OverallStats {
        let profile = self.profiles.active_profile_id();

        let mut stats = OverallStats::default();
        let mut score_sum = 0.0;
        for code in self.store.suffixes(&profile) {
            if !LESSON_CODE_SHAPE.is_match(&code) {
                continue;
            }
            let record: ProficiencyRecord = self.store.load(&profile, Some(&code));
            stats.total_xp += record.quiz_results.iter().map(|r| r.xp_earned).sum::<u32>();

            let Some(latest) = record.quiz_results.last() else {
                continue;
            };
            stats.total_lessons += 1;
            score_sum += latest.percentage;
            if latest.passed {
                stats.passed_lessons += 1;
            }
        }
        if stats.total_lessons > 0 {
            stats.average_score = score_sum / stats.total_lessons as f64;
        }
        stats
    }

    /// Delete all proficiency state for the active profile
    pub fn reset(&self) {
        let profile = self.profiles.active_profile_id();
        self.store.reset(&profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamification::NoopGamification;
    use crate::store::MemoryStorage;
    use crate::types::FixedProfile;
    use std::sync::Mutex;

    fn engine() -> (ProficiencyEngine, Arc<EventBus>) {
        let events = EventBus::new();
        let engine = ProficiencyEngine::new(
            MemoryStorage::new(),
            events.clone(),
            FixedProfile::new("elev1"),
            NoopGamification::handle(),
        );
        (engine, events)
    }

    #[test]
    fn test_minim_pass_at_exactly_half() {
        let (engine, _) = engine();
        let outcome = engine.record_quiz_score("X-M1-L01", Level::Minim, 5, 10);

        assert_eq!(outcome.percentage, 0.5);
        assert!(outcome.passed);
        assert_eq!(outcome.xp_earned, 25); // 50 * 0.5, no perfect bonus
        assert_eq!(outcome.suggested_level, Level::Minim);
    }

    #[test]
    fn test_overcount_score_clamps_to_full_marks() {
        let (engine, _) = engine();
        let outcome = engine.record_quiz_score("X-M1-L01", Level::Minim, 15, 10);

        assert_eq!(outcome.percentage, 1.0);
        assert_eq!(outcome.xp_earned, 75); // treated as a perfect minim run

        let record = engine.record("X-M1-L01");
        assert_eq!(record.quiz_results[0].percentage, 1.0);
    }

    #[test]
    fn test_performanta_perfect_score() {
        let (engine, _) = engine();
        let outcome = engine.record_quiz_score("X-M1-L01", Level::Performanta, 10, 10);

        assert_eq!(outcome.percentage, 1.0);
        assert!(outcome.passed);
        assert_eq!(outcome.xp_earned, 225); // round(50*1.5) + round(100*1.5)
        assert_eq!(outcome.suggested_level, Level::Performanta);
    }

    #[test]
    fn test_standard_threshold_boundary() {
        let (engine, _) = engine();
        assert!(!engine.record_quiz_score("X-M1-L02", Level::Standard, 6, 10).passed);
        assert!(engine.record_quiz_score("X-M1-L02", Level::Standard, 7, 10).passed);
    }

    #[test]
    fn test_zero_total_is_zero_percentage() {
        let (engine, _) = engine();
        let outcome = engine.record_quiz_score("X-M1-L01", Level::Minim, 0, 0);
        assert_eq!(outcome.percentage, 0.0);
        assert!(!outcome.passed);
        assert_eq!(outcome.suggested_level, Level::Minim); // below 0.5 floors at minim
    }

    #[test]
    fn test_suggestion_up_and_down() {
        let (engine, _) = engine();
        let up = engine.record_quiz_score("X-M1-L03", Level::Standard, 19, 20);
        assert_eq!(up.suggested_level, Level::Performanta);

        let down = engine.record_quiz_score("X-M1-L03", Level::Standard, 4, 10);
        assert_eq!(down.suggested_level, Level::Minim);
    }

    #[test]
    fn test_history_is_append_only() {
        let (engine, _) = engine();
        engine.record_quiz_score("X-M1-L01", Level::Minim, 3, 10);
        engine.record_quiz_score("X-M1-L01", Level::Minim, 8, 10);

        let record = engine.record("X-M1-L01");
        assert_eq!(record.quiz_results.len(), 2);
        assert_eq!(record.quiz_results[0].score, 3);
        assert_eq!(record.quiz_results[1].score, 8);
    }

    #[test]
    fn test_set_level_publishes_event() {
        let (engine, events) = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        events.subscribe(LEVEL_CHANGED, "capture", Arc::new(move |payload| {
            s.lock().unwrap().push((payload.lesson_id.clone(), payload.data.clone()));
            Ok(())
        }));

        engine.set_level("X-M1-L01", Level::Standard);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "X-M1-L01");
        assert_eq!(seen[0].1["level"], "standard");
        assert_eq!(engine.level("X-M1-L01"), Some(Level::Standard));
    }

    #[test]
    fn test_module_progress_uses_selected_level() {
        let (engine, _) = engine();
        engine.set_level("X-M1-L01", Level::Minim);
        engine.record_quiz_score("X-M1-L01", Level::Minim, 10, 10);
        // Level changed after the pass: the tally follows the selection
        engine.set_level("X-M1-L01", Level::Performanta);

        engine.set_level("X-M1-L02", Level::Standard);
        engine.record_quiz_score("X-M1-L02", Level::Standard, 2, 10); // fails

        engine.set_level("X-M2-L01", Level::Standard); // other module

        let progress = engine.module_progress("X", 1);
        assert_eq!(progress.total, 2);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.by_level.get(&Level::Performanta), Some(&1));
        assert_eq!(progress.by_level.get(&Level::Minim), None);
    }

    #[test]
    fn test_overall_stats_use_most_recent_attempt() {
        let (engine, _) = engine();
        // Best attempt passes, latest fails: recency wins
        engine.record_quiz_score("X-M1-L01", Level::Minim, 10, 10);
        engine.record_quiz_score("X-M1-L01", Level::Minim, 2, 10);

        engine.record_quiz_score("X-M2-L01", Level::Standard, 7, 10);

        let stats = engine.overall_stats();
        assert_eq!(stats.total_lessons, 2);
        assert_eq!(stats.passed_lessons, 1);
        assert!((stats.average_score - (0.2 + 0.7) / 2.0).abs() < 1e-9);
        // XP sums every attempt: perfect minim (25+50) + standard pass (50)
        assert_eq!(stats.total_xp, 125);
    }

    #[test]
    fn test_overall_stats_skip_malformed_codes() {
        let (engine, _) = engine();
        engine.set_level("not-a-code", Level::Minim);
        engine.record_quiz_score("X-M1-L01", Level::Minim, 5, 10);

        let stats = engine.overall_stats();
        assert_eq!(stats.total_lessons, 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let (engine, _) = engine();
        engine.set_level("X-M1-L01", Level::Standard);
        engine.record_quiz_score("X-M1-L01", Level::Standard, 8, 10);

        engine.reset();

        assert_eq!(engine.level("X-M1-L01"), None);
        assert_eq!(engine.overall_stats(), OverallStats::default());
    }
}
