//! LearningHub - learner progress state core
//!
//! Tracks a learner's progress across a multi-grade curriculum, keyed per
//! learner profile and persisted client-side:
//! - lesson completion per grade/module
//! - practice exercise answers with a length-based completion heuristic
//! - quiz scoring with a first-answer-wins policy
//! - proficiency tiers, XP and tier suggestions
//! - evidence-of-work gating in front of lesson completion
//!
//! Subsystems are explicit stateful objects constructed with an injected
//! [`store::StorageBackend`] and [`events::EventBus`]; nothing is ambient.
//! Presentation concerns (rendering, DOM, styling) live outside this
//! crate and consume the event surface.
//!
//! # Example
//!
//! ```
//! use learninghub::progress::QuizScorer;
//! use learninghub::store::MemoryStorage;
//! use learninghub::events::EventBus;
//! use learninghub::types::{FixedProfile, LessonKey};
//!
//! let scorer = QuizScorer::new(
//!     MemoryStorage::new(),
//!     EventBus::new(),
//!     FixedProfile::new("elev1"),
//!     LessonKey::new("cls5", "m3-word", "lectia1"),
//!     4,
//! );
//! scorer.record_answer(0, true);
//! assert_eq!(scorer.status().total_correct, 1);
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod store; // Must come before the trackers, everything persists through it
pub mod events;
pub mod config;
pub mod gamification;
pub mod progress;
pub mod proficiency;
pub mod evidence;
pub mod cli;

// Re-export commonly used types for convenience
pub use config::HubConfig;
pub use events::{EventBus, EventPayload};
pub use evidence::{EvidenceGate, GateOutcome};
pub use proficiency::ProficiencyEngine;
pub use progress::{LessonCompletionTracker, PracticeTracker, QuizScorer};
pub use store::{FileStorage, MemoryStorage, PersistentStore, StorageBackend};
pub use types::{Level, LessonKey};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Learner Progress Core", NAME, VERSION)
}
