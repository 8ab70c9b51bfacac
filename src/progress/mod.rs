//! Progress tracking subsystems
//!
//! - [`lessons`]: marks/queries lesson completion per grade+module
//! - [`practice`]: free-text exercise answers with a length-based
//!   completion heuristic
//! - [`quiz`]: per-question quiz correctness with a first-answer-wins
//!   policy

pub mod lessons;
pub mod practice;
pub mod quiz;

pub use lessons::{LessonCompletionTracker, ProgressRecord};
pub use practice::{PracticeRecord, PracticeStatus, PracticeTracker};
pub use quiz::{QuizAttemptRecord, QuizScorer, QuizStatus};
