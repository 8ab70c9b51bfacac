//! Shared types used across modules
//!
//! This module contains types that are used by multiple modules
//! to avoid circular dependencies.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Proficiency tier of a lesson, from the three-tier curriculum model.
///
/// Each tier carries its own quiz pass threshold and XP multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Minim,
    Standard,
    Performanta,
}

impl Level {
    /// Minimum quiz score fraction required to pass at this tier
    pub fn pass_threshold(self) -> f64 {
        match self {
            Level::Minim => 0.50,
            Level::Standard => 0.66,
            Level::Performanta => 0.80,
        }
    }

    /// XP multiplier applied to base rewards at this tier
    pub fn xp_multiplier(self) -> f64 {
        match self {
            Level::Minim => 0.5,
            Level::Standard => 1.0,
            Level::Performanta => 1.5,
        }
    }

    /// One tier up, capped at `Performanta`
    pub fn next_up(self) -> Level {
        match self {
            Level::Minim => Level::Standard,
            Level::Standard | Level::Performanta => Level::Performanta,
        }
    }

    /// One tier down, floored at `Minim`
    pub fn next_down(self) -> Level {
        match self {
            Level::Performanta => Level::Standard,
            Level::Standard | Level::Minim => Level::Minim,
        }
    }

    /// All tiers in ascending order
    pub fn all() -> [Level; 3] {
        [Level::Minim, Level::Standard, Level::Performanta]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Minim => "minim",
            Level::Standard => "standard",
            Level::Performanta => "performanta",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Level {
    type Err = UnknownLevel;

    /// Parses a level name; unknown names are rejected without fallback.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minim" => Ok(Level::Minim),
            "standard" => Ok(Level::Standard),
            "performanta" => Ok(Level::Performanta),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

/// Rejection of a level name outside the three known tiers
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown proficiency level '{0}' (expected minim, standard or performanta)")]
pub struct UnknownLevel(pub String);

/// Identifies one lesson inside the curriculum tree.
///
/// Grades are slugs like `cls5`, modules like `m2-scratch`, lessons like
/// `lectia1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LessonKey {
    pub grade: String,
    pub module: String,
    pub lesson: String,
}

impl LessonKey {
    pub fn new(grade: &str, module: &str, lesson: &str) -> Self {
        Self {
            grade: grade.to_string(),
            module: module.to_string(),
            lesson: lesson.to_string(),
        }
    }

    /// Storage suffix for per-lesson records: `grade/module/lesson`
    pub fn storage_suffix(&self) -> String {
        format!("{}/{}/{}", self.grade, self.module, self.lesson)
    }

    /// Storage suffix for per-module records: `grade/module`
    pub fn module_suffix(&self) -> String {
        format!("{}/{}", self.grade, self.module)
    }
}

impl std::fmt::Display for LessonKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.grade, self.module, self.lesson)
    }
}

/// Builds a proficiency lesson code: `V-M1-L01`
pub fn lesson_code(grade: &str, module_index: u32, lesson_number: u32) -> String {
    format!("{}-M{}-L{:02}", grade, module_index, lesson_number)
}

/// Resolves the active learner identity to a stable key.
///
/// Identity itself is owned by an external profile collaborator; the core
/// only ever consumes the resolved id.
pub trait ProfileResolver: Send + Sync {
    fn active_profile_id(&self) -> String;
}

/// Resolver pinned to a single profile id (CLI and tests)
pub struct FixedProfile(pub String);

impl FixedProfile {
    pub fn new(id: &str) -> Arc<dyn ProfileResolver> {
        Arc::new(FixedProfile(id.to_string()))
    }
}

impl ProfileResolver for FixedProfile {
    fn active_profile_id(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_round_trip() {
        for level in Level::all() {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
        }
        assert!("expert".parse::<Level>().is_err());
        assert_eq!(" Standard ".parse::<Level>().unwrap(), Level::Standard);
    }

    #[test]
    fn test_level_neighbors_clamp() {
        assert_eq!(Level::Performanta.next_up(), Level::Performanta);
        assert_eq!(Level::Minim.next_down(), Level::Minim);
        assert_eq!(Level::Minim.next_up(), Level::Standard);
        assert_eq!(Level::Performanta.next_down(), Level::Standard);
    }

    #[test]
    fn test_lesson_code_shape() {
        assert_eq!(lesson_code("V", 1, 1), "V-M1-L01");
        assert_eq!(lesson_code("VIII", 4, 12), "VIII-M4-L12");
    }
}
