//! Level-sliced content projections
//!
//! Authored lesson and quiz payloads carry a slice per tier. These
//! projections are pure: they pick the requested tier's slice and fall
//! back to the `standard` slice when it is absent, so every tier always
//! has renderable content even when level-specific authoring is
//! incomplete.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Level;

/// Lesson payload with optional per-tier content slices
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonPayload {
    #[serde(default)]
    pub minim: Option<Value>,
    #[serde(default)]
    pub standard: Option<Value>,
    #[serde(default)]
    pub performanta: Option<Value>,
}

impl LessonPayload {
    fn slice(&self, level: Level) -> Option<&Value> {
        match level {
            Level::Minim => self.minim.as_ref(),
            Level::Standard => self.standard.as_ref(),
            Level::Performanta => self.performanta.as_ref(),
        }
    }

    /// Content for a tier, falling back to `standard` when unauthored
    pub fn content_for_level(&self, level: Level) -> Option<&Value> {
        self.slice(level).or_else(|| self.slice(Level::Standard))
    }
}

/// Quiz payload; field names follow the authored content format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizPayload {
    #[serde(default)]
    pub items_minim: Option<Vec<Value>>,
    #[serde(default)]
    pub items_standard: Option<Vec<Value>>,
    #[serde(default)]
    pub items_performanta: Option<Vec<Value>>,
}

impl QuizPayload {
    fn slice(&self, level: Level) -> Option<&Vec<Value>> {
        match level {
            Level::Minim => self.items_minim.as_ref(),
            Level::Standard => self.items_standard.as_ref(),
            Level::Performanta => self.items_performanta.as_ref(),
        }
    }

    /// Quiz items for a tier, falling back to `standard` when unauthored
    pub fn quiz_for_level(&self, level: Level) -> Option<&Vec<Value>> {
        self.slice(level).or_else(|| self.slice(Level::Standard))
    }
}
