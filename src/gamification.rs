//! Optional gamification collaborator
//!
//! Components that award XP or achievements accept a handle to this
//! capability set instead of looking up an ambient sibling. When no
//! collaborator is wired in, the no-op implementation is used.

use std::sync::Arc;
use tracing::debug;

/// Capability set consumed by trackers and the proficiency engine
pub trait Gamification: Send + Sync {
    fn add_xp(&self, amount: u32, source: &str);
    fn unlock_achievement(&self, id: &str);
}

/// Default collaborator: records nothing
pub struct NoopGamification;

impl NoopGamification {
    pub fn handle() -> Arc<dyn Gamification> {
        Arc::new(NoopGamification)
    }
}

impl Gamification for NoopGamification {
    fn add_xp(&self, amount: u32, source: &str) {
        debug!("XP ignored (no gamification wired): +{} from {}", amount, source);
    }

    fn unlock_achievement(&self, _id: &str) {}
}
