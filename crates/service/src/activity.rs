//! Fire-and-forget activity logging

use parking_lot::RwLock;

/// One recorded activity entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// Free-text description ("Has created project", ...)
    pub description: String,
    /// Acting profile id
    pub actor: String,
    /// Subject entity id (project, profile)
    pub subject: String,
}

/// Sink for activity descriptions
///
/// Recording is fire-and-forget: implementations must swallow their own
/// failures, and callers never let a failed record abort the mutation
/// that produced it.
pub trait ActivityLog: Send + Sync {
    fn record(&self, description: &str, actor: &str, subject: &str);
}

/// Default sink that forwards activity to `tracing`
#[derive(Debug, Default)]
pub struct TracingLog;

impl ActivityLog for TracingLog {
    fn record(&self, description: &str, actor: &str, subject: &str) {
        tracing::info!(actor, subject, "{description}");
    }
}

/// In-memory sink for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: RwLock<Vec<Activity>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Activity> {
        self.entries.read().clone()
    }
}

impl ActivityLog for MemoryLog {
    fn record(&self, description: &str, actor: &str, subject: &str) {
        self.entries.write().push(Activity {
            description: description.to_string(),
            actor: actor.to_string(),
            subject: subject.to_string(),
        });
    }
}
