//! In-memory job directory: the single source of truth the coordinator
//! publishes to the presentation layer.
//!
//! The registry is owned exclusively by the coordinator task; nothing here
//! is shared by reference across the presentation boundary. `snapshot()`
//! clones into owned rows, so subscribers can hold them without further
//! synchronization.

use std::cmp::Ordering;
use std::collections::HashMap;

use skiff_engine_core::{JobId, JobSnapshot};
use skiff_events::JobView;

/// Map from job identity to its display snapshot.
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: HashMap<JobId, JobSnapshot>,
}

impl JobRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert or replace a job entry.
    pub fn upsert(&mut self, snapshot: JobSnapshot) {
        self.entries.insert(snapshot.id, snapshot);
    }

    /// Remove a job entry, returning it when present.
    pub fn remove(&mut self, id: JobId) -> Option<JobSnapshot> {
        self.entries.remove(&id)
    }

    /// Look up a job entry.
    #[must_use]
    pub fn get(&self, id: JobId) -> Option<&JobSnapshot> {
        self.entries.get(&id)
    }

    /// Mutable lookup used by the event dispatcher.
    pub fn get_mut(&mut self, id: JobId) -> Option<&mut JobSnapshot> {
        self.entries.get_mut(&id)
    }

    /// Whether the registry holds the given identity.
    #[must_use]
    pub fn contains(&self, id: JobId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Identities of every tracked job.
    #[must_use]
    pub fn ids(&self) -> Vec<JobId> {
        self.entries.keys().copied().collect()
    }

    /// Number of tracked jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned, sorted snapshot handed to the presentation layer.
    #[must_use]
    pub fn snapshot(&self) -> Vec<JobView> {
        let mut entries: Vec<&JobSnapshot> = self.entries.values().collect();
        entries.sort_by(|a, b| compare_entries(a, b));
        entries.into_iter().map(JobSnapshot::to_view).collect()
    }
}

fn compare_entries(a: &JobSnapshot, b: &JobSnapshot) -> Ordering {
    let ordering = a.name.cmp(&b.name);
    if ordering == Ordering::Equal {
        a.id.cmp(&b.id)
    } else {
        ordering
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_events::JobState;
    use std::path::PathBuf;

    fn id(seed: u8) -> JobId {
        JobId::from_bytes([seed; 20])
    }

    fn entry(seed: u8, name: &str) -> JobSnapshot {
        JobSnapshot::submitted(id(seed), name, PathBuf::from("."))
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let mut registry = JobRegistry::new();
        registry.upsert(entry(1, "alpha"));

        let mut updated = entry(1, "alpha");
        updated.state = JobState::Downloading;
        updated.bytes_done = 1_024;
        registry.upsert(updated);

        assert_eq!(registry.len(), 1);
        let stored = registry.get(id(1)).expect("entry present");
        assert_eq!(stored.bytes_done, 1_024);
        assert_eq!(stored.state, JobState::Downloading);
    }

    #[test]
    fn snapshot_sorts_by_name_then_id() {
        let mut registry = JobRegistry::new();
        registry.upsert(entry(3, "zeta"));
        registry.upsert(entry(2, "alpha"));
        registry.upsert(entry(1, "alpha"));

        let views = registry.snapshot();
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].name, "alpha");
        assert_eq!(views[0].id, id(1).to_string());
        assert_eq!(views[1].id, id(2).to_string());
        assert_eq!(views[2].name, "zeta");
    }

    #[test]
    fn snapshot_is_detached_from_registry_state() {
        let mut registry = JobRegistry::new();
        registry.upsert(entry(1, "alpha"));

        let views = registry.snapshot();
        registry
            .get_mut(id(1))
            .expect("entry present")
            .bytes_done = 999;

        assert_eq!(views[0].bytes_done, 0, "snapshot rows are owned copies");
    }

    #[test]
    fn remove_unknown_id_is_none() {
        let mut registry = JobRegistry::new();
        assert!(registry.remove(id(9)).is_none());
        assert!(registry.is_empty());
    }
}
