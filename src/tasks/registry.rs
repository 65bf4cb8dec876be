//! Cancellation registry
//!
//! Process-wide set of task ids whose cancellation has been requested.
//! Consumers poll it cooperatively through a `cancel_check` closure; the
//! dispatcher clears an id once that task's dispatch finishes, so ids are
//! never retained past the task they belong to.

use std::collections::HashSet;
use std::sync::Mutex;

/// Set of task ids with a pending cancellation request
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    requested: Mutex<HashSet<i64>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cancellation request for a task
    pub fn request(&self, task_id: i64) {
        self.requested.lock().unwrap().insert(task_id);
    }

    /// True if cancellation has been requested and not yet cleared
    pub fn is_requested(&self, task_id: i64) -> bool {
        self.requested.lock().unwrap().contains(&task_id)
    }

    /// Removes a task's entry once its dispatch has finished
    pub fn clear(&self, task_id: i64) {
        self.requested.lock().unwrap().remove(&task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_and_check() {
        let registry = CancellationRegistry::new();
        assert!(!registry.is_requested(1));

        registry.request(1);
        assert!(registry.is_requested(1));
        assert!(!registry.is_requested(2));
    }

    #[test]
    fn test_clear_removes_entry() {
        let registry = CancellationRegistry::new();
        registry.request(7);
        registry.clear(7);
        assert!(!registry.is_requested(7));
    }

    #[test]
    fn test_clear_unknown_id_is_noop() {
        let registry = CancellationRegistry::new();
        registry.clear(99);
        assert!(!registry.is_requested(99));
    }
}
