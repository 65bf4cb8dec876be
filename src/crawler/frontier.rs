//! Crawl frontier: the shared work queue for one crawl pass
//!
//! The frontier owns everything the worker pool shares: the queue of
//! discovered-but-unfetched URLs, the visited set with its exactly-once
//! claim, the in-flight counter that drives termination, and the set of
//! newly saved URLs handed to the favicon resolver when the pass ends.
//! One crawl pass owns one frontier; nothing here outlives the pass.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use url::Url;

/// One discovered URL awaiting a worker
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: Url,
    /// Hops this entry may still expand; 0 means fetch nothing
    pub remaining_depth: u32,
    /// Canonical URL of the page that linked here
    pub referrer: Option<String>,
}

/// Result of asking the frontier for work
#[derive(Debug)]
pub enum PopResult {
    /// An entry to process; the caller owes a `done()` call
    Entry(FrontierEntry),
    /// Queue is empty but other workers are mid-entry; poll again
    Idle,
    /// Queue is empty and nothing is in flight; the pass is over
    Exhausted,
}

struct FrontierState {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    in_flight: usize,
    newly_saved: HashSet<String>,
}

/// Shared, lock-guarded frontier for one crawl pass
pub struct Frontier {
    state: Mutex<FrontierState>,
}

impl Frontier {
    /// Creates a frontier seeded with one entry
    pub fn new(seed: Url, max_depth: u32) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(FrontierEntry {
            url: seed,
            remaining_depth: max_depth,
            referrer: None,
        });

        Self {
            state: Mutex::new(FrontierState {
                queue,
                visited: HashSet::new(),
                in_flight: 0,
                newly_saved: HashSet::new(),
            }),
        }
    }

    /// Takes the next entry, or reports idle/exhausted
    pub fn pop(&self) -> PopResult {
        let mut state = self.state.lock().unwrap();
        match state.queue.pop_front() {
            Some(entry) => {
                state.in_flight += 1;
                PopResult::Entry(entry)
            }
            None if state.in_flight == 0 => PopResult::Exhausted,
            None => PopResult::Idle,
        }
    }

    /// Marks the entry returned by the last `pop` as finished
    pub fn done(&self) {
        let mut state = self.state.lock().unwrap();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Claims a canonical URL for fetching
    ///
    /// The check and the mark are one operation under the lock, so two
    /// workers racing on the same URL resolve to exactly one fetch.
    pub fn claim(&self, canonical: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .visited
            .insert(canonical.to_string())
    }

    /// Enqueues a discovered link
    pub fn push(&self, entry: FrontierEntry) {
        self.state.lock().unwrap().queue.push_back(entry);
    }

    /// Records a URL whose page row was newly inserted this pass
    pub fn record_saved(&self, canonical: String) {
        self.state.lock().unwrap().newly_saved.insert(canonical);
    }

    /// Drains the newly-saved set at pass completion
    pub fn take_saved(&self) -> HashSet<String> {
        std::mem::take(&mut self.state.lock().unwrap().newly_saved)
    }

    /// Number of URLs claimed so far
    pub fn visited_count(&self) -> usize {
        self.state.lock().unwrap().visited.len()
    }
}
