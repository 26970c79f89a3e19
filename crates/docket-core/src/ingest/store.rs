//! Bounded, thread-safe list of completed extractions.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::lock;
use crate::models::{ExtractionResult, Status};

/// Results shared by every ingestion path, oldest first.
///
/// Holds the result-store lock; no other lock is taken while it is held.
#[derive(Debug)]
pub struct ResultStore {
    entries: Mutex<Entries>,
    max_results: usize,
}

/// Counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub success: usize,
    pub review: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ExtractionResult>) -> Self {
        let mut counts = Self::default();
        for result in results {
            counts.add(result.status);
        }
        counts
    }

    pub fn add(&mut self, status: Status) {
        match status {
            Status::Success => self.success += 1,
            Status::Review => self.review += 1,
            Status::Error => self.error += 1,
            Status::Pending => {}
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.review + self.error
    }
}

#[derive(Debug, Default)]
struct Entries {
    results: VecDeque<ExtractionResult>,
    /// Results ever appended, including dropped and cleared ones.
    appended: usize,
}

impl ResultStore {
    pub fn new(max_results: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            max_results: max_results.max(1),
        }
    }

    /// Append a result, dropping the oldest ones beyond the limit.
    pub fn append(&self, result: ExtractionResult) {
        let mut entries = lock(&self.entries);
        entries.results.push_back(result);
        entries.appended += 1;
        while entries.results.len() > self.max_results {
            entries.results.pop_front();
        }
    }

    /// Copy of all results, oldest first.
    pub fn snapshot(&self) -> Vec<ExtractionResult> {
        lock(&self.entries).results.iter().cloned().collect()
    }

    /// Results appended after `mark` that are still held, and the new mark.
    ///
    /// Start with a mark of 0 and pass back the returned mark each time.
    pub fn since(&self, mark: usize) -> (Vec<ExtractionResult>, usize) {
        let entries = lock(&self.entries);
        let fresh = entries.appended.saturating_sub(mark).min(entries.results.len());
        let skip = entries.results.len() - fresh;
        (entries.results.iter().skip(skip).cloned().collect(), entries.appended)
    }

    pub fn clear(&self) {
        lock(&self.entries).results.clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::from_results(lock(&self.entries).results.iter())
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn named(name: &str, status: Status) -> ExtractionResult {
        ExtractionResult {
            status,
            ..ExtractionResult::pending(name)
        }
    }

    #[test]
    fn test_oldest_dropped_on_overflow() {
        let store = ResultStore::new(3);
        for i in 0..5 {
            store.append(named(&format!("{i}.pdf"), Status::Review));
        }

        let names: Vec<_> = store.snapshot().into_iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["2.pdf", "3.pdf", "4.pdf"]);
    }

    #[test]
    fn test_since_keeps_up_past_the_limit() {
        let store = ResultStore::new(2);
        store.append(named("0.pdf", Status::Success));

        let (fresh, mark) = store.since(0);
        assert_eq!(fresh.len(), 1);
        assert_eq!(mark, 1);

        for i in 1..4 {
            store.append(named(&format!("{i}.pdf"), Status::Success));
        }
        let (fresh, mark) = store.since(mark);
        let names: Vec<_> = fresh.into_iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["2.pdf", "3.pdf"]);
        assert_eq!(mark, 4);

        store.append(named("4.pdf", Status::Review));
        let (fresh, mark) = store.since(mark);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].filename, "4.pdf");
        assert_eq!(store.since(mark).0.len(), 0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = ResultStore::new(10);
        store.append(named("a.pdf", Status::Success));

        let mut snapshot = store.snapshot();
        snapshot.clear();
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_counts() {
        let store = ResultStore::new(10);
        store.append(named("a.pdf", Status::Success));
        store.append(named("b.pdf", Status::Review));
        store.append(named("c.pdf", Status::Review));
        store.append(named("d.pdf", Status::Error));

        assert_eq!(
            store.counts(),
            StatusCounts {
                success: 1,
                review: 2,
                error: 1
            }
        );
        assert_eq!(store.counts().total(), 4);
    }

    #[test]
    fn test_concurrent_appends() {
        let store = std::sync::Arc::new(ResultStore::new(1000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.append(named(&format!("{t}-{i}.pdf"), Status::Review));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 400);
    }
}
