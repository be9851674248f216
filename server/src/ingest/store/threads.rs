//! The bounded-list fold for `recent_threads` (invariant I6): read the
//! current JSON array, drop any entry sharing the new one's `threadId`
//! (a re-add moves it to the front rather than duplicating it), prepend,
//! truncate to 100. Pure so the eviction/reordering logic can be unit
//! tested without a database.

use entity::prelude::ThreadRef;

pub const MAX_RECENT_THREADS: usize = 100;

pub fn fold_thread_ref(mut current: Vec<ThreadRef>, new_ref: ThreadRef) -> Vec<ThreadRef> {
    current.retain(|t| t.thread_id != new_ref.thread_id);
    current.insert(0, new_ref);
    current.truncate(MAX_RECENT_THREADS);
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tref(thread_id: &str, ts: &str) -> ThreadRef {
        ThreadRef::new(thread_id, "work", ts)
    }

    /// Scenario D: 101 distinct threads from the same sender evicts the oldest.
    #[test]
    fn scenario_d_caps_at_100_and_evicts_oldest() {
        let mut threads = Vec::new();
        for i in 1..=101 {
            threads = fold_thread_ref(threads, tref(&format!("t{i}"), &format!("2024-01-{i:02}T00:00:00Z")));
        }

        assert_eq!(threads.len(), 100);
        assert_eq!(threads[0].thread_id, "t101");
        assert_eq!(threads[99].thread_id, "t2");
        assert!(!threads.iter().any(|t| t.thread_id == "t1"));
    }

    /// Scenario E: re-adding the same thread id moves it to the front rather
    /// than duplicating it.
    #[test]
    fn scenario_e_duplicate_thread_moves_to_front() {
        let mut threads = Vec::new();
        threads = fold_thread_ref(threads, tref("t1", "T1"));
        threads = fold_thread_ref(threads, tref("t2", "T1.5"));
        threads = fold_thread_ref(threads, tref("t1", "T2"));

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].thread_id, "t1");
        assert_eq!(threads[0].timestamp, "T2");
        assert_eq!(threads[1].thread_id, "t2");
    }

    /// P3: distinct thread ids, bounded length.
    #[test]
    fn property_distinct_ids_and_bounded_length() {
        let mut threads = Vec::new();
        for i in 0..250 {
            threads = fold_thread_ref(threads, tref(&format!("t{}", i % 37), &format!("{i}")));
        }

        assert!(threads.len() <= MAX_RECENT_THREADS);
        let mut ids = threads.iter().map(|t| t.thread_id.clone()).collect::<Vec<_>>();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before, "thread ids must be distinct");
    }
}
