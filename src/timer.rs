//! Cooperative one-shot timers on a virtual clock.
//!
//! Time is a [`Duration`] since the start of the run. The owner decides what
//! "now" is: the field driver feeds it from `tokio::time::Instant`, tests feed
//! it by hand. Firing a task never re-enters the queue, so callers pop due
//! tasks in a loop and act on them one at a time.
//!
//! There is no cancellation. A task that is no longer relevant when it fires
//! is expected to notice that from current state and do nothing.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

#[derive(Debug)]
struct Entry<T> {
    deadline: Duration,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the max-heap yields the earliest deadline, then the lowest seq.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending one-shot tasks ordered by deadline, ties broken by scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `task` to fire `delay` after `now`. Returns the deadline.
    pub fn after(&mut self, now: Duration, delay: Duration, task: T) -> Duration {
        let deadline = now.saturating_add(delay);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            deadline,
            seq,
            task,
        });
        deadline
    }

    /// Remove and return the earliest task whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(Duration, T)> {
        if self.heap.peek()?.deadline > now {
            return None;
        }
        self.heap.pop().map(|e| (e.deadline, e.task))
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.heap.peek().map(|e| e.deadline)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut q = TimerQueue::new();
        q.after(ms(0), ms(300), "c");
        q.after(ms(0), ms(100), "a");
        q.after(ms(0), ms(200), "b");

        assert_eq!(q.next_deadline(), Some(ms(100)));
        assert_eq!(q.pop_due(ms(1000)), Some((ms(100), "a")));
        assert_eq!(q.pop_due(ms(1000)), Some((ms(200), "b")));
        assert_eq!(q.pop_due(ms(1000)), Some((ms(300), "c")));
        assert!(q.is_empty());
    }

    #[test]
    fn equal_deadlines_keep_scheduling_order() {
        let mut q = TimerQueue::new();
        for i in 0..5 {
            q.after(ms(0), ms(50), i);
        }
        let fired: Vec<i32> = std::iter::from_fn(|| q.pop_due(ms(50)).map(|(_, t)| t)).collect();
        assert_eq!(fired, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn nothing_fires_before_deadline() {
        let mut q = TimerQueue::new();
        q.after(ms(10), ms(100), ());
        assert!(q.pop_due(ms(109)).is_none());
        assert_eq!(q.len(), 1);
        assert!(q.pop_due(ms(110)).is_some());
    }

    #[test]
    fn deadline_is_relative_to_now() {
        let mut q = TimerQueue::new();
        let deadline = q.after(ms(250), ms(100), ());
        assert_eq!(deadline, ms(350));
        assert_eq!(q.next_deadline(), Some(ms(350)));
    }
}
