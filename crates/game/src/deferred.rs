//! Deadline queue for things that finish after a delay (lingering explosions,
//! bomb-bay timing, emitter shutdown). Entities never own timers; they push an
//! action here and the simulation drains whatever is due each tick.

/// Items released once the simulation clock passes their deadline.
#[derive(Debug)]
pub struct DeferredQueue<T> {
    entries: Vec<Entry<T>>,
    next_seq: u64,
}

#[derive(Debug)]
struct Entry<T> {
    deadline: f64,
    seq: u64,
    item: T,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Release `item` at or after `deadline`.
    pub fn schedule(&mut self, deadline: f64, item: T) {
        self.entries.push(Entry {
            deadline,
            seq: self.next_seq,
            item,
        });
        self.next_seq += 1;
    }

    /// Remove and return every due item, earliest deadline first (ties in scheduling order).
    pub fn drain_due(&mut self, now: f64) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.entries).into_iter().partition(|e| e.deadline <= now);
        self.entries = pending;
        due.sort_by(|a, b| a.deadline.total_cmp(&b.deadline).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|e| e.item).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_in_deadline_order() {
        let mut q = DeferredQueue::new();
        q.schedule(2.0, "late");
        q.schedule(1.0, "early");
        q.schedule(1.0, "early-second");
        assert!(q.drain_due(0.5).is_empty());
        assert_eq!(q.drain_due(1.5), vec!["early", "early-second"]);
        assert_eq!(q.len(), 1);
        assert_eq!(q.drain_due(2.0), vec!["late"]);
        assert!(q.is_empty());
    }
}
