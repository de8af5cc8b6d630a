use super::{CpuSet, Level, NR_LEVELS};
use crate::prelude::*;

/// The ready threads, banded into `NR_LEVELS` FIFO levels.
///
/// Level 0 is served first. Each entry keeps a snapshot of the thread's
/// affinity, so that picking a thread for a CPU needs no lock other than
/// the one of the run queues.
pub struct RunQueues<E> {
    // The i-th runqueue lists the entries at level i.
    levels: [VecDeque<RunEntry<E>>; NR_LEVELS],
    // A bitmap where each bit indicates whether the corresponding level
    // has any entries.
    nonempty_mask: u32,
}

#[derive(Debug, Clone)]
pub struct RunEntry<E> {
    pub item: E,
    pub level: Level,
    pub affinity: CpuSet,
    /// The jiffy at which the entry was queued or last promoted.
    pub enqueued_at: u64,
}

impl<E: PartialEq> RunQueues<E> {
    pub fn new() -> Self {
        Self {
            levels: Default::default(),
            nonempty_mask: 0,
        }
    }

    pub fn enqueue(&mut self, entry: RunEntry<E>) {
        let idx = entry.level.idx();
        self.levels[idx].push_back(entry);
        self.nonempty_mask |= 1 << idx;
    }

    /// Dequeue the first entry of the highest non-empty level that may run
    /// on `cpu`.
    pub fn dequeue_for(&mut self, cpu: usize) -> Option<RunEntry<E>> {
        let mut mask = self.nonempty_mask;
        while mask != 0 {
            let idx = mask.trailing_zeros() as usize;
            mask &= !(1 << idx);
            let rq = &mut self.levels[idx];
            if let Some(pos) = rq.iter().position(|entry| entry.affinity.contains(cpu)) {
                let entry = rq.remove(pos);
                self.update_mask(idx);
                return entry;
            }
        }
        None
    }

    /// Remove the entry of an item.
    pub fn remove(&mut self, item: &E) -> Option<RunEntry<E>> {
        for idx in 0..NR_LEVELS {
            let rq = &mut self.levels[idx];
            if let Some(pos) = rq.iter().position(|entry| entry.item == *item) {
                let entry = rq.remove(pos);
                self.update_mask(idx);
                return entry;
            }
        }
        None
    }

    /// Promote by one level every entry that has waited at least `threshold`
    /// jiffies. A promoted entry starts waiting anew.
    ///
    /// Returns the number of promoted entries.
    pub fn age(&mut self, now: u64, threshold: u64) -> usize {
        let mut promoted = 0;
        // Ascending, so that an entry moves at most one level per call
        for idx in 1..NR_LEVELS {
            let (upper, lower) = self.levels.split_at_mut(idx);
            let rq = &mut lower[0];
            let mut kept = VecDeque::with_capacity(rq.len());
            for mut entry in rq.drain(..) {
                if now.saturating_sub(entry.enqueued_at) >= threshold {
                    entry.level = entry.level.promote();
                    entry.enqueued_at = now;
                    upper[idx - 1].push_back(entry);
                    promoted += 1;
                } else {
                    kept.push_back(entry);
                }
            }
            *rq = kept;
            self.update_mask(idx - 1);
            self.update_mask(idx);
        }
        promoted
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(|rq| rq.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nonempty_mask == 0
    }

    /// The entries at a level, in service order.
    pub fn level_iter(&self, level: Level) -> impl Iterator<Item = &RunEntry<E>> + '_ {
        self.levels[level.idx()].iter()
    }

    fn update_mask(&mut self, idx: usize) {
        if self.levels[idx].is_empty() {
            self.nonempty_mask &= !(1 << idx);
        } else {
            self.nonempty_mask |= 1 << idx;
        }
    }
}

impl<E: PartialEq> Default for RunQueues<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(item: u32, level: usize, cpus: &[usize], at: u64) -> RunEntry<u32> {
        RunEntry {
            item,
            level: Level::new(level).unwrap(),
            affinity: CpuSet::from_cpus(2, cpus).unwrap(),
            enqueued_at: at,
        }
    }

    #[test]
    fn priority_then_fifo() {
        let mut rqs = RunQueues::new();
        rqs.enqueue(entry(1, 4, &[0, 1], 0));
        rqs.enqueue(entry(2, 7, &[0, 1], 0));
        rqs.enqueue(entry(3, 0, &[0, 1], 0));
        rqs.enqueue(entry(4, 4, &[0, 1], 0));

        let order: Vec<_> = std::iter::from_fn(|| rqs.dequeue_for(0))
            .map(|entry| entry.item)
            .collect();
        assert_eq!(order, vec![3, 1, 4, 2]);
        assert!(rqs.is_empty());
    }

    #[test]
    fn affinity_filters() {
        let mut rqs = RunQueues::new();
        rqs.enqueue(entry(1, 0, &[1], 0));
        rqs.enqueue(entry(2, 3, &[0], 0));
        assert_eq!(rqs.dequeue_for(0).unwrap().item, 2);
        assert!(rqs.dequeue_for(0).is_none());
        assert_eq!(rqs.dequeue_for(1).unwrap().item, 1);
    }

    #[test]
    fn aging_promotes_waiters() {
        let mut rqs = RunQueues::new();
        rqs.enqueue(entry(1, 7, &[0], 0));
        rqs.enqueue(entry(2, 7, &[0], 90));
        rqs.enqueue(entry(3, 6, &[0], 0));

        assert_eq!(rqs.age(100, 100), 2);
        let level6: Vec<_> = rqs.level_iter(Level::new(6).unwrap()).map(|e| e.item).collect();
        let level5: Vec<_> = rqs.level_iter(Level::new(5).unwrap()).map(|e| e.item).collect();
        assert_eq!(level6, vec![1]);
        assert_eq!(level5, vec![3]);

        // Promoted entries wait anew
        assert_eq!(rqs.age(150, 100), 0);
        assert_eq!(rqs.age(200, 100), 3);
        assert_eq!(rqs.level_iter(Level::TOP).count(), 0);
    }

    #[test]
    fn remove_keeps_mask() {
        let mut rqs = RunQueues::new();
        rqs.enqueue(entry(1, 2, &[0], 0));
        assert_eq!(rqs.remove(&1).unwrap().level.idx(), 2);
        assert!(rqs.remove(&1).is_none());
        assert!(rqs.is_empty());
        assert!(rqs.dequeue_for(0).is_none());
    }
}
