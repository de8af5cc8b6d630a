use std::fmt;

use super::constants::*;
use super::{SigNum, SigSet, Signal};
use crate::prelude::*;

/// The pending signals of a thread.
///
/// Each queue keeps signals for a specific signal number.
pub struct SigQueues {
    count: usize,
    std_queues: Vec<Option<Box<dyn Signal>>>,
    rt_queues: Vec<VecDeque<Box<dyn Signal>>>,
    // Signals a `sigtimedwait` caller accepts even while they are blocked.
    waited: SigSet,
}

impl SigQueues {
    pub fn new() -> Self {
        let std_queues = (0..COUNT_STD_SIGS).map(|_| None).collect();
        let rt_queues = (0..COUNT_RT_SIGS).map(|_| Default::default()).collect();
        SigQueues {
            count: 0,
            std_queues,
            rt_queues,
            waited: SigSet::new_empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// Enqueue a signal to the queue that corresponds to the signal number.
    ///
    /// Standard signals do not queue: while one instance is pending, later
    /// instances are dropped and the first one's info is kept. Real-time
    /// signals queue in arrival order.
    pub fn enqueue(&mut self, signal: Box<dyn Signal>) {
        let signum = signal.num();
        if signum.is_std() {
            let queue = self.std_queue_mut(signum);
            if queue.is_some() {
                return;
            }
            *queue = Some(signal);
        } else {
            self.rt_queue_mut(signum).push_back(signal);
        }
        self.count += 1;
    }

    /// Dequeue a signal with the given signal number.
    pub fn dequeue(&mut self, signum: SigNum) -> Option<Box<dyn Signal>> {
        let signal = if signum.is_std() {
            self.std_queue_mut(signum).take()
        } else {
            self.rt_queue_mut(signum).pop_front()
        };
        if signal.is_some() {
            self.count -= 1;
        }
        signal
    }

    /// Dequeue the lowest-numbered signal that is not in `blocked`.
    pub fn dequeue_unblocked(&mut self, blocked: SigSet) -> Option<Box<dyn Signal>> {
        if self.is_empty() {
            return None;
        }
        let candidates = self.pending() & !blocked;
        let signum = candidates.iter().next()?;
        self.dequeue(signum)
    }

    /// Drop every pending instance of the given signals.
    pub fn discard(&mut self, signals: SigSet) {
        for signum in signals.iter() {
            while self.dequeue(signum).is_some() {}
        }
    }

    /// Returns the signal numbers of pending signals.
    pub fn pending(&self) -> SigSet {
        let std = self
            .std_queues
            .iter()
            .enumerate()
            .filter(|(_, queue)| queue.is_some())
            .map(|(idx, _)| idx as u8 + MIN_STD_SIG_NUM);
        let rt = self
            .rt_queues
            .iter()
            .enumerate()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(idx, _)| idx as u8 + MIN_RT_SIG_NUM);
        std.chain(rt)
            .map(|num| unsafe { SigNum::from_u8_unchecked(num) })
            .collect()
    }

    pub fn waited(&self) -> SigSet {
        self.waited
    }

    pub fn set_waited(&mut self, waited: SigSet) {
        self.waited = waited;
    }

    fn std_queue_mut(&mut self, signum: SigNum) -> &mut Option<Box<dyn Signal>> {
        debug_assert!(signum.is_std());
        let idx = (signum.as_u8() - MIN_STD_SIG_NUM) as usize;
        &mut self.std_queues[idx]
    }

    fn rt_queue_mut(&mut self, signum: SigNum) -> &mut VecDeque<Box<dyn Signal>> {
        debug_assert!(signum.is_real_time());
        let idx = (signum.as_u8() - MIN_RT_SIG_NUM) as usize;
        &mut self.rt_queues[idx]
    }
}

impl Default for SigQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SigQueues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signals = self
            .std_queues
            .iter()
            .flatten()
            .chain(self.rt_queues.iter().flatten());
        write!(f, "SigQueues {{ queue = ")?;
        f.debug_list().entries(signals).finish()?;
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::super::{KernelSignal, UserSignal, UserSignalKind};
    use super::*;

    fn user(num: SigNum, value: usize) -> Box<dyn Signal> {
        Box::new(UserSignal::new(num, UserSignalKind::Sigqueue(value), 1, 0))
    }

    #[test]
    fn std_signals_coalesce() {
        let mut queues = SigQueues::new();
        queues.enqueue(user(SIGUSR1, 1));
        queues.enqueue(user(SIGUSR1, 2));
        assert_eq!(queues.len(), 1);
        let info = queues.dequeue(SIGUSR1).unwrap().to_info();
        assert_eq!(info.value, 1);
        assert!(queues.is_empty());
    }

    #[test]
    fn rt_signals_queue() {
        let rt = SigNum::from_u8(40).unwrap();
        let mut queues = SigQueues::new();
        queues.enqueue(user(rt, 1));
        queues.enqueue(user(rt, 2));
        assert_eq!(queues.len(), 2);
        assert_eq!(queues.dequeue(rt).unwrap().to_info().value, 1);
        assert_eq!(queues.dequeue(rt).unwrap().to_info().value, 2);
    }

    #[test]
    fn lowest_unblocked_first() {
        let mut queues = SigQueues::new();
        queues.enqueue(Box::new(KernelSignal::new(SIGTERM)));
        queues.enqueue(Box::new(KernelSignal::new(SIGINT)));
        queues.enqueue(Box::new(KernelSignal::new(SIGHUP)));
        assert_eq!(queues.pending(), SigSet::from(SIGHUP) + SIGINT + SIGTERM);

        let blocked = SigSet::from(SIGHUP);
        assert_eq!(queues.dequeue_unblocked(blocked).unwrap().num(), SIGINT);
        assert_eq!(queues.dequeue_unblocked(blocked).unwrap().num(), SIGTERM);
        assert!(queues.dequeue_unblocked(blocked).is_none());

        queues.discard(SigSet::from(SIGHUP));
        assert!(queues.is_empty());
    }
}
