//! Per-execution-context hints.
//!
//! An execution context is either a kernel thread or the scheduler loop of a
//! CPU. The arch layer updates the hints on every switch so that low-level
//! code (spinlock diagnostics, the logger) can tell who is running where
//! without reaching into the scheduler.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::prelude::*;

static NEXT_HOLDER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static HOLDER_ID: u64 = NEXT_HOLDER_ID.fetch_add(1, Ordering::Relaxed);
    static CPU_HINT: Cell<Option<usize>> = Cell::new(None);
    static TID_HINT: Cell<Option<pid_t>> = Cell::new(None);
}

/// A non-zero ID that identifies the current execution context as a lock holder.
pub fn holder_id() -> u64 {
    HOLDER_ID.with(|id| *id)
}

pub fn cpu_hint() -> Option<usize> {
    CPU_HINT.try_with(|cell| cell.get()).ok().flatten()
}

pub fn set_cpu_hint(cpu: Option<usize>) {
    let _ = CPU_HINT.try_with(|cell| cell.set(cpu));
}

pub fn tid_hint() -> Option<pid_t> {
    TID_HINT.try_with(|cell| cell.get()).ok().flatten()
}

pub fn set_tid_hint(tid: Option<pid_t>) {
    let _ = TID_HINT.try_with(|cell| cell.set(tid));
}
