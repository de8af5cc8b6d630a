//! Interrupt-disable nesting, in the manner of `pushcli`/`popcli`.
//!
//! Every spinlock acquisition disables local interrupts and every release
//! re-enables them once the outermost lock is gone. The counter belongs to
//! the execution context, so a lock handed across a context switch takes
//! its share of the nesting with it (see `SpinLockGuard::relinquish`).

use std::cell::Cell;

thread_local! {
    static NCLI: Cell<usize> = Cell::new(0);
    static INTENA: Cell<bool> = Cell::new(true);
    static ENABLED: Cell<bool> = Cell::new(true);
}

/// Disable interrupts and increase the nesting depth.
pub fn pushcli() {
    let depth = NCLI.with(|c| c.get());
    if depth == 0 {
        let was_enabled = ENABLED.with(|c| c.get());
        INTENA.with(|c| c.set(was_enabled));
    }
    ENABLED.with(|c| c.set(false));
    NCLI.with(|c| c.set(depth + 1));
}

/// Decrease the nesting depth, enabling interrupts at the outermost level
/// if they were enabled before the first `pushcli`.
pub fn popcli() {
    let depth = NCLI.with(|c| c.get());
    if depth == 0 {
        panic!("popcli without a matching pushcli");
    }
    NCLI.with(|c| c.set(depth - 1));
    if depth == 1 && INTENA.with(|c| c.get()) {
        ENABLED.with(|c| c.set(true));
    }
}

/// The current nesting depth.
pub fn depth() -> usize {
    NCLI.with(|c| c.get())
}

/// Whether interrupts are enabled in the current context.
pub fn enabled() -> bool {
    ENABLED.with(|c| c.get())
}

/// Keep interrupts disabled for the lifetime of the guard.
pub fn disable_local() -> IrqGuard {
    pushcli();
    IrqGuard { _private: () }
}

#[must_use]
pub struct IrqGuard {
    _private: (),
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        popcli();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting() {
        assert!(enabled());
        pushcli();
        pushcli();
        assert_eq!(depth(), 2);
        popcli();
        assert!(!enabled());
        popcli();
        assert!(enabled());
        assert_eq!(depth(), 0);
    }

    #[test]
    fn guard_restores() {
        {
            let _irq = disable_local();
            assert!(!enabled());
        }
        assert!(enabled());
    }

    #[test]
    #[should_panic]
    fn unbalanced_popcli() {
        popcli();
    }
}
