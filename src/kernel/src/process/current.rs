/// Get and set the current thread.
use std::cell::RefCell;

use super::ThreadRef;
use crate::util::context;

thread_local! {
    static CURRENT: RefCell<Option<ThreadRef>> = RefCell::new(None);
}

/// Get the current thread.
///
/// Calling this outside of a kernel thread is a bug.
#[track_caller]
pub fn get() -> ThreadRef {
    match try_get() {
        Some(current) => current,
        None => panic!("not running in a kernel thread"),
    }
}

/// Attempt to get the current thread.
pub fn try_get() -> Option<ThreadRef> {
    CURRENT
        .try_with(|current| current.borrow().clone())
        .ok()
        .flatten()
}

/// Set the thread associated with the current execution context.
///
/// This is called once at the very beginning of a thread's execution context.
pub(crate) fn set(new_current: ThreadRef) {
    context::set_tid_hint(Some(new_current.tid()));
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        debug_assert!(current.is_none());
        *current = Some(new_current);
    });
}

/// Drop the handle of the current thread before its context goes away.
pub(crate) fn clear() {
    context::set_tid_hint(None);
    let _ = CURRENT.try_with(|current| current.borrow_mut().take());
}
