use super::SigSet;
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::process::current;

impl Kernel {
    /// The signals pending on the current thread that it blocks.
    pub fn sigpending(&self) -> SigSet {
        let thread = current::get();
        let mask = *thread.sig_mask().lock();
        let pending = thread.sig_queues().lock().pending();
        debug!("sigpending: pending = {:?}, mask = {:?}", pending, mask);
        pending & mask
    }
}
