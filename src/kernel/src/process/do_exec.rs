use super::{current, KillTarget, ThreadFlags};
use crate::kernel::Kernel;
use crate::prelude::*;

impl Kernel {
    /// Prepare the caller's thread group for a new program image.
    ///
    /// Every other member is killed and reaped, so the caller is left as
    /// the only member and the main thread. User signal handlers are reset
    /// to the default; ignored signals stay ignored.
    pub fn exec_flush(&self) -> Result<()> {
        let me = current::get();
        let group = self.current_tgroup()?;
        debug!("exec_flush: thread {} of group {}", me.tid(), group.pid());

        self.tgroup_kill_thread(&group, KillTarget::All, ThreadFlags::empty(), true)?;
        for thread in group.threads() {
            if thread.tid() == me.tid() {
                continue;
            }
            // Those swept meanwhile are gone already
            if let Ok(status) = self.thread_reap(&thread) {
                trace!("thread {} flushed: {:?}", thread.tid(), status);
            }
        }
        group.inner().elect_main(None, Some(me.tid()));
        debug_assert!(me.is_main());

        group.sig_dispositions().lock().inherit();
        info!("thread group {} flushed for exec", group.pid());
        Ok(())
    }
}
