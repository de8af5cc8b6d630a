use super::{Credentials, ThreadAttrs, ThreadGroup, ThreadGroupRef};
use crate::kernel::Kernel;
use crate::prelude::*;
use crate::signal::SigDispositions;

impl Kernel {
    /// Create an empty thread group.
    ///
    /// A child inherits the parent's credentials, signal dispositions,
    /// process group and session. A group without a parent starts a new
    /// session and a new process group, both named by its pid, and runs as
    /// root.
    pub fn tgroup_create(&self, parent: Option<&ThreadGroupRef>) -> Result<ThreadGroupRef> {
        let pid = self.pids.lock().alloc()?;
        let group = match parent {
            Some(parent) => {
                let (pgid, sid) = {
                    let parent_inner = parent.inner();
                    (parent_inner.pgid(), parent_inner.sid())
                };
                let dispositions = *parent.sig_dispositions().lock();
                ThreadGroup::new(
                    pid,
                    Arc::downgrade(parent),
                    pgid,
                    sid,
                    dispositions,
                    parent.credentials(),
                )
            }
            None => ThreadGroup::new(
                pid,
                Weak::new(),
                pid,
                pid,
                SigDispositions::default(),
                Credentials::ROOT,
            ),
        };
        let group = Arc::new(group);

        if let Err(e) = self.tgroups.lock().add(pid, group.clone()) {
            self.pids.lock().free(pid);
            return Err(e);
        }
        let (pgid, sid) = (group.pgid(), group.sid());
        self.pgrp_join(&group, pgid, sid);

        if let Some(parent) = parent {
            let mut parent_inner = parent.inner();
            if parent_inner.status() != super::GroupStatus::Live {
                drop(parent_inner);
                self.tgroup_unlink(&group);
                return_errno!(ESRCH, "the parent has exited");
            }
            parent_inner.add_child(group.clone());
        }

        info!(
            "thread group {} created, parent = {:?}",
            pid,
            parent.map(|parent| parent.pid())
        );
        Ok(group)
    }

    /// Create a thread group with one running thread.
    pub fn process_spawn<F>(
        &self,
        parent: Option<&ThreadGroupRef>,
        attrs: ThreadAttrs,
        entry: F,
    ) -> Result<ThreadGroupRef>
    where
        F: FnOnce(&Arc<Kernel>) -> i32 + Send + 'static,
    {
        let group = self.tgroup_create(parent)?;
        if let Err(e) = self.thread_spawn(&group, attrs, entry) {
            self.tgroup_discard(&group);
            return Err(e);
        }
        Ok(group)
    }

    // Undo `tgroup_create` for a group whose first thread failed to start.
    fn tgroup_discard(&self, group: &ThreadGroupRef) {
        let parent = group.parent();
        if let Some(parent) = parent.as_ref() {
            parent.inner().remove_child(group.pid());
        }
        // A parentless zombie has released itself
        if parent.is_some() || !group.is_zombie() {
            self.tgroup_release(group);
        }
    }
}
