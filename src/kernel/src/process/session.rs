use std::fmt;

use crate::prelude::*;

pub type SessionRef = Arc<Session>;

/// A session: a set of process groups created by one `setsid`.
pub struct Session {
    sid: pid_t,
    // Process groups in this session
    pgrps: SpinLock<HashSet<pid_t>>,
}

impl Session {
    pub(crate) fn new(sid: pid_t) -> Self {
        Self {
            sid,
            pgrps: SpinLock::new(HashSet::new()),
        }
    }

    pub fn sid(&self) -> pid_t {
        self.sid
    }

    /// The thread group that created the session. Its pid is the sid.
    pub fn leader(&self) -> pid_t {
        self.sid
    }

    pub fn pgrps(&self) -> Vec<pid_t> {
        let mut pgids: Vec<pid_t> = self.pgrps.lock().iter().copied().collect();
        pgids.sort_unstable();
        pgids
    }

    pub(crate) fn add_pgrp(&self, pgid: pid_t) {
        self.pgrps.lock().insert(pgid);
    }

    /// Returns whether the session is left without process groups.
    pub(crate) fn remove_pgrp(&self, pgid: pid_t) -> bool {
        let mut pgrps = self.pgrps.lock();
        pgrps.remove(&pgid);
        pgrps.is_empty()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sid", &self.sid)
            .field("pgrps", &self.pgrps())
            .finish()
    }
}
