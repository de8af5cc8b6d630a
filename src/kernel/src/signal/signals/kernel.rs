use super::super::constants::*;
use super::super::SigNum;
use super::{SigInfo, Signal};
use crate::prelude::*;

/// A signal raised by the kernel itself, e.g. SIGCHLD to a parent.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KernelSignal {
    num: SigNum,
    code: SigCode,
    pid: pid_t,
    status: i32,
}

impl KernelSignal {
    pub fn new(num: SigNum) -> Self {
        Self {
            num,
            code: SigCode::Kernel,
            pid: 0,
            status: 0,
        }
    }

    /// SIGCHLD on behalf of the child thread group `pid`.
    pub fn child(pid: pid_t, code: ChildCode, status: i32) -> Self {
        Self {
            num: SIGCHLD,
            code: SigCode::Child(code),
            pid,
            status,
        }
    }
}

impl Signal for KernelSignal {
    fn num(&self) -> SigNum {
        self.num
    }

    fn to_info(&self) -> SigInfo {
        let mut info = SigInfo::new(self.num, self.code);
        info.pid = self.pid;
        info.status = self.status;
        info
    }
}
