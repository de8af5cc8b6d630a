use super::super::constants::*;
use super::super::SigNum;
use super::{SigInfo, Signal};
use crate::prelude::*;

/// A signal sent by a thread with `kill`, `tgkill` or `sigqueue`.
#[derive(Debug, Copy, Clone)]
pub struct UserSignal {
    num: SigNum,
    pid: pid_t, // sender's pid
    uid: u32,   // sender's uid
    kind: UserSignalKind,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UserSignalKind {
    Kill,
    Tkill,
    Sigqueue(usize),
}

impl UserSignal {
    pub fn new(num: SigNum, kind: UserSignalKind, pid: pid_t, uid: u32) -> Self {
        Self {
            num,
            kind,
            pid,
            uid,
        }
    }

    pub fn pid(&self) -> pid_t {
        self.pid
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn kind(&self) -> UserSignalKind {
        self.kind
    }
}

impl Signal for UserSignal {
    fn num(&self) -> SigNum {
        self.num
    }

    fn to_info(&self) -> SigInfo {
        let code = match self.kind {
            UserSignalKind::Kill => SigCode::User,
            UserSignalKind::Tkill => SigCode::Tkill,
            UserSignalKind::Sigqueue(_) => SigCode::Queue,
        };
        let mut info = SigInfo::new(self.num, code);
        info.pid = self.pid;
        info.uid = self.uid;
        if let UserSignalKind::Sigqueue(value) = self.kind {
            info.value = value;
        }
        info
    }
}
