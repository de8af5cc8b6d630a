//! Threads, thread groups, and the process layer on top of them.
//!
//! A thread group is what user space calls a process. Groups form a tree
//! through their parent links and are gathered into process groups and
//! sessions for job control.

pub use self::credentials::Credentials;
pub use self::do_clone::ThreadEntry;
pub use self::do_wait4::{ChildFilter, WaitOptions, WaitStatus};
pub use self::pgrp::{ProcessGrp, ProcessGrpRef};
pub use self::session::{Session, SessionRef};
pub use self::table::Table;
pub use self::term_status::TermStatus;
pub use self::tgroup::{
    GroupStatus, JobReport, JobState, KillTarget, ThreadGroup, ThreadGroupInner, ThreadGroupRef,
    ThreadSelector,
};
pub use self::thread::{
    SleepKind, Thread, ThreadAttrs, ThreadAttrsBuilder, ThreadFlags, ThreadInner, ThreadRef,
    ThreadState, WakeReason,
};

pub mod current;

mod credentials;
mod do_clone;
mod do_exec;
mod do_exit;
mod do_getpid;
mod do_join;
mod do_kill;
mod do_spawn;
mod do_tgroup;
mod do_wait4;
mod pgrp;
mod session;
mod table;
mod term_status;
mod tgroup;
mod thread;
