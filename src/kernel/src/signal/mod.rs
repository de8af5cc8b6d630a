//! The signal subsystem.
//!
//! Dispositions are per thread group; pending queues and masks are per
//! thread. Signals are delivered at the return-to-user boundary, lowest
//! signal number first.

pub use self::constants::*;
pub use self::do_sigprocmask::MaskOp;
pub use self::do_sigreturn::SignalFrame;
pub use self::sig_action::{SigAction, SigActionFlags, SigDefaultAction};
pub use self::sig_dispositions::SigDispositions;
pub use self::sig_num::SigNum;
pub use self::sig_queues::SigQueues;
pub use self::sig_set::SigSet;
pub use self::signals::{KernelSignal, SigInfo, Signal, UserSignal, UserSignalKind};

mod do_kill;
mod do_sigaction;
mod do_sigpending;
mod do_sigprocmask;
mod do_sigreturn;
mod do_sigtimedwait;
mod sig_action;
mod sig_dispositions;
mod sig_num;
mod sig_queues;
mod sig_set;
mod signals;

pub mod constants;
