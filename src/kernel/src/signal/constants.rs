use super::SigNum;

/// Standard signals
pub(super) const MIN_STD_SIG_NUM: u8 = 1;
pub(super) const MAX_STD_SIG_NUM: u8 = 31; // inclusive
/// Real-time signals
pub(super) const MIN_RT_SIG_NUM: u8 = 32;
pub(super) const MAX_RT_SIG_NUM: u8 = 64; // inclusive
/// Count the number of signals
pub(super) const COUNT_STD_SIGS: usize = 31;
pub(super) const COUNT_RT_SIGS: usize = 33;
pub const NSIG: usize = 64;

macro_rules! define_std_signums {
    ( $( $name: ident = $num: literal ),+, ) => {
        $(
            pub const $name : SigNum = unsafe {
                SigNum::from_u8_unchecked($num)
            };
        )*

        pub(super) fn std_signum_name(num: u8) -> Option<&'static str> {
            match num {
                $( $num => Some(stringify!($name)), )*
                _ => None,
            }
        }
    }
}

define_std_signums! {
    SIGHUP    = 1,
    SIGINT    = 2,
    SIGQUIT   = 3,
    SIGILL    = 4,
    SIGTRAP   = 5,
    SIGABRT   = 6,
    SIGBUS    = 7,
    SIGFPE    = 8,
    SIGKILL   = 9,
    SIGUSR1   = 10,
    SIGSEGV   = 11,
    SIGUSR2   = 12,
    SIGPIPE   = 13,
    SIGALRM   = 14,
    SIGTERM   = 15,
    SIGSTKFLT = 16,
    SIGCHLD   = 17,
    SIGCONT   = 18,
    SIGSTOP   = 19,
    SIGTSTP   = 20,
    SIGTTIN   = 21,
    SIGTTOU   = 22,
    SIGURG    = 23,
    SIGXCPU   = 24,
    SIGXFSZ   = 25,
    SIGVTALRM = 26,
    SIGPROF   = 27,
    SIGWINCH  = 28,
    SIGIO     = 29,
    SIGPWR    = 30,
    SIGSYS    = 31,
}

/// Where a signal came from, as reported in `SigInfo::code`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SigCode {
    /// Sent by `kill`
    User,
    /// Sent by `tgkill`
    Tkill,
    /// Sent with a value attached
    Queue,
    /// Generated by the kernel itself
    Kernel,
    /// A child changed state
    Child(ChildCode),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChildCode {
    Exited,
    Killed,
    Dumped,
    Stopped,
    Continued,
}
