use num_enum::TryFromPrimitive;

use super::fmt;

/// POSIX error numbers, with the same values as Linux.
///
/// Only the numbers that the concurrency core and its direct callers can
/// produce are listed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
pub enum Errno {
    EPERM = 1,
    ENOENT = 2,
    ESRCH = 3,
    EINTR = 4,
    EIO = 5,
    E2BIG = 7,
    ECHILD = 10,
    EAGAIN = 11,
    ENOMEM = 12,
    EACCES = 13,
    EFAULT = 14,
    EBUSY = 16,
    EEXIST = 17,
    EINVAL = 22,
    ERANGE = 34,
    EDEADLK = 35,
    ENOSYS = 38,
    ENODATA = 61,
    EOVERFLOW = 75,
    ETIMEDOUT = 110,
}

impl Errno {
    /// The value a syscall returns to user space on this error.
    pub fn as_retval(&self) -> i32 {
        -(*self as i32)
    }

    pub fn as_str(&self) -> &'static str {
        use self::Errno::*;
        match *self {
            EPERM => "Operation not permitted",
            ENOENT => "No such file or directory",
            ESRCH => "No such process",
            EINTR => "Interrupted system call",
            EIO => "I/O error",
            E2BIG => "Argument list too long",
            ECHILD => "No child processes",
            EAGAIN => "Try again",
            ENOMEM => "Out of memory",
            EACCES => "Permission denied",
            EFAULT => "Bad address",
            EBUSY => "Device or resource busy",
            EEXIST => "File exists",
            EINVAL => "Invalid argument",
            ERANGE => "Math result not representable",
            EDEADLK => "Resource deadlock would occur",
            ENOSYS => "Function not implemented",
            ENODATA => "No data available",
            EOVERFLOW => "Value too large for defined data type",
            ETIMEDOUT => "Connection timed out",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "errno = {}, \"{}\"", *self as u32, self.as_str())
    }
}
