use super::{fmt, Errno, Error};

pub trait ToErrno: fmt::Display + fmt::Debug {
    fn errno(&self) -> Errno;
}

impl<T> From<T> for Error
where
    T: ToErrno + Send + Sync + 'static,
{
    fn from(t: T) -> Error {
        Error::boxed(t, None)
    }
}

impl ToErrno for Errno {
    fn errno(&self) -> Errno {
        *self
    }
}

impl ToErrno for std::num::ParseIntError {
    fn errno(&self) -> Errno {
        Errno::EINVAL
    }
}

impl ToErrno for serde_json::Error {
    fn errno(&self) -> Errno {
        Errno::EINVAL
    }
}
