use super::{fmt, Errno, ToErrno};
use crate::prelude::pid_t;
use crate::util::context;

/// An errno with a message, where it was raised, and what caused it.
#[derive(Debug)]
pub struct Error {
    repr: Repr,
    location: Option<ErrorLocation>,
    cause: Option<Box<Error>>,
}

#[derive(Debug)]
enum Repr {
    Static { errno: Errno, msg: &'static str },
    Wrapped(Box<dyn ToErrno + Send + Sync + 'static>),
}

/// The source position of an `errno!` and the kernel thread that ran it.
#[derive(Debug, Clone, Copy)]
pub struct ErrorLocation {
    file: &'static str,
    line: u32,
    tid: Option<pid_t>,
}

impl Error {
    pub fn embedded(inner: (Errno, &'static str), location: Option<ErrorLocation>) -> Error {
        let (errno, msg) = inner;
        Error {
            repr: Repr::Static { errno, msg },
            location,
            cause: None,
        }
    }

    pub fn boxed<T>(inner: T, location: Option<ErrorLocation>) -> Error
    where
        T: ToErrno + Send + Sync + 'static,
    {
        Error {
            repr: Repr::Wrapped(Box::new(inner)),
            location,
            cause: None,
        }
    }

    pub fn errno(&self) -> Errno {
        match &self.repr {
            Repr::Static { errno, .. } => *errno,
            Repr::Wrapped(inner) => inner.errno(),
        }
    }

    pub fn location(&self) -> Option<ErrorLocation> {
        self.location
    }

    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    pub(super) fn set_cause(&mut self, cause: Error) {
        self.cause = Some(Box::new(cause));
    }
}

impl ErrorLocation {
    /// Record `file:line`, tagged with the current kernel thread if any.
    pub fn new(file: &'static str, line: u32) -> ErrorLocation {
        ErrorLocation {
            file,
            line,
            tid: context::tid_hint(),
        }
    }

    pub fn tid(&self) -> Option<pid_t> {
        self.tid
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.repr {
            Repr::Static { errno, msg } => write!(f, "{}: {}", errno, msg)?,
            Repr::Wrapped(inner) => write!(f, "{}: {}", inner.errno(), inner)?,
        }
        if let Some(location) = self.location {
            write!(f, " {}", location)?;
        }
        Ok(())
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.tid {
            Some(tid) => write!(f, "at {}:{} in thread {}", self.file, self.line, tid),
            None => write!(f, "at {}:{}", self.file, self.line),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
