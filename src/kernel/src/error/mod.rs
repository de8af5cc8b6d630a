//! Error numbers and the error type shared by the whole kernel core.
//!
//! Errors are created with `errno!` or returned early with `return_errno!`.
//! Both macros record the source location, which makes the error chain
//! printed by `Error::backtrace` point at the exact place of failure.

#[macro_export]
macro_rules! errno {
    ($errno_expr: expr, $error_msg: expr) => {{
        let inner_error = {
            let errno: $crate::error::Errno = $errno_expr;
            let msg: &'static str = $error_msg;
            (errno, msg)
        };
        let error = $crate::error::Error::embedded(
            inner_error,
            Some($crate::error::ErrorLocation::new(file!(), line!())),
        );
        error
    }};
    ($error_expr: expr) => {{
        let inner_error = $error_expr;
        let error = $crate::error::Error::boxed(
            inner_error,
            Some($crate::error::ErrorLocation::new(file!(), line!())),
        );
        error
    }};
}

#[macro_export]
macro_rules! return_errno {
    ($errno_expr: expr, $error_msg: expr) => {{
        return Err($crate::errno!($errno_expr, $error_msg));
    }};
    ($error_expr: expr) => {{
        return Err($crate::errno!($error_expr));
    }};
}

use std::fmt;

mod backtrace;
mod errno;
mod error;
mod to_errno;

pub use self::backtrace::ResultExt;
pub use self::errno::Errno;
pub use self::errno::Errno::*;
pub use self::error::{Error, ErrorLocation};
pub use self::to_errno::ToErrno;

pub type Result<T> = std::result::Result<T, Error>;
