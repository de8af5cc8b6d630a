pub use std::cmp::min;
pub use std::collections::{HashMap, HashSet, VecDeque};
pub use std::fmt::{Debug, Display};
pub use std::sync::{Arc, Weak};

pub use log::{debug, error, info, trace, warn};

pub use crate::error::*;
pub use crate::util::sync::{SpinLock, SpinLockGuard};

#[allow(non_camel_case_types)]
pub type pid_t = u32;
