use super::current;
use crate::kernel::Kernel;
use crate::prelude::*;

impl Kernel {
    pub fn getpid(&self) -> Result<pid_t> {
        Ok(self.current_tgroup()?.pid())
    }

    pub fn gettid(&self) -> pid_t {
        current::get().tid()
    }

    /// Returns 0 for a group without a parent.
    pub fn getppid(&self) -> Result<pid_t> {
        let parent = self.current_tgroup()?.parent();
        Ok(parent.map_or(0, |parent| parent.pid()))
    }
}
