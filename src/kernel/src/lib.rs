//! The thread and process concurrency core of the Ginger OS kernel.
//!
//! The crate covers the thread lifecycle, run-queue scheduling on several
//! CPUs, sleeping and waking, signals, thread groups with process groups
//! and sessions, and the locking discipline that ties them together. The
//! hardware below it is reached through the `Arch` trait; `HostArch` runs
//! every execution context on a host thread.
//!
//! All state lives in a `Kernel` object. Operations are its methods and act
//! on behalf of the calling kernel thread (`process::current`).

#![allow(clippy::new_without_default)]
#![allow(clippy::len_without_is_empty)]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate derive_builder;
extern crate log;
extern crate serde;
extern crate serde_json;

#[macro_use]
mod prelude;
#[macro_use]
mod error;

pub mod arch;
pub mod config;
pub mod events;
pub mod kernel;
pub mod process;
pub mod sched;
pub mod signal;
pub mod util;

pub use crate::config::KernelConfig;
pub use crate::error::{Errno, Error, Result};
pub use crate::kernel::Kernel;
pub use crate::prelude::pid_t;

#[cfg(test)]
pub(crate) mod test_util {
    //! Helpers for tests that need a running kernel.

    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    use crate::prelude::*;
    use crate::process::{ThreadAttrs, ThreadGroupRef};
    use crate::{Kernel, KernelConfig};

    /// Long enough for any test thread to finish; only hit when a test hangs.
    pub const RECV_TIMEOUT: Duration = Duration::from_secs(10);

    #[ctor::ctor]
    fn auto_init_logger() {
        crate::util::log::init(log::LevelFilter::Warn);
    }

    /// Boot a kernel with `ncpus` CPUs. Logging stays at the test level.
    pub fn boot(ncpus: usize) -> Arc<Kernel> {
        let json = format!(
            r#"{{ "sched": {{ "ncpus": {} }}, "log_level": "warn" }}"#,
            ncpus
        );
        boot_with(&json)
    }

    /// Boot a kernel from a JSON config.
    pub fn boot_with(json: &str) -> Arc<Kernel> {
        let config = KernelConfig::from_json(json).unwrap();
        let kernel = Kernel::new(config);
        kernel.boot().unwrap();
        kernel
    }

    /// Run `f` as the first thread of a new parentless thread group and
    /// return what it returned.
    pub fn run_in_kernel<T, F>(kernel: &Arc<Kernel>, f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce(&Arc<Kernel>) -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        spawn_process(kernel, move |kernel| {
            let _ = tx.send(f(kernel));
            0
        });
        recv(&rx)
    }

    /// Start a parentless thread group running `entry`.
    pub fn spawn_process<F>(kernel: &Arc<Kernel>, entry: F) -> ThreadGroupRef
    where
        F: FnOnce(&Arc<Kernel>) -> i32 + Send + 'static,
    {
        kernel
            .process_spawn(None, ThreadAttrs::default(), entry)
            .unwrap()
    }

    pub fn recv<T>(rx: &Receiver<T>) -> T {
        rx.recv_timeout(RECV_TIMEOUT)
            .expect("timed out waiting for a kernel thread")
    }

    /// Tick until `cond` holds, yielding the CPU in between. Must be called
    /// from a kernel thread.
    pub fn tick_until<F: Fn() -> bool>(kernel: &Kernel, cond: F) {
        for _ in 0..100_000 {
            if cond() {
                return;
            }
            kernel.jiffies_update();
            kernel.sched_yield().unwrap();
        }
        panic!("condition never held");
    }
}
