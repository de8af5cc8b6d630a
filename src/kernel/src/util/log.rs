/// Log infrastructure.
///
/// There are five APIs for producing log messages:
/// 1. `error!`
/// 2. `warn!`
/// 3. `info!`
/// 4. `debug!`
/// 5. `trace!`
/// which corresponds to five different log levels.
///
/// Guidelines on which level to use:
///
/// 1. Use `error!` for broken invariants that the kernel survives, e.g., a
///    kernel thread body that panicked.
///
/// 2. Use `warn!` for conditions that are legal but suspicious, e.g., a wakeup
///    that found its target in an unexpected state.
///
/// 3. Use `info!` for lifecycle events, e.g., booting a CPU or a thread group
///    becoming a zombie.
///
/// 4. Use `debug!` for major events in normal execution, e.g., a signal being
///    queued or a thread being reaped.
///
/// 5. Use `trace!` for the most detailed info, e.g., every context switch.
///
/// Every message is prefixed with the CPU and the thread it was produced on,
/// when they are known.
use log::*;

use super::context;

pub use log::{max_level, LevelFilter};

/// Initialize the log infrastructure with the given log level.
///
/// Only the first call installs the logger; later calls just adjust the level.
pub fn init(level: LevelFilter) {
    static LOGGER: SimpleLogger = SimpleLogger;
    if log::set_logger(&LOGGER).is_err() {
        trace!("logger is already installed");
    }
    log::set_max_level(level);
}

macro_rules! format_option {
    ($fmt:expr, $opt_val:expr) => {{
        if let Some(val) = $opt_val {
            format!($fmt, val)
        } else {
            std::string::String::from("")
        }
    }};
}

/// A simple logger that adds CPU and thread info to log messages.
struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!(
                "[{:>5}]{}{} {}",
                record.level(),
                format_option!("[C:{}]", context::cpu_hint()),
                format_option!("[T:{}]", context::tid_hint()),
                record.args()
            );
            eprintln!("{}", message);
        }
    }

    fn flush(&self) {}
}
