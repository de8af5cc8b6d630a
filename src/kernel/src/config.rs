//! Kernel configuration.
//!
//! The configuration is given as JSON (see `KernelConfig::from_json`). Every
//! field is optional; missing fields take the defaults listed in the
//! `InputConfig` getters below.

use serde::Deserialize;

use crate::prelude::*;
use crate::sched::NR_LEVELS;

#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    pub sched: ConfigSched,
    pub thread: ConfigThread,
    pub log_level: log::LevelFilter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSched {
    /// The number of CPUs to bring up.
    pub ncpus: usize,
    /// Timer ticks per second.
    pub hz: u32,
    /// The quantum, in jiffies, of each run queue level.
    pub level_quantum: [u32; NR_LEVELS],
    /// Reap detached zombies every this many jiffies.
    pub zombie_sweep_interval: u64,
    /// Promote starving threads every this many jiffies.
    pub aging_interval: u64,
    /// A ready thread that has waited this many jiffies is starving.
    pub starvation_threshold: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigThread {
    pub default_priority: u8,
    pub max_threads: usize,
}

impl KernelConfig {
    pub fn from_json(config_json: &str) -> Result<KernelConfig> {
        let config_input: InputConfig =
            serde_json::from_str(config_json).map_err(|e| errno!(e))?;
        Self::from_input(&config_input).cause_err(|_| errno!(EINVAL, "invalid config JSON"))
    }

    fn from_input(input: &InputConfig) -> Result<KernelConfig> {
        let sched = ConfigSched::from_input(&input.sched)?;
        let thread = ConfigThread::from_input(&input.thread)?;
        let log_level = parse_log_level(&input.log_level)?;
        Ok(KernelConfig {
            sched,
            thread,
            log_level,
        })
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        // The default input always passes validation
        match Self::from_input(&InputConfig::default()) {
            Ok(config) => config,
            Err(e) => panic!("invalid default config: {}", e.backtrace()),
        }
    }
}

impl ConfigSched {
    fn from_input(input: &InputConfigSched) -> Result<ConfigSched> {
        if input.ncpus == 0 || input.ncpus > 64 {
            return_errno!(EINVAL, "ncpus must be in 1..=64");
        }
        if input.hz == 0 {
            return_errno!(EINVAL, "hz must not be zero");
        }
        if input.level_quantum.len() != NR_LEVELS {
            return_errno!(EINVAL, "level_quantum must have one entry per level");
        }
        if input.level_quantum.iter().any(|&q| q == 0) {
            return_errno!(EINVAL, "a quantum must not be zero");
        }
        if input.zombie_sweep_interval == 0 || input.aging_interval == 0 {
            return_errno!(EINVAL, "intervals must not be zero");
        }
        let mut level_quantum = [0; NR_LEVELS];
        level_quantum.copy_from_slice(&input.level_quantum);
        Ok(ConfigSched {
            ncpus: input.ncpus,
            hz: input.hz,
            level_quantum,
            zombie_sweep_interval: input.zombie_sweep_interval,
            aging_interval: input.aging_interval,
            starvation_threshold: input.starvation_threshold,
        })
    }
}

impl ConfigThread {
    fn from_input(input: &InputConfigThread) -> Result<ConfigThread> {
        if input.max_threads == 0 {
            return_errno!(EINVAL, "max_threads must not be zero");
        }
        Ok(ConfigThread {
            default_priority: input.default_priority,
            max_threads: input.max_threads,
        })
    }
}

fn parse_log_level(input: &str) -> Result<log::LevelFilter> {
    let level = match input.to_lowercase().as_str() {
        "off" => log::LevelFilter::Off,
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => return_errno!(EINVAL, "unknown log level"),
    };
    Ok(level)
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct InputConfig {
    #[serde(default)]
    pub sched: InputConfigSched,
    #[serde(default)]
    pub thread: InputConfigThread,
    #[serde(default = "InputConfig::get_log_level")]
    pub log_level: String,
}

impl InputConfig {
    fn get_log_level() -> String {
        "info".to_string()
    }
}

impl Default for InputConfig {
    fn default() -> InputConfig {
        InputConfig {
            sched: Default::default(),
            thread: Default::default(),
            log_level: InputConfig::get_log_level(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct InputConfigSched {
    #[serde(default = "InputConfigSched::get_ncpus")]
    pub ncpus: usize,
    #[serde(default = "InputConfigSched::get_hz")]
    pub hz: u32,
    #[serde(default = "InputConfigSched::get_level_quantum")]
    pub level_quantum: Vec<u32>,
    #[serde(default = "InputConfigSched::get_zombie_sweep_interval")]
    pub zombie_sweep_interval: u64,
    #[serde(default = "InputConfigSched::get_aging_interval")]
    pub aging_interval: u64,
    #[serde(default = "InputConfigSched::get_starvation_threshold")]
    pub starvation_threshold: u64,
}

impl InputConfigSched {
    fn get_ncpus() -> usize {
        1
    }

    fn get_hz() -> u32 {
        100
    }

    // Lower levels run longer once they get the CPU
    fn get_level_quantum() -> Vec<u32> {
        vec![1, 1, 2, 2, 4, 4, 8, 8]
    }

    fn get_zombie_sweep_interval() -> u64 {
        300
    }

    fn get_aging_interval() -> u64 {
        50
    }

    fn get_starvation_threshold() -> u64 {
        100
    }
}

impl Default for InputConfigSched {
    fn default() -> InputConfigSched {
        InputConfigSched {
            ncpus: InputConfigSched::get_ncpus(),
            hz: InputConfigSched::get_hz(),
            level_quantum: InputConfigSched::get_level_quantum(),
            zombie_sweep_interval: InputConfigSched::get_zombie_sweep_interval(),
            aging_interval: InputConfigSched::get_aging_interval(),
            starvation_threshold: InputConfigSched::get_starvation_threshold(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct InputConfigThread {
    #[serde(default = "InputConfigThread::get_default_priority")]
    pub default_priority: u8,
    #[serde(default = "InputConfigThread::get_max_threads")]
    pub max_threads: usize,
}

impl InputConfigThread {
    fn get_default_priority() -> u8 {
        128
    }

    fn get_max_threads() -> usize {
        4096
    }
}

impl Default for InputConfigThread {
    fn default() -> InputConfigThread {
        InputConfigThread {
            default_priority: InputConfigThread::get_default_priority(),
            max_threads: InputConfigThread::get_max_threads(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = KernelConfig::from_json("{}").unwrap();
        assert_eq!(config, KernelConfig::default());
        assert_eq!(config.sched.hz, 100);
        assert_eq!(config.sched.zombie_sweep_interval, 300);
        assert_eq!(config.sched.level_quantum, [1, 1, 2, 2, 4, 4, 8, 8]);
        assert_eq!(config.log_level, log::LevelFilter::Info);
    }

    #[test]
    fn partial_override() {
        let config =
            KernelConfig::from_json(r#"{ "sched": { "ncpus": 4 }, "log_level": "debug" }"#)
                .unwrap();
        assert_eq!(config.sched.ncpus, 4);
        assert_eq!(config.sched.hz, 100);
        assert_eq!(config.log_level, log::LevelFilter::Debug);
    }

    #[test]
    fn invalid_values() {
        let err = KernelConfig::from_json(r#"{ "sched": { "ncpus": 0 } }"#).unwrap_err();
        assert_eq!(err.errno(), EINVAL);
        assert!(KernelConfig::from_json(r#"{ "sched": { "level_quantum": [1, 2] } }"#).is_err());
        assert!(KernelConfig::from_json(r#"{ "log_level": "loud" }"#).is_err());
        assert!(KernelConfig::from_json(r#"{ "unknown": 1 }"#).is_err());
        assert!(KernelConfig::from_json("not json").is_err());
    }
}
