use crate::prelude::*;
use crate::sched::{CpuSet, NiceValue, Priority};
use crate::signal::SigSet;

/// The attributes a new thread starts with.
///
/// Attributes left unset are inherited from the creating thread, or take the
/// kernel defaults when there is no creating thread.
#[derive(Builder, Debug, Clone, Default)]
#[builder(pattern = "owned", build_fn(skip))]
pub struct ThreadAttrs {
    #[builder(setter(into))]
    name: String,
    #[builder(setter(strip_option))]
    priority: Option<Priority>,
    #[builder(setter(strip_option))]
    nice: Option<NiceValue>,
    #[builder(setter(strip_option))]
    affinity: Option<CpuSet>,
    detached: bool,
    sig_mask: SigSet,
}

// ThreadAttrsBuilder is generated automatically, except the build function
impl ThreadAttrsBuilder {
    pub fn build(self) -> Result<ThreadAttrs> {
        let priority = self.priority.flatten();
        let nice = self.nice.flatten();
        let affinity = self.affinity.flatten();
        if priority.is_some() && nice.is_some() {
            return_errno!(EINVAL, "priority and nice are mutually exclusive");
        }
        if let Some(affinity) = affinity.as_ref() {
            if affinity.empty() {
                return_errno!(EINVAL, "empty affinity");
            }
        }
        let sig_mask = self.sig_mask.unwrap_or_default();
        if sig_mask.intersects(SigSet::unblockable()) {
            return_errno!(EINVAL, "SIGKILL and SIGSTOP cannot be blocked");
        }
        Ok(ThreadAttrs {
            name: self.name.unwrap_or_default(),
            priority,
            nice,
            affinity,
            detached: self.detached.unwrap_or(false),
            sig_mask,
        })
    }
}

impl ThreadAttrs {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    pub fn nice(&self) -> Option<NiceValue> {
        self.nice
    }

    pub fn affinity(&self) -> Option<&CpuSet> {
        self.affinity.as_ref()
    }

    pub fn detached(&self) -> bool {
        self.detached
    }

    pub fn sig_mask(&self) -> SigSet {
        self.sig_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::constants::*;

    #[test]
    fn build_attrs() {
        let attrs = ThreadAttrsBuilder::default()
            .name("worker")
            .nice(NiceValue::new(5))
            .detached(true)
            .build()
            .unwrap();
        assert_eq!(attrs.name(), "worker");
        assert_eq!(attrs.nice(), Some(NiceValue::new(5)));
        assert!(attrs.priority().is_none());
        assert!(attrs.detached());
    }

    #[test]
    fn reject_bad_attrs() {
        let both = ThreadAttrsBuilder::default()
            .priority(Priority::NORMAL)
            .nice(NiceValue::new(1))
            .build();
        assert_eq!(both.unwrap_err().errno(), EINVAL);

        let no_cpu = ThreadAttrsBuilder::default()
            .affinity(CpuSet::new_empty(2))
            .build();
        assert_eq!(no_cpu.unwrap_err().errno(), EINVAL);

        let kill_blocked = ThreadAttrsBuilder::default()
            .sig_mask(SigSet::from(SIGKILL))
            .build();
        assert_eq!(kill_blocked.unwrap_err().errno(), EINVAL);
    }
}
