//! A CpuSet is a bit mask used to represent a set of CPUs.
//!
//! The number of bits contained in a CpuSet equals to the number of CPUs the
//! kernel instance was booted with. The meaning of the i-th bit is:
//! * If `cpu_set[i] == true`, then the i-th CPU belongs to the set;
//! * Otherwise, the i-th CPU is not in the set.

use bitvec::prelude::*;
use std::fmt;
use std::ops::Index;

use crate::prelude::*;

#[derive(Clone, PartialEq, Eq)]
pub struct CpuSet {
    bits: BitVec<u8, Lsb0>,
}

impl CpuSet {
    /// Create a CpuSet that consists of all of the `ncpus` CPUs.
    pub fn new_full(ncpus: usize) -> Self {
        Self {
            bits: bitvec![u8, Lsb0; 1; ncpus],
        }
    }

    /// Create a CpuSet that consists of none of the `ncpus` CPUs.
    pub fn new_empty(ncpus: usize) -> Self {
        Self {
            bits: bitvec![u8, Lsb0; 0; ncpus],
        }
    }

    /// Create a CpuSet from a list of CPU indexes.
    pub fn from_cpus(ncpus: usize, cpus: &[usize]) -> Result<Self> {
        let mut set = Self::new_empty(ncpus);
        for &cpu in cpus {
            if cpu >= ncpus {
                return_errno!(EINVAL, "cpu index out of range");
            }
            set.bits.set(cpu, true);
        }
        Ok(set)
    }

    /// Returns the number of CPUs that a set can describe.
    pub fn ncpus(&self) -> usize {
        self.bits.len()
    }

    pub fn full(&self) -> bool {
        self.bits.all()
    }

    pub fn empty(&self) -> bool {
        self.bits.not_any()
    }

    /// Returns the number of CPUs in set.
    pub fn cpu_count(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn contains(&self, cpu: usize) -> bool {
        cpu < self.bits.len() && self.bits[cpu]
    }

    pub fn add(&mut self, cpu: usize) {
        assert!(cpu < self.ncpus());
        self.bits.set(cpu, true);
    }

    pub fn remove(&mut self, cpu: usize) {
        assert!(cpu < self.ncpus());
        self.bits.set(cpu, false);
    }

    /// Returns the first index of CPUs in set.
    pub fn first_cpu_idx(&self) -> Option<usize> {
        self.bits.first_one()
    }

    /// Returns if the CpuSet is a subset of another one.
    pub fn is_subset_of(&self, other: &CpuSet) -> bool {
        self.iter().all(|cpu| other.contains(cpu))
    }

    /// Iterate the indexes of the CPUs in set.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    /// Returns the underlying bytes; the unused trailing bits are zero.
    pub fn as_slice(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }
}

impl Index<usize> for CpuSet {
    type Output = bool;

    fn index(&self, index: usize) -> &bool {
        assert!(index < self.ncpus());
        &self.bits[index]
    }
}

impl fmt::Debug for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpuSet ")?;
        f.debug_list().entries(self.iter()).finish()
    }
}
