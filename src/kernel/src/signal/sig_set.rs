use std::fmt;
use std::iter;
use std::ops::{Add, AddAssign, BitAnd, BitAndAssign, BitOr, BitOrAssign, Not, Sub, SubAssign};

use itertools::Itertools;

use super::constants::*;
use super::SigNum;

/// A set of signal numbers, one bit per signal.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct SigSet {
    bits: u64,
}

impl SigSet {
    pub const fn new_empty() -> Self {
        Self::from_u64(0)
    }

    pub const fn new_full() -> Self {
        Self::from_u64(!0)
    }

    pub const fn from_u64(bits: u64) -> Self {
        SigSet { bits }
    }

    /// The signals that no mask may contain.
    pub fn unblockable() -> Self {
        SigSet::from(SIGKILL) + SIGSTOP
    }

    pub fn as_u64(&self) -> u64 {
        self.bits
    }

    pub fn empty(&self) -> bool {
        self.bits == 0
    }

    pub fn full(&self) -> bool {
        self.bits == !0
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn contains(&self, signum: SigNum) -> bool {
        let idx = Self::num_to_idx(signum);
        (self.bits & (1_u64 << idx)) != 0
    }

    pub fn intersects(&self, other: SigSet) -> bool {
        self.bits & other.bits != 0
    }

    /// Iterate the signals in ascending order.
    pub fn iter(&self) -> SigSetIter {
        SigSetIter {
            bits: self.bits,
            next_idx: 0,
        }
    }

    fn num_to_idx(num: SigNum) -> usize {
        (num.as_u8() - MIN_STD_SIG_NUM) as usize
    }

    fn idx_to_num(idx: usize) -> SigNum {
        debug_assert!(idx < NSIG);
        unsafe { SigNum::from_u8_unchecked(idx as u8 + MIN_STD_SIG_NUM) }
    }
}

pub struct SigSetIter {
    bits: u64,
    next_idx: usize,
}

impl iter::Iterator for SigSetIter {
    type Item = SigNum;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_idx < NSIG && (self.bits & (1 << self.next_idx)) == 0 {
            self.next_idx += 1;
        }
        if self.next_idx == NSIG {
            return None;
        }
        let item = SigSet::idx_to_num(self.next_idx);
        self.next_idx += 1;
        Some(item)
    }
}

impl From<SigNum> for SigSet {
    fn from(signum: SigNum) -> SigSet {
        SigSet::new_empty() + signum
    }
}

impl iter::FromIterator<SigNum> for SigSet {
    fn from_iter<I: IntoIterator<Item = SigNum>>(iter: I) -> Self {
        iter.into_iter().fold(SigSet::new_empty(), |set, num| set + num)
    }
}

impl Not for SigSet {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::from_u64(!self.bits)
    }
}

impl BitOr for SigSet {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self {
        self |= rhs;
        self
    }
}

impl BitOrAssign for SigSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.bits |= rhs.bits;
    }
}

impl BitAnd for SigSet {
    type Output = Self;

    fn bitand(mut self, rhs: Self) -> Self {
        self &= rhs;
        self
    }
}

impl BitAndAssign for SigSet {
    fn bitand_assign(&mut self, rhs: Self) {
        self.bits &= rhs.bits;
    }
}

impl Add<SigNum> for SigSet {
    type Output = Self;

    fn add(mut self, rhs: SigNum) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign<SigNum> for SigSet {
    fn add_assign(&mut self, rhs: SigNum) {
        self.bits |= 1_u64 << Self::num_to_idx(rhs);
    }
}

impl Sub<SigNum> for SigSet {
    type Output = Self;

    fn sub(mut self, rhs: SigNum) -> Self {
        self -= rhs;
        self
    }
}

impl SubAssign<SigNum> for SigSet {
    fn sub_assign(&mut self, rhs: SigNum) {
        self.bits &= !(1_u64 << Self::num_to_idx(rhs));
    }
}

impl fmt::Debug for SigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count() {
            0..=32 => write!(f, "SigSet {{ {:?} }}", self.iter().format(", ")),
            NSIG => write!(f, "SigSet {{ All }}"),
            _ => write!(
                f,
                "SigSet {{ All except {:?} }}",
                (!*self).iter().format(", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_ops() {
        let mut set = SigSet::from(SIGINT) + SIGUSR1;
        assert!(set.contains(SIGINT) && set.contains(SIGUSR1));
        set -= SIGINT;
        assert!(!set.contains(SIGINT));
        assert_eq!((set | SigSet::unblockable()).count(), 3);
        assert!((!SigSet::new_empty()).full());
        assert!(SigSet::unblockable().intersects(SigSet::from(SIGSTOP)));
    }

    #[test]
    fn ascending_iteration() {
        let set: SigSet = vec![SIGTERM, SIGHUP, SIGCHLD].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![SIGHUP, SIGTERM, SIGCHLD]);
        let rt = SigNum::from_u8(64).unwrap();
        assert_eq!(SigSet::from(rt).iter().next(), Some(rt));
    }

    #[test]
    fn debug_format() {
        let set = SigSet::from(SIGINT) + SIGKILL;
        assert_eq!(format!("{:?}", set), "SigSet { SIGINT, SIGKILL }");
        assert_eq!(format!("{:?}", SigSet::new_full()), "SigSet { All }");
    }
}
