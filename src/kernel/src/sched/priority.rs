use std::convert::TryFrom;
use std::ops::Add;

use crate::prelude::*;

/// The number of run queue levels.
pub const NR_LEVELS: usize = 8;

/// The scheduling priority of a thread.
///
/// Values range from 0 to 255 (inclusive). Unlike nice values, a *smaller*
/// value means a *higher* priority. The priority decides the run queue level
/// a thread starts at: `level = priority / (256 / NR_LEVELS)`.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const fn new(val: u8) -> Self {
        Self(val)
    }

    pub fn val(&self) -> u8 {
        self.0
    }

    /// The highest priority.
    pub const HIGHEST: Priority = Priority(0);

    /// The normal priority.
    pub const NORMAL: Priority = Priority(128);

    /// The lowest priority.
    pub const LOWEST: Priority = Priority(255);

    /// The run queue level this priority starts at.
    pub fn level(&self) -> Level {
        Level((self.0 as usize / (256 / NR_LEVELS)) as u8)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<NiceValue> for Priority {
    /// Map nice values linearly onto priorities: -20 is close to the top
    /// level, 0 is `NORMAL` and 19 is close to the bottom level.
    fn from(nice: NiceValue) -> Priority {
        let val = Priority::NORMAL.0 as i32 + nice.to_raw_val() as i32 * 6;
        Priority(val.clamp(0, 255) as u8)
    }
}

impl Add<i8> for Priority {
    type Output = Self;

    fn add(self, rhs: i8) -> Self {
        // Use i16 internally to rule out overflow
        let new_val = (self.0 as i16 + rhs as i16).clamp(0, 255);
        Self(new_val as u8)
    }
}

/// A run queue level. Level 0 is served first.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct Level(u8);

impl Level {
    pub const TOP: Level = Level(0);
    pub const BOTTOM: Level = Level(NR_LEVELS as u8 - 1);

    pub fn new(val: usize) -> Result<Self> {
        if val >= NR_LEVELS {
            return_errno!(EINVAL, "invalid run queue level");
        }
        Ok(Self(val as u8))
    }

    pub fn idx(&self) -> usize {
        self.0 as usize
    }

    /// One level down, i.e., a lower priority.
    pub fn demote(self) -> Self {
        min(Self(self.0 + 1), Self::BOTTOM)
    }

    /// One level up, i.e., a higher priority.
    pub fn promote(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PrioWhich {
    PRIO_PROCESS = 0,
    PRIO_PGRP = 1,
    PRIO_USER = 2,
}

impl TryFrom<i32> for PrioWhich {
    type Error = crate::error::Error;

    fn try_from(raw: i32) -> Result<Self> {
        let which = match raw {
            0 => PrioWhich::PRIO_PROCESS,
            1 => PrioWhich::PRIO_PGRP,
            2 => PrioWhich::PRIO_USER,
            _ => return_errno!(EINVAL, "invalid which value"),
        };
        Ok(which)
    }
}

/// Process scheduling nice value.
///
/// Lower values give a process a higher scheduling priority.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct NiceValue {
    value: i8,
}

impl NiceValue {
    pub const MAX: Self = Self { value: 19 };

    pub const MIN: Self = Self { value: -20 };

    /// Create a nice value from a raw value.
    ///
    /// The raw value given beyond the range are automatically adjusted
    /// to the nearest boundary value.
    pub fn new(raw: i8) -> Self {
        Self {
            value: raw.clamp(Self::MIN.value, Self::MAX.value),
        }
    }

    /// Convert to the raw value with range [19, -20].
    pub fn to_raw_val(self) -> i8 {
        self.value
    }
}

impl From<i32> for NiceValue {
    fn from(raw: i32) -> Self {
        let adj_raw = raw.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
        Self::new(adj_raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_banding() {
        assert_eq!(Priority::new(0).level(), Level::TOP);
        assert_eq!(Priority::new(31).level().idx(), 0);
        assert_eq!(Priority::new(32).level().idx(), 1);
        assert_eq!(Priority::NORMAL.level().idx(), 4);
        assert_eq!(Priority::new(255).level(), Level::BOTTOM);
    }

    #[test]
    fn nice_to_priority() {
        assert_eq!(Priority::from(NiceValue::new(0)), Priority::NORMAL);
        assert_eq!(Priority::from(NiceValue::MIN).level(), Level::TOP);
        assert_eq!(Priority::from(NiceValue::MAX).level(), Level::BOTTOM);
        assert!(Priority::from(NiceValue::new(-1)) < Priority::NORMAL);
    }

    #[test]
    fn nice_is_clamped() {
        assert_eq!(NiceValue::from(100), NiceValue::MAX);
        assert_eq!(NiceValue::from(-100), NiceValue::MIN);
    }

    #[test]
    fn level_moves_stay_in_range() {
        assert_eq!(Level::BOTTOM.demote(), Level::BOTTOM);
        assert_eq!(Level::TOP.promote(), Level::TOP);
        assert_eq!(Level::TOP.demote().idx(), 1);
        assert!(Level::new(NR_LEVELS).is_err());
    }

    #[test]
    fn add_saturates() {
        assert_eq!(Priority::HIGHEST + (-1_i8), Priority::HIGHEST);
        assert_eq!(Priority::LOWEST + 1_i8, Priority::LOWEST);
        assert_eq!(Priority::NORMAL + 4_i8 + (-4_i8), Priority::NORMAL);
    }
}
