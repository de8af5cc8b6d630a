use crate::prelude::*;

/// Hands out TIDs or PIDs in `1..=max_id`.
///
/// IDs are given out in increasing order and wrap around to 1 after
/// `max_id`, skipping those still in use, so a freed ID is not reused
/// until the counter comes back to it. ID 0 is never handed out.
#[derive(Debug, Clone)]
pub struct IdAlloc {
    next_id: u32,
    max_id: u32,
    used_ids: HashSet<u32>,
}

impl IdAlloc {
    /// Create an allocator that hands out IDs in `1..=max_id`.
    pub fn new(max_id: u32) -> Self {
        debug_assert!(max_id > 0);
        Self {
            next_id: 0,
            max_id,
            used_ids: HashSet::new(),
        }
    }

    pub fn alloc(&mut self) -> Result<u32> {
        if self.used_ids.len() >= self.max_id as usize {
            return_errno!(EAGAIN, "no free ID");
        }
        let new_id = loop {
            // Increment the ID and wrap around if necessary
            self.next_id = self.next_id.wrapping_add(1);
            if self.next_id == 0 || self.next_id > self.max_id {
                self.next_id = 1;
            }

            if !self.used_ids.contains(&self.next_id) {
                break self.next_id;
            }
        };
        self.used_ids.insert(new_id);
        Ok(new_id)
    }

    pub fn free(&mut self, id: u32) -> Option<u32> {
        if self.used_ids.remove(&id) {
            Some(id)
        } else {
            None
        }
    }

    pub fn in_use(&self) -> usize {
        self.used_ids.len()
    }

    pub fn is_allocated(&self, id: u32) -> bool {
        self.used_ids.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_and_skips_used() {
        let mut alloc = IdAlloc::new(3);
        assert_eq!(alloc.alloc().unwrap(), 1);
        assert_eq!(alloc.alloc().unwrap(), 2);
        assert_eq!(alloc.alloc().unwrap(), 3);
        assert_eq!(alloc.alloc().unwrap_err().errno(), EAGAIN);

        assert_eq!(alloc.free(2), Some(2));
        assert_eq!(alloc.free(2), None);
        assert_eq!(alloc.alloc().unwrap(), 2);
        alloc.free(1);
        assert_eq!(alloc.alloc().unwrap(), 1);
        assert_eq!(alloc.in_use(), 3);
    }
}
