use crate::prelude::*;

/// An ID-to-object map with the errno conventions of the kernel tables.
#[derive(Debug, Clone)]
pub struct Table<I: Debug + Clone + Send + Sync> {
    map: HashMap<pid_t, I>,
}

impl<I: Debug + Clone + Send + Sync> Table<I> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, id: pid_t) -> bool {
        self.map.contains_key(&id)
    }

    pub fn get(&self, id: pid_t) -> Result<I> {
        self.map
            .get(&id)
            .cloned()
            .ok_or_else(|| errno!(ESRCH, "id does not exist"))
    }

    pub fn add(&mut self, id: pid_t, item: I) -> Result<()> {
        if self.map.contains_key(&id) {
            return_errno!(EEXIST, "id is already added");
        }
        self.map.insert(id, item);
        Ok(())
    }

    pub fn del(&mut self, id: pid_t) -> Result<I> {
        self.map
            .remove(&id)
            .ok_or_else(|| errno!(ENOENT, "id does not exist"))
    }

    /// All items, ordered by ID.
    pub fn values(&self) -> Vec<I> {
        let mut ids: Vec<_> = self.map.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().map(|id| self.map[&id].clone()).collect()
    }
}

impl<I: Debug + Clone + Send + Sync> Default for Table<I> {
    fn default() -> Self {
        Self::with_capacity(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errnos() {
        let mut table = Table::default();
        table.add(3, "c").unwrap();
        table.add(1, "a").unwrap();
        assert_eq!(table.add(1, "x").unwrap_err().errno(), EEXIST);
        assert_eq!(table.get(2).unwrap_err().errno(), ESRCH);
        assert_eq!(table.values(), vec!["a", "c"]);
        assert_eq!(table.del(1).unwrap(), "a");
        assert_eq!(table.del(1).unwrap_err().errno(), ENOENT);
        assert_eq!(table.len(), 1);
    }
}
