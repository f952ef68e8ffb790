use std::collections::BTreeMap;

/// Releases items strictly by index, holding back anything that arrives
/// early.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ReorderBuffer<T> {
    pub fn new(first_index: u64) -> Self {
        Self {
            next: first_index,
            pending: BTreeMap::new(),
        }
    }

    /// Indices already released or already pending are ignored.
    pub fn push(&mut self, index: u64, item: T) {
        if index < self.next {
            log::warn!("frame {index} arrived after it was released, dropped");
            return;
        }
        self.pending.entry(index).or_insert(item);
    }

    /// The next item in order, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    pub fn next_index(&self) -> u64 {
        self.next
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_in_index_order() {
        let mut buf = ReorderBuffer::new(0);
        buf.push(2, "c");
        buf.push(1, "b");
        assert_eq!(buf.pop_ready(), None);

        buf.push(0, "a");
        let released: Vec<&str> = std::iter::from_fn(|| buf.pop_ready()).collect();
        assert_eq!(released, vec!["a", "b", "c"]);
        assert!(buf.is_empty());
        assert_eq!(buf.next_index(), 3);
    }

    #[test]
    fn gap_holds_everything_behind_it() {
        let mut buf = ReorderBuffer::new(10);
        buf.push(10, 10);
        buf.push(12, 12);
        assert_eq!(buf.pop_ready(), Some(10));
        assert_eq!(buf.pop_ready(), None);
        assert_eq!(buf.len(), 1);
        buf.push(11, 11);
        assert_eq!(buf.pop_ready(), Some(11));
        assert_eq!(buf.pop_ready(), Some(12));
    }

    #[test]
    fn stale_and_duplicate_indices_are_ignored() {
        let mut buf = ReorderBuffer::new(0);
        buf.push(0, "first");
        buf.push(0, "again");
        assert_eq!(buf.pop_ready(), Some("first"));
        buf.push(0, "late");
        assert!(buf.is_empty());
    }
}
