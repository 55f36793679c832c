//! Sorted row storage for table handlers.

use crate::oid::Oid;

/// Rows keyed by their index OID, kept in ascending index order.
///
/// Answers the two questions a [`TableHandler`](super::TableHandler) is
/// asked: "which row follows this one" and "give me this row". Handlers
/// usually wrap it in a lock.
///
/// ```rust
/// use async_agentx::handler::IndexedRows;
/// use async_agentx::oid;
///
/// let mut rows = IndexedRows::new();
/// rows.insert(oid!(2), "eth1");
/// rows.insert(oid!(1), "eth0");
///
/// assert_eq!(rows.next_after(None).map(|(i, _)| i.clone()), Some(oid!(1)));
/// assert_eq!(rows.next_after(Some(&oid!(1))).map(|(_, r)| *r), Some("eth1"));
/// assert!(rows.next_after(Some(&oid!(2))).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct IndexedRows<R> {
    rows: Vec<(Oid, R)>,
}

impl<R> IndexedRows<R> {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    fn position(&self, index: &Oid) -> Result<usize, usize> {
        self.rows.binary_search_by(|(i, _)| i.cmp(index))
    }

    /// Insert or replace a row, returning the row it replaced.
    pub fn insert(&mut self, index: Oid, row: R) -> Option<R> {
        match self.position(&index) {
            Ok(pos) => Some(std::mem::replace(&mut self.rows[pos].1, row)),
            Err(pos) => {
                self.rows.insert(pos, (index, row));
                None
            }
        }
    }

    pub fn remove(&mut self, index: &Oid) -> Option<R> {
        self.position(index).ok().map(|pos| self.rows.remove(pos).1)
    }

    pub fn get(&self, index: &Oid) -> Option<&R> {
        self.position(index).ok().map(|pos| &self.rows[pos].1)
    }

    pub fn get_mut(&mut self, index: &Oid) -> Option<&mut R> {
        self.position(index).ok().map(|pos| &mut self.rows[pos].1)
    }

    /// The first row whose index is strictly greater than `after`, or the
    /// first row overall. `after` need not be a stored index.
    pub fn next_after(&self, after: Option<&Oid>) -> Option<(&Oid, &R)> {
        let pos = match after {
            None => 0,
            Some(after) => match self.position(after) {
                Ok(pos) => pos + 1,
                Err(pos) => pos,
            },
        };
        self.rows.get(pos).map(|(i, r)| (i, r))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&Oid, &R)> {
        self.rows.iter().map(|(i, r)| (i, r))
    }
}

impl<R> Default for IndexedRows<R> {
    fn default() -> Self {
        Self::new()
    }
}
