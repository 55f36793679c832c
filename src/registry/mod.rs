//! MIB tree registry.
//!
//! Maps OIDs to the registration that owns them. Plain registrations are
//! keyed by subtree in a `BTreeMap`, so resolving an OID looks up each of its
//! prefixes; range registrations are few and checked one by one.
//!
//! When several registrations cover an OID, the one with the longest
//! subtree owns it, and at equal depth the lower priority value wins
//! (RFC 2741 §7.1.5.1).

mod registration;

pub use registration::{DEFAULT_PRIORITY, Registration};

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, RegistrationErrorKind, Result};
use crate::oid::Oid;

/// Identifier of one active registration, unique within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(u64);

impl std::fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An active registration.
#[derive(Debug)]
pub struct Entry {
    pub id: RegistrationId,
    pub registration: Registration,
    anchor: Oid,
}

impl Entry {
    /// OID the handler is addressed relative to.
    pub fn anchor(&self) -> &Oid {
        &self.anchor
    }

    fn outranks(&self, other: &Entry) -> bool {
        let (a, b) = (&self.registration, &other.registration);
        (a.depth(), std::cmp::Reverse(a.priority), std::cmp::Reverse(self.id))
            > (b.depth(), std::cmp::Reverse(b.priority), std::cmp::Reverse(other.id))
    }
}

/// All registrations of one session.
#[derive(Debug, Default)]
pub struct MibRegistry {
    next_id: u64,
    by_subtree: BTreeMap<Oid, Vec<Arc<Entry>>>,
    ranges: Vec<Arc<Entry>>,
}

fn same_context(a: Option<&Bytes>, b: Option<&Bytes>) -> bool {
    a == b
}

impl MibRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_subtree.values().map(Vec::len).sum::<usize>() + self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(reg: &mut Registration) -> Result<()> {
        let invalid = |subtree: &Oid| {
            Error::registration(subtree.clone(), RegistrationErrorKind::InvalidRange)
        };
        if reg.subtree.is_empty() {
            return Err(invalid(&reg.subtree));
        }
        reg.subtree.validate_length()?;

        if reg.range_subid == 0 {
            reg.upper_bound = None;
            return Ok(());
        }
        let pos = usize::from(reg.range_subid);
        if pos > reg.subtree.len() {
            return Err(invalid(&reg.subtree));
        }
        match reg.upper_bound {
            Some(upper) if upper >= reg.subtree.arcs()[pos - 1] => Ok(()),
            _ => Err(invalid(&reg.subtree)),
        }
    }

    /// Add a registration.
    ///
    /// Fails with `InvalidRange` for an empty subtree or an unusable range,
    /// and with `Duplicate` when a registration with the same subtree,
    /// priority and context already exists.
    pub fn insert(&mut self, mut registration: Registration) -> Result<RegistrationId> {
        Self::validate(&mut registration)?;

        let duplicate = self.iter().any(|e| {
            e.registration.subtree == registration.subtree
                && e.registration.priority == registration.priority
                && same_context(e.registration.context.as_ref(), registration.context.as_ref())
        });
        if duplicate {
            return Err(Error::registration(
                registration.subtree,
                RegistrationErrorKind::Duplicate,
            ));
        }

        self.next_id += 1;
        let id = RegistrationId(self.next_id);
        let entry = Arc::new(Entry {
            id,
            anchor: registration.anchor(),
            registration,
        });
        if entry.registration.range_subid == 0 {
            self.by_subtree
                .entry(entry.registration.subtree.clone())
                .or_default()
                .push(entry);
        } else {
            self.ranges.push(entry);
        }
        Ok(id)
    }

    /// Remove a registration, returning it if it was present.
    pub fn remove(&mut self, id: RegistrationId) -> Option<Arc<Entry>> {
        if let Some(pos) = self.ranges.iter().position(|e| e.id == id) {
            return Some(self.ranges.remove(pos));
        }
        let subtree = self
            .by_subtree
            .iter()
            .find(|(_, entries)| entries.iter().any(|e| e.id == id))
            .map(|(subtree, _)| subtree.clone())?;
        let entries = self.by_subtree.get_mut(&subtree)?;
        let pos = entries.iter().position(|e| e.id == id)?;
        let entry = entries.remove(pos);
        if entries.is_empty() {
            self.by_subtree.remove(&subtree);
        }
        Some(entry)
    }

    pub fn get(&self, id: RegistrationId) -> Option<Arc<Entry>> {
        self.iter().find(|e| e.id == id).cloned()
    }

    /// Every registration, plain ones in subtree order followed by ranges.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Entry>> {
        self.by_subtree.values().flatten().chain(self.ranges.iter())
    }

    /// The registration owning `oid` in `context`, if any.
    pub fn resolve(&self, context: Option<&Bytes>, oid: &Oid) -> Option<Arc<Entry>> {
        let mut best: Option<&Arc<Entry>> = None;
        for len in (1..=oid.len()).rev() {
            let prefix = Oid::from_slice(&oid.arcs()[..len]);
            if let Some(entries) = self.by_subtree.get(&prefix) {
                for entry in entries {
                    if !same_context(entry.registration.context.as_ref(), context) {
                        continue;
                    }
                    if best.is_none_or(|b| entry.outranks(b)) {
                        best = Some(entry);
                    }
                }
                if best.is_some() {
                    // Shorter prefixes cannot outrank this depth
                    break;
                }
            }
        }

        for entry in &self.ranges {
            if same_context(entry.registration.context.as_ref(), context)
                && entry.registration.covers(oid)
                && best.is_none_or(|b| entry.outranks(b))
            {
                best = Some(entry);
            }
        }
        best.cloned()
    }

    /// Registrations that may hold an OID greater than `after`, in `context`,
    /// paired with the smallest OID they could contribute and sorted by it.
    ///
    /// A GetNext search walks this list in order and can stop as soon as a
    /// floor is not below the best result found so far.
    pub fn candidates_from(&self, context: Option<&Bytes>, after: &Oid) -> Vec<(Oid, Arc<Entry>)> {
        let mut candidates: Vec<(Oid, Arc<Entry>)> = self
            .iter()
            .filter(|e| same_context(e.registration.context.as_ref(), context))
            .filter_map(|e| {
                e.registration
                    .search_floor(after)
                    .map(|floor| (floor, Arc::clone(e)))
            })
            .collect();
        candidates.sort_by(|(a, ea), (b, eb)| a.cmp(b).then(ea.id.cmp(&eb.id)));
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{
        BoxFuture, GetNextResult, GetResult, MibHandler, RequestContext, ScalarCell, TableHandler,
    };
    use crate::oid;
    use std::ops::RangeInclusive;

    struct Empty;

    impl MibHandler for Empty {
        fn get<'a>(&'a self, _: &'a RequestContext, _: &'a Oid) -> BoxFuture<'a, GetResult> {
            Box::pin(async { GetResult::NoSuchObject })
        }

        fn get_next<'a>(&'a self, _: &'a RequestContext, _: &'a Oid) -> BoxFuture<'a, GetNextResult> {
            Box::pin(async { GetNextResult::EndOfMibView })
        }
    }

    struct Columns(RangeInclusive<u32>);

    impl TableHandler for Columns {
        fn columns(&self) -> RangeInclusive<u32> {
            self.0.clone()
        }

        fn next_row<'a>(&'a self, _: &'a RequestContext, _: Option<&'a Oid>) -> BoxFuture<'a, Option<Oid>> {
            Box::pin(async { None })
        }

        fn get_cell<'a>(&'a self, _: &'a RequestContext, _: u32, _: &'a Oid) -> BoxFuture<'a, GetResult> {
            Box::pin(async { GetResult::NoSuchInstance })
        }
    }

    fn subtree(oid: Oid) -> Registration {
        Registration::subtree(oid, Arc::new(Empty))
    }

    #[test]
    fn test_longest_match_wins() {
        let mut reg = MibRegistry::new();
        let outer = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999))).unwrap();
        let inner = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999, 2))).unwrap();

        let owner = |o: Oid| reg.resolve(None, &o).map(|e| e.id);
        assert_eq!(owner(oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0)), Some(outer));
        assert_eq!(owner(oid!(1, 3, 6, 1, 4, 1, 99999, 2, 0)), Some(inner));
        assert_eq!(owner(oid!(1, 3, 6, 1, 4, 1, 99999, 2)), Some(inner));
        assert_eq!(owner(oid!(1, 3, 6, 1, 4, 1, 99998)), None);
    }

    #[test]
    fn test_priority_breaks_ties() {
        let mut reg = MibRegistry::new();
        let _low = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999)).priority(200)).unwrap();
        let high = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999)).priority(10)).unwrap();
        let owner = reg.resolve(None, &oid!(1, 3, 6, 1, 4, 1, 99999, 7)).unwrap();
        assert_eq!(owner.id, high);
    }

    #[test]
    fn test_duplicate_rejected_first_stays() {
        let mut reg = MibRegistry::new();
        let first = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999, 1))).unwrap();
        let err = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999, 1))).unwrap_err();
        assert!(matches!(
            err,
            Error::Registration {
                kind: RegistrationErrorKind::Duplicate,
                ..
            }
        ));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.resolve(None, &oid!(1, 3, 6, 1, 4, 1, 99999, 1)).unwrap().id, first);

        // A different context is a different registration
        reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999, 1)).context("ctx")).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_context_isolation() {
        let mut reg = MibRegistry::new();
        reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999)).context("blue")).unwrap();
        let blue = Bytes::from_static(b"blue");
        assert!(reg.resolve(None, &oid!(1, 3, 6, 1, 4, 1, 99999, 1)).is_none());
        assert!(reg.resolve(Some(&blue), &oid!(1, 3, 6, 1, 4, 1, 99999, 1)).is_some());
    }

    #[test]
    fn test_invalid_ranges() {
        let mut reg = MibRegistry::new();
        let invalid = |r: Result<RegistrationId>| {
            matches!(
                r,
                Err(Error::Registration {
                    kind: RegistrationErrorKind::InvalidRange,
                    ..
                })
            )
        };
        assert!(invalid(reg.insert(subtree(Oid::empty()))));
        assert!(invalid(reg.insert(subtree(oid!(1, 3, 6, 1)).range(5, 9))));
        assert!(invalid(reg.insert(subtree(oid!(1, 3, 6, 1, 4)).range(5, 3))));
        let mut missing_bound = subtree(oid!(1, 3, 6, 1, 4));
        missing_bound.range_subid = 5;
        assert!(invalid(reg.insert(missing_bound)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_table_range_registration() {
        let mut reg = MibRegistry::new();
        let entry = oid!(1, 3, 6, 1, 4, 1, 99999, 3, 1);
        let id = reg
            .insert(Registration::table(entry.clone(), Arc::new(Columns(2..=4))))
            .unwrap();

        let stored = reg.get(id).unwrap();
        assert_eq!(stored.registration.subtree, entry.child(2));
        assert_eq!(stored.registration.range_subid, 10);
        assert_eq!(stored.registration.upper_bound, Some(4));
        assert_eq!(stored.anchor(), &entry);

        assert!(reg.resolve(None, &entry.extend(&[3, 17])).is_some());
        assert!(reg.resolve(None, &entry.extend(&[1, 17])).is_none());
        assert!(reg.resolve(None, &entry.extend(&[5, 17])).is_none());
    }

    #[test]
    fn test_range_in_middle_of_subtree() {
        // 1.3.6.1.4.1.99999.[1-3].5
        let r = subtree(oid!(1, 3, 6, 1, 4, 1, 99999, 1, 5)).range(8, 3);
        assert!(r.covers(&oid!(1, 3, 6, 1, 4, 1, 99999, 2, 5, 0)));
        assert!(!r.covers(&oid!(1, 3, 6, 1, 4, 1, 99999, 2, 6)));

        assert_eq!(
            r.search_floor(&oid!(1, 3, 6, 1, 4, 1, 99999, 2, 6)),
            Some(oid!(1, 3, 6, 1, 4, 1, 99999, 3, 5))
        );
        assert_eq!(
            r.search_floor(&oid!(1, 3, 6, 1, 4, 1, 99999, 2, 4)),
            Some(oid!(1, 3, 6, 1, 4, 1, 99999, 2, 5))
        );
        assert_eq!(
            r.search_floor(&oid!(1, 3)),
            Some(oid!(1, 3, 6, 1, 4, 1, 99999, 1, 5))
        );
        assert_eq!(r.search_floor(&oid!(1, 3, 6, 1, 4, 1, 99999, 3, 6)), None);
    }

    #[test]
    fn test_candidates_sorted_by_floor() {
        let mut reg = MibRegistry::new();
        let c = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999, 3))).unwrap();
        let a = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999, 1))).unwrap();
        let outer = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999))).unwrap();
        let cell = Arc::new(ScalarCell::integer32(oid!(1, 3, 6, 1, 4, 1, 99999, 2), 1));
        let b = reg
            .insert(Registration::scalar(oid!(1, 3, 6, 1, 4, 1, 99999, 2), cell))
            .unwrap();

        let start = oid!(1, 3, 6, 1, 4, 1, 99999, 1, 9);
        let ids: Vec<_> = reg
            .candidates_from(None, &start)
            .into_iter()
            .map(|(_, e)| e.id)
            .collect();
        // `a` and `outer` both cover the start point itself
        assert_eq!(ids, vec![a, outer, b, c]);
    }

    #[test]
    fn test_remove() {
        let mut reg = MibRegistry::new();
        let id = reg.insert(subtree(oid!(1, 3, 6, 1, 4, 1, 99999))).unwrap();
        let ranged = reg
            .insert(Registration::table(oid!(1, 3, 6, 1, 4, 1, 99999, 3, 1), Arc::new(Columns(1..=2))))
            .unwrap();
        assert!(reg.remove(id).is_some());
        assert!(reg.remove(id).is_none());
        assert!(reg.remove(ranged).is_some());
        assert!(reg.is_empty());
    }
}
