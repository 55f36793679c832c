//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>` to avoid heap allocation for common OIDs.

use crate::error::{Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of sub-identifiers allowed in an OID.
///
/// RFC 2741 §5.1 caps the `n_subid` field at 128. The decoder rejects longer
/// OIDs, and [`Oid::validate_length()`] checks OIDs built from other sources.
pub const MAX_OID_LEN: usize = 128;

/// The `internet` prefix `1.3.6.1` that AgentX can compress away on the wire.
pub const INTERNET_PREFIX: [u32; 4] = [1, 3, 6, 1];

/// Object Identifier.
///
/// Stored as a sequence of arc values (u32). Uses SmallVec to avoid
/// heap allocation for OIDs with 16 or fewer arcs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    ///
    /// On the wire this is the null OID, used as an open-ended SearchRange end.
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    /// Create an OID from arc values.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_agentx::oid::Oid;
    ///
    /// let oid = Oid::new(vec![1, 3, 6, 1, 4, 1]);
    /// assert_eq!(oid.arcs(), &[1, 3, 6, 1, 4, 1]);
    ///
    /// let oid = Oid::new(0..5);
    /// assert_eq!(oid.arcs(), &[0, 1, 2, 3, 4]);
    /// ```
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted string notation (e.g., "1.3.6.1.4.1.99999.1").
    ///
    /// A leading dot is accepted, as net-snmp tools print OIDs that way.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_agentx::oid::Oid;
    ///
    /// let oid = Oid::parse(".1.3.6.1.4.1.99999.1").unwrap();
    /// assert_eq!(oid.to_string(), "1.3.6.1.4.1.99999.1");
    ///
    /// assert!(Oid::parse("1.3.x").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();

        for part in s.split('.') {
            if part.is_empty() {
                continue;
            }

            let arc: u32 = part.parse().map_err(|_| {
                Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s.to_string())
            })?;

            arcs.push(arc);
        }

        let oid = Self { arcs };
        oid.validate_length()?;
        Ok(oid)
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Get the number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID is empty.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID starts with another OID.
    ///
    /// An OID always starts with itself, and any OID starts with an empty OID.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_agentx::oid;
    ///
    /// let instance = oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0);
    /// assert!(instance.starts_with(&oid!(1, 3, 6, 1, 4, 1, 99999)));
    /// assert!(!instance.starts_with(&oid!(1, 3, 6, 1, 4, 1, 99998)));
    /// ```
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// Get the parent OID (all arcs except the last).
    ///
    /// Returns `None` if the OID is empty.
    pub fn parent(&self) -> Option<Oid> {
        if self.arcs.is_empty() {
            None
        } else {
            Some(Oid {
                arcs: SmallVec::from_slice(&self.arcs[..self.arcs.len() - 1]),
            })
        }
    }

    /// Create a child OID by appending an arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Create a descendant OID by appending several arcs.
    ///
    /// ```
    /// use async_agentx::oid;
    ///
    /// let entry = oid!(1, 3, 6, 1, 4, 1, 99999, 3, 1);
    /// assert_eq!(entry.extend(&[2, 7]).to_string(), "1.3.6.1.4.1.99999.3.1.2.7");
    /// ```
    pub fn extend(&self, suffix: &[u32]) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.extend_from_slice(suffix);
        Oid { arcs }
    }

    /// The arcs following `prefix`, if this OID starts with it.
    pub fn strip_prefix(&self, prefix: &Oid) -> Option<&[u32]> {
        if self.starts_with(prefix) {
            Some(&self.arcs[prefix.len()..])
        } else {
            None
        }
    }

    /// Validate that the OID doesn't exceed the maximum arc count.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_agentx::oid::{Oid, MAX_OID_LEN};
    ///
    /// assert!(Oid::new(0..MAX_OID_LEN as u32).validate_length().is_ok());
    /// assert!(Oid::new(0..150).validate_length().is_err());
    /// ```
    pub fn validate_length(&self) -> Result<()> {
        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: self.arcs.len(),
                max: MAX_OID_LEN,
            }));
        }
        Ok(())
    }

    /// Split off the `1.3.6.1.<prefix>` compression RFC 2741 §5.1 allows.
    ///
    /// Returns the prefix byte and the remaining arcs, or `None` when the OID
    /// does not qualify.
    pub fn internet_prefix(&self) -> Option<(u8, &[u32])> {
        if self.arcs.len() > INTERNET_PREFIX.len() && self.arcs[..4] == INTERNET_PREFIX {
            let fifth = self.arcs[4];
            if (1..=255).contains(&fifth) {
                return Some((fifth as u8, &self.arcs[5..]));
            }
        }
        None
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Macro to create an OID from literal arcs.
///
/// # Examples
///
/// ```
/// use async_agentx::oid;
///
/// let scalar = oid!(1, 3, 6, 1, 4, 1, 99999, 1);
/// assert_eq!(scalar.to_string(), "1.3.6.1.4.1.99999.1");
///
/// // Trailing commas are allowed
/// let other = oid!(1, 3, 6, 1, 4, 1, 99999, 2,);
/// assert!(scalar < other);
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let oid = Oid::parse("1.3.6.1.4.1.99999.1").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 4, 1, 99999, 1]);
        assert!(Oid::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_too_many_arcs() {
        let long = vec!["1"; MAX_OID_LEN + 1].join(".");
        let err = Oid::parse(&long).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidOid {
                kind: OidErrorKind::TooManyArcs { count: 129, max: 128 },
                ..
            }
        ));
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = oid!(1, 3, 6, 1, 4, 1, 99999, 1);
        let a0 = oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0);
        let b = oid!(1, 3, 6, 1, 4, 1, 99999, 2);
        let big = oid!(1, 3, 6, 1, 4, 1, 100000);

        assert!(a < a0);
        assert!(a0 < b);
        assert!(b < big);
        assert!(Oid::empty() < a);
    }

    #[test]
    fn test_starts_with_and_strip() {
        let oid = oid!(1, 3, 6, 1, 4, 1, 99999, 3, 1, 2, 7);
        let entry = oid!(1, 3, 6, 1, 4, 1, 99999, 3, 1);
        assert!(oid.starts_with(&entry));
        assert_eq!(oid.strip_prefix(&entry), Some(&[2u32, 7][..]));
        assert_eq!(entry.strip_prefix(&oid), None);
    }

    #[test]
    fn test_internet_prefix() {
        let oid = oid!(1, 3, 6, 1, 4, 1, 99999);
        assert_eq!(oid.internet_prefix(), Some((4, &[1u32, 99999][..])));

        // Fifth arc outside 1..=255 cannot be compressed
        assert_eq!(oid!(1, 3, 6, 1, 0, 5).internet_prefix(), None);
        assert_eq!(oid!(1, 3, 6, 1, 256).internet_prefix(), None);
        // Exactly the prefix has no fifth arc
        assert_eq!(oid!(1, 3, 6, 1).internet_prefix(), None);
        assert_eq!(oid!(1, 3, 6, 2, 4).internet_prefix(), None);
    }

    #[test]
    fn test_parent_child() {
        let scalar = oid!(1, 3, 6, 1, 4, 1, 99999, 1);
        assert_eq!(scalar.child(0).parent(), Some(scalar.clone()));
        assert!(Oid::empty().parent().is_none());
    }

    #[test]
    fn test_oid_fromstr() {
        let oid: Oid = "1.3.6.1.2.1.1.3.0".parse().unwrap();
        assert_eq!(oid, oid!(1, 3, 6, 1, 2, 1, 1, 3, 0));
        assert!("1.3.six".parse::<Oid>().is_err());
    }
}
