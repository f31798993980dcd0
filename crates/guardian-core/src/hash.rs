//! Hashing of heterogeneous protocol values into Z_Q

use crate::group::{ElementModP, ElementModQ, Group};
use digest::Digest;
use num_bigint::BigUint;
use sha2::Sha256;

/// A value that can take part in [`hash_elems`]
#[derive(Debug, Clone)]
pub enum Hashable<'a> {
    P(&'a ElementModP),
    Q(&'a ElementModQ),
    Str(&'a str),
    Int(u64),
    /// Hashed recursively; the nested digest enters the outer hash
    List(Vec<Hashable<'a>>),
    Null,
}

impl<'a> From<&'a ElementModP> for Hashable<'a> {
    fn from(e: &'a ElementModP) -> Self {
        Hashable::P(e)
    }
}

impl<'a> From<&'a ElementModQ> for Hashable<'a> {
    fn from(e: &'a ElementModQ) -> Self {
        Hashable::Q(e)
    }
}

impl<'a> From<&'a str> for Hashable<'a> {
    fn from(s: &'a str) -> Self {
        Hashable::Str(s)
    }
}

impl<'a> From<&'a String> for Hashable<'a> {
    fn from(s: &'a String) -> Self {
        Hashable::Str(s.as_str())
    }
}

impl From<u64> for Hashable<'_> {
    fn from(v: u64) -> Self {
        Hashable::Int(v)
    }
}

impl From<u32> for Hashable<'_> {
    fn from(v: u32) -> Self {
        Hashable::Int(u64::from(v))
    }
}

impl<'a, T> From<&'a [T]> for Hashable<'a>
where
    &'a T: Into<Hashable<'a>>,
{
    fn from(items: &'a [T]) -> Self {
        Hashable::List(items.iter().map(Into::into).collect())
    }
}

/// SHA-256 over `|`-prefixed item encodings, reduced mod Q
///
/// Group elements and integers enter as upper-case hex, strings as-is,
/// `Null` as the literal `null`. A list contributes the hex of its own
/// recursive hash, so `[a, b]` and `a, b` hash differently.
pub fn hash_elems(group: &Group, items: &[Hashable<'_>]) -> ElementModQ {
    let mut hasher = Sha256::new();
    hasher.update(b"|");
    for item in items {
        let encoded = match item {
            Hashable::P(e) => e.to_hex(),
            Hashable::Q(e) => e.to_hex(),
            Hashable::Str(s) => (*s).to_string(),
            Hashable::Int(v) => format!("{:X}", v),
            Hashable::List(inner) if inner.is_empty() => "null".to_string(),
            Hashable::List(inner) => hash_elems(group, inner).to_hex(),
            Hashable::Null => "null".to_string(),
        };
        hasher.update(encoded.as_bytes());
        hasher.update(b"|");
    }
    let digest = hasher.finalize();
    group.reduce_q(&BigUint::from_bytes_be(&digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_and_order_dependent() {
        let group = Group::reduced();
        let a = group.g_pow_p(&group.q_from_u64(5));
        let b = group.q_from_u64(7);

        let h1 = hash_elems(&group, &[(&a).into(), (&b).into()]);
        let h2 = hash_elems(&group, &[(&a).into(), (&b).into()]);
        let h3 = hash_elems(&group, &[(&b).into(), (&a).into()]);
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert!(group.is_in_bounds_q(&h1));
    }

    #[test]
    fn test_nested_list_differs_from_flat() {
        let group = Group::reduced();
        let x = group.q_from_u64(1);
        let y = group.q_from_u64(2);

        let flat = hash_elems(&group, &[(&x).into(), (&y).into()]);
        let nested = hash_elems(&group, &[Hashable::List(vec![(&x).into(), (&y).into()])]);
        assert_ne!(flat, nested);
    }

    #[test]
    fn test_strings_and_ints() {
        let group = Group::reduced();
        let h1 = hash_elems(&group, &["guardian-1".into(), 3u32.into()]);
        let h2 = hash_elems(&group, &["guardian-1".into(), 4u32.into()]);
        assert_ne!(h1, h2);
        assert_eq!(
            hash_elems(&group, &[Hashable::Null]),
            hash_elems(&group, &[Hashable::List(Vec::new())])
        );
    }
}
