//! Deterministic nonce sequences derived from a seed

use crate::group::{ElementModQ, Group};
use crate::hash::hash_elems;

/// An indexable sequence of pseudo-random elements of Z_Q
///
/// `Nonces::new(seed, header).get(i)` is `H(H(seed, header), i)`; the same
/// seed and header always give the same sequence.
#[derive(Debug, Clone)]
pub struct Nonces {
    seed: ElementModQ,
}

impl Nonces {
    pub fn new(group: &Group, seed: &ElementModQ, header: Option<&str>) -> Self {
        let seed = match header {
            Some(header) => hash_elems(group, &[seed.into(), header.into()]),
            None => seed.clone(),
        };
        Self { seed }
    }

    /// The `index`-th nonce
    pub fn get(&self, group: &Group, index: u64) -> ElementModQ {
        hash_elems(group, &[(&self.seed).into(), index.into()])
    }

    /// The first `count` nonces
    pub fn take(&self, group: &Group, count: usize) -> Vec<ElementModQ> {
        (0..count as u64).map(|i| self.get(group, i)).collect()
    }
}
