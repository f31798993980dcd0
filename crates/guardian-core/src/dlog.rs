//! Bounded discrete logarithm with a shared cache
//!
//! Decrypted tallies come out as `G^m`; `m` is recovered by walking powers of
//! `G` up from the highest power computed so far. Results are cached so that
//! later lookups of smaller counts are a map hit.

use crate::group::{ElementModP, Group};
use crate::{Error, Result};
use dashmap::DashMap;
use std::sync::Mutex;
use tracing::debug;

/// Default bound on the exponent search
pub const DEFAULT_MAX_EXPONENT: u64 = 1_000_000;

pub struct DiscreteLog {
    group: Group,
    cache: DashMap<ElementModP, u64>,
    /// Highest exponent computed so far and `G` raised to it
    frontier: Mutex<(u64, ElementModP)>,
    max_exponent: u64,
}

impl DiscreteLog {
    pub fn new(group: &Group) -> Self {
        Self::with_max_exponent(group, DEFAULT_MAX_EXPONENT)
    }

    pub fn with_max_exponent(group: &Group, max_exponent: u64) -> Self {
        let cache = DashMap::new();
        cache.insert(group.one_p(), 0);
        Self {
            group: group.clone(),
            cache,
            frontier: Mutex::new((0, group.one_p())),
            max_exponent,
        }
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Find `m` with `G^m = element`, `0 <= m <= max_exponent`
    pub fn discrete_log(&self, element: &ElementModP) -> Result<u64> {
        if let Some(hit) = self.cache.get(element) {
            return Ok(*hit);
        }

        let mut frontier = self
            .frontier
            .lock()
            .map_err(|_| Error::Internal("Discrete log cache poisoned".into()))?;

        // Another caller may have extended the frontier while we waited
        if let Some(hit) = self.cache.get(element) {
            return Ok(*hit);
        }

        let generator = self.group.generator();
        let (exponent, power) = &mut *frontier;
        while *exponent < self.max_exponent {
            *exponent += 1;
            *power = self.group.mult_p(power, &generator);
            self.cache.insert(power.clone(), *exponent);
            if *power == *element {
                debug!(exponent = *exponent, "Discrete log found");
                return Ok(*exponent);
            }
        }

        Err(Error::NotFound(format!(
            "Discrete log of {} exceeds {}",
            element.to_short_string(),
            self.max_exponent
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discrete_log_small_values() {
        let group = Group::reduced();
        let dlog = DiscreteLog::with_max_exponent(&group, 100);

        for m in [0u64, 1, 17, 5, 99] {
            let element = group.g_pow_p(&group.q_from_u64(m));
            assert_eq!(dlog.discrete_log(&element).unwrap(), m);
        }
    }

    #[test]
    fn test_discrete_log_bound() {
        let group = Group::reduced();
        let dlog = DiscreteLog::with_max_exponent(&group, 10);
        let element = group.g_pow_p(&group.q_from_u64(11));
        assert!(dlog.discrete_log(&element).is_err());
    }
}
