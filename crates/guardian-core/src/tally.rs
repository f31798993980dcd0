//! Encrypted tally and ballot structures consumed by decryption
//!
//! These are the inputs handed over by the publishing layer: contests of
//! selections, each selection an ElGamal ciphertext of a count. Maps are
//! keyed by object id so that every party walks them in the same order.

use crate::elgamal::{self, Ciphertext};
use crate::group::{ElementModP, Group};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextSelection {
    pub object_id: String,
    pub ciphertext: Ciphertext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextContest {
    pub object_id: String,
    pub selections: BTreeMap<String, CiphertextSelection>,
}

/// Homomorphic sum of all cast ballots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextTally {
    pub object_id: String,
    pub contests: BTreeMap<String, CiphertextContest>,
}

/// A single encrypted ballot, decrypted individually when spoiled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedBallot {
    pub object_id: String,
    pub contests: BTreeMap<String, CiphertextContest>,
}

/// Anything that decrypts as contests of selections
pub trait CiphertextRecord {
    fn object_id(&self) -> &str;
    fn contests(&self) -> &BTreeMap<String, CiphertextContest>;

    /// Every selection ciphertext as `(contest_id, selection_id, ciphertext)`,
    /// in key order
    fn selections(&self) -> Vec<(&str, &str, &Ciphertext)> {
        self.contests()
            .iter()
            .flat_map(|(contest_id, contest)| {
                contest.selections.iter().map(move |(selection_id, selection)| {
                    (
                        contest_id.as_str(),
                        selection_id.as_str(),
                        &selection.ciphertext,
                    )
                })
            })
            .collect()
    }
}

impl CiphertextRecord for CiphertextTally {
    fn object_id(&self) -> &str {
        &self.object_id
    }

    fn contests(&self) -> &BTreeMap<String, CiphertextContest> {
        &self.contests
    }
}

impl CiphertextRecord for SubmittedBallot {
    fn object_id(&self) -> &str {
        &self.object_id
    }

    fn contests(&self) -> &BTreeMap<String, CiphertextContest> {
        &self.contests
    }
}

/// Plaintext votes: contest id to selection id to count
pub type PlaintextVotes = BTreeMap<String, BTreeMap<String, u64>>;

impl SubmittedBallot {
    /// Encrypt `votes` under `public_key` with fresh nonces
    pub fn encrypt(
        group: &Group,
        object_id: impl Into<String>,
        votes: &PlaintextVotes,
        public_key: &ElementModP,
    ) -> Result<Self> {
        let mut contests = BTreeMap::new();
        for (contest_id, selections) in votes {
            let mut encrypted = BTreeMap::new();
            for (selection_id, count) in selections {
                let ciphertext = elgamal::encrypt(group, *count, &group.rand_q(), public_key)?;
                encrypted.insert(
                    selection_id.clone(),
                    CiphertextSelection {
                        object_id: selection_id.clone(),
                        ciphertext,
                    },
                );
            }
            contests.insert(
                contest_id.clone(),
                CiphertextContest {
                    object_id: contest_id.clone(),
                    selections: encrypted,
                },
            );
        }

        Ok(Self {
            object_id: object_id.into(),
            contests,
        })
    }
}

impl CiphertextTally {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            contests: BTreeMap::new(),
        }
    }

    /// Add a ballot into the running tally
    ///
    /// The first ballot fixes the tally's shape; later ballots must have the
    /// same contests and selections.
    pub fn accumulate(&mut self, group: &Group, ballot: &SubmittedBallot) -> Result<()> {
        if self.contests.is_empty() {
            self.contests = ballot.contests.clone();
            return Ok(());
        }

        if !same_shape(&self.contests, &ballot.contests) {
            return Err(Error::InvalidConfig(format!(
                "Ballot '{}' does not match the shape of tally '{}'",
                ballot.object_id, self.object_id
            )));
        }

        for (contest_id, contest) in self.contests.iter_mut() {
            let other = &ballot.contests[contest_id];
            for (selection_id, selection) in contest.selections.iter_mut() {
                let addend = &other.selections[selection_id].ciphertext;
                selection.ciphertext = elgamal::add(group, [&selection.ciphertext, addend]);
            }
        }
        Ok(())
    }
}

fn same_shape(
    a: &BTreeMap<String, CiphertextContest>,
    b: &BTreeMap<String, CiphertextContest>,
) -> bool {
    a.len() == b.len()
        && a.iter().all(|(id, contest)| {
            b.get(id).is_some_and(|other| {
                contest.selections.len() == other.selections.len()
                    && contest
                        .selections
                        .keys()
                        .all(|k| other.selections.contains_key(k))
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlog::DiscreteLog;
    use crate::elgamal::ElGamalKeyPair;

    fn votes(a: u64, b: u64) -> PlaintextVotes {
        let mut selections = BTreeMap::new();
        selections.insert("a".to_string(), a);
        selections.insert("b".to_string(), b);
        let mut contests = BTreeMap::new();
        contests.insert("contest".to_string(), selections);
        contests
    }

    #[test]
    fn test_accumulate_sums_counts() {
        let group = Group::reduced();
        let dlog = DiscreteLog::with_max_exponent(&group, 100);
        let keypair = ElGamalKeyPair::from_secret(&group, group.rand_q()).unwrap();

        let mut tally = CiphertextTally::new("tally");
        for (i, (a, b)) in [(1, 0), (0, 1), (1, 0)].into_iter().enumerate() {
            let ballot = SubmittedBallot::encrypt(&group, format!("ballot-{}", i), &votes(a, b), &keypair.public_key).unwrap();
            tally.accumulate(&group, &ballot).unwrap();
        }

        let selections = tally.selections();
        assert_eq!(selections.len(), 2);
        assert_eq!(selections[0].2.decrypt(&keypair.secret_key, &dlog).unwrap(), 2);
        assert_eq!(selections[1].2.decrypt(&keypair.secret_key, &dlog).unwrap(), 1);
    }

    #[test]
    fn test_accumulate_rejects_mismatched_ballot() {
        let group = Group::reduced();
        let keypair = ElGamalKeyPair::from_secret(&group, group.rand_q()).unwrap();
        let mut tally = CiphertextTally::new("tally");
        tally
            .accumulate(&group, &SubmittedBallot::encrypt(&group, "b1", &votes(1, 0), &keypair.public_key).unwrap())
            .unwrap();

        let mut other = votes(1, 0);
        other.get_mut("contest").unwrap().insert("c".into(), 0);
        let ballot = SubmittedBallot::encrypt(&group, "b2", &other, &keypair.public_key).unwrap();
        assert!(tally.accumulate(&group, &ballot).is_err());
    }
}
