//! Decryption share types

use crate::elgamal::Ciphertext;
use crate::group::{ElementModP, ElementModQ};
use crate::proofs::ChaumPedersenProof;
use crate::types::GuardianId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A partial decryption `M_i = pad^{s_i}` with its proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProofTuple {
    pub partial_decryption: ElementModP,
    pub proof: ChaumPedersenProof,
}

/// A compensated partial decryption `M_{i,l} = pad^{P_i(x_l)}`, its proof,
/// and the recovery key `G^{P_i(x_l)}` the proof verifies against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProofRecovery {
    pub partial_decryption: ElementModP,
    pub proof: ChaumPedersenProof,
    pub recovery_public_key: ElementModP,
}

/// One guardian's share for one selection
///
/// A direct share carries `proof`; a share reconstructed for a missing
/// guardian carries the compensated parts it was built from instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDecryptionShare {
    pub object_id: String,
    pub guardian_id: GuardianId,
    pub share: ElementModP,
    pub proof: Option<ChaumPedersenProof>,
    pub recovered_parts: Option<BTreeMap<GuardianId, CompensatedSelectionShare>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDecryptionShare {
    pub object_id: String,
    pub guardian_id: GuardianId,
    pub selections: BTreeMap<String, SelectionDecryptionShare>,
}

/// A guardian's share of a whole tally or ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionShare {
    pub object_id: String,
    pub guardian_id: GuardianId,
    pub public_key: ElementModP,
    pub contests: BTreeMap<String, ContestDecryptionShare>,
}

impl DecryptionShare {
    pub fn selection(&self, contest_id: &str, selection_id: &str) -> Option<&SelectionDecryptionShare> {
        self.contests
            .get(contest_id)
            .and_then(|c| c.selections.get(selection_id))
    }
}

/// An available guardian's partial decryption on behalf of a missing one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensatedSelectionShare {
    pub object_id: String,
    pub guardian_id: GuardianId,
    pub missing_guardian_id: GuardianId,
    pub share: ElementModP,
    pub recovery_key: ElementModP,
    pub proof: ChaumPedersenProof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensatedContestShare {
    pub object_id: String,
    pub guardian_id: GuardianId,
    pub missing_guardian_id: GuardianId,
    pub selections: BTreeMap<String, CompensatedSelectionShare>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensatedDecryptionShare {
    pub object_id: String,
    pub guardian_id: GuardianId,
    pub missing_guardian_id: GuardianId,
    pub public_key: ElementModP,
    pub contests: BTreeMap<String, CompensatedContestShare>,
}

impl CompensatedDecryptionShare {
    pub fn selection(&self, contest_id: &str, selection_id: &str) -> Option<&CompensatedSelectionShare> {
        self.contests
            .get(contest_id)
            .and_then(|c| c.selections.get(selection_id))
    }
}

/// Lagrange weights of the available guardians, by guardian id
pub type LagrangeCoefficients = BTreeMap<GuardianId, ElementModQ>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextSelection {
    pub object_id: String,
    pub tally: u64,
    /// `G^tally`
    pub value: ElementModP,
    pub message: Ciphertext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextContest {
    pub object_id: String,
    pub selections: BTreeMap<String, PlaintextSelection>,
}

/// Decrypted counts of a tally or spoiled ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextTally {
    pub object_id: String,
    pub contests: BTreeMap<String, PlaintextContest>,
}

impl PlaintextTally {
    /// Counts only, contest id to selection id to count
    pub fn counts(&self) -> BTreeMap<String, BTreeMap<String, u64>> {
        self.contests
            .iter()
            .map(|(contest_id, contest)| {
                let selections = contest
                    .selections
                    .iter()
                    .map(|(selection_id, s)| (selection_id.clone(), s.tally))
                    .collect();
                (contest_id.clone(), selections)
            })
            .collect()
    }
}
