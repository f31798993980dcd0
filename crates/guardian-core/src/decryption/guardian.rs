//! A guardian's state for the decryption phase

use super::par_map;
use super::shares::{DecryptionProofRecovery, DecryptionProofTuple};
use crate::elgamal::{Ciphertext, ElGamalKeyPair};
use crate::group::{ElementModP, ElementModQ, Group};
use crate::polynomial::evaluate_commitments;
use crate::proofs::ChaumPedersenProof;
use crate::types::GuardianId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use zeroize::Zeroize;

/// What a guardian keeps once the key ceremony is over
///
/// `key_shares` maps each other guardian to `P_other(x_self)`, the share of
/// that guardian's secret this one can use to compensate for its absence.
#[derive(Clone, Serialize, Deserialize)]
pub struct DecryptingGuardian {
    id: GuardianId,
    x_coordinate: u32,
    group: Group,
    election_keys: ElGamalKeyPair,
    key_shares: BTreeMap<GuardianId, ElementModQ>,
    coefficient_commitments: BTreeMap<GuardianId, Vec<ElementModP>>,
}

impl DecryptingGuardian {
    pub(crate) fn new(
        group: &Group,
        id: GuardianId,
        x_coordinate: u32,
        election_keys: ElGamalKeyPair,
        key_shares: BTreeMap<GuardianId, ElementModQ>,
        coefficient_commitments: BTreeMap<GuardianId, Vec<ElementModP>>,
    ) -> Self {
        Self {
            id,
            x_coordinate,
            group: group.clone(),
            election_keys,
            key_shares,
            coefficient_commitments,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn x_coordinate(&self) -> u32 {
        self.x_coordinate
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn election_public_key(&self) -> &ElementModP {
        &self.election_keys.public_key
    }

    /// `G^{P_missing(x_self)}`, computed from the missing guardian's public
    /// commitments
    pub fn recovery_public_key(&self, missing_guardian_id: &str) -> Result<ElementModP> {
        let commitments = self
            .coefficient_commitments
            .get(missing_guardian_id)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Guardian '{}' has no commitments for '{}'",
                    self.id, missing_guardian_id
                ))
            })?;
        Ok(evaluate_commitments(
            &self.group,
            self.x_coordinate,
            commitments,
        ))
    }

    /// Partially decrypt each ciphertext with this guardian's secret key
    ///
    /// Proof nonces are drawn fresh here for every call and never come from
    /// the caller.
    pub fn partial_decrypt(
        &self,
        texts: &[Ciphertext],
        extended_base_hash: &ElementModQ,
    ) -> Vec<DecryptionProofTuple> {
        let seeds = self.proof_seeds(texts.len());
        let secret = &self.election_keys.secret_key;

        par_map(texts, |i, text| {
            let partial_decryption = text.partial_decrypt(&self.group, secret);
            let proof = ChaumPedersenProof::prove(
                &self.group,
                text,
                secret,
                &partial_decryption,
                &seeds[i],
                extended_base_hash,
            );
            DecryptionProofTuple {
                partial_decryption,
                proof,
            }
        })
    }

    /// Partially decrypt each ciphertext on behalf of `missing_guardian_id`
    /// using the share of its secret held by this guardian
    pub fn compensated_decrypt(
        &self,
        missing_guardian_id: &str,
        texts: &[Ciphertext],
        extended_base_hash: &ElementModQ,
    ) -> Result<Vec<DecryptionProofRecovery>> {
        let key_share = self.key_shares.get(missing_guardian_id).ok_or_else(|| {
            Error::NotFound(format!(
                "Guardian '{}' holds no backup for '{}'",
                self.id, missing_guardian_id
            ))
        })?;
        let recovery_public_key = self.recovery_public_key(missing_guardian_id)?;
        if self.group.g_pow_p(key_share) != recovery_public_key {
            return Err(Error::VerificationFailed(format!(
                "Backup from '{}' held by '{}' does not match its commitments",
                missing_guardian_id, self.id
            )));
        }

        debug!(
            guardian_id = %self.id,
            missing_guardian_id,
            selections = texts.len(),
            "Compensated decryption"
        );

        let seeds = self.proof_seeds(texts.len());
        Ok(par_map(texts, |i, text| {
            let partial_decryption = text.partial_decrypt(&self.group, key_share);
            let proof = ChaumPedersenProof::prove(
                &self.group,
                text,
                key_share,
                &partial_decryption,
                &seeds[i],
                extended_base_hash,
            );
            DecryptionProofRecovery {
                partial_decryption,
                proof,
                recovery_public_key: recovery_public_key.clone(),
            }
        }))
    }

    fn proof_seeds(&self, count: usize) -> Vec<ElementModQ> {
        (0..count).map(|_| self.group.rand_q()).collect()
    }
}

impl Drop for DecryptingGuardian {
    fn drop(&mut self) {
        for share in self.key_shares.values_mut() {
            share.zeroize();
        }
    }
}

impl fmt::Debug for DecryptingGuardian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptingGuardian")
            .field("id", &self.id)
            .field("x_coordinate", &self.x_coordinate)
            .field("public_key", self.election_public_key())
            .field("key_shares", &self.key_shares.keys().collect::<Vec<_>>())
            .finish()
    }
}
