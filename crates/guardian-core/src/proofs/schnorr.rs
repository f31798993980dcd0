//! Schnorr proof of possession of an ElGamal secret key

use crate::elgamal::ElGamalKeyPair;
use crate::group::{ElementModP, ElementModQ, Group};
use crate::hash::hash_elems;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Proof that the prover knows `s` with `public_key = G^s`
///
/// The public key travels with the proof, which makes each proof in a
/// [`PublicKeySet`](crate::keyceremony::PublicKeySet) double as the
/// coefficient commitment it attests to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrProof {
    pub public_key: ElementModP,
    /// `h = G^r`
    pub commitment: ElementModP,
    /// `c = H(K, h)`
    pub challenge: ElementModQ,
    /// `u = r + c * s`
    pub response: ElementModQ,
}

impl SchnorrProof {
    /// Prove knowledge of `keypair.secret_key` using the non-zero nonce `r`
    pub fn prove(group: &Group, keypair: &ElGamalKeyPair, nonce: &ElementModQ) -> Self {
        let commitment = group.g_pow_p(nonce);
        let challenge = hash_elems(group, &[(&keypair.public_key).into(), (&commitment).into()]);
        let response = group.a_plus_bc_q(nonce, &challenge, &keypair.secret_key);

        Self {
            public_key: keypair.public_key.clone(),
            commitment,
            challenge,
            response,
        }
    }

    /// Check the proof; a mismatch is reported as `false`, never an error
    pub fn is_valid(&self, group: &Group) -> bool {
        let valid_public_key = group.is_valid_residue(&self.public_key);
        let valid_commitment = group.is_valid_residue(&self.commitment);
        let in_bounds = group.is_in_bounds_q(&self.challenge) && group.is_in_bounds_q(&self.response);

        let expected_challenge =
            hash_elems(group, &[(&self.public_key).into(), (&self.commitment).into()]);
        let valid_challenge = expected_challenge == self.challenge;

        let left = group.g_pow_p(&self.response);
        let right = group.mult_p(
            &self.commitment,
            &group.pow_p(&self.public_key, &self.challenge),
        );
        let valid_response = left == right;

        let success =
            valid_public_key && valid_commitment && in_bounds && valid_challenge && valid_response;
        if !success {
            warn!(
                public_key = %self.public_key.to_short_string(),
                valid_public_key,
                valid_commitment,
                in_bounds,
                valid_challenge,
                valid_response,
                "Invalid Schnorr proof"
            );
        }
        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_proof() {
        let group = Group::reduced();
        let keypair = ElGamalKeyPair::from_secret(&group, group.rand_q()).unwrap();
        let proof = SchnorrProof::prove(&group, &keypair, &group.rand_q());
        assert!(proof.is_valid(&group));
    }

    #[test]
    fn test_tampered_proof_fails() {
        let group = Group::reduced();
        let keypair = ElGamalKeyPair::from_secret(&group, group.rand_q()).unwrap();
        let proof = SchnorrProof::prove(&group, &keypair, &group.rand_q());

        let mut bad_response = proof.clone();
        bad_response.response = group.add_q(&proof.response, &group.one_q());
        assert!(!bad_response.is_valid(&group));

        let other = ElGamalKeyPair::from_secret(&group, group.rand_q()).unwrap();
        let mut bad_key = proof;
        bad_key.public_key = other.public_key.clone();
        assert!(!bad_key.is_valid(&group));
    }
}
