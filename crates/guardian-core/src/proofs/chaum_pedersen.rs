//! Chaum-Pedersen proof of a correct partial decryption

use crate::elgamal::Ciphertext;
use crate::group::{ElementModP, ElementModQ, Group};
use crate::hash::hash_elems;
use crate::nonces::Nonces;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Proof that `m = pad^s` for the same `s` as `K = G^s`, without revealing `s`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaumPedersenProof {
    /// `a = G^u`
    pub pad: ElementModP,
    /// `b = pad^u`
    pub data: ElementModP,
    /// `c = H(Q̄, pad, data, a, b, m)`
    pub challenge: ElementModQ,
    /// `v = u + c * s`
    pub response: ElementModQ,
}

impl ChaumPedersenProof {
    /// Prove that `m` is `message.pad` raised to `secret`
    ///
    /// The proof nonce is derived from `seed`, so proving twice with the
    /// same seed yields the same proof. A seed must never be reused for a
    /// different message under the same secret.
    pub fn prove(
        group: &Group,
        message: &Ciphertext,
        secret: &ElementModQ,
        m: &ElementModP,
        seed: &ElementModQ,
        extended_base_hash: &ElementModQ,
    ) -> Self {
        let u = Nonces::new(group, seed, Some("constant-chaum-pedersen-proof")).get(group, 0);
        let a = group.g_pow_p(&u);
        let b = group.pow_p(&message.pad, &u);
        let challenge = hash_elems(
            group,
            &[
                extended_base_hash.into(),
                (&message.pad).into(),
                (&message.data).into(),
                (&a).into(),
                (&b).into(),
                m.into(),
            ],
        );
        let response = group.a_plus_bc_q(&u, &challenge, secret);

        Self {
            pad: a,
            data: b,
            challenge,
            response,
        }
    }

    /// Check the proof against the ciphertext, the prover's public key `k`
    /// and the claimed partial decryption `m`
    pub fn is_valid(
        &self,
        group: &Group,
        message: &Ciphertext,
        k: &ElementModP,
        m: &ElementModP,
        extended_base_hash: &ElementModQ,
    ) -> bool {
        let in_bounds = group.is_valid_residue(&self.pad)
            && group.is_valid_residue(&self.data)
            && group.is_in_bounds_q(&self.challenge)
            && group.is_in_bounds_q(&self.response);

        let expected_challenge = hash_elems(
            group,
            &[
                extended_base_hash.into(),
                (&message.pad).into(),
                (&message.data).into(),
                (&self.pad).into(),
                (&self.data).into(),
                m.into(),
            ],
        );
        let valid_challenge = expected_challenge == self.challenge;

        // g^v = a * K^c
        let consistent_gv = group.g_pow_p(&self.response)
            == group.mult_p(&self.pad, &group.pow_p(k, &self.challenge));
        // pad^v = b * m^c
        let consistent_av = group.pow_p(&message.pad, &self.response)
            == group.mult_p(&self.data, &group.pow_p(m, &self.challenge));

        let success = in_bounds && valid_challenge && consistent_gv && consistent_av;
        if !success {
            warn!(
                public_key = %k.to_short_string(),
                in_bounds,
                valid_challenge,
                consistent_gv,
                consistent_av,
                "Invalid Chaum-Pedersen proof"
            );
        }
        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::{encrypt, ElGamalKeyPair};

    fn setup(group: &Group) -> (ElGamalKeyPair, Ciphertext, ElementModQ) {
        let keypair = ElGamalKeyPair::from_secret(group, group.rand_q()).unwrap();
        let ciphertext = encrypt(group, 1, &group.rand_q(), &keypair.public_key).unwrap();
        (keypair, ciphertext, group.rand_q())
    }

    #[test]
    fn test_valid_proof() {
        let group = Group::reduced();
        let (keypair, ciphertext, qbar) = setup(&group);
        let m = ciphertext.partial_decrypt(&group, &keypair.secret_key);
        let proof = ChaumPedersenProof::prove(
            &group,
            &ciphertext,
            &keypair.secret_key,
            &m,
            &group.rand_q(),
            &qbar,
        );
        assert!(proof.is_valid(&group, &ciphertext, &keypair.public_key, &m, &qbar));
    }

    #[test]
    fn test_wrong_partial_decryption_fails() {
        let group = Group::reduced();
        let (keypair, ciphertext, qbar) = setup(&group);
        let m = ciphertext.partial_decrypt(&group, &keypair.secret_key);
        let proof = ChaumPedersenProof::prove(
            &group,
            &ciphertext,
            &keypair.secret_key,
            &m,
            &group.rand_q(),
            &qbar,
        );

        let wrong_m = group.mult_p(&m, &group.generator());
        assert!(!proof.is_valid(&group, &ciphertext, &keypair.public_key, &wrong_m, &qbar));

        let other = ElGamalKeyPair::from_secret(&group, group.rand_q()).unwrap();
        assert!(!proof.is_valid(&group, &ciphertext, &other.public_key, &m, &qbar));

        let other_qbar = group.add_q(&qbar, &group.one_q());
        assert!(!proof.is_valid(&group, &ciphertext, &keypair.public_key, &m, &other_qbar));
    }

    #[test]
    fn test_seeded_proof_is_deterministic() {
        let group = Group::reduced();
        let (keypair, ciphertext, qbar) = setup(&group);
        let m = ciphertext.partial_decrypt(&group, &keypair.secret_key);
        let seed = group.rand_q();

        let first = ChaumPedersenProof::prove(&group, &ciphertext, &keypair.secret_key, &m, &seed, &qbar);
        let second = ChaumPedersenProof::prove(&group, &ciphertext, &keypair.secret_key, &m, &seed, &qbar);
        assert_eq!(first, second);
    }
}
