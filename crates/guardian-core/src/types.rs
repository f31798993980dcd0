//! Core types shared by the key ceremony and decryption

use crate::group::{ElementModP, ElementModQ, Group};
use crate::hash::{hash_elems, Hashable};
use crate::polynomial::MAX_COORDINATE;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Unique identifier for a guardian
pub type GuardianId = String;

/// Size parameters of a ceremony
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyConfig {
    /// Total number of guardians (N)
    pub number_of_guardians: usize,

    /// Guardians required to decrypt (K)
    pub quorum: usize,
}

impl CeremonyConfig {
    /// Create a new ceremony configuration
    pub fn new(number_of_guardians: usize, quorum: usize) -> Result<Self> {
        if quorum < 1 {
            return Err(Error::InvalidConfig("Quorum must be at least 1".into()));
        }
        if quorum > number_of_guardians {
            return Err(Error::InvalidConfig(
                "Quorum cannot exceed number of guardians".into(),
            ));
        }
        if number_of_guardians > MAX_COORDINATE as usize {
            return Err(Error::InvalidConfig(format!(
                "At most {} guardians are supported",
                MAX_COORDINATE
            )));
        }

        Ok(Self {
            number_of_guardians,
            quorum,
        })
    }
}

/// Public cryptographic context of an election, fixed once the key
/// ceremony has completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionContext {
    pub group: Group,
    pub number_of_guardians: usize,
    pub quorum: usize,

    /// Joint public key `K = ∏ K_i`
    pub elgamal_public_key: ElementModP,

    /// Hash of all guardians' coefficient commitments, by guardian id
    pub commitment_hash: ElementModQ,

    pub manifest_hash: ElementModQ,

    /// `Q = H(P, Q, G, N, K, manifest)`
    pub crypto_base_hash: ElementModQ,

    /// `Q̄ = H(Q, commitment_hash)`, bound into every decryption proof
    pub crypto_extended_base_hash: ElementModQ,
}

impl ElectionContext {
    pub fn new(
        group: &Group,
        config: &CeremonyConfig,
        elgamal_public_key: ElementModP,
        commitment_hash: ElementModQ,
        manifest_hash: ElementModQ,
    ) -> Self {
        let p_hex = hex::encode_upper(group.p().to_bytes_be());
        let q_hex = hex::encode_upper(group.q().to_bytes_be());
        let generator = group.generator();

        let crypto_base_hash = hash_elems(
            group,
            &[
                Hashable::Str(&p_hex),
                Hashable::Str(&q_hex),
                (&generator).into(),
                Hashable::Int(config.number_of_guardians as u64),
                Hashable::Int(config.quorum as u64),
                (&manifest_hash).into(),
            ],
        );
        let crypto_extended_base_hash =
            hash_elems(group, &[(&crypto_base_hash).into(), (&commitment_hash).into()]);

        Self {
            group: group.clone(),
            number_of_guardians: config.number_of_guardians,
            quorum: config.quorum,
            elgamal_public_key,
            commitment_hash,
            manifest_hash,
            crypto_base_hash,
            crypto_extended_base_hash,
        }
    }

    pub fn config(&self) -> CeremonyConfig {
        CeremonyConfig {
            number_of_guardians: self.number_of_guardians,
            quorum: self.quorum,
        }
    }
}
