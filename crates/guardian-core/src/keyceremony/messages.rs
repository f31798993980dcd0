//! Messages exchanged during the key ceremony

use crate::auxiliary::{AuxiliaryCiphertext, AuxiliaryPublicKey};
use crate::group::{ElementModP, ElementModQ, Group};
use crate::polynomial::{validate_coordinate, verify_polynomial_coordinate};
use crate::proofs::SchnorrProof;
use crate::types::GuardianId;
use serde::{Deserialize, Serialize};

/// Round 1 broadcast: a guardian's public keys and coefficient proofs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeySet {
    pub owner_id: GuardianId,
    pub x_coordinate: u32,
    pub auxiliary_public_key: AuxiliaryPublicKey,
    /// One proof per coefficient, carrying the commitment `K_j`
    pub coefficient_proofs: Vec<SchnorrProof>,
}

impl PublicKeySet {
    /// `K_0`, the owner's election public key
    pub fn election_public_key(&self) -> Option<&ElementModP> {
        self.coefficient_proofs.first().map(|p| &p.public_key)
    }

    pub fn coefficient_commitments(&self) -> Vec<ElementModP> {
        self.coefficient_proofs
            .iter()
            .map(|p| p.public_key.clone())
            .collect()
    }

    /// Valid iff the coordinate is in range and every proof verifies
    pub fn is_valid(&self, group: &Group) -> bool {
        validate_coordinate(self.x_coordinate).is_ok()
            && !self.coefficient_proofs.is_empty()
            && self.coefficient_proofs.iter().all(|p| p.is_valid(group))
    }
}

/// Round 2: `P_i(x_l)` sealed for guardian `l`
///
/// Exactly one of `encrypted_coordinate` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialKeyBackup {
    pub generating_guardian_id: GuardianId,
    pub designated_guardian_id: GuardianId,
    pub designated_guardian_x_coordinate: u32,
    pub encrypted_coordinate: Option<AuxiliaryCiphertext>,
    pub error: Option<String>,
}

impl PartialKeyBackup {
    pub(crate) fn failed(
        generating_guardian_id: &str,
        designated_guardian_id: &str,
        error: impl Into<String>,
    ) -> Self {
        Self {
            generating_guardian_id: generating_guardian_id.to_string(),
            designated_guardian_id: designated_guardian_id.to_string(),
            designated_guardian_x_coordinate: 0,
            encrypted_coordinate: None,
            error: Some(error.into()),
        }
    }

    /// Associated data binding the sealed coordinate to this pair
    pub fn associated_data(&self) -> Vec<u8> {
        backup_associated_data(
            &self.generating_guardian_id,
            &self.designated_guardian_id,
            self.designated_guardian_x_coordinate,
        )
    }
}

pub(crate) fn backup_associated_data(generating: &str, designated: &str, x: u32) -> Vec<u8> {
    format!("{}|{}|{}", generating, designated, x).into_bytes()
}

/// Round 2 result: the designated guardian's verdict on a backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialKeyVerification {
    pub generating_guardian_id: GuardianId,
    pub designated_guardian_id: GuardianId,
    /// `None` when the backup verified
    pub error: Option<String>,
}

impl PartialKeyVerification {
    pub(crate) fn new(generating: &str, designated: &str, error: Option<String>) -> Self {
        Self {
            generating_guardian_id: generating.to_string(),
            designated_guardian_id: designated.to_string(),
            error,
        }
    }

    pub fn verified(&self) -> bool {
        self.error.is_none()
    }
}

/// Round 3: the generator's unencrypted re-publication of a disputed
/// coordinate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialKeyChallengeResponse {
    pub generating_guardian_id: GuardianId,
    pub designated_guardian_id: GuardianId,
    pub designated_guardian_x_coordinate: u32,
    pub coordinate: Option<ElementModQ>,
    pub error: Option<String>,
}

impl PartialKeyChallengeResponse {
    pub(crate) fn failed(generating: &str, designated: &str, error: impl Into<String>) -> Self {
        Self {
            generating_guardian_id: generating.to_string(),
            designated_guardian_id: designated.to_string(),
            designated_guardian_x_coordinate: 0,
            coordinate: None,
            error: Some(error.into()),
        }
    }
}

/// Adjudicate a challenge response against the generator's commitments
pub fn verify_partial_key_challenge(
    group: &Group,
    response: &PartialKeyChallengeResponse,
    commitments: &[ElementModP],
) -> PartialKeyVerification {
    let error = match (&response.error, &response.coordinate) {
        (Some(error), _) => Some(format!("Challenge response carries error: {}", error)),
        (None, None) => Some("Challenge response has no coordinate".to_string()),
        (None, Some(coordinate)) => {
            if verify_polynomial_coordinate(
                group,
                coordinate,
                response.designated_guardian_x_coordinate,
                commitments,
            ) {
                None
            } else {
                Some("Published coordinate does not match the public commitments".to_string())
            }
        }
    };

    PartialKeyVerification::new(
        &response.generating_guardian_id,
        &response.designated_guardian_id,
        error,
    )
}
