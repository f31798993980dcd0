//! Public output of a completed key ceremony

use super::messages::PublicKeySet;
use crate::group::{ElementModP, ElementModQ, Group};
use crate::hash::{hash_elems, Hashable};
use crate::proofs::SchnorrProof;
use crate::types::{CeremonyConfig, ElectionContext, GuardianId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Published record of one guardian
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianRecord {
    pub guardian_id: GuardianId,
    pub x_coordinate: u32,
    pub election_public_key: ElementModP,
    pub coefficient_commitments: Vec<ElementModP>,
    pub coefficient_proofs: Vec<SchnorrProof>,
}

impl GuardianRecord {
    pub fn from_public_keys(keys: &PublicKeySet) -> Option<Self> {
        Some(Self {
            guardian_id: keys.owner_id.clone(),
            x_coordinate: keys.x_coordinate,
            election_public_key: keys.election_public_key()?.clone(),
            coefficient_commitments: keys.coefficient_commitments(),
            coefficient_proofs: keys.coefficient_proofs.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCeremonyResults {
    pub config: CeremonyConfig,
    pub joint_public_key: ElementModP,
    pub commitment_hash: ElementModQ,
    /// Sorted by guardian id
    pub guardian_records: Vec<GuardianRecord>,
}

impl KeyCeremonyResults {
    /// Build the election context, binding in the manifest hash
    pub fn election_context(&self, group: &Group, manifest_hash: ElementModQ) -> ElectionContext {
        ElectionContext::new(
            group,
            &self.config,
            self.joint_public_key.clone(),
            self.commitment_hash.clone(),
            manifest_hash,
        )
    }
}

/// Hash of every guardian's commitments, concatenated in guardian id order
pub fn commitment_hash(group: &Group, public_keys: &BTreeMap<GuardianId, PublicKeySet>) -> ElementModQ {
    let items: Vec<Hashable<'_>> = public_keys
        .values()
        .flat_map(|keys| keys.coefficient_proofs.iter().map(|p| Hashable::P(&p.public_key)))
        .collect();
    hash_elems(group, &items)
}
