//! A single guardian's side of the key ceremony

use super::messages::{
    backup_associated_data, PartialKeyBackup, PartialKeyChallengeResponse, PartialKeyVerification,
    PublicKeySet,
};
use crate::auxiliary::{self, AuxiliaryKeyPair};
use crate::decryption::DecryptingGuardian;
use crate::elgamal::combine_public_keys;
use crate::group::{ElementModP, ElementModQ, Group};
use crate::polynomial::{validate_coordinate, verify_polynomial_coordinate, ElectionPolynomial};
use crate::types::{CeremonyConfig, GuardianId};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

/// Progress of a guardian through the ceremony, derived from what it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CeremonyState {
    Created,
    KeysShared,
    BackupsGenerated,
    BackupsExchanged,
    Verified,
    JointKeyPublished,
}

/// Secret material, owned by exactly one guardian for its lifetime
struct GuardianSecrets {
    polynomial: ElectionPolynomial,
    auxiliary_keys: AuxiliaryKeyPair,
}

/// A key-ceremony participant
///
/// Holds the guardian's polynomial and auxiliary private key; only public
/// data and sealed backups ever leave it.
pub struct Guardian {
    id: GuardianId,
    x_coordinate: u32,
    config: CeremonyConfig,
    group: Group,
    secrets: GuardianSecrets,

    /// Every guardian's public keys, this one included
    all_guardian_public_keys: BTreeMap<GuardianId, PublicKeySet>,

    /// Backups this guardian generated, by designated guardian
    my_partial_key_backups: BTreeMap<GuardianId, PartialKeyBackup>,

    /// Backups received from others, by generating guardian
    other_guardian_partial_key_backups: BTreeMap<GuardianId, PartialKeyBackup>,

    /// Generators whose backup for this guardian verified
    verified_backups: BTreeSet<GuardianId>,

    joint_public_key: Option<ElementModP>,
}

impl Guardian {
    /// Create a guardian with a fresh polynomial of degree `quorum - 1`
    pub fn new(
        group: &Group,
        id: impl Into<GuardianId>,
        x_coordinate: u32,
        config: &CeremonyConfig,
        seed: Option<&ElementModQ>,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidConfig("Guardian id must not be empty".into()));
        }
        validate_coordinate(x_coordinate)?;

        let polynomial = ElectionPolynomial::generate(group, config.quorum, seed)?;
        let secrets = GuardianSecrets {
            polynomial,
            auxiliary_keys: AuxiliaryKeyPair::generate(),
        };

        let mut guardian = Self {
            id,
            x_coordinate,
            config: *config,
            group: group.clone(),
            secrets,
            all_guardian_public_keys: BTreeMap::new(),
            my_partial_key_backups: BTreeMap::new(),
            other_guardian_partial_key_backups: BTreeMap::new(),
            verified_backups: BTreeSet::new(),
            joint_public_key: None,
        };
        let own_keys = guardian.share_public_keys();
        guardian
            .all_guardian_public_keys
            .insert(guardian.id.clone(), own_keys);

        debug!(
            guardian_id = %guardian.id,
            x_coordinate,
            public_key = %guardian.election_public_key().to_short_string(),
            "Guardian created"
        );
        Ok(guardian)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn x_coordinate(&self) -> u32 {
        self.x_coordinate
    }

    pub fn config(&self) -> &CeremonyConfig {
        &self.config
    }

    pub fn election_public_key(&self) -> &ElementModP {
        self.secrets.polynomial.public_key()
    }

    pub fn state(&self) -> CeremonyState {
        let others = self.config.number_of_guardians.saturating_sub(1);
        if self.joint_public_key.is_some() {
            CeremonyState::JointKeyPublished
        } else if self.verified_backups.len() == others
            && self.all_guardian_public_keys.len() == self.config.number_of_guardians
        {
            CeremonyState::Verified
        } else if self.other_guardian_partial_key_backups.len() == others && others > 0 {
            CeremonyState::BackupsExchanged
        } else if self.my_partial_key_backups.len() == others && others > 0 {
            CeremonyState::BackupsGenerated
        } else if self.all_guardian_public_keys.len() == self.config.number_of_guardians {
            CeremonyState::KeysShared
        } else {
            CeremonyState::Created
        }
    }

    /// Public keys received so far, this guardian's included
    pub fn guardian_public_keys(&self) -> &BTreeMap<GuardianId, PublicKeySet> {
        &self.all_guardian_public_keys
    }

    /// This guardian's public keys and coefficient proofs
    pub fn share_public_keys(&self) -> PublicKeySet {
        PublicKeySet {
            owner_id: self.id.clone(),
            x_coordinate: self.x_coordinate,
            auxiliary_public_key: self.secrets.auxiliary_keys.public_key(),
            coefficient_proofs: self.secrets.polynomial.coefficient_proofs().to_vec(),
        }
    }

    /// Store another guardian's public keys if their proofs verify
    ///
    /// Returns false for this guardian's own id, an invalid set, or an
    /// x-coordinate already claimed by a different guardian.
    pub fn receive_public_keys(&mut self, keys: &PublicKeySet) -> bool {
        if keys.owner_id == self.id {
            warn!(guardian_id = %self.id, "Refusing public keys under own id");
            return false;
        }
        if keys.coefficient_proofs.len() != self.config.quorum {
            warn!(
                guardian_id = %self.id,
                owner_id = %keys.owner_id,
                proofs = keys.coefficient_proofs.len(),
                quorum = self.config.quorum,
                "Public key set has the wrong number of coefficients"
            );
            return false;
        }
        if !keys.is_valid(&self.group) {
            warn!(guardian_id = %self.id, owner_id = %keys.owner_id, "Invalid public key set");
            return false;
        }
        let collision = self
            .all_guardian_public_keys
            .values()
            .any(|k| k.owner_id != keys.owner_id && k.x_coordinate == keys.x_coordinate);
        if collision {
            warn!(
                guardian_id = %self.id,
                owner_id = %keys.owner_id,
                x_coordinate = keys.x_coordinate,
                "Duplicate x-coordinate"
            );
            return false;
        }

        let previous = self
            .all_guardian_public_keys
            .insert(keys.owner_id.clone(), keys.clone());
        if previous.as_ref().is_some_and(|p| p != keys) {
            // Anything derived from the replaced keys is stale
            self.my_partial_key_backups.remove(&keys.owner_id);
            self.other_guardian_partial_key_backups.remove(&keys.owner_id);
            self.verified_backups.remove(&keys.owner_id);
            self.joint_public_key = None;
        }
        true
    }

    /// This guardian's backup for `designated_id`, generated once and cached
    ///
    /// Failures come back as a backup carrying an error, and are not cached.
    pub fn send_partial_key_backup(&mut self, designated_id: &str) -> PartialKeyBackup {
        if designated_id == self.id {
            return PartialKeyBackup::failed(
                &self.id,
                designated_id,
                format!("Guardian '{}' cannot back up its own key", self.id),
            );
        }
        if let Some(cached) = self.my_partial_key_backups.get(designated_id) {
            return cached.clone();
        }

        let backup = self.generate_partial_key_backup(designated_id);
        if backup.error.is_none() {
            self.my_partial_key_backups
                .insert(designated_id.to_string(), backup.clone());
        } else {
            warn!(
                guardian_id = %self.id,
                designated_id,
                error = backup.error.as_deref().unwrap_or_default(),
                "Backup generation failed"
            );
        }
        backup
    }

    fn generate_partial_key_backup(&self, designated_id: &str) -> PartialKeyBackup {
        let Some(designated_keys) = self.all_guardian_public_keys.get(designated_id) else {
            return PartialKeyBackup::failed(
                &self.id,
                designated_id,
                format!(
                    "Guardian '{}' is missing public key for '{}'",
                    self.id, designated_id
                ),
            );
        };
        let x = designated_keys.x_coordinate;

        let coordinate = match self.secrets.polynomial.evaluate(&self.group, x) {
            Ok(value) => value,
            Err(e) => return PartialKeyBackup::failed(&self.id, designated_id, e.to_string()),
        };
        let plaintext = coordinate.to_bytes_be(self.group.q_byte_len());
        let associated_data = backup_associated_data(&self.id, designated_id, x);

        match auxiliary::encrypt(
            &designated_keys.auxiliary_public_key,
            &plaintext,
            &associated_data,
        ) {
            Ok(sealed) => PartialKeyBackup {
                generating_guardian_id: self.id.clone(),
                designated_guardian_id: designated_id.to_string(),
                designated_guardian_x_coordinate: x,
                encrypted_coordinate: Some(sealed),
                error: None,
            },
            Err(e) => PartialKeyBackup::failed(&self.id, designated_id, e.to_string()),
        }
    }

    /// Check a backup addressed to this guardian against its generator's
    /// commitments
    ///
    /// The backup is recorded whatever the outcome so that a later challenge
    /// or compensated decryption can refer to it.
    pub fn verify_partial_key_backup(&mut self, backup: &PartialKeyBackup) -> PartialKeyVerification {
        let generating_id = backup.generating_guardian_id.as_str();
        if backup.designated_guardian_id != self.id {
            return PartialKeyVerification::new(
                generating_id,
                &backup.designated_guardian_id,
                Some(format!(
                    "Backup for '{}' sent to guardian '{}'",
                    backup.designated_guardian_id, self.id
                )),
            );
        }

        self.other_guardian_partial_key_backups
            .insert(generating_id.to_string(), backup.clone());
        self.verified_backups.remove(generating_id);

        let error = self.check_backup(backup).err();
        match &error {
            None => {
                self.verified_backups.insert(generating_id.to_string());
                debug!(guardian_id = %self.id, generating_id, "Backup verified");
            }
            Some(reason) => {
                warn!(guardian_id = %self.id, generating_id, %reason, "Backup failed verification");
            }
        }
        PartialKeyVerification::new(generating_id, &self.id, error)
    }

    fn check_backup(&self, backup: &PartialKeyBackup) -> std::result::Result<(), String> {
        let coordinate = self.open_backup(backup)?;
        let generating_keys = self
            .all_guardian_public_keys
            .get(&backup.generating_guardian_id)
            .ok_or_else(|| {
                format!(
                    "Guardian '{}' is missing public key for '{}'",
                    self.id, backup.generating_guardian_id
                )
            })?;

        if verify_polynomial_coordinate(
            &self.group,
            &coordinate,
            self.x_coordinate,
            &generating_keys.coefficient_commitments(),
        ) {
            Ok(())
        } else {
            Err("Coordinate does not match the generator's public commitments".into())
        }
    }

    /// Decrypt a received backup to `P_gen(x_self)`
    pub(crate) fn open_backup(&self, backup: &PartialKeyBackup) -> std::result::Result<ElementModQ, String> {
        if let Some(error) = &backup.error {
            return Err(format!("Backup carries error: {}", error));
        }
        if backup.designated_guardian_x_coordinate != self.x_coordinate {
            return Err(format!(
                "Backup targets x-coordinate {}, guardian '{}' has {}",
                backup.designated_guardian_x_coordinate, self.id, self.x_coordinate
            ));
        }
        let sealed = backup
            .encrypted_coordinate
            .as_ref()
            .ok_or_else(|| "Backup has no encrypted coordinate".to_string())?;

        let plaintext = auxiliary::decrypt(
            &self.secrets.auxiliary_keys,
            sealed,
            &backup.associated_data(),
        )
        .map_err(|e| e.to_string())?;

        self.group
            .bytes_to_q(&plaintext)
            .ok_or_else(|| "Decrypted coordinate is not an element of Z_Q".to_string())
    }

    /// Publish, unencrypted, the coordinate of an earlier backup for
    /// `designated_id`
    pub fn send_backup_challenge_response(&self, designated_id: &str) -> PartialKeyChallengeResponse {
        let Some(backup) = self.my_partial_key_backups.get(designated_id) else {
            return PartialKeyChallengeResponse::failed(
                &self.id,
                designated_id,
                format!(
                    "Guardian '{}' has no backup for '{}'",
                    self.id, designated_id
                ),
            );
        };
        if backup.designated_guardian_id != designated_id || backup.generating_guardian_id != self.id {
            return PartialKeyChallengeResponse::failed(
                &self.id,
                designated_id,
                format!(
                    "Cached backup ({} -> {}) does not match the challenge ({} -> {})",
                    backup.generating_guardian_id,
                    backup.designated_guardian_id,
                    self.id,
                    designated_id
                ),
            );
        }

        let x = backup.designated_guardian_x_coordinate;
        match self.secrets.polynomial.evaluate(&self.group, x) {
            Ok(coordinate) => PartialKeyChallengeResponse {
                generating_guardian_id: self.id.clone(),
                designated_guardian_id: designated_id.to_string(),
                designated_guardian_x_coordinate: x,
                coordinate: Some(coordinate),
                error: None,
            },
            Err(e) => PartialKeyChallengeResponse::failed(&self.id, designated_id, e.to_string()),
        }
    }

    /// Combine the election public keys of all N guardians
    #[instrument(skip(self), fields(guardian_id = %self.id))]
    pub fn publish_joint_key(&mut self) -> Result<ElementModP> {
        let known = self.all_guardian_public_keys.len();
        if known != self.config.number_of_guardians {
            return Err(Error::NotFound(format!(
                "Guardian '{}' holds {} of {} public key sets",
                self.id, known, self.config.number_of_guardians
            )));
        }

        let keys = self
            .all_guardian_public_keys
            .values()
            .map(|k| {
                k.election_public_key()
                    .ok_or_else(|| Error::NotFound(format!("No election key for '{}'", k.owner_id)))
            })
            .collect::<Result<Vec<_>>>()?;
        let joint = combine_public_keys(&self.group, keys);

        info!(joint_key = %joint.to_short_string(), "Joint key computed");
        self.joint_public_key = Some(joint.clone());
        Ok(joint)
    }

    /// Export the state needed for decryption
    ///
    /// Requires a backup from every other guardian; each is decrypted here
    /// into the share this guardian holds of that guardian's secret.
    pub fn decrypting_trustee(&self) -> Result<DecryptingGuardian> {
        let others = self.config.number_of_guardians.saturating_sub(1);
        if self.other_guardian_partial_key_backups.len() != others {
            return Err(Error::NotFound(format!(
                "Guardian '{}' holds {} of {} backups",
                self.id,
                self.other_guardian_partial_key_backups.len(),
                others
            )));
        }

        let mut key_shares = BTreeMap::new();
        for (generating_id, backup) in &self.other_guardian_partial_key_backups {
            let share = self
                .open_backup(backup)
                .map_err(|reason| Error::Crypto(format!("Backup from '{}': {}", generating_id, reason)))?;
            key_shares.insert(generating_id.clone(), share);
        }

        let commitments = self
            .all_guardian_public_keys
            .iter()
            .map(|(id, keys)| (id.clone(), keys.coefficient_commitments()))
            .collect();

        Ok(DecryptingGuardian::new(
            &self.group,
            self.id.clone(),
            self.x_coordinate,
            self.secrets.polynomial.election_keypair(),
            key_shares,
            commitments,
        ))
    }
}

impl std::fmt::Debug for Guardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guardian")
            .field("id", &self.id)
            .field("x_coordinate", &self.x_coordinate)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guardians(group: &Group, n: usize, quorum: usize) -> Vec<Guardian> {
        let config = CeremonyConfig::new(n, quorum).unwrap();
        (1..=n)
            .map(|i| Guardian::new(group, format!("guardian-{}", i), i as u32, &config, None).unwrap())
            .collect()
    }

    fn exchange_keys(guardians: &mut [Guardian]) {
        let sets: Vec<_> = guardians.iter().map(|g| g.share_public_keys()).collect();
        for guardian in guardians.iter_mut() {
            for set in &sets {
                if set.owner_id != guardian.id() {
                    assert!(guardian.receive_public_keys(set));
                }
            }
        }
    }

    #[test]
    fn test_new_validates_input() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(3, 2).unwrap();
        assert!(Guardian::new(&group, "g", 0, &config, None).is_err());
        assert!(Guardian::new(&group, "g", 256, &config, None).is_err());
        assert!(Guardian::new(&group, "", 1, &config, None).is_err());

        let guardian = Guardian::new(&group, "g", 1, &config, None).unwrap();
        assert_eq!(guardian.state(), CeremonyState::Created);
        assert_eq!(guardian.guardian_public_keys().len(), 1);
    }

    #[test]
    fn test_receive_public_keys_rules() {
        let group = Group::reduced();
        let mut all = guardians(&group, 3, 2);
        let own = all[0].share_public_keys();
        assert!(!all[0].receive_public_keys(&own));

        let mut bad = all[1].share_public_keys();
        bad.coefficient_proofs[1].response = group.add_q(&bad.coefficient_proofs[1].response, &group.one_q());
        assert!(!all[0].receive_public_keys(&bad));

        let mut clash = all[1].share_public_keys();
        clash.x_coordinate = 1;
        assert!(!all[0].receive_public_keys(&clash));

        exchange_keys(&mut all);
        assert!(all.iter().all(|g| g.state() == CeremonyState::KeysShared));
    }

    #[test]
    fn test_backup_round_trip() {
        let group = Group::reduced();
        let mut all = guardians(&group, 3, 2);
        exchange_keys(&mut all);

        let backup = all[0].send_partial_key_backup("guardian-2");
        assert!(backup.error.is_none());
        assert_eq!(backup.designated_guardian_x_coordinate, 2);

        let verification = all[1].verify_partial_key_backup(&backup);
        assert!(verification.verified(), "{:?}", verification.error);
    }

    #[test]
    fn test_backup_is_cached() {
        let group = Group::reduced();
        let mut all = guardians(&group, 3, 2);
        exchange_keys(&mut all);

        let first = all[0].send_partial_key_backup("guardian-3");
        let second = all[0].send_partial_key_backup("guardian-3");
        assert_eq!(first, second);
    }

    #[test]
    fn test_backup_errors() {
        let group = Group::reduced();
        let mut all = guardians(&group, 3, 2);

        let own = all[0].send_partial_key_backup("guardian-1");
        assert!(own.error.is_some());

        // Public keys not yet exchanged
        let missing = all[0].send_partial_key_backup("guardian-2");
        assert!(missing.error.is_some());
        assert!(missing.encrypted_coordinate.is_none());
    }

    #[test]
    fn test_tampered_backup_fails_verification() {
        let group = Group::reduced();
        let mut all = guardians(&group, 3, 2);
        exchange_keys(&mut all);

        let backup = all[0].send_partial_key_backup("guardian-2");

        let mut flipped = backup.clone();
        if let Some(sealed) = flipped.encrypted_coordinate.as_mut() {
            sealed.ciphertext[3] ^= 0x80;
        }
        assert!(!all[1].verify_partial_key_backup(&flipped).verified());

        let wrong_recipient = all[0].send_partial_key_backup("guardian-3");
        let mut redirected = wrong_recipient.clone();
        redirected.designated_guardian_id = "guardian-2".into();
        assert!(!all[1].verify_partial_key_backup(&redirected).verified());

        let misaddressed = all[2].verify_partial_key_backup(&backup);
        assert!(!misaddressed.verified());
    }

    #[test]
    fn test_failed_verification_still_records_backup() {
        let group = Group::reduced();
        let mut all = guardians(&group, 2, 1);
        exchange_keys(&mut all);

        let mut backup = all[0].send_partial_key_backup("guardian-2");
        if let Some(sealed) = backup.encrypted_coordinate.as_mut() {
            sealed.ciphertext[0] ^= 0x01;
        }
        assert!(!all[1].verify_partial_key_backup(&backup).verified());
        assert_eq!(all[1].state(), CeremonyState::BackupsExchanged);
    }

    #[test]
    fn test_challenge_response_verifies() {
        let group = Group::reduced();
        let mut all = guardians(&group, 3, 2);
        exchange_keys(&mut all);

        let none = all[0].send_backup_challenge_response("guardian-2");
        assert!(none.error.is_some());

        all[0].send_partial_key_backup("guardian-2");
        let response = all[0].send_backup_challenge_response("guardian-2");
        let commitments = all[0].share_public_keys().coefficient_commitments();
        let verdict = crate::keyceremony::verify_partial_key_challenge(&group, &response, &commitments);
        assert!(verdict.verified());
    }

    #[test]
    fn test_repeated_public_keys_keep_verification() {
        let group = Group::reduced();
        let mut all = guardians(&group, 2, 2);
        exchange_keys(&mut all);

        let backup = all[0].send_partial_key_backup("guardian-2");
        assert!(all[1].verify_partial_key_backup(&backup).verified());
        let before = all[1].state();

        let keys = all[0].share_public_keys();
        assert!(all[1].receive_public_keys(&keys));
        assert_eq!(all[1].state(), before);
        assert_eq!(all[0].send_partial_key_backup("guardian-2"), backup);
    }

    #[test]
    fn test_challenge_rejects_unreduced_coordinate() {
        let group = Group::reduced();
        let mut all = guardians(&group, 2, 2);
        exchange_keys(&mut all);

        all[0].send_partial_key_backup("guardian-2");
        let mut response = all[0].send_backup_challenge_response("guardian-2");
        let commitments = all[0].share_public_keys().coefficient_commitments();

        // coordinate + Q has the same exponent but is not an element of Z_Q
        let coordinate = response.coordinate.take().unwrap();
        let shifted = coordinate.as_biguint() + group.q();
        let json = format!("\"{}\"", hex::encode_upper(shifted.to_bytes_be()));
        response.coordinate = Some(serde_json::from_str(&json).unwrap());

        let verdict = crate::keyceremony::verify_partial_key_challenge(&group, &response, &commitments);
        assert!(!verdict.verified());
    }

    #[test]
    fn test_replaced_keys_drop_received_backup() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(2, 2).unwrap();
        let mut all = guardians(&group, 2, 2);
        exchange_keys(&mut all);

        let backup = all[1].send_partial_key_backup("guardian-1");
        assert!(all[0].verify_partial_key_backup(&backup).verified());
        assert!(all[0].decrypting_trustee().is_ok());

        // guardian-2 starts over with a fresh polynomial
        let mut restarted = Guardian::new(&group, "guardian-2", 2, &config, None).unwrap();
        assert!(all[0].receive_public_keys(&restarted.share_public_keys()));
        assert!(matches!(all[0].decrypting_trustee(), Err(Error::NotFound(_))));

        assert!(restarted.receive_public_keys(&all[0].share_public_keys()));
        let backup = restarted.send_partial_key_backup("guardian-1");
        assert!(all[0].verify_partial_key_backup(&backup).verified());

        let trustee = all[0].decrypting_trustee().unwrap();
        let shares = trustee
            .compensated_decrypt("guardian-2", &[], &group.q_from_u64(7))
            .unwrap();
        assert!(shares.is_empty());
    }

    #[test]
    fn test_joint_key_requires_all_keys() {
        let group = Group::reduced();
        let mut all = guardians(&group, 3, 2);
        assert!(all[0].publish_joint_key().is_err());

        exchange_keys(&mut all);
        let keys: Vec<_> = all.iter_mut().map(|g| g.publish_joint_key().unwrap()).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(all[0].state(), CeremonyState::JointKeyPublished);
    }
}
