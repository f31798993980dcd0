//! Key ceremony mediator: drives N trustees through the four rounds

use super::messages::{verify_partial_key_challenge, PartialKeyVerification, PublicKeySet};
use super::results::{commitment_hash, GuardianRecord, KeyCeremonyResults};
use crate::elgamal::combine_public_keys;
use crate::group::{ElementModP, ElementModQ, Group};
use crate::polynomial::validate_coordinate;
use crate::trustee::KeyCeremonyTrustee;
use crate::types::{CeremonyConfig, GuardianId};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info, instrument, warn};

/// Round 2 disputes: generating guardian to the failed verifications of its
/// backups
pub type Disputes = BTreeMap<GuardianId, Vec<PartialKeyVerification>>;

/// Runs the ceremony over borrowed trustees
///
/// The mediator only ever sees public keys, sealed backups and verdicts.
/// Trustees stay with the caller, which can export their decryption state
/// once the ceremony is over.
pub struct KeyCeremonyMediator<'a> {
    group: Group,
    config: CeremonyConfig,
    trustees: Vec<&'a mut dyn KeyCeremonyTrustee>,
    public_keys: BTreeMap<GuardianId, PublicKeySet>,
}

impl<'a> KeyCeremonyMediator<'a> {
    pub fn new(
        group: &Group,
        config: &CeremonyConfig,
        trustees: Vec<&'a mut dyn KeyCeremonyTrustee>,
    ) -> Result<Self> {
        if trustees.len() != config.number_of_guardians {
            return Err(Error::InvalidConfig(format!(
                "Expected {} trustees, got {}",
                config.number_of_guardians,
                trustees.len()
            )));
        }

        let mut ids = BTreeSet::new();
        let mut coordinates = BTreeSet::new();
        for trustee in &trustees {
            validate_coordinate(trustee.x_coordinate())?;
            if !ids.insert(trustee.id().to_string()) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate guardian id '{}'",
                    trustee.id()
                )));
            }
            if !coordinates.insert(trustee.x_coordinate()) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate x-coordinate {}",
                    trustee.x_coordinate()
                )));
            }
        }

        Ok(Self {
            group: group.clone(),
            config: *config,
            trustees,
            public_keys: BTreeMap::new(),
        })
    }

    /// Run all four rounds
    #[instrument(skip(self), fields(
        guardians = self.config.number_of_guardians,
        quorum = self.config.quorum
    ))]
    pub fn run(&mut self) -> Result<KeyCeremonyResults> {
        info!("Starting key ceremony");

        self.round1()?;
        let disputes = self.round2()?;
        self.round3(&disputes)?;
        let joint_public_key = self.round4()?;

        let results = self.results(joint_public_key)?;
        info!(
            joint_key = %results.joint_public_key.to_short_string(),
            commitment_hash = %results.commitment_hash.to_short_string(),
            "Key ceremony completed successfully"
        );
        Ok(results)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.trustees
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| Error::NotFound(format!("No trustee '{}'", id)))
    }

    /// Round 1: every trustee's public keys go to every other trustee
    pub fn round1(&mut self) -> Result<()> {
        info!("Round 1: exchange public keys");
        let mut failures = Vec::new();

        for i in 0..self.trustees.len() {
            let sender_id = self.trustees[i].id().to_string();
            let keys = match self.trustees[i].send_public_keys() {
                Ok(keys) if keys.owner_id == sender_id => keys,
                Ok(keys) => {
                    failures.push(format!(
                        "'{}' sent public keys owned by '{}'",
                        sender_id, keys.owner_id
                    ));
                    continue;
                }
                Err(e) => {
                    failures.push(format!("'{}' sent no public keys: {}", sender_id, e));
                    continue;
                }
            };

            for j in 0..self.trustees.len() {
                if i == j {
                    continue;
                }
                let recipient = &mut self.trustees[j];
                match recipient.receive_public_keys(&keys) {
                    Ok(true) => {}
                    Ok(false) => failures.push(format!(
                        "'{}' rejected public keys of '{}'",
                        recipient.id(),
                        sender_id
                    )),
                    Err(e) => failures.push(format!(
                        "'{}' did not acknowledge public keys of '{}': {}",
                        recipient.id(),
                        sender_id,
                        e
                    )),
                }
            }
            debug!(guardian_id = %sender_id, "Public keys distributed");
            self.public_keys.insert(sender_id, keys);
        }

        fail_round(1, failures)
    }

    /// Round 2: every ordered pair exchanges a backup; failed verifications
    /// are collected as disputes, missing answers fail the round
    pub fn round2(&mut self) -> Result<Disputes> {
        info!("Round 2: exchange partial key backups");
        let mut failures = Vec::new();
        let mut disputes = Disputes::new();

        for i in 0..self.trustees.len() {
            for j in 0..self.trustees.len() {
                if i == j {
                    continue;
                }
                let generating_id = self.trustees[i].id().to_string();
                let designated_id = self.trustees[j].id().to_string();

                let backup = match self.trustees[i].send_partial_key_backup(&designated_id) {
                    Ok(backup) => backup,
                    Err(e) => {
                        failures.push(format!(
                            "'{}' sent no backup for '{}': {}",
                            generating_id, designated_id, e
                        ));
                        continue;
                    }
                };

                match self.trustees[j].verify_partial_key_backup(&backup) {
                    Ok(verification) if verification.verified() => {
                        debug!(%generating_id, %designated_id, "Backup verified");
                    }
                    Ok(verification) => {
                        warn!(
                            %generating_id,
                            %designated_id,
                            error = verification.error.as_deref().unwrap_or_default(),
                            "Backup challenged"
                        );
                        disputes.entry(generating_id).or_default().push(verification);
                    }
                    Err(e) => failures.push(format!(
                        "'{}' did not verify backup from '{}': {}",
                        designated_id, generating_id, e
                    )),
                }
            }
        }

        fail_round(2, failures)?;
        Ok(disputes)
    }

    /// Round 3: each challenged generator publishes the disputed coordinate
    /// in the clear; a coordinate that fails the commitment check aborts the
    /// ceremony
    pub fn round3(&mut self, disputes: &Disputes) -> Result<()> {
        info!(
            disputes = disputes.values().map(Vec::len).sum::<usize>(),
            "Round 3: resolve backup challenges"
        );
        let mut failures = Vec::new();

        for (generating_id, verifications) in disputes {
            let generator = self.index_of(generating_id)?;
            let commitments = self
                .public_keys
                .get(generating_id)
                .map(PublicKeySet::coefficient_commitments)
                .ok_or_else(|| Error::NotFound(format!("No public keys for '{}'", generating_id)))?;

            for challenge in verifications {
                let designated_id = &challenge.designated_guardian_id;
                let response = match self.trustees[generator].send_backup_challenge_response(designated_id) {
                    Ok(response) => response,
                    Err(e) => {
                        failures.push(format!(
                            "'{}' did not answer the challenge from '{}': {}",
                            generating_id, designated_id, e
                        ));
                        continue;
                    }
                };

                let designated_x = self.public_keys.get(designated_id).map(|k| k.x_coordinate);
                let verdict = if response.generating_guardian_id != *generating_id
                    || response.designated_guardian_id != *designated_id
                {
                    Some("Challenge response names the wrong guardians".to_string())
                } else if designated_x != Some(response.designated_guardian_x_coordinate) {
                    Some("Challenge response uses the wrong x-coordinate".to_string())
                } else {
                    verify_partial_key_challenge(&self.group, &response, &commitments).error
                };

                match verdict {
                    Some(reason) => {
                        error!(
                            %generating_id,
                            %designated_id,
                            %reason,
                            "Guardian failed its backup challenge"
                        );
                        failures.push(format!(
                            "guardian '{}' failed the challenge from '{}': {}",
                            generating_id, designated_id, reason
                        ));
                    }
                    None => {
                        info!(%generating_id, %designated_id, "Backup challenge dismissed");
                        self.redeliver_backup(generator, designated_id);
                    }
                }
            }
        }

        fail_round(3, failures)
    }

    /// After a dismissed challenge, hand the designated guardian its backup
    /// again so it holds a usable copy
    fn redeliver_backup(&mut self, generator: usize, designated_id: &str) {
        let Ok(designated) = self.index_of(designated_id) else {
            return;
        };
        let result = self.trustees[generator]
            .send_partial_key_backup(designated_id)
            .and_then(|backup| self.trustees[designated].verify_partial_key_backup(&backup));
        match result {
            Ok(verification) if verification.verified() => {
                debug!(designated_id, "Backup redelivered");
            }
            Ok(verification) => warn!(
                designated_id,
                error = verification.error.as_deref().unwrap_or_default(),
                "Redelivered backup still fails verification"
            ),
            Err(e) => warn!(designated_id, error = %e, "Backup redelivery failed"),
        }
    }

    /// Round 4: every trustee computes the joint key; all must agree with
    /// each other and with the product of the published keys
    pub fn round4(&mut self) -> Result<ElementModP> {
        info!("Round 4: joint key agreement");
        let mut failures = Vec::new();
        let mut joint_keys = BTreeMap::new();

        for trustee in self.trustees.iter_mut() {
            match trustee.send_joint_public_key() {
                Ok(key) => {
                    joint_keys.insert(trustee.id().to_string(), key);
                }
                Err(e) => failures.push(format!("'{}' sent no joint key: {}", trustee.id(), e)),
            }
        }
        fail_round(4, failures)?;

        let election_keys = self
            .public_keys
            .values()
            .filter_map(PublicKeySet::election_public_key);
        let expected = combine_public_keys(&self.group, election_keys);

        if joint_keys.values().any(|key| *key != expected) {
            for (guardian_id, key) in &joint_keys {
                error!(
                    %guardian_id,
                    joint_key = %key.to_short_string(),
                    expected = %expected.to_short_string(),
                    agrees = (*key == expected),
                    "Joint key disagreement"
                );
            }
            return Err(Error::JointKeyMismatch);
        }

        Ok(expected)
    }

    /// Hash of all coefficient commitments in guardian id order
    pub fn commitment_hash(&self) -> ElementModQ {
        commitment_hash(&self.group, &self.public_keys)
    }

    pub fn public_keys(&self) -> &BTreeMap<GuardianId, PublicKeySet> {
        &self.public_keys
    }

    fn results(&self, joint_public_key: ElementModP) -> Result<KeyCeremonyResults> {
        let guardian_records = self
            .public_keys
            .values()
            .map(|keys| {
                GuardianRecord::from_public_keys(keys).ok_or_else(|| {
                    Error::NotFound(format!("No election key for '{}'", keys.owner_id))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(KeyCeremonyResults {
            config: self.config,
            joint_public_key,
            commitment_hash: self.commitment_hash(),
            guardian_records,
        })
    }
}

fn fail_round(round: u8, failures: Vec<String>) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    for failure in &failures {
        error!(round, %failure, "Key ceremony round failed");
    }
    Err(Error::round(round, failures.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyceremony::{
        Guardian, PartialKeyBackup, PartialKeyChallengeResponse,
    };

    fn guardians(group: &Group, config: &CeremonyConfig) -> Vec<Guardian> {
        (1..=config.number_of_guardians)
            .map(|i| Guardian::new(group, format!("guardian-{}", i), i as u32, config, None).unwrap())
            .collect()
    }

    fn as_trustees(guardians: &mut [Guardian]) -> Vec<&mut dyn KeyCeremonyTrustee> {
        guardians
            .iter_mut()
            .map(|g| g as &mut dyn KeyCeremonyTrustee)
            .collect()
    }

    /// Delegates to a guardian, optionally misbehaving toward one target
    struct Wrapped {
        inner: Guardian,
        target: String,
        /// Report the first verification of a backup as failed
        flaky_verification: bool,
        /// Corrupt backups for `target` and lie in the challenge response
        lying_generator: bool,
        /// Fail to produce backups at all
        unreachable: bool,
        /// Report a wrong joint key
        wrong_joint_key: bool,
    }

    impl Wrapped {
        fn new(inner: Guardian, target: &str) -> Self {
            Self {
                inner,
                target: target.to_string(),
                flaky_verification: false,
                lying_generator: false,
                unreachable: false,
                wrong_joint_key: false,
            }
        }
    }

    impl KeyCeremonyTrustee for Wrapped {
        fn id(&self) -> &str {
            self.inner.id()
        }

        fn x_coordinate(&self) -> u32 {
            self.inner.x_coordinate()
        }

        fn send_public_keys(&mut self) -> Result<PublicKeySet> {
            Ok(self.inner.share_public_keys())
        }

        fn receive_public_keys(&mut self, keys: &PublicKeySet) -> Result<bool> {
            Ok(self.inner.receive_public_keys(keys))
        }

        fn send_partial_key_backup(&mut self, designated_id: &str) -> Result<PartialKeyBackup> {
            if self.unreachable {
                return Err(Error::transport(self.inner.id(), "connection refused"));
            }
            let mut backup = self.inner.send_partial_key_backup(designated_id);
            if self.lying_generator && designated_id == self.target {
                if let Some(sealed) = backup.encrypted_coordinate.as_mut() {
                    sealed.ciphertext[0] ^= 0x01;
                }
            }
            Ok(backup)
        }

        fn verify_partial_key_backup(
            &mut self,
            backup: &PartialKeyBackup,
        ) -> Result<PartialKeyVerification> {
            let mut verification = self.inner.verify_partial_key_backup(backup);
            if self.flaky_verification && backup.generating_guardian_id == self.target {
                self.flaky_verification = false;
                verification.error = Some("transient decryption failure".into());
            }
            Ok(verification)
        }

        fn send_backup_challenge_response(
            &mut self,
            designated_id: &str,
        ) -> Result<PartialKeyChallengeResponse> {
            let mut response = self.inner.send_backup_challenge_response(designated_id);
            if self.lying_generator {
                let group = Group::reduced();
                response.coordinate = response
                    .coordinate
                    .map(|c| group.add_q(&c, &group.one_q()));
            }
            Ok(response)
        }

        fn send_joint_public_key(&mut self) -> Result<ElementModP> {
            let key = self.inner.publish_joint_key()?;
            if self.wrong_joint_key {
                let group = Group::reduced();
                return Ok(group.mult_p(&key, &group.generator()));
            }
            Ok(key)
        }
    }

    fn wrapped(group: &Group, config: &CeremonyConfig) -> Vec<Wrapped> {
        guardians(group, config)
            .into_iter()
            .map(|g| Wrapped::new(g, "guardian-1"))
            .collect()
    }

    fn run_wrapped(group: &Group, config: &CeremonyConfig, all: &mut [Wrapped]) -> Result<KeyCeremonyResults> {
        let trustees = all
            .iter_mut()
            .map(|w| w as &mut dyn KeyCeremonyTrustee)
            .collect();
        KeyCeremonyMediator::new(group, config, trustees)?.run()
    }

    #[test]
    fn test_ceremony_joint_key_agreement() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(5, 3).unwrap();
        let mut all = guardians(&group, &config);

        let results = KeyCeremonyMediator::new(&group, &config, as_trustees(&mut all))
            .unwrap()
            .run()
            .unwrap();

        let expected = combine_public_keys(&group, all.iter().map(|g| g.election_public_key()));
        assert_eq!(results.joint_public_key, expected);
        for guardian in all.iter_mut() {
            assert_eq!(guardian.publish_joint_key().unwrap(), expected);
        }

        assert_eq!(results.guardian_records.len(), 5);
        let ids: Vec<_> = results.guardian_records.iter().map(|r| r.guardian_id.as_str()).collect();
        assert_eq!(ids, ["guardian-1", "guardian-2", "guardian-3", "guardian-4", "guardian-5"]);
        assert!(all.iter().all(|g| g.decrypting_trustee().is_ok()));
    }

    #[test]
    fn test_commitment_hash_is_order_independent() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(3, 2).unwrap();
        let mut all = guardians(&group, &config);
        let hash = {
            let mut mediator = KeyCeremonyMediator::new(&group, &config, as_trustees(&mut all)).unwrap();
            mediator.round1().unwrap();
            mediator.commitment_hash()
        };

        all.reverse();
        let mut mediator = KeyCeremonyMediator::new(&group, &config, as_trustees(&mut all)).unwrap();
        mediator.round1().unwrap();
        assert_eq!(mediator.commitment_hash(), hash);
    }

    #[test]
    fn test_new_rejects_bad_roster() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(3, 2).unwrap();
        let mut two = guardians(&group, &CeremonyConfig::new(2, 2).unwrap());
        assert!(KeyCeremonyMediator::new(&group, &config, as_trustees(&mut two)).is_err());

        let mut clash: Vec<Guardian> = (1..=3)
            .map(|i| Guardian::new(&group, format!("g{}", i), 7, &config, None).unwrap())
            .collect();
        assert!(KeyCeremonyMediator::new(&group, &config, as_trustees(&mut clash)).is_err());
    }

    #[test]
    fn test_transient_dispute_is_resolved() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(3, 2).unwrap();
        let mut all = wrapped(&group, &config);
        all[2].flaky_verification = true;

        let results = run_wrapped(&group, &config, &mut all).unwrap();
        assert_eq!(results.guardian_records.len(), 3);
        assert!(all[2].inner.decrypting_trustee().is_ok());
    }

    #[test]
    fn test_lying_generator_aborts() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(3, 2).unwrap();
        let mut all = wrapped(&group, &config);
        all[1].lying_generator = true;
        all[1].target = "guardian-3".into();

        let err = run_wrapped(&group, &config, &mut all).unwrap_err();
        match err {
            Error::CeremonyFailed { round, reason } => {
                assert_eq!(round, 3);
                assert!(reason.contains("guardian-2"), "{}", reason);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unreachable_trustee_fails_round2() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(3, 2).unwrap();
        let mut all = wrapped(&group, &config);
        all[0].unreachable = true;

        let err = run_wrapped(&group, &config, &mut all).unwrap_err();
        assert!(matches!(err, Error::CeremonyFailed { round: 2, .. }), "{}", err);
    }

    #[test]
    fn test_joint_key_disagreement() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(3, 2).unwrap();
        let mut all = wrapped(&group, &config);
        all[1].wrong_joint_key = true;

        let err = run_wrapped(&group, &config, &mut all).unwrap_err();
        assert!(matches!(err, Error::JointKeyMismatch));
    }
}
