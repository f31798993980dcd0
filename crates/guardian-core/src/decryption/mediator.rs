//! Orchestrates decryption of a tally and spoiled ballots across whichever
//! guardians show up

use super::compute::{
    compute_compensated_decryption_share, compute_decryption_share,
    compute_decryption_shares_for_ballots, compute_lagrange_coefficients, decrypt_with_shares,
    reconstruct_decryption_share,
};
use super::shares::{DecryptionShare, LagrangeCoefficients, PlaintextTally};
use crate::dlog::DiscreteLog;
use crate::keyceremony::GuardianRecord;
use crate::tally::{CiphertextRecord, CiphertextTally, SubmittedBallot};
use crate::trustee::DecryptingTrustee;
use crate::types::{ElectionContext, GuardianId};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Collects available guardians, then decrypts with at least a quorum of
/// them, reconstructing the shares of the rest
pub struct DecryptionMediator {
    context: ElectionContext,
    guardian_records: BTreeMap<GuardianId, GuardianRecord>,
    tally: CiphertextTally,
    ballots: Vec<SubmittedBallot>,
    available: BTreeMap<GuardianId, Box<dyn DecryptingTrustee>>,
    tally_shares: BTreeMap<GuardianId, DecryptionShare>,
    /// Ballot id to guardian id to share
    ballot_shares: BTreeMap<String, BTreeMap<GuardianId, DecryptionShare>>,
    dlog: DiscreteLog,
}

impl DecryptionMediator {
    pub fn new(
        context: ElectionContext,
        guardian_records: Vec<GuardianRecord>,
        tally: CiphertextTally,
        ballots: Vec<SubmittedBallot>,
    ) -> Result<Self> {
        if guardian_records.len() != context.number_of_guardians {
            return Err(Error::InvalidConfig(format!(
                "Expected {} guardian records, got {}",
                context.number_of_guardians,
                guardian_records.len()
            )));
        }
        let guardian_records: BTreeMap<_, _> = guardian_records
            .into_iter()
            .map(|r| (r.guardian_id.clone(), r))
            .collect();
        if guardian_records.len() != context.number_of_guardians {
            return Err(Error::InvalidConfig("Duplicate guardian records".into()));
        }

        let dlog = DiscreteLog::new(&context.group);
        Ok(Self {
            context,
            guardian_records,
            tally,
            ballots,
            available: BTreeMap::new(),
            tally_shares: BTreeMap::new(),
            ballot_shares: BTreeMap::new(),
            dlog,
        })
    }

    /// Register an available guardian and compute its shares of the tally
    /// and every ballot
    ///
    /// If any share fails the guardian is not registered and the error is
    /// returned; the caller may carry on treating it as missing.
    #[instrument(skip_all, fields(guardian_id = %trustee.id()))]
    pub fn announce(&mut self, trustee: Box<dyn DecryptingTrustee>) -> Result<()> {
        let id = trustee.id().to_string();
        if self.available.contains_key(&id) {
            warn!("Guardian already announced");
            return Ok(());
        }
        let record = self
            .guardian_records
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Unknown guardian '{}'", id)))?;
        if record.election_public_key != *trustee.election_public_key()
            || record.x_coordinate != trustee.x_coordinate()
        {
            return Err(Error::VerificationFailed(format!(
                "Guardian '{}' does not match its ceremony record",
                id
            )));
        }

        let tally_share = compute_decryption_share(trustee.as_ref(), &self.tally, &self.context)?;
        let ballot_shares =
            compute_decryption_shares_for_ballots(trustee.as_ref(), &self.ballots, &self.context)?;

        self.tally_shares.insert(id.clone(), tally_share);
        for (ballot_id, share) in ballot_shares {
            self.ballot_shares
                .entry(ballot_id)
                .or_default()
                .insert(id.clone(), share);
        }
        self.available.insert(id, trustee);

        info!(
            available = self.available.len(),
            quorum = self.context.quorum,
            "Guardian announced"
        );
        Ok(())
    }

    pub fn available_guardians(&self) -> Vec<GuardianId> {
        self.available.keys().cloned().collect()
    }

    pub fn missing_guardians(&self) -> Vec<GuardianId> {
        self.guardian_records
            .keys()
            .filter(|id| !self.available.contains_key(*id))
            .cloned()
            .collect()
    }

    fn check_quorum(&self) -> Result<()> {
        if self.available.len() < self.context.quorum {
            return Err(Error::ThresholdNotMet {
                required: self.context.quorum,
                actual: self.available.len(),
            });
        }
        Ok(())
    }

    fn lagrange_coefficients(&self) -> Result<LagrangeCoefficients> {
        let coordinates = self
            .available
            .iter()
            .map(|(id, trustee)| (id.clone(), trustee.x_coordinate()))
            .collect();
        compute_lagrange_coefficients(&self.context.group, &coordinates)
    }

    /// Shares for the missing guardians, rebuilt from compensated shares of
    /// every available guardian
    fn reconstruct_missing<R: CiphertextRecord + ?Sized>(
        &self,
        record: &R,
        lagrange_coefficients: &LagrangeCoefficients,
    ) -> Result<BTreeMap<GuardianId, DecryptionShare>> {
        let mut reconstructed = BTreeMap::new();
        for missing_id in self.missing_guardians() {
            let missing = &self.guardian_records[&missing_id];
            let mut compensated = BTreeMap::new();
            for (id, trustee) in &self.available {
                let share = compute_compensated_decryption_share(
                    trustee.as_ref(),
                    missing,
                    record,
                    &self.context,
                )?;
                compensated.insert(id.clone(), share);
            }
            let share = reconstruct_decryption_share(
                &self.context,
                missing,
                record,
                &compensated,
                lagrange_coefficients,
            )?;
            reconstructed.insert(missing_id, share);
        }
        Ok(reconstructed)
    }

    /// Decrypt the tally
    #[instrument(skip(self), fields(tally_id = %self.tally.object_id))]
    pub fn get_plaintext_tally(&self) -> Result<PlaintextTally> {
        self.check_quorum()?;
        let lagrange_coefficients = self.lagrange_coefficients()?;

        let mut shares = self.tally_shares.clone();
        shares.extend(self.reconstruct_missing(&self.tally, &lagrange_coefficients)?);

        let plaintext = decrypt_with_shares(
            &self.context,
            &self.tally,
            &self.guardian_records,
            &shares,
            &self.dlog,
        )?;
        info!(
            available = self.available.len(),
            missing = self.context.number_of_guardians - self.available.len(),
            "Tally decrypted"
        );
        Ok(plaintext)
    }

    /// Decrypt every spoiled ballot, keyed by ballot id
    #[instrument(skip(self), fields(ballots = self.ballots.len()))]
    pub fn decrypt_ballots(&self) -> Result<BTreeMap<String, PlaintextTally>> {
        self.check_quorum()?;
        let lagrange_coefficients = self.lagrange_coefficients()?;

        let mut decrypted = BTreeMap::new();
        for ballot in &self.ballots {
            let mut shares = self
                .ballot_shares
                .get(&ballot.object_id)
                .cloned()
                .unwrap_or_default();
            shares.extend(self.reconstruct_missing(ballot, &lagrange_coefficients)?);

            let plaintext = decrypt_with_shares(
                &self.context,
                ballot,
                &self.guardian_records,
                &shares,
                &self.dlog,
            )?;
            decrypted.insert(ballot.object_id.clone(), plaintext);
        }
        Ok(decrypted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Group;
    use crate::keyceremony::{Guardian, KeyCeremonyMediator, KeyCeremonyResults};
    use crate::tally::PlaintextVotes;
    use crate::trustee::KeyCeremonyTrustee;
    use crate::types::CeremonyConfig;
    use crate::decryption::{
        CompensatedDecryptionShare, DecryptingGuardian, SelectionDecryptionShare,
    };
    use crate::proofs::ChaumPedersenProof;

    struct Election {
        context: ElectionContext,
        results: KeyCeremonyResults,
        trustees: Vec<DecryptingGuardian>,
        tally: CiphertextTally,
        ballots: Vec<SubmittedBallot>,
        expected: PlaintextVotes,
    }

    fn votes(entries: &[(&str, &str, u64)]) -> PlaintextVotes {
        let mut votes = PlaintextVotes::new();
        for (contest, selection, count) in entries {
            votes
                .entry(contest.to_string())
                .or_default()
                .insert(selection.to_string(), *count);
        }
        votes
    }

    fn election(n: usize, k: usize) -> Election {
        let group = Group::reduced();
        let config = CeremonyConfig::new(n, k).unwrap();
        let mut guardians: Vec<Guardian> = (1..=n)
            .map(|i| Guardian::new(&group, format!("guardian-{}", i), i as u32, &config, None).unwrap())
            .collect();

        let trustees: Vec<&mut dyn KeyCeremonyTrustee> = guardians
            .iter_mut()
            .map(|g| g as &mut dyn KeyCeremonyTrustee)
            .collect();
        let results = KeyCeremonyMediator::new(&group, &config, trustees)
            .unwrap()
            .run()
            .unwrap();
        let context = results.election_context(&group, group.q_from_u64(42));

        let cast = [
            votes(&[("mayor", "alice", 1), ("mayor", "bob", 0), ("measure", "yes", 1)]),
            votes(&[("mayor", "alice", 0), ("mayor", "bob", 1), ("measure", "yes", 1)]),
            votes(&[("mayor", "alice", 1), ("mayor", "bob", 0), ("measure", "yes", 0)]),
        ];
        let mut tally = CiphertextTally::new("tally");
        let mut ballots = Vec::new();
        for (i, ballot_votes) in cast.iter().enumerate() {
            let ballot = SubmittedBallot::encrypt(
                &group,
                format!("ballot-{}", i),
                ballot_votes,
                &context.elgamal_public_key,
            )
            .unwrap();
            tally.accumulate(&group, &ballot).unwrap();
            ballots.push(ballot);
        }

        let trustees = guardians
            .iter()
            .map(|g| g.decrypting_trustee().unwrap())
            .collect();

        Election {
            context,
            results,
            trustees,
            tally,
            // the first ballot is spoiled
            ballots: ballots.into_iter().take(1).collect(),
            expected: votes(&[("mayor", "alice", 2), ("mayor", "bob", 1), ("measure", "yes", 2)]),
        }
    }

    fn mediator(election: &Election, present: &[usize]) -> DecryptionMediator {
        let mut mediator = DecryptionMediator::new(
            election.context.clone(),
            election.results.guardian_records.clone(),
            election.tally.clone(),
            election.ballots.clone(),
        )
        .unwrap();
        for i in present {
            mediator
                .announce(Box::new(election.trustees[*i].clone()))
                .unwrap();
        }
        mediator
    }

    #[test]
    fn test_all_guardians_present() {
        let election = election(3, 2);
        let mediator = mediator(&election, &[0, 1, 2]);
        assert!(mediator.missing_guardians().is_empty());

        let plaintext = mediator.get_plaintext_tally().unwrap();
        assert_eq!(plaintext.counts(), election.expected);
    }

    #[test]
    fn test_missing_guardians_are_compensated() {
        let election = election(5, 3);
        let full = mediator(&election, &[0, 1, 2, 3, 4]);
        let partial = mediator(&election, &[0, 2, 4]);
        assert_eq!(partial.missing_guardians(), ["guardian-2", "guardian-4"]);

        let full_tally = full.get_plaintext_tally().unwrap();
        let partial_tally = partial.get_plaintext_tally().unwrap();
        assert_eq!(partial_tally.counts(), election.expected);
        assert_eq!(partial_tally.counts(), full_tally.counts());

        let spoiled = partial.decrypt_ballots().unwrap();
        assert_eq!(
            spoiled["ballot-0"].counts(),
            votes(&[("mayor", "alice", 1), ("mayor", "bob", 0), ("measure", "yes", 1)])
        );
    }

    fn records(election: &Election) -> BTreeMap<GuardianId, GuardianRecord> {
        election
            .results
            .guardian_records
            .iter()
            .map(|r| (r.guardian_id.clone(), r.clone()))
            .collect()
    }

    fn lagrange(election: &Election, available: &[usize]) -> LagrangeCoefficients {
        let coordinates = available
            .iter()
            .map(|i| {
                let trustee = &election.trustees[*i];
                (trustee.id().to_string(), trustee.x_coordinate())
            })
            .collect();
        compute_lagrange_coefficients(&election.context.group, &coordinates).unwrap()
    }

    /// Tally shares on behalf of guardian `missing` from each of `available`
    fn compensated(
        election: &Election,
        missing: usize,
        available: &[usize],
    ) -> BTreeMap<GuardianId, CompensatedDecryptionShare> {
        let record = &election.results.guardian_records[missing];
        available
            .iter()
            .map(|i| {
                let trustee = &election.trustees[*i];
                let share = compute_compensated_decryption_share(
                    trustee,
                    record,
                    &election.tally,
                    &election.context,
                )
                .unwrap();
                (trustee.id().to_string(), share)
            })
            .collect()
    }

    /// Direct tally shares from `present`, rebuilt ones for everyone else
    fn tally_shares(election: &Election, present: &[usize]) -> BTreeMap<GuardianId, DecryptionShare> {
        let lagrange = lagrange(election, present);
        election
            .trustees
            .iter()
            .enumerate()
            .map(|(i, trustee)| {
                let share = if present.contains(&i) {
                    compute_decryption_share(trustee, &election.tally, &election.context).unwrap()
                } else {
                    reconstruct_decryption_share(
                        &election.context,
                        &election.results.guardian_records[i],
                        &election.tally,
                        &compensated(election, i, present),
                        &lagrange,
                    )
                    .unwrap()
                };
                (trustee.id().to_string(), share)
            })
            .collect()
    }

    fn selection_mut<'a>(
        shares: &'a mut BTreeMap<GuardianId, DecryptionShare>,
        guardian_id: &str,
        contest_id: &str,
        selection_id: &str,
    ) -> &'a mut SelectionDecryptionShare {
        shares
            .get_mut(guardian_id)
            .and_then(|s| s.contests.get_mut(contest_id))
            .and_then(|c| c.selections.get_mut(selection_id))
            .unwrap()
    }

    #[test]
    fn test_reconstructed_share_matches_direct_share() {
        let election = election(4, 2);
        let record = &election.results.guardian_records[3];
        let direct =
            compute_decryption_share(&election.trustees[3], &election.tally, &election.context).unwrap();

        // a bare quorum, then one guardian more
        for available in [&[0, 2][..], &[0, 1, 2][..]] {
            let rebuilt = reconstruct_decryption_share(
                &election.context,
                record,
                &election.tally,
                &compensated(&election, 3, available),
                &lagrange(&election, available),
            )
            .unwrap();

            for (contest_id, selection_id, _) in election.tally.selections() {
                assert_eq!(
                    rebuilt.selection(contest_id, selection_id).unwrap().share,
                    direct.selection(contest_id, selection_id).unwrap().share
                );
            }
        }
    }

    #[test]
    fn test_reconstruction_needs_matching_coefficients() {
        let election = election(4, 2);
        let record = &election.results.guardian_records[3];
        let shares = compensated(&election, 3, &[0, 1]);

        for available in [&[0, 1, 2][..], &[0, 2][..]] {
            let err = reconstruct_decryption_share(
                &election.context,
                record,
                &election.tally,
                &shares,
                &lagrange(&election, available),
            )
            .unwrap_err();
            assert!(matches!(err, Error::VerificationFailed(_)));
        }

        // the missing guardian cannot stand in for itself
        let mut with_self = shares.clone();
        with_self.insert("guardian-4".into(), shares["guardian-1"].clone());
        let err = reconstruct_decryption_share(
            &election.context,
            record,
            &election.tally,
            &with_self,
            &lagrange(&election, &[0, 1, 3]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
    }

    #[test]
    fn test_decrypt_rejects_altered_reconstruction() {
        let election = election(3, 2);
        let group = &election.context.group;
        let records = records(&election);
        let dlog = DiscreteLog::new(group);
        let shares = tally_shares(&election, &[0, 1]);

        let plaintext =
            decrypt_with_shares(&election.context, &election.tally, &records, &shares, &dlog).unwrap();
        assert_eq!(plaintext.counts(), election.expected);

        let mut shifted = shares.clone();
        let selection = selection_mut(&mut shifted, "guardian-3", "mayor", "alice");
        selection.share = group
            .div_p(&selection.share, &group.g_pow_p(&group.one_q()))
            .unwrap();
        let err = decrypt_with_shares(&election.context, &election.tally, &records, &shifted, &dlog)
            .unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));

        let mut thinned = shares.clone();
        let selection = selection_mut(&mut thinned, "guardian-3", "mayor", "alice");
        selection.recovered_parts.as_mut().unwrap().remove("guardian-2");
        let err = decrypt_with_shares(&election.context, &election.tally, &records, &thinned, &dlog)
            .unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
    }

    #[test]
    fn test_decrypt_checks_published_keys() {
        let election = election(2, 2);
        let group = &election.context.group;
        let qbar = &election.context.crypto_extended_base_hash;
        let records = records(&election);
        let dlog = DiscreteLog::new(group);
        let shares = tally_shares(&election, &[0, 1]);

        // a key of the share's own choosing, with proofs valid under it
        let fake = group.rand_q();
        let mut forged = shares.clone();
        let share = forged.get_mut("guardian-1").unwrap();
        share.public_key = group.g_pow_p(&fake);
        for (contest_id, selection_id, ciphertext) in election.tally.selections() {
            let selection = share
                .contests
                .get_mut(contest_id)
                .and_then(|c| c.selections.get_mut(selection_id))
                .unwrap();
            selection.share = ciphertext.partial_decrypt(group, &fake);
            let proof =
                ChaumPedersenProof::prove(group, ciphertext, &fake, &selection.share, &group.rand_q(), qbar);
            assert!(proof.is_valid(group, ciphertext, &share.public_key, &selection.share, qbar));
            selection.proof = Some(proof);
        }
        let err = decrypt_with_shares(&election.context, &election.tally, &records, &forged, &dlog)
            .unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));

        let mut renamed = shares.clone();
        if let Some(share) = renamed.remove("guardian-2") {
            renamed.insert("guardian-9".into(), share);
        }
        let err = decrypt_with_shares(&election.context, &election.tally, &records, &renamed, &dlog)
            .unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
    }

    #[test]
    fn test_below_quorum_fails() {
        let election = election(5, 3);
        let mediator = mediator(&election, &[1, 3]);
        let err = mediator.get_plaintext_tally().unwrap_err();
        assert!(matches!(err, Error::ThresholdNotMet { required: 3, actual: 2 }));
        assert!(mediator.decrypt_ballots().is_err());
    }

    #[test]
    fn test_announce_rejects_unknown_and_mismatched() {
        let election = election(3, 2);
        let other = self::election(3, 2);
        let mut mediator = mediator(&election, &[]);

        // same id, different ceremony
        let err = mediator
            .announce(Box::new(other.trustees[0].clone()))
            .unwrap_err();
        assert!(matches!(err, Error::VerificationFailed(_)));
        assert!(mediator.available_guardians().is_empty());

        mediator.announce(Box::new(election.trustees[0].clone())).unwrap();
        mediator.announce(Box::new(election.trustees[0].clone())).unwrap();
        assert_eq!(mediator.available_guardians(), ["guardian-1"]);
    }
}
