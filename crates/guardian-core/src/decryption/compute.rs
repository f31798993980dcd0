//! Share computation, threshold reconstruction and final decryption

use super::par_map;
use super::shares::{
    CompensatedContestShare, CompensatedDecryptionShare, CompensatedSelectionShare,
    ContestDecryptionShare, DecryptionShare, LagrangeCoefficients, PlaintextContest,
    PlaintextSelection, PlaintextTally, SelectionDecryptionShare,
};
use crate::dlog::DiscreteLog;
use crate::elgamal::Ciphertext;
use crate::group::{ElementModP, ElementModQ, Group};
use crate::keyceremony::GuardianRecord;
use crate::polynomial::{evaluate_commitments, lagrange_coefficient};
use crate::tally::{CiphertextRecord, SubmittedBallot};
use crate::trustee::DecryptingTrustee;
use crate::types::{ElectionContext, GuardianId};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

fn record_texts<R: CiphertextRecord + ?Sized>(record: &R) -> (Vec<(String, String)>, Vec<Ciphertext>) {
    record
        .selections()
        .into_iter()
        .map(|(contest_id, selection_id, ciphertext)| {
            (
                (contest_id.to_string(), selection_id.to_string()),
                ciphertext.clone(),
            )
        })
        .unzip()
}

/// A guardian's share of every selection in `record`, each with a verified
/// Chaum-Pedersen proof
///
/// All or nothing: one bad selection fails the whole share.
#[instrument(skip_all, fields(guardian_id = %trustee.id(), object_id = %record.object_id()))]
pub fn compute_decryption_share<R: CiphertextRecord + ?Sized>(
    trustee: &dyn DecryptingTrustee,
    record: &R,
    context: &ElectionContext,
) -> Result<DecryptionShare> {
    let group = &context.group;
    let qbar = &context.crypto_extended_base_hash;
    let (keys, texts) = record_texts(record);

    let results = trustee.partial_decrypt(&texts, qbar)?;
    if results.len() != texts.len() {
        return Err(Error::transport(
            trustee.id(),
            format!("returned {} partial decryptions for {} selections", results.len(), texts.len()),
        ));
    }

    let public_key = trustee.election_public_key();
    let valid = par_map(&results, |i, result| {
        result
            .proof
            .is_valid(group, &texts[i], public_key, &result.partial_decryption, qbar)
    });
    if let Some(i) = valid.iter().position(|v| !v) {
        return Err(Error::VerificationFailed(format!(
            "Guardian '{}' share for selection '{}/{}' has an invalid proof",
            trustee.id(),
            keys[i].0,
            keys[i].1
        )));
    }

    let guardian_id = trustee.id().to_string();
    let mut contests = empty_contests(record, |contest_id| ContestDecryptionShare {
        object_id: contest_id.to_string(),
        guardian_id: guardian_id.clone(),
        selections: BTreeMap::new(),
    });
    for ((contest_id, selection_id), result) in keys.into_iter().zip(results) {
        if let Some(contest) = contests.get_mut(&contest_id) {
            contest.selections.insert(
                selection_id.clone(),
                SelectionDecryptionShare {
                    object_id: selection_id,
                    guardian_id: guardian_id.clone(),
                    share: result.partial_decryption,
                    proof: Some(result.proof),
                    recovered_parts: None,
                },
            );
        }
    }

    debug!(selections = texts.len(), "Decryption share computed");
    Ok(DecryptionShare {
        object_id: record.object_id().to_string(),
        guardian_id,
        public_key: public_key.clone(),
        contests,
    })
}

/// [`compute_decryption_share`] for each ballot, keyed by ballot id
pub fn compute_decryption_shares_for_ballots(
    trustee: &dyn DecryptingTrustee,
    ballots: &[SubmittedBallot],
    context: &ElectionContext,
) -> Result<BTreeMap<String, DecryptionShare>> {
    ballots
        .iter()
        .map(|ballot| {
            compute_decryption_share(trustee, ballot, context)
                .map(|share| (ballot.object_id.clone(), share))
        })
        .collect()
}

/// An available guardian's share of `record` on behalf of `missing`
///
/// Each proof is checked against the recovery key derived from the missing
/// guardian's published commitments at the available guardian's
/// x-coordinate.
#[instrument(skip_all, fields(
    guardian_id = %trustee.id(),
    missing_guardian_id = %missing.guardian_id,
    object_id = %record.object_id()
))]
pub fn compute_compensated_decryption_share<R: CiphertextRecord + ?Sized>(
    trustee: &dyn DecryptingTrustee,
    missing: &GuardianRecord,
    record: &R,
    context: &ElectionContext,
) -> Result<CompensatedDecryptionShare> {
    let group = &context.group;
    let qbar = &context.crypto_extended_base_hash;
    let (keys, texts) = record_texts(record);

    let results = trustee.compensated_decrypt(&missing.guardian_id, &texts, qbar)?;
    if results.len() != texts.len() {
        return Err(Error::transport(
            trustee.id(),
            format!(
                "returned {} compensated decryptions for {} selections",
                results.len(),
                texts.len()
            ),
        ));
    }

    let recovery_key = evaluate_commitments(
        group,
        trustee.x_coordinate(),
        &missing.coefficient_commitments,
    );
    if results.iter().any(|r| r.recovery_public_key != recovery_key) {
        return Err(Error::VerificationFailed(format!(
            "Guardian '{}' used a recovery key for '{}' that does not match the commitments",
            trustee.id(),
            missing.guardian_id
        )));
    }

    let valid = par_map(&results, |i, result| {
        result
            .proof
            .is_valid(group, &texts[i], &recovery_key, &result.partial_decryption, qbar)
    });
    if let Some(i) = valid.iter().position(|v| !v) {
        return Err(Error::VerificationFailed(format!(
            "Guardian '{}' compensated share for '{}' at selection '{}/{}' has an invalid proof",
            trustee.id(),
            missing.guardian_id,
            keys[i].0,
            keys[i].1
        )));
    }

    let guardian_id = trustee.id().to_string();
    let mut contests = empty_contests(record, |contest_id| CompensatedContestShare {
        object_id: contest_id.to_string(),
        guardian_id: guardian_id.clone(),
        missing_guardian_id: missing.guardian_id.clone(),
        selections: BTreeMap::new(),
    });
    for ((contest_id, selection_id), result) in keys.into_iter().zip(results) {
        if let Some(contest) = contests.get_mut(&contest_id) {
            contest.selections.insert(
                selection_id.clone(),
                CompensatedSelectionShare {
                    object_id: selection_id,
                    guardian_id: guardian_id.clone(),
                    missing_guardian_id: missing.guardian_id.clone(),
                    share: result.partial_decryption,
                    recovery_key: result.recovery_public_key,
                    proof: result.proof,
                },
            );
        }
    }

    Ok(CompensatedDecryptionShare {
        object_id: record.object_id().to_string(),
        guardian_id,
        missing_guardian_id: missing.guardian_id.clone(),
        public_key: trustee.election_public_key().clone(),
        contests,
    })
}

/// Lagrange weight of each available guardian over the available set
pub fn compute_lagrange_coefficients(
    group: &Group,
    available: &BTreeMap<GuardianId, u32>,
) -> Result<LagrangeCoefficients> {
    let degrees: Vec<u32> = available.values().copied().collect();
    available
        .iter()
        .map(|(id, x)| lagrange_coefficient(group, *x, &degrees).map(|w| (id.clone(), w)))
        .collect()
}

/// Rebuild a missing guardian's share from at least a quorum of
/// compensated shares: `M = ∏ M_{i,l}^{w_l}`
///
/// `lagrange_coefficients` must be computed over exactly the guardians that
/// sent `compensated_shares`.
#[instrument(skip_all, fields(missing_guardian_id = %missing.guardian_id, object_id = %record.object_id()))]
pub fn reconstruct_decryption_share<R: CiphertextRecord + ?Sized>(
    context: &ElectionContext,
    missing: &GuardianRecord,
    record: &R,
    compensated_shares: &BTreeMap<GuardianId, CompensatedDecryptionShare>,
    lagrange_coefficients: &LagrangeCoefficients,
) -> Result<DecryptionShare> {
    if compensated_shares.len() < context.quorum {
        return Err(Error::ThresholdNotMet {
            required: context.quorum,
            actual: compensated_shares.len(),
        });
    }
    if compensated_shares.contains_key(&missing.guardian_id) {
        return Err(Error::VerificationFailed(format!(
            "Guardian '{}' cannot compensate for itself",
            missing.guardian_id
        )));
    }
    if !compensated_shares.keys().eq(lagrange_coefficients.keys()) {
        return Err(Error::VerificationFailed(format!(
            "Lagrange coefficients for {:?} do not match compensated shares from {:?}",
            lagrange_coefficients.keys().collect::<Vec<_>>(),
            compensated_shares.keys().collect::<Vec<_>>()
        )));
    }
    for (guardian_id, share) in compensated_shares {
        if share.missing_guardian_id != missing.guardian_id {
            return Err(Error::VerificationFailed(format!(
                "Compensated share from '{}' is for '{}', not '{}'",
                guardian_id, share.missing_guardian_id, missing.guardian_id
            )));
        }
    }

    let group = &context.group;
    let mut contests = empty_contests(record, |contest_id| ContestDecryptionShare {
        object_id: contest_id.to_string(),
        guardian_id: missing.guardian_id.clone(),
        selections: BTreeMap::new(),
    });

    for (contest_id, selection_id, _) in record.selections() {
        let mut parts = BTreeMap::new();
        let mut share = group.one_p();
        for (guardian_id, compensated) in compensated_shares {
            let part = compensated
                .selection(contest_id, selection_id)
                .ok_or_else(|| {
                    Error::NotFound(format!(
                        "Compensated share from '{}' lacks selection '{}/{}'",
                        guardian_id, contest_id, selection_id
                    ))
                })?;
            let weight = &lagrange_coefficients[guardian_id];
            share = group.mult_p(&share, &group.pow_p(&part.share, weight));
            parts.insert(guardian_id.clone(), part.clone());
        }

        if let Some(contest) = contests.get_mut(contest_id) {
            contest.selections.insert(
                selection_id.to_string(),
                SelectionDecryptionShare {
                    object_id: selection_id.to_string(),
                    guardian_id: missing.guardian_id.clone(),
                    share,
                    proof: None,
                    recovered_parts: Some(parts),
                },
            );
        }
    }

    debug!(available = compensated_shares.len(), "Missing share reconstructed");
    Ok(DecryptionShare {
        object_id: record.object_id().to_string(),
        guardian_id: missing.guardian_id.clone(),
        public_key: missing.election_public_key.clone(),
        contests,
    })
}

/// Combine one share per guardian into plaintext counts
///
/// `shares` must hold exactly one share for each guardian in
/// `guardian_records`, and every share is checked against those records.
/// A direct share needs a proof under the guardian's published key. A
/// reconstructed share needs at least a quorum of parts, each proven under
/// the recovery key derived from the missing guardian's commitments, and
/// its value must equal the Lagrange combination of those parts.
#[instrument(skip_all, fields(object_id = %record.object_id()))]
pub fn decrypt_with_shares<R: CiphertextRecord + ?Sized>(
    context: &ElectionContext,
    record: &R,
    guardian_records: &BTreeMap<GuardianId, GuardianRecord>,
    shares: &BTreeMap<GuardianId, DecryptionShare>,
    dlog: &DiscreteLog,
) -> Result<PlaintextTally> {
    if shares.len() != context.number_of_guardians {
        return Err(Error::ThresholdNotMet {
            required: context.number_of_guardians,
            actual: shares.len(),
        });
    }
    if !shares.keys().eq(guardian_records.keys()) {
        return Err(Error::VerificationFailed(format!(
            "Shares from {:?} do not match the guardians {:?}",
            shares.keys().collect::<Vec<_>>(),
            guardian_records.keys().collect::<Vec<_>>()
        )));
    }
    if let Some((guardian_id, share)) = shares.iter().find(|(id, share)| share.guardian_id != **id) {
        return Err(Error::VerificationFailed(format!(
            "Share filed under '{}' belongs to '{}'",
            guardian_id, share.guardian_id
        )));
    }

    let group = &context.group;
    let qbar = &context.crypto_extended_base_hash;
    let checker = ShareChecker {
        group,
        qbar,
        quorum: context.quorum,
        records: guardian_records,
        recovery_keys: recovery_keys(group, guardian_records, shares),
    };
    let selections = record.selections();

    let decrypted = par_map(&selections, |_, (contest_id, selection_id, ciphertext)| {
        let mut product = group.one_p();
        for ((guardian_id, share), guardian) in shares.iter().zip(guardian_records.values()) {
            let selection = share.selection(contest_id, selection_id).ok_or_else(|| {
                Error::NotFound(format!(
                    "Share from '{}' lacks selection '{}/{}'",
                    guardian_id, contest_id, selection_id
                ))
            })?;
            if !checker.is_valid(ciphertext, guardian, selection) {
                return Err(Error::VerificationFailed(format!(
                    "Share from '{}' for selection '{}/{}' does not verify",
                    guardian_id, contest_id, selection_id
                )));
            }
            product = group.mult_p(&product, &selection.share);
        }

        let tally = ciphertext.decrypt_known_product(&product, dlog)?;
        Ok(PlaintextSelection {
            object_id: selection_id.to_string(),
            tally,
            value: group.g_pow_p(&group.q_from_u64(tally)),
            message: (*ciphertext).clone(),
        })
    });

    let mut contests = empty_contests(record, |contest_id| PlaintextContest {
        object_id: contest_id.to_string(),
        selections: BTreeMap::new(),
    });
    for ((contest_id, selection_id, _), result) in selections.iter().zip(decrypted) {
        let plaintext = result?;
        if let Some(contest) = contests.get_mut(*contest_id) {
            contest.selections.insert(selection_id.to_string(), plaintext);
        }
    }

    Ok(PlaintextTally {
        object_id: record.object_id().to_string(),
        contests,
    })
}

/// `G^{P_missing(x_available)}` keyed by `(missing, available)`, for every
/// guardian whose share contains reconstructed selections
fn recovery_keys(
    group: &Group,
    guardian_records: &BTreeMap<GuardianId, GuardianRecord>,
    shares: &BTreeMap<GuardianId, DecryptionShare>,
) -> BTreeMap<(GuardianId, GuardianId), ElementModP> {
    let mut keys = BTreeMap::new();
    for (missing_id, share) in shares {
        let reconstructed = share
            .contests
            .values()
            .flat_map(|contest| contest.selections.values())
            .any(|selection| selection.recovered_parts.is_some());
        let missing = match guardian_records.get(missing_id) {
            Some(missing) if reconstructed => missing,
            _ => continue,
        };
        for (available_id, available) in guardian_records {
            if available_id != missing_id {
                keys.insert(
                    (missing_id.clone(), available_id.clone()),
                    evaluate_commitments(group, available.x_coordinate, &missing.coefficient_commitments),
                );
            }
        }
    }
    keys
}

struct ShareChecker<'a> {
    group: &'a Group,
    qbar: &'a ElementModQ,
    quorum: usize,
    records: &'a BTreeMap<GuardianId, GuardianRecord>,
    recovery_keys: BTreeMap<(GuardianId, GuardianId), ElementModP>,
}

impl ShareChecker<'_> {
    fn is_valid(
        &self,
        ciphertext: &Ciphertext,
        guardian: &GuardianRecord,
        selection: &SelectionDecryptionShare,
    ) -> bool {
        match (&selection.proof, &selection.recovered_parts) {
            (Some(proof), None) => proof.is_valid(
                self.group,
                ciphertext,
                &guardian.election_public_key,
                &selection.share,
                self.qbar,
            ),
            (None, Some(parts)) => self.reconstruction_is_valid(ciphertext, guardian, selection, parts),
            _ => {
                warn!(guardian_id = %selection.guardian_id, "Share needs exactly one of proof or parts");
                false
            }
        }
    }

    fn reconstruction_is_valid(
        &self,
        ciphertext: &Ciphertext,
        missing: &GuardianRecord,
        selection: &SelectionDecryptionShare,
        parts: &BTreeMap<GuardianId, CompensatedSelectionShare>,
    ) -> bool {
        if parts.len() < self.quorum {
            warn!(guardian_id = %missing.guardian_id, parts = parts.len(), "Too few parts");
            return false;
        }

        let mut coordinates = Vec::with_capacity(parts.len());
        for (available_id, part) in parts {
            if part.guardian_id != *available_id || part.missing_guardian_id != missing.guardian_id {
                return false;
            }
            let key = match self
                .recovery_keys
                .get(&(missing.guardian_id.clone(), available_id.clone()))
            {
                Some(key) => key,
                None => return false,
            };
            if part.recovery_key != *key
                || !part.proof.is_valid(self.group, ciphertext, key, &part.share, self.qbar)
            {
                return false;
            }
            match self.records.get(available_id) {
                Some(record) => coordinates.push(record.x_coordinate),
                None => return false,
            }
        }

        let mut product = self.group.one_p();
        for (part, x) in parts.values().zip(&coordinates) {
            let weight = match lagrange_coefficient(self.group, *x, &coordinates) {
                Ok(weight) => weight,
                Err(_) => return false,
            };
            product = self.group.mult_p(&product, &self.group.pow_p(&part.share, &weight));
        }
        product == selection.share
    }
}

fn empty_contests<R, T, F>(record: &R, make: F) -> BTreeMap<String, T>
where
    R: CiphertextRecord + ?Sized,
    F: Fn(&str) -> T,
{
    record
        .contests()
        .keys()
        .map(|contest_id| (contest_id.clone(), make(contest_id)))
        .collect()
}
