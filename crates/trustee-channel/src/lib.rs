//! Trustee Channel
//!
//! Message-passing implementations of the guardian trustee interfaces. Each
//! guardian lives on its own server thread and is reached only through JSON
//! request envelopes, so a mediator driving these proxies sees exactly what
//! it would see over a network link.

mod connection;
mod decrypting;
mod key_ceremony;
pub mod wire;

pub use connection::DEFAULT_QUEUE_DEPTH;
pub use decrypting::ChannelDecryptingTrustee;
pub use key_ceremony::ChannelKeyCeremonyTrustee;

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_core::decryption::DecryptionMediator;
    use guardian_core::keyceremony::{Guardian, KeyCeremonyMediator};
    use guardian_core::tally::{CiphertextTally, PlaintextVotes, SubmittedBallot};
    use guardian_core::{CeremonyConfig, DecryptingTrustee, Group, KeyCeremonyTrustee};

    fn votes(alice: u64, bob: u64) -> PlaintextVotes {
        let mut contest = std::collections::BTreeMap::new();
        contest.insert("alice".to_string(), alice);
        contest.insert("bob".to_string(), bob);
        let mut votes = PlaintextVotes::new();
        votes.insert("mayor".to_string(), contest);
        votes
    }

    #[test]
    fn test_ceremony_and_decryption_through_channels() {
        let group = Group::reduced();
        let config = CeremonyConfig::new(4, 3).unwrap();

        let mut proxies: Vec<ChannelKeyCeremonyTrustee> = (1..=4)
            .map(|i| {
                let guardian =
                    Guardian::new(&group, format!("guardian-{}", i), i, &config, None).unwrap();
                ChannelKeyCeremonyTrustee::spawn(guardian).unwrap()
            })
            .collect();

        let trustees = proxies
            .iter_mut()
            .map(|p| p as &mut dyn KeyCeremonyTrustee)
            .collect();
        let results = KeyCeremonyMediator::new(&group, &config, trustees)
            .unwrap()
            .run()
            .unwrap();

        let mut guardians: Vec<Guardian> = proxies
            .into_iter()
            .map(|p| p.shutdown().unwrap())
            .collect();
        for guardian in guardians.iter_mut() {
            assert_eq!(guardian.publish_joint_key().unwrap(), results.joint_public_key);
        }

        let context = results.election_context(&group, group.q_from_u64(7));
        let mut tally = CiphertextTally::new("tally");
        for (i, (alice, bob)) in [(1, 0), (0, 1), (1, 0)].into_iter().enumerate() {
            let ballot = SubmittedBallot::encrypt(
                &group,
                format!("ballot-{}", i),
                &votes(alice, bob),
                &context.elgamal_public_key,
            )
            .unwrap();
            tally.accumulate(&group, &ballot).unwrap();
        }

        let mut mediator = DecryptionMediator::new(
            context,
            results.guardian_records.clone(),
            tally,
            Vec::new(),
        )
        .unwrap();
        // guardian-2 stays away
        for guardian in guardians.iter().filter(|g| g.id() != "guardian-2") {
            let trustee = ChannelDecryptingTrustee::spawn(guardian.decrypting_trustee().unwrap()).unwrap();
            assert_eq!(trustee.election_public_key(), guardian.election_public_key());
            mediator.announce(Box::new(trustee)).unwrap();
        }
        assert_eq!(mediator.missing_guardians(), ["guardian-2"]);

        let plaintext = mediator.get_plaintext_tally().unwrap();
        assert_eq!(plaintext.counts(), votes(2, 1));
    }
}
