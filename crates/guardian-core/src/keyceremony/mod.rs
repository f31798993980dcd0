//! Threshold key ceremony
//!
//! Each [`Guardian`] holds a secret polynomial and an auxiliary key pair.
//! The [`KeyCeremonyMediator`] moves public keys, sealed backups and
//! verdicts between guardians until all of them agree on the joint key.

mod guardian;
mod mediator;
mod messages;
mod results;

pub use guardian::{CeremonyState, Guardian};
pub use mediator::{Disputes, KeyCeremonyMediator};
pub use messages::{
    verify_partial_key_challenge, PartialKeyBackup, PartialKeyChallengeResponse,
    PartialKeyVerification, PublicKeySet,
};
pub use results::{commitment_hash, GuardianRecord, KeyCeremonyResults};
