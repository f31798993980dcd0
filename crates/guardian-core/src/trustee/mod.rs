//! Trustee interfaces: the only way mediators talk to guardians
//!
//! A trustee is either an in-process guardian ([`local`]) or a proxy for one
//! living elsewhere. An `Err` from any method means no usable answer came
//! back; protocol-level rejections travel inside the returned messages.

mod local;

use crate::decryption::{DecryptionProofRecovery, DecryptionProofTuple};
use crate::elgamal::Ciphertext;
use crate::group::{ElementModP, ElementModQ};
use crate::keyceremony::{
    PartialKeyBackup, PartialKeyChallengeResponse, PartialKeyVerification, PublicKeySet,
};
use crate::Result;

/// A guardian as seen by the [`KeyCeremonyMediator`](crate::keyceremony::KeyCeremonyMediator)
pub trait KeyCeremonyTrustee: Send {
    fn id(&self) -> &str;

    fn x_coordinate(&self) -> u32;

    fn send_public_keys(&mut self) -> Result<PublicKeySet>;

    /// `Ok(false)` if the trustee rejected the keys
    fn receive_public_keys(&mut self, keys: &PublicKeySet) -> Result<bool>;

    fn send_partial_key_backup(&mut self, designated_id: &str) -> Result<PartialKeyBackup>;

    fn verify_partial_key_backup(
        &mut self,
        backup: &PartialKeyBackup,
    ) -> Result<PartialKeyVerification>;

    fn send_backup_challenge_response(
        &mut self,
        designated_id: &str,
    ) -> Result<PartialKeyChallengeResponse>;

    fn send_joint_public_key(&mut self) -> Result<ElementModP>;
}

/// A guardian as seen by the [`DecryptionMediator`](crate::decryption::DecryptionMediator)
///
/// Results are positional: entry `i` belongs to `texts[i]`. Proof nonces are
/// chosen by the trustee itself.
pub trait DecryptingTrustee: Send + Sync {
    fn id(&self) -> &str;

    fn x_coordinate(&self) -> u32;

    fn election_public_key(&self) -> &ElementModP;

    fn partial_decrypt(
        &self,
        texts: &[Ciphertext],
        extended_base_hash: &ElementModQ,
    ) -> Result<Vec<DecryptionProofTuple>>;

    fn compensated_decrypt(
        &self,
        missing_guardian_id: &str,
        texts: &[Ciphertext],
        extended_base_hash: &ElementModQ,
    ) -> Result<Vec<DecryptionProofRecovery>>;
}
