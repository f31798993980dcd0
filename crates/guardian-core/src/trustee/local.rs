//! In-process trustees: direct calls on an owned guardian

use super::{DecryptingTrustee, KeyCeremonyTrustee};
use crate::decryption::{DecryptingGuardian, DecryptionProofRecovery, DecryptionProofTuple};
use crate::elgamal::Ciphertext;
use crate::group::{ElementModP, ElementModQ};
use crate::keyceremony::{
    Guardian, PartialKeyBackup, PartialKeyChallengeResponse, PartialKeyVerification, PublicKeySet,
};
use crate::Result;

impl KeyCeremonyTrustee for Guardian {
    fn id(&self) -> &str {
        Guardian::id(self)
    }

    fn x_coordinate(&self) -> u32 {
        Guardian::x_coordinate(self)
    }

    fn send_public_keys(&mut self) -> Result<PublicKeySet> {
        Ok(self.share_public_keys())
    }

    fn receive_public_keys(&mut self, keys: &PublicKeySet) -> Result<bool> {
        Ok(Guardian::receive_public_keys(self, keys))
    }

    fn send_partial_key_backup(&mut self, designated_id: &str) -> Result<PartialKeyBackup> {
        Ok(Guardian::send_partial_key_backup(self, designated_id))
    }

    fn verify_partial_key_backup(
        &mut self,
        backup: &PartialKeyBackup,
    ) -> Result<PartialKeyVerification> {
        Ok(Guardian::verify_partial_key_backup(self, backup))
    }

    fn send_backup_challenge_response(
        &mut self,
        designated_id: &str,
    ) -> Result<PartialKeyChallengeResponse> {
        Ok(Guardian::send_backup_challenge_response(self, designated_id))
    }

    fn send_joint_public_key(&mut self) -> Result<ElementModP> {
        self.publish_joint_key()
    }
}

impl DecryptingTrustee for DecryptingGuardian {
    fn id(&self) -> &str {
        DecryptingGuardian::id(self)
    }

    fn x_coordinate(&self) -> u32 {
        DecryptingGuardian::x_coordinate(self)
    }

    fn election_public_key(&self) -> &ElementModP {
        DecryptingGuardian::election_public_key(self)
    }

    fn partial_decrypt(
        &self,
        texts: &[Ciphertext],
        extended_base_hash: &ElementModQ,
    ) -> Result<Vec<DecryptionProofTuple>> {
        Ok(DecryptingGuardian::partial_decrypt(
            self,
            texts,
            extended_base_hash,
        ))
    }

    fn compensated_decrypt(
        &self,
        missing_guardian_id: &str,
        texts: &[Ciphertext],
        extended_base_hash: &ElementModQ,
    ) -> Result<Vec<DecryptionProofRecovery>> {
        DecryptingGuardian::compensated_decrypt(
            self,
            missing_guardian_id,
            texts,
            extended_base_hash,
        )
    }
}
