//! Wire messages exchanged between proxies and trustee servers
//!
//! Every request and response travels as a JSON [`Envelope`]; the response
//! echoes the request id so a proxy can reject stray replies.

use guardian_core::decryption::{DecryptionProofRecovery, DecryptionProofTuple};
use guardian_core::elgamal::Ciphertext;
use guardian_core::keyceremony::{
    PartialKeyBackup, PartialKeyChallengeResponse, PartialKeyVerification, PublicKeySet,
};
use guardian_core::{ElementModP, ElementModQ, GuardianId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub request_id: Uuid,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            payload,
        }
    }

    /// Turn the payload into a reply carrying the same request id
    pub fn answer<R, F>(self, handle: F) -> Envelope<R>
    where
        F: FnOnce(T) -> R,
    {
        Envelope {
            request_id: self.request_id,
            payload: handle(self.payload),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyCeremonyRequest {
    SendPublicKeys,
    ReceivePublicKeys { keys: PublicKeySet },
    SendPartialKeyBackup { designated_id: GuardianId },
    VerifyPartialKeyBackup { backup: PartialKeyBackup },
    SendBackupChallengeResponse { designated_id: GuardianId },
    SendJointPublicKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyCeremonyResponse {
    PublicKeys { keys: PublicKeySet },
    Accepted { accepted: bool },
    Backup { backup: PartialKeyBackup },
    Verification { verification: PartialKeyVerification },
    ChallengeResponse { response: PartialKeyChallengeResponse },
    JointPublicKey { key: ElementModP },
    Error { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecryptingRequest {
    PartialDecrypt {
        texts: Vec<Ciphertext>,
        extended_base_hash: ElementModQ,
    },
    CompensatedDecrypt {
        missing_guardian_id: GuardianId,
        texts: Vec<Ciphertext>,
        extended_base_hash: ElementModQ,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecryptingResponse {
    PartialDecryptions { results: Vec<DecryptionProofTuple> },
    CompensatedDecryptions { results: Vec<DecryptionProofRecovery> },
    Error { reason: String },
}
