//! Error types for guardian key ceremony and decryption operations

use thiserror::Error;

/// Result type alias for guardian operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during the key ceremony or decryption.
///
/// Cryptographic mismatches found while checking another guardian's data are
/// not errors: they travel in-band on the protocol messages so the mediator can
/// run the challenge round. An `Err` means the operation itself could not be
/// carried out.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid ceremony or group configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A guardian x-coordinate outside [1, 256)
    #[error("Invalid x-coordinate: {0}")]
    InvalidCoordinate(u32),

    /// Quorum requirements not met
    #[error("Quorum not met: required {required}, got {actual}")]
    ThresholdNotMet { required: usize, actual: usize },

    /// A proof or share did not verify where verification is mandatory
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// No usable response from a trustee
    #[error("Trustee '{trustee}' unavailable: {reason}")]
    Transport { trustee: String, reason: String },

    /// A key ceremony round could not complete
    #[error("Key ceremony round {round} failed: {reason}")]
    CeremonyFailed { round: u8, reason: String },

    /// Guardians computed different joint public keys
    #[error("Guardians disagree on the joint public key")]
    JointKeyMismatch,

    /// A guardian, backup or record that should exist is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a [`Error::Transport`] naming the trustee
    pub fn transport(trustee: impl Into<String>, reason: impl ToString) -> Self {
        Error::Transport {
            trustee: trustee.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn round(round: u8, reason: impl Into<String>) -> Self {
        Error::CeremonyFailed {
            round,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
