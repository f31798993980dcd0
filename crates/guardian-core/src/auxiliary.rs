//! Auxiliary point-to-point encryption between guardians
//!
//! Partial key backups are sealed for their designated guardian with an
//! ephemeral X25519 key agreement, a BLAKE3-derived key and
//! ChaCha20-Poly1305. The caller supplies associated data binding the
//! ciphertext to its (generator, designated) pair.

use crate::{Error, Result};
use aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

const KDF_CONTEXT: &str = "guardian-ceremony 2024 auxiliary backup key";
const NONCE_LEN: usize = 12;

/// X25519 public key of a guardian's auxiliary key pair
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuxiliaryPublicKey(#[serde(with = "bytes_hex")] [u8; 32]);

impl AuxiliaryPublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for AuxiliaryPublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for AuxiliaryPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuxiliaryPublicKey({})", hex::encode(&self.0[..6]))
    }
}

/// A guardian's auxiliary key pair
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AuxiliaryKeyPair {
    #[serde(with = "bytes_hex")]
    secret: [u8; 32],
    #[zeroize(skip)]
    public_key: AuxiliaryPublicKey,
}

impl AuxiliaryKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public_key = AuxiliaryPublicKey(PublicKey::from(&secret).to_bytes());
        Self {
            secret: secret.to_bytes(),
            public_key,
        }
    }

    pub fn public_key(&self) -> AuxiliaryPublicKey {
        self.public_key
    }

    fn static_secret(&self) -> StaticSecret {
        StaticSecret::from(self.secret)
    }
}

impl fmt::Debug for AuxiliaryKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxiliaryKeyPair")
            .field("secret", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Sealed payload: the sender's ephemeral key, the AEAD nonce and the
/// ciphertext with its tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryCiphertext {
    pub ephemeral_public_key: AuxiliaryPublicKey,
    #[serde(with = "bytes_hex")]
    pub nonce: [u8; NONCE_LEN],
    #[serde(with = "bytes_hex")]
    pub ciphertext: Vec<u8>,
}

fn derive_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> [u8; 32] {
    let mut material = [0u8; 96];
    material[..32].copy_from_slice(shared);
    material[32..64].copy_from_slice(ephemeral);
    material[64..].copy_from_slice(recipient);
    let key = blake3::derive_key(KDF_CONTEXT, &material);
    material.zeroize();
    key
}

/// Seal `plaintext` for `recipient`
pub fn encrypt(
    recipient: &AuxiliaryPublicKey,
    plaintext: &[u8],
    associated_data: &[u8],
) -> Result<AuxiliaryCiphertext> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&PublicKey::from(recipient.0));
    if !shared.was_contributory() {
        return Err(Error::Crypto("Non-contributory auxiliary key agreement".into()));
    }

    let mut key = derive_key(shared.as_bytes(), &ephemeral_public, &recipient.0);
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| Error::Crypto(format!("Invalid AEAD key: {}", e)))?;
    key.zeroize();

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )
        .map_err(|_| Error::Crypto("Auxiliary encryption failed".into()))?;

    Ok(AuxiliaryCiphertext {
        ephemeral_public_key: AuxiliaryPublicKey(ephemeral_public),
        nonce,
        ciphertext,
    })
}

/// Open a payload sealed for `keypair`
pub fn decrypt(
    keypair: &AuxiliaryKeyPair,
    sealed: &AuxiliaryCiphertext,
    associated_data: &[u8],
) -> Result<Vec<u8>> {
    let shared = keypair
        .static_secret()
        .diffie_hellman(&PublicKey::from(sealed.ephemeral_public_key.0));

    let mut key = derive_key(
        shared.as_bytes(),
        &sealed.ephemeral_public_key.0,
        &keypair.public_key.0,
    );
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| Error::Crypto(format!("Invalid AEAD key: {}", e)))?;
    key.zeroize();

    cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: associated_data,
            },
        )
        .map_err(|_| Error::Crypto("Auxiliary decryption failed".into()))
}

/// Serde adapter for byte strings as lower-case hex
mod bytes_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        T::try_from(bytes).map_err(|_| serde::de::Error::custom("Invalid byte length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let recipient = AuxiliaryKeyPair::generate();
        let sealed = encrypt(&recipient.public_key(), b"coordinate", b"g1|g2").unwrap();
        let opened = decrypt(&recipient, &sealed, b"g1|g2").unwrap();
        assert_eq!(opened, b"coordinate");
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let recipient = AuxiliaryKeyPair::generate();
        let other = AuxiliaryKeyPair::generate();
        let sealed = encrypt(&recipient.public_key(), b"coordinate", b"g1|g2").unwrap();
        assert!(decrypt(&other, &sealed, b"g1|g2").is_err());
    }

    #[test]
    fn test_associated_data_is_bound() {
        let recipient = AuxiliaryKeyPair::generate();
        let sealed = encrypt(&recipient.public_key(), b"coordinate", b"g1|g2").unwrap();
        assert!(decrypt(&recipient, &sealed, b"g1|g3").is_err());
    }

    #[test]
    fn test_bit_flip_fails() {
        let recipient = AuxiliaryKeyPair::generate();
        let mut sealed = encrypt(&recipient.public_key(), b"coordinate", b"aad").unwrap();
        sealed.ciphertext[0] ^= 0x01;
        assert!(decrypt(&recipient, &sealed, b"aad").is_err());
    }

    #[test]
    fn test_keypair_serde() {
        let keypair = AuxiliaryKeyPair::generate();
        let json = serde_json::to_string(&keypair).unwrap();
        let restored: AuxiliaryKeyPair = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.public_key(), keypair.public_key());

        let sealed = encrypt(&keypair.public_key(), b"x", b"").unwrap();
        assert_eq!(decrypt(&restored, &sealed, b"").unwrap(), b"x");
    }
}
