//! Exponential ElGamal over the election group

use crate::dlog::DiscreteLog;
use crate::group::{ElementModP, ElementModQ, Group};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An ElGamal secret key and its public key `G^s`
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ElGamalKeyPair {
    pub secret_key: ElementModQ,
    #[zeroize(skip)]
    pub public_key: ElementModP,
}

impl ElGamalKeyPair {
    /// Derive the key pair for a non-zero secret
    pub fn from_secret(group: &Group, secret_key: ElementModQ) -> Result<Self> {
        if secret_key.is_zero() || !group.is_in_bounds_q(&secret_key) {
            return Err(Error::Crypto("ElGamal secret key must lie in [1, Q)".into()));
        }
        let public_key = group.g_pow_p(&secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }
}

impl fmt::Debug for ElGamalKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElGamalKeyPair")
            .field("secret_key", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// `(pad, data) = (G^r, G^m * K^r)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub pad: ElementModP,
    pub data: ElementModP,
}

impl Ciphertext {
    /// One guardian's share of the decryption: `pad^secret`
    pub fn partial_decrypt(&self, group: &Group, secret: &ElementModQ) -> ElementModP {
        group.pow_p(&self.pad, secret)
    }

    /// Recover the plaintext given the product of all partial decryptions
    ///
    /// Both `data` and `product` must lie in the order-Q subgroup.
    pub fn decrypt_known_product(
        &self,
        product: &ElementModP,
        dlog: &DiscreteLog,
    ) -> Result<u64> {
        let group = dlog.group();
        if !group.is_valid_residue(&self.data) || !group.is_valid_residue(product) {
            return Err(Error::VerificationFailed(
                "Ciphertext data or partial decryption product is not a group element".into(),
            ));
        }
        let g_m = group
            .div_p(&self.data, product)
            .ok_or_else(|| Error::Crypto("Partial decryption product is zero".into()))?;
        dlog.discrete_log(&g_m)
    }

    /// Decrypt with the full secret key
    pub fn decrypt(&self, secret_key: &ElementModQ, dlog: &DiscreteLog) -> Result<u64> {
        let product = self.partial_decrypt(dlog.group(), secret_key);
        self.decrypt_known_product(&product, dlog)
    }
}

/// Encrypt the count `message` under `public_key` with the given nonce
pub fn encrypt(
    group: &Group,
    message: u64,
    nonce: &ElementModQ,
    public_key: &ElementModP,
) -> Result<Ciphertext> {
    if nonce.is_zero() {
        return Err(Error::Crypto("ElGamal nonce must be non-zero".into()));
    }
    let pad = group.g_pow_p(nonce);
    let g_m = group.g_pow_p(&group.q_from_u64(message));
    let data = group.mult_p(&g_m, &group.pow_p(public_key, nonce));
    Ok(Ciphertext { pad, data })
}

/// Homomorphic sum: component-wise product of the ciphertexts
pub fn add<'a, I>(group: &Group, ciphertexts: I) -> Ciphertext
where
    I: IntoIterator<Item = &'a Ciphertext>,
{
    ciphertexts.into_iter().fold(
        Ciphertext {
            pad: group.one_p(),
            data: group.one_p(),
        },
        |acc, c| Ciphertext {
            pad: group.mult_p(&acc.pad, &c.pad),
            data: group.mult_p(&acc.data, &c.data),
        },
    )
}

/// Joint key: product of the individual public keys
pub fn combine_public_keys<'a, I>(group: &Group, keys: I) -> ElementModP
where
    I: IntoIterator<Item = &'a ElementModP>,
{
    group.mult_p_all(keys)
}
