//! Arithmetic in the order-Q subgroup of Z_P^*
//!
//! Every other layer of the crate works on two element types:
//! [`ElementModP`] (group elements: public keys, commitments, ciphertexts)
//! and [`ElementModQ`] (exponents: secret keys, polynomial coefficients,
//! challenges). Both are plain values; all arithmetic goes through an
//! explicit [`Group`] so that the same code runs over the full-size and the
//! reduced parameter sets.

mod constants;

use crate::{Error, Result};
use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use zeroize::Zeroize;

/// An element of Z_P, normally a member of the order-Q subgroup
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementModP(#[serde(with = "biguint_hex")] BigUint);

/// An element of Z_Q
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementModQ(#[serde(with = "biguint_hex")] BigUint);

impl ElementModP {
    /// Underlying integer
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Upper-case big-endian hex
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0.to_bytes_be())
    }

    /// Prefix of the hex encoding, for logs
    pub fn to_short_string(&self) -> String {
        short(&self.to_hex())
    }

    /// Big-endian bytes left-padded to `width`
    pub fn to_bytes_be(&self, width: usize) -> Vec<u8> {
        pad_be(&self.0, width)
    }
}

impl ElementModQ {
    /// Underlying integer
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Upper-case big-endian hex
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0.to_bytes_be())
    }

    /// Prefix of the hex encoding, for logs
    pub fn to_short_string(&self) -> String {
        short(&self.to_hex())
    }

    /// Big-endian bytes left-padded to `width`
    pub fn to_bytes_be(&self, width: usize) -> Vec<u8> {
        pad_be(&self.0, width)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Debug for ElementModP {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementModP({})", self.to_short_string())
    }
}

impl fmt::Debug for ElementModQ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementModQ({})", self.to_short_string())
    }
}

impl Zeroize for ElementModQ {
    fn zeroize(&mut self) {
        // BigUint does not expose its limbs mutably; replacing the value
        // releases the old allocation.
        self.0 = BigUint::zero();
    }
}

fn short(hex: &str) -> String {
    if hex.len() <= 12 {
        hex.to_string()
    } else {
        format!("{}..", &hex[..12])
    }
}

fn pad_be(value: &BigUint, width: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= width {
        return bytes;
    }
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}

/// Parameters of a prime-order subgroup: `P = Q * R + 1`, `G^Q = 1 mod P`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GroupParameters", into = "GroupParameters")]
pub struct Group {
    name: String,
    p: BigUint,
    q: BigUint,
    r: BigUint,
    g: BigUint,
}

#[derive(Clone, Serialize, Deserialize)]
struct GroupParameters {
    name: String,
    #[serde(with = "biguint_hex")]
    p: BigUint,
    #[serde(with = "biguint_hex")]
    q: BigUint,
    #[serde(with = "biguint_hex")]
    g: BigUint,
}

impl TryFrom<GroupParameters> for Group {
    type Error = Error;

    fn try_from(params: GroupParameters) -> Result<Self> {
        Group::new(params.name, params.p, params.q, params.g)
    }
}

impl From<Group> for GroupParameters {
    fn from(group: Group) -> Self {
        GroupParameters {
            name: group.name,
            p: group.p,
            q: group.q,
            g: group.g,
        }
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("p_bits", &self.p.bits())
            .field("q_bits", &self.q.bits())
            .finish()
    }
}

static STANDARD: OnceLock<Group> = OnceLock::new();
static REDUCED: OnceLock<Group> = OnceLock::new();

impl Group {
    /// Build a group from explicit parameters, checking `Q | P - 1` and that
    /// `G` generates a subgroup of order `Q`
    pub fn new(name: impl Into<String>, p: BigUint, q: BigUint, g: BigUint) -> Result<Self> {
        let one = BigUint::one();
        if q <= one || p <= q {
            return Err(Error::InvalidConfig("Q must satisfy 1 < Q < P".into()));
        }
        let p_minus_one = &p - &one;
        if !p_minus_one.is_multiple_of(&q) {
            return Err(Error::InvalidConfig("Q does not divide P - 1".into()));
        }
        if g <= one || g >= p {
            return Err(Error::InvalidConfig("Generator out of range".into()));
        }
        if !g.modpow(&q, &p).is_one() {
            return Err(Error::InvalidConfig(
                "Generator does not have order Q".into(),
            ));
        }
        let r = p_minus_one / &q;

        Ok(Self {
            name: name.into(),
            p,
            q,
            r,
            g,
        })
    }

    /// 4096-bit production parameters with a 256-bit Q
    pub fn standard() -> Self {
        STANDARD
            .get_or_init(|| {
                Self::from_constants(
                    "standard-4096",
                    constants::STANDARD_P,
                    constants::STANDARD_Q,
                    constants::STANDARD_R,
                    constants::STANDARD_G,
                )
            })
            .clone()
    }

    /// 512-bit parameters with a 64-bit Q, for tests and simulations
    pub fn reduced() -> Self {
        REDUCED
            .get_or_init(|| {
                Self::from_constants(
                    "reduced-512",
                    constants::REDUCED_P,
                    constants::REDUCED_Q,
                    constants::REDUCED_R,
                    constants::REDUCED_G,
                )
            })
            .clone()
    }

    /// Look up a built-in group by name
    pub fn by_name(name: &str) -> Result<Self> {
        match name {
            "standard" | "standard-4096" => Ok(Self::standard()),
            "reduced" | "reduced-512" => Ok(Self::reduced()),
            other => Err(Error::InvalidConfig(format!("Unknown group '{}'", other))),
        }
    }

    fn from_constants(name: &str, p: &[&str], q: &[&str], r: &[&str], g: &[&str]) -> Self {
        let parse = |rows: &[&str]| {
            BigUint::parse_bytes(rows.concat().as_bytes(), 16).expect("valid group constant")
        };
        let group = Self::new(name, parse(p), parse(q), parse(g)).expect("valid group constant");
        debug_assert_eq!(group.r, parse(r));
        group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    pub fn r(&self) -> &BigUint {
        &self.r
    }

    /// Width of a fixed-size big-endian encoding of an element mod P
    pub fn p_byte_len(&self) -> usize {
        self.p.bits().div_ceil(8) as usize
    }

    /// Width of a fixed-size big-endian encoding of an element mod Q
    pub fn q_byte_len(&self) -> usize {
        self.q.bits().div_ceil(8) as usize
    }

    pub fn generator(&self) -> ElementModP {
        ElementModP(self.g.clone())
    }

    pub fn one_p(&self) -> ElementModP {
        ElementModP(BigUint::one())
    }

    pub fn zero_q(&self) -> ElementModQ {
        ElementModQ(BigUint::zero())
    }

    pub fn one_q(&self) -> ElementModQ {
        ElementModQ(BigUint::one())
    }

    /// Accept `value` as an element mod Q if it is in range
    pub fn element_mod_q(&self, value: BigUint) -> Option<ElementModQ> {
        (value < self.q).then_some(ElementModQ(value))
    }

    /// Reduce an arbitrary integer mod Q
    pub fn reduce_q(&self, value: &BigUint) -> ElementModQ {
        ElementModQ(value % &self.q)
    }

    pub fn q_from_u64(&self, value: u64) -> ElementModQ {
        self.reduce_q(&BigUint::from(value))
    }

    /// Parse big-endian hex into an element mod Q
    pub fn hex_to_q(&self, hex: &str) -> Option<ElementModQ> {
        let bytes = hex::decode(hex).ok()?;
        self.element_mod_q(BigUint::from_bytes_be(&bytes))
    }

    /// Parse big-endian bytes into an element mod Q
    pub fn bytes_to_q(&self, bytes: &[u8]) -> Option<ElementModQ> {
        self.element_mod_q(BigUint::from_bytes_be(bytes))
    }

    // Z_Q

    pub fn add_q(&self, a: &ElementModQ, b: &ElementModQ) -> ElementModQ {
        ElementModQ((&a.0 + &b.0) % &self.q)
    }

    pub fn sub_q(&self, a: &ElementModQ, b: &ElementModQ) -> ElementModQ {
        ElementModQ((&a.0 + &self.q - (&b.0 % &self.q)) % &self.q)
    }

    pub fn mult_q(&self, a: &ElementModQ, b: &ElementModQ) -> ElementModQ {
        ElementModQ((&a.0 * &b.0) % &self.q)
    }

    pub fn negate_q(&self, a: &ElementModQ) -> ElementModQ {
        self.sub_q(&self.zero_q(), a)
    }

    /// `a + b * c mod Q`
    pub fn a_plus_bc_q(&self, a: &ElementModQ, b: &ElementModQ, c: &ElementModQ) -> ElementModQ {
        ElementModQ((&a.0 + &b.0 * &c.0) % &self.q)
    }

    /// Multiplicative inverse mod the prime Q; `None` for zero
    pub fn inverse_q(&self, a: &ElementModQ) -> Option<ElementModQ> {
        if (&a.0 % &self.q).is_zero() {
            return None;
        }
        let exponent = &self.q - 2u32;
        Some(ElementModQ(a.0.modpow(&exponent, &self.q)))
    }

    pub fn div_q(&self, a: &ElementModQ, b: &ElementModQ) -> Option<ElementModQ> {
        self.inverse_q(b).map(|inv| self.mult_q(a, &inv))
    }

    // Z_P

    pub fn mult_p(&self, a: &ElementModP, b: &ElementModP) -> ElementModP {
        ElementModP((&a.0 * &b.0) % &self.p)
    }

    /// Product of all elements; the empty product is one
    pub fn mult_p_all<'a, I>(&self, elements: I) -> ElementModP
    where
        I: IntoIterator<Item = &'a ElementModP>,
    {
        elements
            .into_iter()
            .fold(self.one_p(), |acc, e| self.mult_p(&acc, e))
    }

    pub fn pow_p(&self, base: &ElementModP, exponent: &ElementModQ) -> ElementModP {
        ElementModP(base.0.modpow(&exponent.0, &self.p))
    }

    /// `G^exponent mod P`
    pub fn g_pow_p(&self, exponent: &ElementModQ) -> ElementModP {
        ElementModP(self.g.modpow(&exponent.0, &self.p))
    }

    /// Multiplicative inverse mod the prime P; `None` for zero
    pub fn inverse_p(&self, a: &ElementModP) -> Option<ElementModP> {
        if (&a.0 % &self.p).is_zero() {
            return None;
        }
        let exponent = &self.p - 2u32;
        Some(ElementModP(a.0.modpow(&exponent, &self.p)))
    }

    pub fn div_p(&self, a: &ElementModP, b: &ElementModP) -> Option<ElementModP> {
        self.inverse_p(b).map(|inv| self.mult_p(a, &inv))
    }

    // Randomness

    /// Uniform element of [1, Q) from the OS generator
    pub fn rand_q(&self) -> ElementModQ {
        self.rand_q_with(&mut OsRng)
    }

    /// Uniform element of [1, Q) from a caller-supplied generator
    pub fn rand_q_with<R: RngCore + CryptoRng>(&self, rng: &mut R) -> ElementModQ {
        ElementModQ(rng.gen_biguint_range(&BigUint::one(), &self.q))
    }

    // Validation

    /// `0 < a < P` and `a^Q = 1`, i.e. `a` lies in the order-Q subgroup
    pub fn is_valid_residue(&self, a: &ElementModP) -> bool {
        !a.0.is_zero() && a.0 < self.p && a.0.modpow(&self.q, &self.p).is_one()
    }

    pub fn is_in_bounds_q(&self, a: &ElementModQ) -> bool {
        a.0 < self.q
    }
}

/// Serde adapter encoding a [`BigUint`] as upper-case big-endian hex
///
/// Decoding has no group at hand and does not range-check. Values from the
/// wire are checked where they are used. Proofs check their elements with
/// [`Group::is_valid_residue`] and [`Group::is_in_bounds_q`]. Decryption
/// checks ciphertext data and share products before dividing.
pub(crate) mod biguint_hex {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode_upper(value.to_bytes_be()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Ok(BigUint::from_bytes_be(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_groups_are_consistent() {
        for group in [Group::reduced(), Group::standard()] {
            assert_eq!(group.p(), &(group.q() * group.r() + 1u32));
            assert!(group.is_valid_residue(&group.generator()));
        }
        assert_eq!(Group::reduced().q_byte_len(), 8);
        assert_eq!(Group::standard().p_byte_len(), 512);
    }

    #[test]
    fn test_new_rejects_bad_generator() {
        let group = Group::reduced();
        // 1 has order 1, not Q
        let result = Group::new("bad", group.p().clone(), group.q().clone(), BigUint::one());
        assert!(result.is_err());

        let result = Group::new(
            "bad",
            group.p().clone(),
            group.q() + 2u32,
            group.generator().as_biguint().clone(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_q_arithmetic() {
        let group = Group::reduced();
        let a = group.rand_q();
        let b = group.rand_q();

        assert_eq!(group.sub_q(&group.add_q(&a, &b), &b), a);
        assert_eq!(group.add_q(&a, &group.negate_q(&a)), group.zero_q());

        let inv = group.inverse_q(&a).unwrap();
        assert_eq!(group.mult_q(&a, &inv), group.one_q());
        assert!(group.inverse_q(&group.zero_q()).is_none());

        let c = group.rand_q();
        assert_eq!(
            group.a_plus_bc_q(&a, &b, &c),
            group.add_q(&a, &group.mult_q(&b, &c))
        );
    }

    #[test]
    fn test_p_arithmetic() {
        let group = Group::reduced();
        let a = group.rand_q();
        let b = group.rand_q();

        let ga = group.g_pow_p(&a);
        let gb = group.g_pow_p(&b);
        assert_eq!(group.mult_p(&ga, &gb), group.g_pow_p(&group.add_q(&a, &b)));
        assert_eq!(group.div_p(&ga, &ga).unwrap(), group.one_p());
        assert!(group.is_valid_residue(&ga));
        assert!(!group.is_valid_residue(&ElementModP(BigUint::zero())));
    }

    #[test]
    fn test_group_serde_validates() {
        let group = Group::reduced();
        let json = serde_json::to_string(&group).unwrap();
        let parsed: Group = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, group);

        let tampered = json.replace(&group.generator().to_hex(), "02");
        assert!(serde_json::from_str::<Group>(&tampered).is_err());
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        use rand_chacha::ChaCha20Rng;
        use rand_core::SeedableRng;

        let group = Group::reduced();
        let a = group.rand_q_with(&mut ChaCha20Rng::seed_from_u64(11));
        let b = group.rand_q_with(&mut ChaCha20Rng::seed_from_u64(11));
        assert_eq!(a, b);
        assert!(!a.is_zero());
        assert!(group.is_in_bounds_q(&a));
    }

    #[test]
    fn test_hex_round_trip() {
        let group = Group::reduced();
        let a = group.rand_q();
        assert_eq!(group.hex_to_q(&a.to_hex()), Some(a.clone()));
        assert_eq!(a.to_bytes_be(group.q_byte_len()).len(), group.q_byte_len());
    }
}
