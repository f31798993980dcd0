//! Election polynomial: a guardian's secret sharing polynomial
//!
//! A guardian with quorum `K` draws `K` random coefficients `a_0..a_{K-1}`
//! mod Q. `a_0` is its election secret key. Each coefficient is committed to
//! as `K_j = G^{a_j}` and accompanied by a Schnorr proof. Evaluating the
//! polynomial at another guardian's x-coordinate yields the backup that lets
//! that guardian stand in for this one at decryption time.

use crate::elgamal::ElGamalKeyPair;
use crate::group::{ElementModP, ElementModQ, Group};
use crate::nonces::Nonces;
use crate::proofs::SchnorrProof;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Largest valid guardian x-coordinate
pub const MAX_COORDINATE: u32 = 255;

/// Reject x-coordinates outside [1, 256)
pub fn validate_coordinate(x: u32) -> Result<()> {
    if (1..=MAX_COORDINATE).contains(&x) {
        Ok(())
    } else {
        Err(Error::InvalidCoordinate(x))
    }
}

#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ElectionPolynomial {
    coefficients: Vec<ElementModQ>,
    #[zeroize(skip)]
    proofs: Vec<SchnorrProof>,
}

impl ElectionPolynomial {
    /// Generate a polynomial of degree `quorum - 1`
    ///
    /// With a seed, coefficients and proof nonces come from a deterministic
    /// [`Nonces`] sequence; without one they are drawn from the OS generator.
    pub fn generate(group: &Group, quorum: usize, seed: Option<&ElementModQ>) -> Result<Self> {
        if quorum == 0 {
            return Err(Error::InvalidConfig("Quorum must be at least 1".into()));
        }

        let seeded = seed.map(|seed| {
            (
                Nonces::new(group, seed, Some("election-polynomial")),
                Nonces::new(group, seed, Some("coefficient-proof")),
            )
        });

        let mut coefficients = Vec::with_capacity(quorum);
        let mut proofs = Vec::with_capacity(quorum);
        for i in 0..quorum {
            let (coefficient, nonce) = match &seeded {
                Some((coefficient_nonces, proof_nonces)) => (
                    coefficient_nonces.get(group, i as u64),
                    proof_nonces.get(group, i as u64),
                ),
                None => (group.rand_q(), group.rand_q()),
            };
            let keypair = ElGamalKeyPair::from_secret(group, coefficient)?;
            proofs.push(SchnorrProof::prove(group, &keypair, &nonce));
            coefficients.push(keypair.secret_key.clone());
        }

        Ok(Self {
            coefficients,
            proofs,
        })
    }

    pub fn quorum(&self) -> usize {
        self.coefficients.len()
    }

    /// `K_j = G^{a_j}` for every coefficient, in order
    pub fn coefficient_commitments(&self) -> Vec<ElementModP> {
        self.proofs.iter().map(|p| p.public_key.clone()).collect()
    }

    pub fn coefficient_proofs(&self) -> &[SchnorrProof] {
        &self.proofs
    }

    /// `a_0`, the guardian's election secret key
    pub fn secret_key(&self) -> &ElementModQ {
        &self.coefficients[0]
    }

    /// `K_0`, the guardian's election public key
    pub fn public_key(&self) -> &ElementModP {
        &self.proofs[0].public_key
    }

    pub fn election_keypair(&self) -> ElGamalKeyPair {
        ElGamalKeyPair {
            secret_key: self.secret_key().clone(),
            public_key: self.public_key().clone(),
        }
    }

    /// `P(x) mod Q` by Horner's rule
    pub fn evaluate(&self, group: &Group, x: u32) -> Result<ElementModQ> {
        validate_coordinate(x)?;
        let x = group.q_from_u64(u64::from(x));
        let value = self
            .coefficients
            .iter()
            .rev()
            .fold(group.zero_q(), |acc, coefficient| {
                group.a_plus_bc_q(coefficient, &acc, &x)
            });
        Ok(value)
    }
}

impl fmt::Debug for ElectionPolynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElectionPolynomial")
            .field("quorum", &self.quorum())
            .field("coefficients", &"[REDACTED]")
            .finish()
    }
}

/// `∏ K_j^{x^j}`: the public image `G^{P(x)}` of the committed polynomial
pub fn evaluate_commitments(group: &Group, x: u32, commitments: &[ElementModP]) -> ElementModP {
    let x = group.q_from_u64(u64::from(x));
    let mut exponent = group.one_q();
    let mut result = group.one_p();
    for commitment in commitments {
        result = group.mult_p(&result, &group.pow_p(commitment, &exponent));
        exponent = group.mult_q(&exponent, &x);
    }
    result
}

/// Check a claimed `P(x)` against the commitments without knowing `P`
///
/// A coordinate outside [1, 256) cannot belong to any guardian and fails.
pub fn verify_polynomial_coordinate(
    group: &Group,
    coordinate: &ElementModQ,
    x: u32,
    commitments: &[ElementModP],
) -> bool {
    if validate_coordinate(x).is_err() {
        warn!(x, "Coordinate check against an invalid x-coordinate");
        return false;
    }
    if commitments.is_empty() || !group.is_in_bounds_q(coordinate) {
        return false;
    }
    group.g_pow_p(coordinate) == evaluate_commitments(group, x, commitments)
}

/// Lagrange basis coefficient at zero for `coordinate` over `degrees`
///
/// `w = ∏ d / ∏ (d - coordinate)` over every `d` in `degrees` other than
/// `coordinate` itself.
pub fn lagrange_coefficient(group: &Group, coordinate: u32, degrees: &[u32]) -> Result<ElementModQ> {
    validate_coordinate(coordinate)?;
    let x = group.q_from_u64(u64::from(coordinate));

    let mut numerator = group.one_q();
    let mut denominator = group.one_q();
    for &degree in degrees.iter().filter(|&&d| d != coordinate) {
        validate_coordinate(degree)?;
        let d = group.q_from_u64(u64::from(degree));
        numerator = group.mult_q(&numerator, &d);
        denominator = group.mult_q(&denominator, &group.sub_q(&d, &x));
    }

    group
        .div_q(&numerator, &denominator)
        .ok_or_else(|| Error::Crypto("Degenerate Lagrange denominator".into()))
}
