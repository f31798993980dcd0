//! # Guardian Core
//!
//! Threshold key ceremony and distributed decryption for election
//! guardians.
//!
//! This crate provides:
//! - Group arithmetic over a prime-order subgroup of `Z_p^*`
//! - Exponential ElGamal, Schnorr and Chaum-Pedersen proofs
//! - The key ceremony: per-guardian election polynomials, encrypted
//!   partial key backups, challenges and joint key agreement
//! - Decryption of tallies and spoiled ballots by any quorum of guardians,
//!   reconstructing the shares of missing guardians
//!
//! ## Protocol Overview
//!
//! Each of `N` guardians generates a polynomial of degree `K - 1` and
//! publishes commitments to its coefficients with Schnorr proofs. Every
//! guardian sends every other guardian its polynomial evaluated at their
//! x-coordinate, encrypted under their auxiliary key. The recipient checks
//! the value against the commitments. The joint election key is the product
//! of all guardians' constant-term keys.
//!
//! To decrypt, each available guardian produces `pad^{s_i}` with a
//! Chaum-Pedersen proof. For each missing guardian, the available ones
//! produce compensated shares from their backups, which are combined with
//! Lagrange coefficients at zero.
//!
//! ## Example
//!
//! ```rust,ignore
//! use guardian_core::{keyceremony::{Guardian, KeyCeremonyMediator}, CeremonyConfig, Group};
//!
//! let group = Group::standard();
//! let config = CeremonyConfig::new(5, 3)?;
//! let mut guardians = (1..=5)
//!     .map(|i| Guardian::new(&group, format!("guardian-{}", i), i, &config, None))
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! let trustees = guardians.iter_mut().map(|g| g as _).collect();
//! let results = KeyCeremonyMediator::new(&group, &config, trustees)?.run()?;
//! ```

pub mod auxiliary;
pub mod decryption;
pub mod dlog;
pub mod elgamal;
pub mod error;
pub mod group;
pub mod hash;
pub mod keyceremony;
pub mod nonces;
pub mod polynomial;
pub mod proofs;
pub mod tally;
pub mod trustee;
pub mod types;

pub use error::{Error, Result};
pub use group::{ElementModP, ElementModQ, Group};
pub use trustee::{DecryptingTrustee, KeyCeremonyTrustee};
pub use types::{CeremonyConfig, ElectionContext, GuardianId};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default quorum for a five-guardian setup
pub const DEFAULT_QUORUM: usize = 3;

/// Default number of guardians
pub const DEFAULT_GUARDIANS: usize = 5;
