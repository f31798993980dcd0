//! Non-interactive zero-knowledge proofs
//!
//! - [`SchnorrProof`]: knowledge of the secret behind a public key
//! - [`ChaumPedersenProof`]: a partial decryption used the same secret as a
//!   given public key

mod chaum_pedersen;
mod schnorr;

pub use chaum_pedersen::ChaumPedersenProof;
pub use schnorr::SchnorrProof;
