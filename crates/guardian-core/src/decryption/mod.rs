//! Decryption: per-guardian shares, compensation for missing guardians,
//! Lagrange reconstruction and recovery of plaintext counts
//!
//! Every selection is handled independently. With the `multi-thread`
//! feature the per-selection work runs on the rayon pool and is joined
//! before results are aggregated.

mod compute;
mod guardian;
mod mediator;
mod shares;

pub use compute::{
    compute_compensated_decryption_share, compute_decryption_share,
    compute_decryption_shares_for_ballots, compute_lagrange_coefficients, decrypt_with_shares,
    reconstruct_decryption_share,
};
pub use guardian::DecryptingGuardian;
pub use mediator::DecryptionMediator;
pub use shares::{
    CompensatedContestShare, CompensatedDecryptionShare, CompensatedSelectionShare,
    ContestDecryptionShare, DecryptionProofRecovery, DecryptionProofTuple, DecryptionShare,
    LagrangeCoefficients, PlaintextContest, PlaintextSelection, PlaintextTally,
    SelectionDecryptionShare,
};

/// Map `f` over `items`, in parallel when enabled; output order matches input
#[cfg(feature = "multi-thread")]
pub(crate) fn par_map<I, T, F>(items: &[I], f: F) -> Vec<T>
where
    I: Sync,
    T: Send,
    F: Fn(usize, &I) -> T + Sync + Send,
{
    use rayon::prelude::*;
    items
        .par_iter()
        .enumerate()
        .map(|(i, item)| f(i, item))
        .collect()
}

#[cfg(not(feature = "multi-thread"))]
pub(crate) fn par_map<I, T, F>(items: &[I], f: F) -> Vec<T>
where
    F: Fn(usize, &I) -> T,
{
    items.iter().enumerate().map(|(i, item)| f(i, item)).collect()
}
