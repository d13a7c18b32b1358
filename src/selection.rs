//! Selection rules for picking the "wanted" Ritz values.
//!
//! The implicit restart keeps the k Ritz values that the selection rule ranks
//! first and uses the remaining m − k as shifts, so the rule fully determines
//! which part of the spectrum the solver converges to. Each rule defines a
//! total order that places the wanted values at the front of a sorted list.
//!
//! Only the rules meaningful for real eigenvalues are provided: the symmetric
//! eigenproblem has a real spectrum, so the real/imaginary-part variants of
//! the general (non-symmetric) problem do not apply here.

use num_traits::Float;
use std::cmp::Ordering;

/// The part of the spectrum the solver targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    /// Eigenvalues of largest absolute value first.
    LargestMagnitude,
    /// Eigenvalues of largest (signed) value first.
    LargestAlgebraic,
    /// Eigenvalues of smallest absolute value first.
    SmallestMagnitude,
    /// Eigenvalues of smallest (signed) value first.
    SmallestAlgebraic,
    /// Both ends of the spectrum. The sort order is largest-algebraic; the
    /// sorted list is then interleaved (largest, smallest, 2nd largest,
    /// 2nd smallest, ...) so that any prefix is balanced across both ends.
    BothEnds,
}

impl SelectionRule {
    /// Compares two eigenvalue estimates under this rule.
    ///
    /// Returns `Less` when `a` is more wanted than `b`, so that sorting a
    /// slice ascending with this comparator places the wanted values first.
    /// The ordering is strict; equal values compare `Equal`, and a stable
    /// sort keeps their original relative order. Incomparable values (NaN)
    /// also compare `Equal` rather than poisoning the sort.
    pub fn cmp<T: Float>(self, a: T, b: T) -> Ordering {
        let ord = match self {
            SelectionRule::LargestMagnitude => b.abs().partial_cmp(&a.abs()),
            SelectionRule::LargestAlgebraic | SelectionRule::BothEnds => b.partial_cmp(&a),
            SelectionRule::SmallestMagnitude => a.abs().partial_cmp(&b.abs()),
            SelectionRule::SmallestAlgebraic => a.partial_cmp(&b),
        };
        ord.unwrap_or(Ordering::Equal)
    }
}

/// Reorders a largest-algebraic-sorted `(value, index)` list for `BothEnds`:
/// even positions take from the front (large values), odd positions from the
/// back (small values). The first k entries are then a valid wanted set for
/// any k up to the list length.
pub(crate) fn both_ends_reorder<T: Copy>(pairs: &mut [(T, usize)]) {
    let m = pairs.len();
    let sorted: Vec<(T, usize)> = pairs.to_vec();
    for i in 0..m {
        pairs[i] = if i % 2 == 0 {
            sorted[i / 2]
        } else {
            sorted[m - 1 - i / 2]
        };
    }
}
