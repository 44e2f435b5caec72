//! Batch-GCD RSA factoring (spec C9): recover shared prime factors across
//! a list of RSA moduli using a product tree / remainder tree (Bernstein's
//! algorithm) instead of a pairwise O(n^2) GCD sweep.
//!
//! If two moduli `n_i = p*r` and `n_j = q*r` were generated with a
//! careless RNG and happen to share a prime `r`, `gcd(n_i, n_j) = r`
//! factors both instantly. The batch form computes, for every `n_i`,
//! `gcd(n_i, product of all the other moduli)` in roughly `O(n log^2 n)`
//! big-integer operations total rather than `O(n^2)` pairwise GCDs.

use crate::error::{CoreError, CoreResult};
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::Zero;

/// A recovered factorization of one modulus into two nontrivial factors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factorization {
    pub p: BigUint,
    pub q: BigUint,
}

/// Bottom-up product tree: `levels[0]` is the input values, each
/// subsequent level pairs up its predecessor's entries by product, up to
/// a single root holding the product of everything.
fn product_tree(values: &[BigUint]) -> Vec<Vec<BigUint>> {
    let mut levels = vec![values.to_vec()];
    loop {
        let prev = levels.last().expect("levels always has at least one entry");
        if prev.len() == 1 {
            break;
        }
        let mut next = Vec::with_capacity(prev.len().div_ceil(2));
        for pair in prev.chunks(2) {
            if pair.len() == 2 {
                next.push(&pair[0] * &pair[1]);
            } else {
                next.push(pair[0].clone());
            }
        }
        levels.push(next);
    }
    levels
}

/// Top-down remainder tree: for every node `v` with product value `X_v`,
/// computes `R_v = (product of every leaf) mod X_v^2`. At the leaves,
/// `R_leaf / leaf` is `(product of every OTHER leaf) mod leaf`, because
/// `leaf` divides the full product exactly.
fn remainder_tree(levels: &[Vec<BigUint>]) -> Vec<BigUint> {
    let top = levels.len() - 1;
    let mut remainders: Vec<Vec<BigUint>> = vec![Vec::new(); levels.len()];
    remainders[top] = vec![levels[top][0].clone()];

    for level in (0..top).rev() {
        let parents = &remainders[level + 1];
        let children = &levels[level];
        let mut this_level = Vec::with_capacity(children.len());
        for (i, child) in children.iter().enumerate() {
            let parent_remainder = &parents[i / 2];
            let modulus = child * child;
            this_level.push(parent_remainder % &modulus);
        }
        remainders[level] = this_level;
    }
    remainders.into_iter().next().expect("level 0 always populated")
}

/// For every modulus, `gcd(modulus, product of every other modulus)`.
/// A result equal to `1` means that modulus shares no prime with any
/// other in the batch; a result equal to the modulus itself means two
/// (or more) inputs were fully identical.
pub fn batch_gcd(moduli: &[BigUint]) -> CoreResult<Vec<BigUint>> {
    if moduli.is_empty() {
        return Err(CoreError::Domain("batch GCD needs at least one modulus".into()));
    }
    if moduli.iter().any(|m| m.is_zero()) {
        return Err(CoreError::Domain("batch GCD moduli must be non-zero".into()));
    }

    let tree = product_tree(moduli);
    let remainders = remainder_tree(&tree);

    Ok(moduli
        .iter()
        .zip(remainders.iter())
        .map(|(n, r)| {
            let others_mod_n = (r / n) % n;
            others_mod_n.gcd(n)
        })
        .collect())
}

/// Run [`batch_gcd`] and turn every nontrivial shared factor into a full
/// `p * q = n` factorization. `None` for moduli where no shared prime was
/// found in this batch.
pub fn factor_via_shared_primes(moduli: &[BigUint]) -> CoreResult<Vec<Option<Factorization>>> {
    let shared = batch_gcd(moduli)?;
    Ok(moduli
        .iter()
        .zip(shared.iter())
        .map(|(n, g)| {
            if g.is_zero() || g == n || g == &BigUint::from(1u32) {
                None
            } else {
                Some(Factorization { p: g.clone(), q: n / g })
            }
        })
        .collect())
}
