//! Polynomial factorization over GF(2^128): square-free, distinct-degree
//! and equal-degree factorization (spec C6 / 4.4).

use crate::error::{CoreError, CoreResult};
use crate::field::F;
use crate::poly::Poly;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::RngCore;

/// Square-free factorization: `f = prod(factor_i ^ exponent_i)`, each
/// `factor_i` monic and square-free, all distinct.
///
/// This also covers the characteristic-2 "f is a perfect square" case
/// spec 4.4 calls out separately: when `diff(f) == 0`, `gcd(f, diff(f))`
/// degenerates to `monic(f)` itself (our `Poly::gcd` already defines
/// `gcd(p, 0) = monic(p)`), which drives the loop below straight into
/// the "remainder is a square, take its root and double the exponents"
/// branch without a separate check.
pub fn sff(f: &Poly) -> CoreResult<Vec<(Poly, u64)>> {
    if f.is_zero() {
        return Err(CoreError::Domain("square-free factorization of the zero polynomial".into()));
    }
    sff_inner(&f.monic())
}

fn sff_inner(f: &Poly) -> CoreResult<Vec<(Poly, u64)>> {
    let mut result = vec![];
    let c = f.gcd(&f.diff());
    let (mut w, _) = f.divmod(&c)?;
    let mut c = c;
    let mut i: u64 = 1;

    while w != Poly::one() && !w.is_zero() {
        let y = w.gcd(&c);
        let (fac, _) = w.divmod(&y)?;
        if fac != Poly::one() {
            result.push((fac, i));
        }
        let (next_c, _) = c.divmod(&y)?;
        c = next_c;
        w = y;
        i += 1;
    }

    if c != Poly::one() && !c.is_zero() {
        let root = c.sqrt()?;
        for (fac, e) in sff_inner(&root)? {
            result.push((fac, e * 2));
        }
    }

    Ok(result)
}

/// Distinct-degree factorization of a square-free monic `f`: returns
/// `(factor_i, degree_i)` where `factor_i` is the product of every
/// irreducible factor of `f` with degree `degree_i`.
pub fn ddf(f: &Poly) -> CoreResult<Vec<(Poly, usize)>> {
    let mut result = vec![];
    let mut f_rem = f.monic();
    let mut h = Poly::x();
    let q_exp = two_pow_128();
    let mut d: usize = 0;

    loop {
        d += 1;
        match f_rem.degree() {
            None => break,
            Some(deg) if deg < 2 * d => break,
            _ => {}
        }

        h = h.powmod(&q_exp, &f_rem)?;
        let shifted = h.add(&Poly::x()); // h - x, addition is XOR in char 2
        let g = f_rem.gcd(&shifted);

        if matches!(g.degree(), Some(dg) if dg > 0) {
            result.push((g.clone(), d));
            let (quotient, _) = f_rem.divmod(&g)?;
            f_rem = quotient;
            h = h.divmod(&f_rem)?.1;
        }
    }

    if f_rem != Poly::one() && !f_rem.is_zero() {
        let deg = f_rem.degree().expect("checked non-zero above");
        result.push((f_rem, deg));
    }

    Ok(result)
}

fn two_pow_128() -> BigUint {
    BigUint::from(2u32).pow(128)
}

/// Equal-degree factorization (Cantor-Zassenhaus) of a square-free monic
/// `f` known to be a product of `r` irreducible factors of degree `d`.
///
/// `rng` is an injected randomness source (spec 4.4/9: EDF's randomness
/// must be a parameter, not a hidden global, so tests can replay runs).
pub fn edf(f: &Poly, d: usize, r: usize, rng: &mut dyn RngCore) -> CoreResult<Vec<Poly>> {
    if r == 0 {
        return Ok(vec![]);
    }
    let f = f.monic();
    if r == 1 {
        return Ok(vec![f]);
    }
    let n = f
        .degree()
        .ok_or_else(|| CoreError::Domain("equal-degree factorization of the zero polynomial".into()))?;
    if n == 0 {
        return Err(CoreError::Domain("equal-degree factorization needs deg(f) > 0".into()));
    }

    let q = two_pow_128();
    let mut factors = vec![f.clone()];
    let mut attempts: u64 = 0;
    const MAX_ATTEMPTS: u64 = 1_000_000;

    while factors.len() < r {
        attempts += 1;
        if attempts > MAX_ATTEMPTS {
            return Err(CoreError::NoSolution(
                "equal-degree factorization did not converge within the attempt budget".into(),
            ));
        }

        let h = random_poly_below_degree(n, rng);
        if h.is_zero() {
            continue;
        }

        let gcd_h_f = h.gcd(&f);
        let g = if gcd_h_f != Poly::one() {
            gcd_h_f
        } else {
            split_candidate(&h, d, &f, &q)?
        };

        let mut next_factors = Vec::with_capacity(factors.len());
        for u in factors {
            if u.degree() == Some(d) {
                next_factors.push(u);
                continue;
            }
            let gu = g.gcd(&u);
            if !gu.is_zero() && gu != Poly::one() && gu != u {
                let (quotient, _) = u.divmod(&gu)?;
                next_factors.push(gu);
                next_factors.push(quotient);
            } else {
                next_factors.push(u);
            }
        }
        factors = next_factors;
    }

    Ok(Poly::sort(factors))
}

/// The Cantor-Zassenhaus splitting polynomial for a random `h`.
///
/// When `q^d - 1` is divisible by 3 (true whenever `d` is even, since
/// `q = 2^128 ≡ 1 (mod 3)`, but computed generally rather than assumed),
/// raising `h` to `(q^d - 1)/3` forces it into the order-3 subgroup.
/// Otherwise — the case spec 4.4 and the redesign notes flag — fall back
/// to the trace polynomial `T(h) = h + h^q + ... + h^(q^(d-1)) mod f`,
/// which always has a 1-in-3-ish splitting chance in characteristic 2
/// regardless of the subgroup structure.
fn split_candidate(h: &Poly, d: usize, f: &Poly, q: &BigUint) -> CoreResult<Poly> {
    let qd = q.pow(d as u32);
    let three = BigUint::from(3u32);
    if (&qd - BigUint::one()) % &three == BigUint::zero() {
        let exponent = (&qd - BigUint::one()) / &three;
        let g = h.powmod(&exponent, f)?;
        Ok(g.add(&Poly::one()))
    } else {
        let mut term = h.divmod(f)?.1;
        let mut trace = term.clone();
        for _ in 1..d {
            term = term.powmod(q, f)?;
            trace = trace.add(&term);
        }
        Ok(trace)
    }
}

fn random_poly_below_degree(n: usize, rng: &mut dyn RngCore) -> Poly {
    let coeffs: Vec<F> = (0..n).map(|_| F::new(rng.next_u64() as u128 | ((rng.next_u64() as u128) << 64))).collect();
    Poly::from_coeffs(coeffs)
}
