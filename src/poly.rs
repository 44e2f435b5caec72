//! Polynomials with coefficients in GF(2^128) (spec C5 / 4.3).
//!
//! A [`Poly`] stores coefficients low-degree first and is kept
//! normalized (no trailing zero coefficients) by every public
//! operation. The zero polynomial normalizes to an empty coefficient
//! vector; its degree is `None`, never compared numerically against a
//! real degree.

use crate::error::{CoreError, CoreResult};
use crate::field::F;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poly {
    /// Low-degree first. Always normalized: no trailing `F::ZERO`.
    coeffs: Vec<F>,
}

impl Poly {
    pub fn zero() -> Poly {
        Poly { coeffs: vec![] }
    }

    pub fn one() -> Poly {
        Poly { coeffs: vec![F::ONE] }
    }

    /// `x` (degree 1, monic).
    pub fn x() -> Poly {
        Poly { coeffs: vec![F::ZERO, F::ONE] }
    }

    pub fn from_coeffs(coeffs: Vec<F>) -> Poly {
        let mut p = Poly { coeffs };
        p.normalize();
        p
    }

    pub fn constant(c: F) -> Poly {
        Poly::from_coeffs(vec![c])
    }

    fn normalize(&mut self) {
        while matches!(self.coeffs.last(), Some(c) if c.is_zero()) {
            self.coeffs.pop();
        }
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn coeffs(&self) -> &[F] {
        &self.coeffs
    }

    /// `None` represents -infinity, the degree of the zero polynomial.
    pub fn degree(&self) -> Option<usize> {
        if self.coeffs.is_empty() {
            None
        } else {
            Some(self.coeffs.len() - 1)
        }
    }

    pub fn leading_coeff(&self) -> F {
        *self.coeffs.last().unwrap_or(&F::ZERO)
    }

    pub fn coeff(&self, i: usize) -> F {
        self.coeffs.get(i).copied().unwrap_or(F::ZERO)
    }

    pub fn add(&self, rhs: &Poly) -> Poly {
        let n = self.coeffs.len().max(rhs.coeffs.len());
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            out.push(self.coeff(i).add(rhs.coeff(i)));
        }
        Poly::from_coeffs(out)
    }

    pub fn scale(&self, c: F) -> Poly {
        if c.is_zero() {
            return Poly::zero();
        }
        Poly::from_coeffs(self.coeffs.iter().map(|&v| v.mul(c)).collect())
    }

    pub fn mul(&self, rhs: &Poly) -> Poly {
        if self.is_zero() || rhs.is_zero() {
            return Poly::zero();
        }
        let mut out = vec![F::ZERO; self.coeffs.len() + rhs.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            if a.is_zero() {
                continue;
            }
            for (j, &b) in rhs.coeffs.iter().enumerate() {
                out[i + j] = out[i + j].add(a.mul(b));
            }
        }
        Poly::from_coeffs(out)
    }

    /// Long division in F: returns (quotient, remainder) with
    /// `deg(remainder) < deg(q)` and `self == q*quotient + remainder`.
    pub fn divmod(&self, divisor: &Poly) -> CoreResult<(Poly, Poly)> {
        if divisor.is_zero() {
            return Err(CoreError::Domain("polynomial division by zero".into()));
        }
        let dd = divisor.degree().unwrap();
        let lead_inv = divisor.leading_coeff().inv()?;

        let mut remainder = self.coeffs.clone();
        let mut quotient = vec![F::ZERO; remainder.len().saturating_sub(dd)];

        loop {
            // Trim trailing zeros from the working remainder to get its
            // true current degree.
            while matches!(remainder.last(), Some(c) if c.is_zero()) {
                remainder.pop();
            }
            let rd = match remainder.len() {
                0 => break,
                n => n - 1,
            };
            if rd < dd {
                break;
            }
            let shift = rd - dd;
            let factor = remainder[rd].mul(lead_inv);
            if shift >= quotient.len() {
                quotient.resize(shift + 1, F::ZERO);
            }
            quotient[shift] = quotient[shift].add(factor);
            for (j, &dc) in divisor.coeffs.iter().enumerate() {
                remainder[shift + j] = remainder[shift + j].add(factor.mul(dc));
            }
        }

        Ok((Poly::from_coeffs(quotient), Poly::from_coeffs(remainder)))
    }

    /// Divide every coefficient by the leading coefficient. `monic(0) = 0`.
    pub fn monic(&self) -> Poly {
        if self.is_zero() {
            return Poly::zero();
        }
        let inv = self.leading_coeff().inv().expect("leading coeff of a normalized nonzero poly is nonzero");
        self.scale(inv)
    }

    /// Euclidean GCD, returned monic. `gcd(0,0) = 0`.
    pub fn gcd(&self, rhs: &Poly) -> Poly {
        let mut a = self.clone();
        let mut b = rhs.clone();
        while !b.is_zero() {
            let (_, r) = a.divmod(&b).expect("divisor checked non-zero by loop condition");
            a = b;
            b = r;
        }
        a.monic()
    }

    pub fn pow(&self, mut e: u64) -> Poly {
        let mut base = self.clone();
        let mut acc = Poly::one();
        while e > 0 {
            if e & 1 == 1 {
                acc = acc.mul(&base);
            }
            base = base.mul(&base);
            e >>= 1;
        }
        acc
    }

    /// Repeated-squaring exponentiation modulo `m`, exponent given as an
    /// arbitrary-precision integer (DDF/EDF exponents run into the
    /// 2^128-scale range, spec 9's note on C6's use of big integers).
    pub fn powmod(&self, e: &BigUint, m: &Poly) -> CoreResult<Poly> {
        if m.is_zero() {
            return Err(CoreError::Domain("powmod modulus must be non-zero".into()));
        }
        let mut base = self.divmod(m)?.1;
        let mut acc = Poly::one();
        let mut e = e.clone();
        let two = BigUint::from(2u32);
        while !e.is_zero() {
            if &e % &two == BigUint::one() {
                acc = acc.mul(&base).divmod(m)?.1;
            }
            base = base.mul(&base).divmod(m)?.1;
            e >>= 1u32;
        }
        Ok(acc)
    }

    /// Formal derivative. Characteristic 2 kills every even-degree term.
    pub fn diff(&self) -> Poly {
        if self.coeffs.len() <= 1 {
            return Poly::zero();
        }
        let mut out = vec![F::ZERO; self.coeffs.len() - 1];
        for i in 1..self.coeffs.len() {
            if i % 2 == 1 {
                out[i - 1] = self.coeffs[i];
            }
        }
        Poly::from_coeffs(out)
    }

    /// Defined when every odd-degree coefficient is zero; `deg i` of the
    /// result is `gf_sqrt(p[2i])`.
    pub fn sqrt(&self) -> CoreResult<Poly> {
        for (i, &c) in self.coeffs.iter().enumerate() {
            if i % 2 == 1 && !c.is_zero() {
                return Err(CoreError::Domain(
                    "polynomial has a non-zero odd-degree coefficient; no square root".into(),
                ));
            }
        }
        let half_len = self.coeffs.len().div_ceil(2);
        let mut out = vec![F::ZERO; half_len];
        for i in 0..half_len {
            out[i] = self.coeff(2 * i).sqrt();
        }
        Ok(Poly::from_coeffs(out))
    }

    /// Lexicographic order: degree ascending, then by coefficients from
    /// the highest degree downward (numeric encoding).
    pub fn sort(mut polys: Vec<Poly>) -> Vec<Poly> {
        polys.sort_by(|a, b| compare(a, b));
        polys
    }
}

fn compare(a: &Poly, b: &Poly) -> Ordering {
    match (a.degree(), b.degree()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(da), Some(db)) => {
            da.cmp(&db).then_with(|| {
                for i in (0..=da).rev() {
                    match a.coeff(i).0.cmp(&b.coeff(i).0) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                Ordering::Equal
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(v: u128) -> F {
        F::new(v)
    }

    #[test]
    fn add_trims_trailing_zeros() {
        let a = Poly::from_coeffs(vec![c(1), c(2), c(3)]);
        let b = Poly::from_coeffs(vec![c(1), c(2), c(3)]);
        assert_eq!(a.add(&b), Poly::zero());
    }

    #[test]
    fn mul_degree_law() {
        let a = Poly::from_coeffs(vec![c(1), c(5)]); // deg 1
        let b = Poly::from_coeffs(vec![c(3), c(0), c(7)]); // deg 2
        let p = a.mul(&b);
        assert_eq!(p.degree(), Some(3));
    }

    #[test]
    fn divmod_round_trip() {
        let p = Poly::from_coeffs(vec![c(9), c(1), c(8), c(4)]);
        let q = Poly::from_coeffs(vec![c(2), c(1)]);
        let (quot, rem) = p.divmod(&q).unwrap();
        let reconstructed = quot.mul(&q).add(&rem);
        assert_eq!(reconstructed, p);
        assert!(rem.degree().is_none() || rem.degree().unwrap() < q.degree().unwrap());
    }

    #[test]
    fn divmod_by_zero_is_domain_error() {
        let p = Poly::one();
        assert!(p.divmod(&Poly::zero()).is_err());
    }

    #[test]
    fn gcd_zero_zero_is_zero() {
        assert_eq!(Poly::zero().gcd(&Poly::zero()), Poly::zero());
    }

    #[test]
    fn gcd_with_zero_is_monic_self() {
        let p = Poly::from_coeffs(vec![c(5), c(9)]);
        assert_eq!(p.gcd(&Poly::zero()), p.monic());
    }

    #[test]
    fn monic_divides_out_leading_coeff() {
        let p = Poly::from_coeffs(vec![c(3), c(5), c(9)]);
        let m = p.monic();
        assert_eq!(m.leading_coeff(), F::ONE);
    }

    #[test]
    fn diff_kills_even_degree_terms() {
        // p = x^3 + x^2 + x + 1 -> diff = x^2*0 + ... only odd-index terms survive as coeff shifted down
        let p = Poly::from_coeffs(vec![c(1), c(1), c(1), c(1)]);
        let d = p.diff();
        // odd-degree coefficients of p are at index 1 and 3 -> contribute to d at index 0 and 2
        assert_eq!(d.coeff(0), c(1));
        assert_eq!(d.coeff(1), c(0));
        assert_eq!(d.coeff(2), c(1));
    }

    #[test]
    fn sqrt_of_square_round_trips() {
        let p = Poly::from_coeffs(vec![c(3), c(7), c(11)]);
        let squared = p.mul(&p);
        let root = squared.sqrt().unwrap();
        assert_eq!(root, p);
    }

    #[test]
    fn sqrt_rejects_odd_degree_coefficients() {
        let p = Poly::from_coeffs(vec![c(1), c(1)]); // x + 1, odd coeff at degree 1
        assert!(p.sqrt().is_err());
    }

    #[test]
    fn sort_orders_by_degree_then_high_coeffs() {
        let a = Poly::from_coeffs(vec![c(1)]); // degree 0
        let b = Poly::from_coeffs(vec![c(0), c(1)]); // degree 1
        let c1 = Poly::from_coeffs(vec![c(0), c(2)]); // degree 1, higher leading coeff
        let sorted = Poly::sort(vec![c1.clone(), b.clone(), a.clone()]);
        assert_eq!(sorted, vec![a, b, c1]);
    }

    #[test]
    fn powmod_matches_repeated_mul() {
        let p = Poly::from_coeffs(vec![c(1), c(1)]); // x + 1
        let m = Poly::from_coeffs(vec![c(1), c(0), c(0), c(1)]); // x^3 + 1
        let got = p.powmod(&BigUint::from(5u32), &m).unwrap();
        let want = p.pow(5).divmod(&m).unwrap().1;
        assert_eq!(got, want);
    }
}
