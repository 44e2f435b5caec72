//! GCM nonce-reuse key recovery and forgery (spec C7 / 4.5).
//!
//! When two messages are ever authenticated under the same `(key, nonce)`
//! pair, their tags share the same mask `S = AES_K(Y_0)`. Subtracting one
//! message's tag equation from the other's cancels `S` and leaves a
//! polynomial in `H` (the GHASH subkey) with `H` as a root. Finding that
//! root by factoring turns the recovery into an application of
//! [`crate::factor`] rather than a fresh piece of number theory.

use crate::error::{CoreError, CoreResult};
use crate::field::{self, F};
use crate::factor;
use crate::gcm;
use crate::poly::Poly;
use rand::RngCore;

/// One captured `(associated data, ciphertext, tag)` triple, all produced
/// under the same reused `(key, nonce)`.
#[derive(Clone, Debug)]
pub struct Capture {
    pub aad: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: [u8; 16],
}

/// The keystream material recovered from a nonce reuse: the GHASH subkey
/// `H` and the tag mask `S = AES_K(Y_0)`. Together these let us forge a
/// valid tag for any new ciphertext encrypted under the same nonce,
/// without ever learning the AES key itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveredKeystream {
    pub h: F,
    pub mask: F,
}

/// Build `G(X) = G_1(X) + G_2(X)`, the GHASH auth-block Horner expansion
/// of `capture` as a polynomial in the (unknown) subkey `X`, as a
/// low-degree-first [`Poly`]. `GHASH(H, A, C) = G(H)` by construction of
/// [`gcm::ghash`], so `H` is a root of `G_1(X) + G_2(X) + (T_1 + T_2)`.
fn ghash_poly(capture: &Capture) -> Poly {
    let blocks = gcm::auth_blocks(&capture.aad, &capture.ciphertext);
    let mut coeffs = vec![F::ZERO];
    coeffs.extend(blocks.into_iter().rev());
    Poly::from_coeffs(coeffs)
}

/// The polynomial whose roots include the reused subkey `H` (spec 4.5
/// step 2: `F(X) = G_1(X) + G_2(X) + T_1 + T_2`).
fn difference_poly(c1: &Capture, c2: &Capture) -> Poly {
    let t1 = field::block_to_field(&c1.tag);
    let t2 = field::block_to_field(&c2.tag);
    ghash_poly(c1).add(&ghash_poly(c2)).add(&Poly::constant(t1.add(t2)))
}

/// Enumerate every root of `f` by running square-free, distinct-degree
/// and equal-degree factorization and reading off the constant term of
/// each resulting linear factor (`x + c` has root `c` in characteristic 2).
fn roots(f: &Poly, rng: &mut dyn RngCore) -> CoreResult<Vec<F>> {
    let mut out = vec![];
    for (factor, exponent) in factor::sff(f)? {
        let _ = exponent; // a repeated root is still a single candidate to test
        for (group, degree) in factor::ddf(&factor)? {
            if degree != 1 {
                continue;
            }
            let r = group.degree().expect("non-zero group from ddf") / degree;
            for linear in factor::edf(&group, 1, r, rng)? {
                out.push(linear.coeff(0));
            }
        }
    }
    out.sort_by_key(|f| f.0);
    out.dedup();
    Ok(out)
}

/// Recover `(H, S)` from two nonce-reuse captures, disambiguating the
/// resulting root candidates against a third capture under the same
/// nonce (spec 4.5 step 4). Fails with [`CoreError::NoSolution`] if no
/// candidate reproduces the third tag, or [`CoreError::Ambiguous`] if
/// more than one does.
pub fn recover(c1: &Capture, c2: &Capture, verify: &Capture, rng: &mut dyn RngCore) -> CoreResult<RecoveredKeystream> {
    let f = difference_poly(c1, c2);
    if f.is_zero() {
        return Err(CoreError::NoSolution(
            "the two captures produced an identical GHASH equation; no information to recover H from".into(),
        ));
    }

    let candidates = roots(&f, rng)?;
    let t1 = field::block_to_field(&c1.tag);

    let mut matches = vec![];
    for h in candidates {
        let mask = t1.add(gcm::ghash(h, &c1.aad, &c1.ciphertext));
        if gcm::verify_with_mask(h, mask, &verify.aad, &verify.ciphertext, &verify.tag) {
            matches.push(RecoveredKeystream { h, mask });
        }
    }

    match matches.len() {
        0 => Err(CoreError::NoSolution(
            "no candidate subkey reproduced the verification capture's tag".into(),
        )),
        1 => Ok(matches[0]),
        n => Err(CoreError::Ambiguous(format!(
            "{n} distinct candidate subkeys all reproduced the verification capture's tag"
        ))),
    }
}

/// Forge a valid tag for `(aad, ciphertext)` under the keystream material
/// recovered by [`recover`], without ever learning the underlying AES key.
pub fn forge(recovered: RecoveredKeystream, aad: &[u8], ciphertext: &[u8]) -> [u8; 16] {
    let tag = gcm::ghash(recovered.h, aad, ciphertext).add(recovered.mask);
    field::field_to_block(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn capture(key: &[u8; 16], nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Capture {
        let enc = gcm::encrypt(key, nonce, aad, plaintext);
        Capture { aad: aad.to_vec(), ciphertext: enc.ciphertext, tag: enc.tag }
    }

    #[test]
    fn recovers_subkey_and_mask_from_reused_nonce() {
        let key = *b"YELLOW SUBMARINE";
        let nonce = *b"fixed_nonce!";

        let c1 = capture(&key, &nonce, b"aad one", b"the first secret message, somewhat long");
        let c2 = capture(&key, &nonce, b"aad two!", b"a second, differently sized message under the same nonce");
        let c3 = capture(&key, &nonce, b"aad three", b"a third message used only to disambiguate candidates");

        let mut rng = StdRng::seed_from_u64(7);
        let recovered = recover(&c1, &c2, &c3, &mut rng).unwrap();

        let aes = crate::aes::Aes128::new(&key);
        let expected_h = field::block_to_field(&aes.encrypt_block(&[0u8; 16]));
        assert_eq!(recovered.h, expected_h);
    }

    #[test]
    fn forged_tag_is_accepted_by_decrypt() {
        let key = *b"YELLOW SUBMARINE";
        let nonce = *b"fixed_nonce!";

        let c1 = capture(&key, &nonce, b"aad one", b"the first secret message, somewhat long");
        let c2 = capture(&key, &nonce, b"aad two!", b"a second, differently sized message under the same nonce");
        let c3 = capture(&key, &nonce, b"aad three", b"a third message used only to disambiguate candidates");

        let mut rng = StdRng::seed_from_u64(7);
        let recovered = recover(&c1, &c2, &c3, &mut rng).unwrap();

        let forged_aad = b"forged aad";
        let forged_ct = gcm::encrypt(&key, &nonce, forged_aad, b"attacker chosen plaintext").ciphertext;
        let forged_tag = forge(recovered, forged_aad, &forged_ct);

        assert!(gcm::decrypt(&key, &nonce, forged_aad, &forged_ct, &forged_tag).is_ok());
    }

    #[test]
    fn identical_captures_have_no_information_to_recover() {
        let key = *b"YELLOW SUBMARINE";
        let nonce = *b"fixed_nonce!";
        let c1 = capture(&key, &nonce, b"same aad", b"same plaintext");
        let c2 = c1.clone();
        let c3 = capture(&key, &nonce, b"other", b"other message");

        let mut rng = StdRng::seed_from_u64(1);
        assert!(recover(&c1, &c2, &c3, &mut rng).is_err());
    }
}
