//! A self-contained AES-128-GCM implementation (spec C4 / 4.2), built on
//! this crate's own [`crate::aes`] block cipher and [`crate::field`]
//! GF(2^128) arithmetic rather than delegating to an AEAD crate.
//!
//! `H` and `L` are exposed on every encrypt/decrypt result because
//! [`crate::crack`] (the nonce-reuse forgery attack) needs them, and
//! [`auth_blocks`] exposes the raw GHASH input blocks (pre-multiplication)
//! so that attack can build its symbolic polynomial directly from two
//! ciphertexts without re-deriving GCM's internal framing.

use crate::aes::Aes128;
use crate::error::{CoreError, CoreResult};
use crate::field::{self, F};

pub struct GcmCiphertext {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; 16],
    pub h: F,
    pub l: [u8; 16],
}

/// Split `bytes` into 16-byte blocks, zero-padding the final partial
/// block. An empty input yields no blocks.
fn pad_blocks(bytes: &[u8]) -> Vec<[u8; 16]> {
    if bytes.is_empty() {
        return vec![];
    }
    bytes
        .chunks(16)
        .map(|chunk| {
            let mut block = [0u8; 16];
            block[..chunk.len()].copy_from_slice(chunk);
            block
        })
        .collect()
}

/// The length block: 64-bit big-endian bit-length of `aad` followed by
/// 64-bit big-endian bit-length of `ciphertext`.
pub fn length_block(aad_len: usize, ciphertext_len: usize) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[..8].copy_from_slice(&((aad_len as u64) * 8).to_be_bytes());
    block[8..].copy_from_slice(&((ciphertext_len as u64) * 8).to_be_bytes());
    block
}

/// The ordered list of GHASH input blocks (as field elements, *not yet*
/// multiplied by `H`): AAD blocks, then ciphertext blocks, then the
/// length block. This is the coefficient list spec 4.5's key-recovery
/// attack needs, in the same order GHASH folds them in.
pub fn auth_blocks(aad: &[u8], ciphertext: &[u8]) -> Vec<F> {
    let mut blocks: Vec<F> = pad_blocks(aad).iter().map(field::block_to_field).collect();
    blocks.extend(pad_blocks(ciphertext).iter().map(field::block_to_field));
    blocks.push(field::block_to_field(&length_block(aad.len(), ciphertext.len())));
    blocks
}

/// GHASH(H, A, C): fold the auth blocks through Horner's method in
/// GF(2^128), X <- (X + B) * H for each block B.
pub fn ghash(h: F, aad: &[u8], ciphertext: &[u8]) -> F {
    let mut x = F::ZERO;
    for b in auth_blocks(aad, ciphertext) {
        x = x.add(b).mul(h);
    }
    x
}

fn y0(aes: &Aes128, h: F, nonce: &[u8]) -> [u8; 16] {
    if nonce.len() == 12 {
        let mut block = [0u8; 16];
        block[..12].copy_from_slice(nonce);
        block[15] = 1;
        block
    } else {
        field::field_to_block(ghash(h, &[], nonce))
    }
}

fn increment_counter(y: &mut [u8; 16]) {
    let counter = u32::from_be_bytes([y[12], y[13], y[14], y[15]]);
    let next = counter.wrapping_add(1);
    y[12..].copy_from_slice(&next.to_be_bytes());
}

fn ctr_crypt(aes: &Aes128, y0_block: [u8; 16], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut y = y0_block;
    for chunk in data.chunks(16) {
        increment_counter(&mut y);
        let keystream = aes.encrypt_block(&y);
        for (d, k) in chunk.iter().zip(keystream.iter()) {
            out.push(d ^ k);
        }
    }
    out
}

/// Encrypt `plaintext` under AES-128-GCM with the given key, nonce and
/// associated data.
pub fn encrypt(key: &[u8; 16], nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> GcmCiphertext {
    let aes = Aes128::new(key);
    let h = field::block_to_field(&aes.encrypt_block(&[0u8; 16]));
    let y0_block = y0(&aes, h, nonce);

    let ciphertext = ctr_crypt(&aes, y0_block, plaintext);
    let s = field::block_to_field(&aes.encrypt_block(&y0_block));
    let tag_field = ghash(h, aad, &ciphertext).add(s);
    let l = length_block(aad.len(), ciphertext.len());

    GcmCiphertext { ciphertext, tag: field::field_to_block(tag_field), h, l }
}

/// Decrypt and verify an AES-128-GCM ciphertext. Returns `Domain` on a
/// tag mismatch (this crate's AEAD is a teaching tool, but an
/// authentication failure still has to be distinguishable from success).
pub fn decrypt(key: &[u8; 16], nonce: &[u8], aad: &[u8], ciphertext: &[u8], tag: &[u8; 16]) -> CoreResult<Vec<u8>> {
    let aes = Aes128::new(key);
    let h = field::block_to_field(&aes.encrypt_block(&[0u8; 16]));
    let y0_block = y0(&aes, h, nonce);

    let s = field::block_to_field(&aes.encrypt_block(&y0_block));
    let expected_tag = ghash(h, aad, ciphertext).add(s);
    if field::field_to_block(expected_tag) != *tag {
        return Err(CoreError::Domain("GCM tag verification failed".into()));
    }

    Ok(ctr_crypt(&aes, y0_block, ciphertext))
}

/// Does `(h, mask)` reproduce `tag` for `(aad, ciphertext)`? Shared by
/// [`crate::crack`]'s candidate-verification step (spec 4.5 step 4) and
/// would otherwise be duplicated there.
pub fn verify_with_mask(h: F, mask: F, aad: &[u8], ciphertext: &[u8], tag: &[u8; 16]) -> bool {
    let computed = ghash(h, aad, ciphertext).add(mask);
    field::field_to_block(computed) == *tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_known_vector() {
        // NIST GCM test vector: K=0, N=0^96, A="", P="" -> tag is AES_K(Y0).
        let key = [0u8; 16];
        let nonce = [0u8; 12];
        let result = encrypt(&key, &nonce, &[], &[]);
        let aes = Aes128::new(&key);
        let mut y0_block = [0u8; 16];
        y0_block[15] = 1;
        let expected_tag = aes.encrypt_block(&y0_block);
        assert_eq!(result.tag, expected_tag);
        assert!(result.ciphertext.is_empty());
    }

    #[test]
    fn round_trip() {
        let key = *b"YELLOW SUBMARINE";
        let nonce = *b"uniquenonce!";
        let aad = b"header data";
        let plaintext = b"the quick brown fox jumps over the lazy dog, several times over";

        let enc = encrypt(&key, &nonce, aad, plaintext);
        let dec = decrypt(&key, &nonce, aad, &enc.ciphertext, &enc.tag).unwrap();
        assert_eq!(dec, plaintext);
    }

    #[test]
    fn tampered_tag_fails_to_decrypt() {
        let key = *b"YELLOW SUBMARINE";
        let nonce = *b"uniquenonce!";
        let enc = encrypt(&key, &nonce, b"", b"hello world");
        let mut bad_tag = enc.tag;
        bad_tag[0] ^= 1;
        assert!(decrypt(&key, &nonce, b"", &enc.ciphertext, &bad_tag).is_err());
    }

    #[test]
    fn non_96_bit_nonce_uses_ghash_derived_y0() {
        let key = *b"YELLOW SUBMARINE";
        let nonce = b"a nonce longer than 12 bytes for sure";
        let enc = encrypt(&key, nonce, b"aad", b"plaintext message");
        let dec = decrypt(&key, nonce, b"aad", &enc.ciphertext, &enc.tag).unwrap();
        assert_eq!(dec, b"plaintext message");
    }

    #[test]
    fn verify_with_mask_matches_tag() {
        let key = *b"YELLOW SUBMARINE";
        let nonce = *b"uniquenonce!";
        let aad = b"aad bytes";
        let enc = encrypt(&key, &nonce, aad, b"some ciphertext input");
        let aes = Aes128::new(&key);
        let mut y0_block = [0u8; 16];
        y0_block[..12].copy_from_slice(&nonce);
        y0_block[15] = 1;
        let mask = field::block_to_field(&aes.encrypt_block(&y0_block));
        assert!(verify_with_mask(enc.h, mask, aad, &enc.ciphertext, &enc.tag));
    }
}
