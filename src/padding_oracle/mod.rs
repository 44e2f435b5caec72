//! The CBC padding-oracle attack, end to end (spec C8 / 4.6): a real
//! client/server pair talking a length-prefixed wire protocol, and the
//! byte-by-byte attack that recovers plaintext from nothing but a
//! padding-valid/padding-invalid bit leaked over the network.
//!
//! The attack itself is the same insight as any padding-oracle writeup:
//! forge a fake previous ciphertext block one byte at a time and watch
//! which guess makes the server-side unpad succeed. What spec 4.6 adds
//! over the single-process version is that the oracle really is on the
//! other end of a socket, so the attack has to survive real I/O errors
//! as well as wrong guesses.

pub mod attack;
pub mod client;
pub mod server;
pub mod wire;

pub use attack::crack;
pub use client::Client;
pub use server::Server;

use crate::aes::Aes128;
use crate::error::{CoreError, CoreResult};

const BLOCK_SIZE: usize = 16;

/// PKCS#7-pad `input` out to a multiple of `block`, always appending at
/// least one full block of padding (so unpadding is never ambiguous).
pub fn pkcs7_pad(input: &[u8], block: usize) -> Vec<u8> {
    let mut v = input.to_vec();
    let pad_len = block - (v.len() % block);
    v.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    v
}

/// Validate and strip PKCS#7 padding.
pub fn pkcs7_unpad(bytes: &[u8]) -> CoreResult<Vec<u8>> {
    let pad_len = match bytes.last() {
        Some(&b) if b != 0 => b as usize,
        _ => return Err(CoreError::Encoding("invalid PKCS#7 padding".into())),
    };
    if pad_len > bytes.len() || !bytes[bytes.len() - pad_len..].iter().all(|&b| b as usize == pad_len) {
        return Err(CoreError::Encoding("invalid PKCS#7 padding".into()));
    }
    Ok(bytes[..bytes.len() - pad_len].to_vec())
}

/// CBC-encrypt `plaintext` (already a multiple of the block size) under
/// `key`/`iv`, using this crate's own AES-128 rather than a library AEAD.
pub fn cbc_encrypt(plaintext: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> CoreResult<Vec<u8>> {
    if plaintext.len() % BLOCK_SIZE != 0 {
        return Err(CoreError::Domain("CBC plaintext length must be a multiple of the block size".into()));
    }
    let aes = Aes128::new(key);
    let mut prev = *iv;
    let mut out = Vec::with_capacity(plaintext.len());
    for block in plaintext.chunks(BLOCK_SIZE) {
        let mut xored = [0u8; BLOCK_SIZE];
        for i in 0..BLOCK_SIZE {
            xored[i] = block[i] ^ prev[i];
        }
        let ciphertext_block = aes.encrypt_block(&xored);
        out.extend_from_slice(&ciphertext_block);
        prev = ciphertext_block;
    }
    Ok(out)
}

/// CBC-decrypt `ciphertext` under `key`/`iv`. Does not check padding;
/// callers that need a padding oracle do that separately.
pub fn cbc_decrypt(ciphertext: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> CoreResult<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CoreError::Domain("CBC ciphertext length must be a positive multiple of the block size".into()));
    }
    let aes = Aes128::new(key);
    let mut prev = *iv;
    let mut out = Vec::with_capacity(ciphertext.len());
    for block in ciphertext.chunks(BLOCK_SIZE) {
        let block: [u8; BLOCK_SIZE] = block.try_into().expect("chunked by BLOCK_SIZE");
        let decrypted = aes.decrypt_block(&block);
        for i in 0..BLOCK_SIZE {
            out.push(decrypted[i] ^ prev[i]);
        }
        prev = block;
    }
    Ok(out)
}
