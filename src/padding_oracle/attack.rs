//! The byte-by-byte CBC padding-oracle attack, run over [`super::Client`]
//! instead of an in-process function call. The recovery math per block
//! is the teacher's `challenge17` attack, generalized to spec 4.6's
//! batched wire request: instead of one guess per round trip, every
//! byte position is tried all 256 ways in a single `Guess` request, and
//! the server answers with one validity bit per candidate.

use super::{pkcs7_unpad, Client};
use crate::error::{CoreError, CoreResult};
use log::debug;

const BLOCK_SIZE: usize = 16;

/// Recover one block of plaintext, given the ciphertext block
/// immediately preceding `target` (real CBC chaining, or the message IV
/// for the first block). `client` must already be bound (spec §3) to
/// `target` via [`Client::bind`].
fn recover_block(client: &mut Client, preceding: &[u8; BLOCK_SIZE], target: &[u8; BLOCK_SIZE]) -> CoreResult<[u8; BLOCK_SIZE]> {
    let mut forged = *preceding;

    for target_byte in 0..BLOCK_SIZE {
        let pos = BLOCK_SIZE - target_byte - 1;

        let candidates: Vec<[u8; BLOCK_SIZE]> = (0u16..=255)
            .map(|guess| {
                let mut block = forged;
                block[pos] = guess as u8;
                block
            })
            .collect();

        let validities = client.guess(&forged, &candidates)?;
        let mut valid_guesses: Vec<u8> =
            validities.iter().enumerate().filter(|&(_, &ok)| ok).map(|(guess, _)| guess as u8).collect();

        if valid_guesses.is_empty() {
            return Err(CoreError::NoSolution(format!("no guess byte produced valid padding at block offset {pos}")));
        }

        // Spec 4.6 step 3: on the first recovered byte only, more than one
        // guess can coincidentally produce valid padding (the classic
        // `\x02\x02` collision against a real `\x01` pad). Disambiguate by
        // flipping Q[p-1] and keeping only the guess(es) still valid.
        if target_byte == 0 && valid_guesses.len() > 1 {
            let flip_pos = pos - 1;
            let mut flip_q = forged;
            flip_q[flip_pos] ^= 0xff;

            let flipped_candidates: Vec<[u8; BLOCK_SIZE]> = valid_guesses
                .iter()
                .map(|&guess| {
                    let mut block = flip_q;
                    block[pos] = guess;
                    block
                })
                .collect();
            let confirmations = client.guess(&flip_q, &flipped_candidates)?;
            let confirmed: Vec<u8> = valid_guesses
                .iter()
                .zip(confirmations.iter())
                .filter(|&(_, &ok)| ok)
                .map(|(&guess, _)| guess)
                .collect();
            if confirmed.len() == 1 {
                valid_guesses = confirmed;
            }
        }

        forged[pos] = valid_guesses[0];

        // `forged` now decrypts to plaintext ending in target_byte+1
        // copies of the byte (target_byte+1). Re-tune every byte
        // recovered so far to target one more copy of that pad value.
        for update_byte in 0..=target_byte {
            let loc = BLOCK_SIZE - update_byte - 1;
            let tb = target_byte as u8;
            forged[loc] ^= (tb + 1) ^ (tb + 2);
        }
        debug!("recovered byte at block offset {pos}");
    }

    let mut plaintext = [0u8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        plaintext[i] = preceding[i] ^ forged[i] ^ ((BLOCK_SIZE as u8) + 1);
    }
    Ok(plaintext)
}

/// Recover the plaintext of `ciphertext` (CBC-encrypted under `iv`),
/// using nothing but [`Client::guess`]'s batched valid/invalid padding
/// bits, one block at a time (spec §3: one target block per session).
pub fn crack(client: &mut Client, iv: &[u8], ciphertext: &[u8]) -> CoreResult<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CoreError::Domain("ciphertext length must be a positive multiple of the block size".into()));
    }
    let iv: [u8; BLOCK_SIZE] = iv.try_into().map_err(|_| CoreError::Encoding("IV must be 16 bytes".into()))?;

    let mut preceding = iv;
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    for (i, chunk) in ciphertext.chunks(BLOCK_SIZE).enumerate() {
        let target: [u8; BLOCK_SIZE] = chunk.try_into().expect("chunked by BLOCK_SIZE");
        client.bind(&target)?;
        let recovered = recover_block(client, &preceding, &target)?;
        debug!("recovered block {i}");
        plaintext.extend_from_slice(&recovered);
        preceding = target;
    }

    pkcs7_unpad(&plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::padding_oracle::server::Server;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn recovers_the_issued_secret_end_to_end() {
        let key = *b"YELLOW SUBMARINE";
        let secret = b"attack at dawn, bring the usual crew".to_vec();
        let server = Server::new(key, vec![secret.clone()]).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            server.serve_listener(&listener).ok();
        });

        let mut client = Client::connect(&addr, Duration::from_secs(5)).unwrap();
        let (iv, ciphertext) = client.issue().unwrap();
        let recovered = crack(&mut client, &iv, &ciphertext).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn recovers_a_secret_whose_last_byte_is_two() {
        // Exercises spec 4.6 step 3's disambiguation: the real last-byte
        // pad (0x01) and a forged \x02\x02 guess are both valid padding
        // whenever the true plaintext byte at block offset 14 is 0x02.
        let key = *b"YELLOW SUBMARINE";
        let mut secret = b"a 15 byte msg..".to_vec();
        secret.push(2);
        let server = Server::new(key, vec![secret.clone()]).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            server.serve_listener(&listener).ok();
        });

        let mut client = Client::connect(&addr, Duration::from_secs(5)).unwrap();
        let (iv, ciphertext) = client.issue().unwrap();
        let recovered = crack(&mut client, &iv, &ciphertext).unwrap();
        assert_eq!(recovered, secret);
    }
}
