//! The oracle server half: holds a session key and a handful of candidate
//! secrets (mirroring the teacher's `challenge17` encryption side), and
//! answers `Issue`/`Bind`/`Guess` requests over TCP.

use super::wire::{read_request, write_response, Request, Response};
use super::{cbc_decrypt, cbc_encrypt, pkcs7_pad, pkcs7_unpad};
use crate::error::{CoreError, CoreResult};
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::RngCore;
use std::net::{TcpListener, TcpStream};

const BLOCK_SIZE: usize = 16;

pub struct Server {
    key: [u8; 16],
    secrets: Vec<Vec<u8>>,
}

impl Server {
    pub fn new(key: [u8; 16], secrets: Vec<Vec<u8>>) -> CoreResult<Server> {
        if secrets.is_empty() {
            return Err(CoreError::Domain("padding-oracle server needs at least one candidate secret".into()));
        }
        Ok(Server { key, secrets })
    }

    /// Bind `addr` and serve connections until the process is killed or
    /// `accept` errors.
    pub fn serve(&self, addr: &str) -> CoreResult<()> {
        let listener = TcpListener::bind(addr).map_err(|e| CoreError::Transport(e.to_string()))?;
        self.serve_listener(&listener)
    }

    /// Serve connections on an already-bound listener until the process
    /// is killed or `accept` errors. Each connection is handled to
    /// completion before the next is accepted, matching the single-client
    /// usage this protocol is built for (spec 4.6 doesn't call for
    /// concurrency). Exposed separately from [`Server::serve`] so tests
    /// can bind an ephemeral port and learn its address before the
    /// server thread starts accepting.
    pub fn serve_listener(&self, listener: &TcpListener) -> CoreResult<()> {
        info!("padding-oracle server listening on {:?}", listener.local_addr());
        for stream in listener.incoming() {
            let stream = stream.map_err(|e| CoreError::Transport(e.to_string()))?;
            if let Err(e) = self.handle_connection(stream) {
                warn!("padding-oracle connection ended with an error: {e}");
            }
        }
        Ok(())
    }

    /// Spec §3: "a per-session block is associated with one 16-byte
    /// ciphertext block" — `bound_target` tracks that association for
    /// the lifetime of one connection, set by a `Bind` request and read
    /// by every `Guess` request that follows it.
    fn handle_connection(&self, mut stream: TcpStream) -> CoreResult<()> {
        let mut bound_target: Option<[u8; BLOCK_SIZE]> = None;
        loop {
            let request = match read_request(&mut stream) {
                Ok(req) => req,
                Err(CoreError::Transport(_)) => return Ok(()), // peer closed the connection
                Err(e) => return Err(e),
            };
            let response = match request {
                Request::Issue => self.handle_issue()?,
                Request::Bind { target } => {
                    bound_target = Some(target);
                    debug!("session bound to a target ciphertext block");
                    Response::Bound
                }
                Request::Guess { q, candidates } => {
                    let target = bound_target.ok_or_else(|| {
                        CoreError::OracleProtocol("guess request sent before the session was bound to a target block".into())
                    })?;
                    self.handle_guess(&q, &candidates, &target)
                }
            };
            write_response(&mut stream, &response)?;
        }
    }

    fn handle_issue(&self) -> CoreResult<Response> {
        let mut rng = rand::thread_rng();
        let secret = self.secrets.choose(&mut rng).expect("checked non-empty in new()");
        let mut iv = [0u8; 16];
        rng.fill_bytes(&mut iv);
        let padded = pkcs7_pad(secret, 16);
        let ciphertext = cbc_encrypt(&padded, &self.key, &iv)?;
        debug!("issued a fresh {}-byte secret", secret.len());
        Ok(Response::Issued { iv: iv.to_vec(), ciphertext })
    }

    /// One validity bit per candidate (spec 4.6): decrypt the bound
    /// `target` block with `candidate` standing in as its preceding
    /// ciphertext block, and report whether the result is valid PKCS#7
    /// padding. `q` carries no information the check itself needs — the
    /// candidates already are the full substituted blocks spec 4.6
    /// describes — so it's read off the wire but otherwise unused here.
    fn handle_guess(&self, q: &[u8; BLOCK_SIZE], candidates: &[[u8; BLOCK_SIZE]], target: &[u8; BLOCK_SIZE]) -> Response {
        let _ = q;
        let validities = candidates
            .iter()
            .map(|candidate| {
                cbc_decrypt(target, &self.key, candidate).ok().map(|block| pkcs7_unpad(&block).is_ok()).unwrap_or(false)
            })
            .collect();
        Response::Validities(validities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::padding_oracle::client::Client;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn issue_then_valid_block_guesses_true() {
        let key = *b"YELLOW SUBMARINE";
        let server = Server::new(key, vec![b"a secret message".to_vec()]).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = stream.unwrap();
                server.handle_connection(stream).unwrap();
                break;
            }
        });

        let mut client = Client::connect(&addr.to_string(), Duration::from_secs(5)).unwrap();
        let (iv, ciphertext) = client.issue().unwrap();

        let blocks: Vec<[u8; 16]> = ciphertext.chunks(16).map(|c| c.try_into().unwrap()).collect();
        let target = *blocks.last().unwrap();
        let preceding = if blocks.len() > 1 { blocks[blocks.len() - 2] } else { iv[..16].try_into().unwrap() };

        client.bind(&target).unwrap();
        let validities = client.guess(&preceding, &[preceding]).unwrap();
        assert_eq!(validities, vec![true]);

        let mut bad_preceding = preceding;
        bad_preceding[0] ^= 1;
        let validities = client.guess(&bad_preceding, &[bad_preceding]).unwrap();
        assert_eq!(validities, vec![false]);
    }

    #[test]
    fn guess_before_bind_is_a_protocol_error() {
        let key = *b"YELLOW SUBMARINE";
        let server = Server::new(key, vec![b"a secret message".to_vec()]).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = stream.unwrap();
                let _ = server.handle_connection(stream);
                break;
            }
        });

        let mut client = Client::connect(&addr.to_string(), Duration::from_secs(5)).unwrap();
        assert!(client.guess(&[0u8; 16], &[[0u8; 16]]).is_err());
    }
}
