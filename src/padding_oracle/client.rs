//! The oracle client half: a thin wrapper around a `TcpStream` that
//! speaks the `Issue`/`Bind`/`Guess` request/response pairs from
//! [`super::wire`], with a configurable per-request timeout (spec 9:
//! oracle timeout defaults to 10s, see [`crate::config::Config`]).

use super::wire::{read_bound_response, read_issue_response, read_validities_response, write_request, Request};
use crate::error::CoreError;
use std::net::TcpStream;
use std::time::Duration;

const BLOCK_SIZE: usize = 16;

pub struct Client {
    stream: TcpStream,
}

impl Client {
    pub fn connect(addr: &str, timeout: Duration) -> Result<Client, CoreError> {
        let stream = TcpStream::connect(addr).map_err(|e| CoreError::Transport(e.to_string()))?;
        stream.set_read_timeout(Some(timeout)).map_err(|e| CoreError::Transport(e.to_string()))?;
        stream.set_write_timeout(Some(timeout)).map_err(|e| CoreError::Transport(e.to_string()))?;
        Ok(Client { stream })
    }

    /// Ask the server to hand back a fresh `(iv, ciphertext)` pair for
    /// one of its candidate secrets.
    pub fn issue(&mut self) -> Result<(Vec<u8>, Vec<u8>), CoreError> {
        write_request(&mut self.stream, &Request::Issue)?;
        read_issue_response(&mut self.stream)
    }

    /// Bind this connection to one target ciphertext block (spec §3):
    /// every subsequent `guess` call on this session attacks `target`.
    pub fn bind(&mut self, target: &[u8; BLOCK_SIZE]) -> Result<(), CoreError> {
        write_request(&mut self.stream, &Request::Bind { target: *target })?;
        read_bound_response(&mut self.stream)
    }

    /// Spec 4.6's batched request: `q` is the current forged-IV block,
    /// `candidates` is up to 256 single-byte-substituted variants of it.
    /// Returns one validity bit per candidate, in order.
    pub fn guess(&mut self, q: &[u8; BLOCK_SIZE], candidates: &[[u8; BLOCK_SIZE]]) -> Result<Vec<bool>, CoreError> {
        let count = candidates.len();
        write_request(&mut self.stream, &Request::Guess { q: *q, candidates: candidates.to_vec() })?;
        read_validities_response(&mut self.stream, count)
    }
}
