//! The binary wire protocol shared by [`super::client`] and
//! [`super::server`]: every message is a 4-byte big-endian length prefix
//! followed by that many payload bytes, carrying spec 4.6's protocol —
//! a session binds one TCP connection to a single target ciphertext
//! block (spec §3), then the client repeatedly sends a batch of up to
//! [`MAX_GUESS_COUNT`] candidate forged-IV blocks for that target and
//! gets back one validity byte per candidate.

use crate::error::{CoreError, CoreResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Refuse to allocate more than 1 MiB for a single frame. A real
/// ciphertext in this protocol is a handful of AES blocks; anything
/// larger than this is a malformed or hostile peer, not a legitimate job.
pub const MAX_FRAME_LEN: u32 = 1 << 20;

/// Spec 4.6: "a 2-byte count of guess blocks (≤ 256)".
pub const MAX_GUESS_COUNT: usize = 256;

const BLOCK_SIZE: usize = 16;

pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> CoreResult<()> {
    w.write_u32::<BigEndian>(payload.len() as u32).map_err(transport)?;
    w.write_all(payload).map_err(transport)?;
    w.flush().map_err(transport)
}

pub fn read_frame<R: Read>(r: &mut R) -> CoreResult<Vec<u8>> {
    let len = r.read_u32::<BigEndian>().map_err(transport)?;
    if len > MAX_FRAME_LEN {
        return Err(CoreError::OracleProtocol(format!(
            "frame length {len} exceeds the {MAX_FRAME_LEN}-byte maximum"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf).map_err(transport)?;
    Ok(buf)
}

fn transport(e: std::io::Error) -> CoreError {
    CoreError::Transport(e.to_string())
}

/// Request opcodes. `Issue` asks the server to hand back a fresh
/// encrypted secret. `Bind` associates this connection with one target
/// ciphertext block (spec §3). `Guess` is spec 4.6's batched attack
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opcode {
    Issue,
    Bind,
    Guess,
}

impl Opcode {
    fn to_byte(self) -> u8 {
        match self {
            Opcode::Issue => 0,
            Opcode::Bind => 1,
            Opcode::Guess => 2,
        }
    }

    fn from_byte(b: u8) -> CoreResult<Opcode> {
        match b {
            0 => Ok(Opcode::Issue),
            1 => Ok(Opcode::Bind),
            2 => Ok(Opcode::Guess),
            other => Err(CoreError::OracleProtocol(format!("unknown opcode byte {other}"))),
        }
    }
}

/// `Issue` has no body. `Bind` carries the 16-byte target ciphertext
/// block this session's subsequent `Guess` requests attack. `Guess`
/// carries spec 4.6's wire layout verbatim: a 16-byte IV block `Q`, a
/// 2-byte count, then `count * 16` bytes of candidate
/// last-byte-substitution blocks.
pub enum Request {
    Issue,
    Bind { target: [u8; BLOCK_SIZE] },
    Guess { q: [u8; BLOCK_SIZE], candidates: Vec<[u8; BLOCK_SIZE]> },
}

pub fn write_request<W: Write>(w: &mut W, req: &Request) -> CoreResult<()> {
    let mut payload = Vec::new();
    match req {
        Request::Issue => payload.push(Opcode::Issue.to_byte()),
        Request::Bind { target } => {
            payload.push(Opcode::Bind.to_byte());
            payload.extend_from_slice(target);
        }
        Request::Guess { q, candidates } => {
            if candidates.len() > MAX_GUESS_COUNT {
                return Err(CoreError::Domain(format!(
                    "guess batch of {} candidates exceeds the {MAX_GUESS_COUNT}-block maximum",
                    candidates.len()
                )));
            }
            payload.push(Opcode::Guess.to_byte());
            payload.extend_from_slice(q);
            payload.write_u16::<BigEndian>(candidates.len() as u16).map_err(transport)?;
            for candidate in candidates {
                payload.extend_from_slice(candidate);
            }
        }
    }
    write_frame(w, &payload)
}

pub fn read_request<R: Read>(r: &mut R) -> CoreResult<Request> {
    let payload = read_frame(r)?;
    let (opcode_byte, rest) = payload
        .split_first()
        .ok_or_else(|| CoreError::OracleProtocol("empty request frame".into()))?;
    match Opcode::from_byte(*opcode_byte)? {
        Opcode::Issue => Ok(Request::Issue),
        Opcode::Bind => {
            let target: [u8; BLOCK_SIZE] = rest
                .try_into()
                .map_err(|_| CoreError::OracleProtocol("bind request must carry exactly one 16-byte block".into()))?;
            Ok(Request::Bind { target })
        }
        Opcode::Guess => {
            if rest.len() < BLOCK_SIZE + 2 {
                return Err(CoreError::OracleProtocol("guess request shorter than Q plus a count".into()));
            }
            let (q_bytes, mut rest) = rest.split_at(BLOCK_SIZE);
            let q: [u8; BLOCK_SIZE] = q_bytes.try_into().expect("split at BLOCK_SIZE");
            let count = rest.read_u16::<BigEndian>().map_err(transport)? as usize;
            if count > MAX_GUESS_COUNT {
                return Err(CoreError::OracleProtocol(format!(
                    "guess count {count} exceeds the {MAX_GUESS_COUNT}-block maximum"
                )));
            }
            if rest.len() != count * BLOCK_SIZE {
                return Err(CoreError::OracleProtocol(
                    "guess request's candidate bytes don't match its declared count".into(),
                ));
            }
            let candidates = rest.chunks(BLOCK_SIZE).map(|c| c.try_into().expect("chunked by BLOCK_SIZE")).collect();
            Ok(Request::Guess { q, candidates })
        }
    }
}

/// `Issue` replies with `IV || ciphertext`. `Bind` replies with a single
/// acknowledgement byte. `Guess` replies with spec 4.6's `count`
/// validity bytes, one per candidate in the order they were sent.
pub enum Response {
    Issued { iv: Vec<u8>, ciphertext: Vec<u8> },
    Bound,
    Validities(Vec<bool>),
}

pub fn write_response<W: Write>(w: &mut W, resp: &Response) -> CoreResult<()> {
    let mut payload = Vec::new();
    match resp {
        Response::Issued { iv, ciphertext } => {
            payload.extend_from_slice(iv);
            payload.extend_from_slice(ciphertext);
        }
        Response::Bound => payload.push(1),
        Response::Validities(validities) => payload.extend(validities.iter().map(|&v| v as u8)),
    }
    write_frame(w, &payload)
}

pub fn read_issue_response<R: Read>(r: &mut R) -> CoreResult<(Vec<u8>, Vec<u8>)> {
    let payload = read_frame(r)?;
    if payload.len() < BLOCK_SIZE {
        return Err(CoreError::OracleProtocol("issue response shorter than one IV block".into()));
    }
    let (iv, ciphertext) = payload.split_at(BLOCK_SIZE);
    Ok((iv.to_vec(), ciphertext.to_vec()))
}

pub fn read_bound_response<R: Read>(r: &mut R) -> CoreResult<()> {
    let payload = read_frame(r)?;
    match payload.as_slice() {
        [1] => Ok(()),
        _ => Err(CoreError::OracleProtocol("bind response was not a single acknowledgement byte".into())),
    }
}

/// Spec 4.6: "Server responds: `count` bytes, each byte is 1 if the
/// corresponding guess produced valid PKCS#7 padding... else 0."
pub fn read_validities_response<R: Read>(r: &mut R, count: usize) -> CoreResult<Vec<bool>> {
    let payload = read_frame(r)?;
    if payload.len() != count {
        return Err(CoreError::OracleProtocol(format!(
            "guess response carried {} validity bytes, expected {count}",
            payload.len()
        )));
    }
    payload
        .iter()
        .map(|&b| match b {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CoreError::OracleProtocol(format!("validity byte must be 0 or 1, got {other}"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_round_trip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), b"hello");
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(MAX_FRAME_LEN + 1).unwrap();
        let mut cursor = Cursor::new(buf);
        assert!(read_frame(&mut cursor).is_err());
    }

    #[test]
    fn bind_request_round_trip() {
        let mut buf = Vec::new();
        let req = Request::Bind { target: [7u8; 16] };
        write_request(&mut buf, &req).unwrap();
        let mut cursor = Cursor::new(buf);
        match read_request(&mut cursor).unwrap() {
            Request::Bind { target } => assert_eq!(target, [7u8; 16]),
            _ => panic!("expected Bind"),
        }
    }

    #[test]
    fn guess_request_round_trip() {
        let mut buf = Vec::new();
        let candidates = vec![[1u8; 16], [2u8; 16], [3u8; 16]];
        let req = Request::Guess { q: [0u8; 16], candidates: candidates.clone() };
        write_request(&mut buf, &req).unwrap();
        let mut cursor = Cursor::new(buf);
        match read_request(&mut cursor).unwrap() {
            Request::Guess { q, candidates: got } => {
                assert_eq!(q, [0u8; 16]);
                assert_eq!(got, candidates);
            }
            _ => panic!("expected Guess"),
        }
    }

    #[test]
    fn guess_request_over_the_limit_is_rejected() {
        let mut buf = Vec::new();
        let candidates = vec![[0u8; 16]; MAX_GUESS_COUNT + 1];
        let req = Request::Guess { q: [0u8; 16], candidates };
        assert!(write_request(&mut buf, &req).is_err());
    }

    #[test]
    fn validities_response_round_trip() {
        let mut buf = Vec::new();
        write_response(&mut buf, &Response::Validities(vec![true, false, true])).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_validities_response(&mut cursor, 3).unwrap(), vec![true, false, true]);
    }
}
