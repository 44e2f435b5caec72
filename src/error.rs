//! Error kinds shared by every core component (spec section 7).
//!
//! Each variant maps onto one of the documented failure classes. The
//! `job` glue layer is the only place that turns these into a diagnostic
//! field on a reply object; core functions never swallow an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A mathematical precondition was violated: inverse of zero,
    /// division by the zero polynomial, square root of a non-square.
    #[error("domain error: {0}")]
    Domain(String),

    /// Invalid base64, or a byte string of the wrong length for the
    /// block/field-element shape it's meant to decode into.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// An attack could not find a candidate that satisfies every check.
    #[error("no solution: {0}")]
    NoSolution(String),

    /// An attack found more than one candidate that satisfies every
    /// check, and had no further way to narrow the field.
    #[error("ambiguous result: {0}")]
    Ambiguous(String),

    /// Network I/O failure while talking to a padding-oracle server.
    #[error("transport error: {0}")]
    Transport(String),

    /// The oracle's response violated the wire protocol's shape.
    #[error("oracle protocol error: {0}")]
    OracleProtocol(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
