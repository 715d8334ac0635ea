//! Interface to the TLS record-layer collaborator.
//!
//! The record layer, ciphers and chain validation live in an external TLS
//! library. This crate only needs the handful of operations below to drive
//! a handshake and to verify the peer afterwards.

use thiserror::Error;
use x509_cert::Certificate;

/// The I/O direction a blocked handshake step is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    Read,
    Write,
}

/// Outcome of a single non-blocking handshake step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// No progress until the transport is ready in the given direction.
    /// Not a failure; the step can be retried after the readiness event.
    #[error("handshake would block waiting for {0:?}")]
    WouldBlock(IoDirection),

    /// The handshake failed. The description is diagnostic only.
    #[error("handshake failed: {0}")]
    Fatal(String),
}

/// One TLS session, bound to an underlying transport owned by the caller.
///
/// Implemented by the glue around the external TLS library. All methods
/// are non-blocking; "pending" is communicated through return values,
/// never by suspension.
pub trait TlsSession {
    /// Advance the server-side handshake by exactly one non-blocking step.
    fn accept_step(&mut self) -> Result<(), StepError>;

    /// The peer's parsed certificate. Available after a completed
    /// handshake on connections where the peer presented one.
    fn peer_certificate(&self) -> Option<&Certificate>;

    /// The record layer's own chain and trust verification verdict for
    /// the peer certificate.
    fn chain_verified(&self) -> bool;
}
