use thiserror::Error;

/// Errors surfaced by this crate.
///
/// Configuration and crypto failures are fatal to the listener being set
/// up: without a usable identity there is no TLS service to offer.
/// Per-connection conditions (hostname mismatch, handshake failure,
/// would-block) are deliberately *not* errors; they are reported through
/// [`crate::HandshakeState`] and the verifier's boolean result, and only
/// ever affect the one connection.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Incompatible or missing credential configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A cryptographic primitive failed (key generation, certificate
    /// construction or signing).
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// The handshake driver was invoked for a listener that does not have
    /// TLS enabled. Callers respecting preconditions never see this.
    #[error("TLS is not enabled for this listener")]
    TlsDisabled,
}
