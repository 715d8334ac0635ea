#![forbid(unsafe_code)]
#![warn(clippy::all)]
//! TLS identity and handshake core for the siphon network relay.
//!
//! The relay can terminate TLS on either side of a proxied connection. This
//! crate carries the pieces of that which are independent of the record
//! layer and the event loop:
//!
//! * [`verify`] — RFC 2818 verification of a peer certificate against the
//!   hostname the caller intended to reach, including wildcard patterns,
//!   multi-value subjectAltName and the "most specific CommonName" rule.
//! * [`ServerIdentity`] — ephemeral identity issuance (RSA keypair plus a
//!   self-signed certificate) so a listener can always offer TLS service
//!   even without an operator-supplied credential.
//! * [`Connection`] — a non-blocking, resumable handshake driver that
//!   reports which I/O direction it is waiting on, so an external event
//!   loop can reschedule it.
//! * [`sha1_fingerprint`] — human-readable certificate fingerprints for
//!   diagnostics.
//!
//! The TLS record layer itself is a collaborator, abstracted behind the
//! [`TlsSession`] trait. Sockets, the event loop and option parsing belong
//! to the embedding tool.

mod config;
mod context;
mod error;
mod fingerprint;
mod handshake;
mod identity;
mod session;
pub mod verify;

pub use config::{Config, ConfigBuilder, DEFAULT_CIPHER_POLICY};
pub use context::ListenContext;
pub use error::Error;
pub use fingerprint::{format_fingerprint, sha1_digest, sha1_fingerprint, SHA1_FINGERPRINT_LEN};
pub use handshake::{Connection, HandshakeState};
pub use identity::{IdentitySignature, ServerIdentity, KEY_BITS};
pub use session::{IoDirection, StepError, TlsSession};
pub use verify::{certificate_matches_hostname, post_connect_check, VerifyMode};

// The parsed certificate shape consumed by the verifier and produced by the
// identity generator.
pub use x509_cert::Certificate;
