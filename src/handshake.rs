//! Non-blocking, resumable TLS accept driver.

use std::net::SocketAddr;

use log::debug;

use crate::context::ListenContext;
use crate::session::{IoDirection, StepError, TlsSession};
use crate::Error;

/// Progress of one server-side TLS handshake.
///
/// Read by the event loop to decide what readiness event to wait for
/// next; mutated only by [`Connection::advance_handshake`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No handshake step has run yet.
    NotStarted,
    /// The next step needs the transport to become readable.
    PendingRead,
    /// The next step needs the transport to become writable.
    PendingWrite,
    /// The handshake finished; application data can flow.
    Completed,
    /// The handshake failed. Terminal: close the connection, do not
    /// retry.
    Failed,
}

impl HandshakeState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Completed | HandshakeState::Failed)
    }
}

/// One accepted connection's handshake descriptor.
///
/// Owns the TLS session (created lazily on the first
/// [`Connection::advance_handshake`] call) and the handshake state. The
/// underlying transport stays with the caller: cancelling a handshake is
/// simply no longer invoking the driver and closing the transport.
pub struct Connection<S> {
    peer: SocketAddr,
    session: Option<S>,
    state: HandshakeState,
}

impl<S: TlsSession> Connection<S> {
    /// A new descriptor for a connection from `peer`, with no session
    /// yet.
    pub fn new(peer: SocketAddr) -> Self {
        Connection {
            peer,
            session: None,
            state: HandshakeState::NotStarted,
        }
    }

    /// A new descriptor wrapping an already-created session.
    pub fn with_session(peer: SocketAddr, session: S) -> Self {
        Connection {
            peer,
            session: Some(session),
            state: HandshakeState::NotStarted,
        }
    }

    /// Address of the remote peer.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The TLS session, once one exists.
    pub fn session(&self) -> Option<&S> {
        self.session.as_ref()
    }

    /// Mutable access to the TLS session.
    pub fn session_mut(&mut self) -> Option<&mut S> {
        self.session.as_mut()
    }

    /// Consume the descriptor, returning the session for data transfer.
    pub fn into_session(self) -> Option<S> {
        self.session
    }

    /// Drive the handshake one non-blocking step.
    ///
    /// Creates the TLS session through `make_session` on the first call.
    /// Returns the resulting state: on `PendingRead`/`PendingWrite` the
    /// caller must re-invoke after the corresponding readiness event (any
    /// number of times); terminal states are sticky and are reported
    /// again without touching the session.
    ///
    /// Invoking this on a listener without TLS enabled is a usage error
    /// and fails with [`Error::TlsDisabled`] before any session is
    /// created.
    pub fn advance_handshake<F>(
        &mut self,
        ctx: &ListenContext,
        make_session: F,
    ) -> Result<HandshakeState, Error>
    where
        F: FnOnce(&ListenContext) -> Result<S, Error>,
    {
        if !ctx.tls_enabled() {
            debug!(
                "advance_handshake() called for {} on a listener without TLS; this is a bug in the caller",
                self.peer
            );
            return Err(Error::TlsDisabled);
        }

        if self.state.is_terminal() {
            return Ok(self.state);
        }

        let session = match self.session.as_mut() {
            Some(session) => session,
            None => {
                let session = make_session(ctx)?;
                self.session.insert(session)
            }
        };

        self.state = match session.accept_step() {
            Ok(()) => HandshakeState::Completed,
            Err(StepError::WouldBlock(IoDirection::Read)) => HandshakeState::PendingRead,
            Err(StepError::WouldBlock(IoDirection::Write)) => HandshakeState::PendingWrite,
            Err(StepError::Fatal(reason)) => {
                debug!("Failed TLS connection from {}: {}", self.peer, reason);
                HandshakeState::Failed
            }
        };

        Ok(self.state)
    }
}
