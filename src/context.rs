//! Listen-socket TLS context.

use std::sync::Arc;

use log::debug;

use crate::config::{Config, DEFAULT_CIPHER_POLICY};
use crate::fingerprint::sha1_fingerprint;
use crate::identity::{ServerIdentity, KEY_BITS};
use crate::verify::VerifyMode;
use crate::Error;

/// Per-listener TLS context: the server identity and cipher policy every
/// accepted connection's handshake reads from.
///
/// Constructed once at listen-socket setup and immutable afterwards, so
/// it is safe to share read-only between any number of in-flight
/// handshakes. Passed explicitly into every handshake-advancing call;
/// there is no ambient global.
pub struct ListenContext {
    config: Arc<Config>,
    identity: Option<ServerIdentity>,
    cipher_policy: String,
}

impl ListenContext {
    /// Set up the TLS context for one listener.
    ///
    /// With no static credential configured, a fresh identity is
    /// generated eagerly here; a generation failure means the listener
    /// cannot start. With TLS disabled in the configuration no identity
    /// is resolved at all.
    pub fn setup(config: Arc<Config>) -> Result<Self, Error> {
        let identity = if config.tls() {
            Some(resolve_identity(&config)?)
        } else {
            None
        };

        let cipher_policy = config
            .cipher_policy()
            .unwrap_or(DEFAULT_CIPHER_POLICY)
            .to_string();

        Ok(ListenContext {
            config,
            identity,
            cipher_policy,
        })
    }

    /// Whether this listener terminates TLS.
    #[inline(always)]
    pub fn tls_enabled(&self) -> bool {
        self.config.tls()
    }

    /// The server credential, present whenever TLS is enabled.
    #[inline(always)]
    pub fn identity(&self) -> Option<&ServerIdentity> {
        self.identity.as_ref()
    }

    /// The resolved cipher policy string for the record layer.
    #[inline(always)]
    pub fn cipher_policy(&self) -> &str {
        &self.cipher_policy
    }

    /// Peer verification policy for connections on this listener.
    #[inline(always)]
    pub fn verify(&self) -> VerifyMode {
        self.config.verify()
    }

    /// The configured target hostname, used by the post-connect check.
    #[inline(always)]
    pub fn target_name(&self) -> Option<&str> {
        self.config.target_name()
    }
}

fn resolve_identity(config: &Config) -> Result<ServerIdentity, Error> {
    match (config.certificate(), config.private_key()) {
        (Some(certificate), Some(private_key)) => {
            ServerIdentity::from_parts(certificate.to_vec(), private_key.to_vec())
        }
        (None, None) => {
            debug!(
                "Generating a temporary {}-bit RSA key. Configure a certificate and key to use a permanent one",
                KEY_BITS
            );
            let identity = ServerIdentity::generate(
                config.target_name(),
                config.identity_signature(),
                config.identity_validity(),
            )?;
            debug!(
                "SHA-1 fingerprint: {}",
                sha1_fingerprint(identity.certificate_der())
            );
            Ok(identity)
        }
        // Config::build() already rejects a mismatched pair.
        _ => Err(Error::Config(
            "the certificate and private key options must be used together".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_without_tls_resolves_no_identity() {
        let config = Config::builder().tls(false).build().unwrap();
        let ctx = ListenContext::setup(Arc::new(config)).unwrap();
        assert!(!ctx.tls_enabled());
        assert!(ctx.identity().is_none());
        assert_eq!(ctx.cipher_policy(), DEFAULT_CIPHER_POLICY);
    }

    #[test]
    fn custom_cipher_policy_is_kept() {
        let config = Config::builder()
            .tls(false)
            .cipher_policy("HIGH:!aNULL")
            .build()
            .unwrap();
        let ctx = ListenContext::setup(Arc::new(config)).unwrap();
        assert_eq!(ctx.cipher_policy(), "HIGH:!aNULL");
    }
}
