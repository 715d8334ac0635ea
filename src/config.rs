use std::time::Duration;

use crate::identity::IdentitySignature;
use crate::verify::VerifyMode;
use crate::Error;

/// Cipher policy applied when the operator does not supply one.
///
/// Excludes anonymous, export-grade, weak, and single-DES/RC4/MD5-based
/// suites, strongest first.
pub const DEFAULT_CIPHER_POLICY: &str = "ALL:!aNULL:!eNULL:!LOW:!EXP:!RC4:!MD5:@STRENGTH";

/// TLS listener configuration.
///
/// Built once at startup from the embedding tool's options and treated as
/// immutable afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    tls: bool,
    certificate: Option<Vec<u8>>,
    private_key: Option<Vec<u8>>,
    cipher_policy: Option<String>,
    target_name: Option<String>,
    verify: VerifyMode,
    identity_signature: IdentitySignature,
    identity_validity: Duration,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            tls: true,
            certificate: None,
            private_key: None,
            cipher_policy: None,
            target_name: None,
            verify: VerifyMode::None,
            identity_signature: IdentitySignature::default(),
            identity_validity: Duration::from_secs(60 * 60 * 24 * 365),
        }
    }

    /// Whether this listener terminates TLS at all.
    #[inline(always)]
    pub fn tls(&self) -> bool {
        self.tls
    }

    /// Operator-supplied certificate, DER encoded.
    #[inline(always)]
    pub fn certificate(&self) -> Option<&[u8]> {
        self.certificate.as_deref()
    }

    /// Operator-supplied private key, PKCS#8 DER encoded.
    #[inline(always)]
    pub fn private_key(&self) -> Option<&[u8]> {
        self.private_key.as_deref()
    }

    /// Operator-supplied cipher policy string, if any.
    #[inline(always)]
    pub fn cipher_policy(&self) -> Option<&str> {
        self.cipher_policy.as_deref()
    }

    /// Hostname used as the generated identity's name.
    #[inline(always)]
    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }

    /// Peer verification policy.
    #[inline(always)]
    pub fn verify(&self) -> VerifyMode {
        self.verify
    }

    /// Signature algorithm for the generated identity.
    #[inline(always)]
    pub fn identity_signature(&self) -> IdentitySignature {
        self.identity_signature
    }

    /// Validity period for the generated identity.
    #[inline(always)]
    pub fn identity_validity(&self) -> Duration {
        self.identity_validity
    }
}

/// Builder for TLS listener configuration.
pub struct ConfigBuilder {
    tls: bool,
    certificate: Option<Vec<u8>>,
    private_key: Option<Vec<u8>>,
    cipher_policy: Option<String>,
    target_name: Option<String>,
    verify: VerifyMode,
    identity_signature: IdentitySignature,
    identity_validity: Duration,
}

impl ConfigBuilder {
    /// Set whether this listener terminates TLS.
    ///
    /// Defaults to true. With TLS off, [`crate::ListenContext::setup`]
    /// resolves no identity and the handshake driver refuses to run.
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Set a static certificate (DER).
    ///
    /// Must be supplied together with [`ConfigBuilder::private_key`].
    /// Reading the bytes off disk is the caller's concern.
    pub fn certificate(mut self, certificate: Vec<u8>) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Set the static certificate's private key (PKCS#8 DER).
    ///
    /// Must be supplied together with [`ConfigBuilder::certificate`].
    pub fn private_key(mut self, private_key: Vec<u8>) -> Self {
        self.private_key = Some(private_key);
        self
    }

    /// Set the cipher policy string handed to the record layer.
    ///
    /// Defaults to [`DEFAULT_CIPHER_POLICY`].
    pub fn cipher_policy(mut self, policy: impl Into<String>) -> Self {
        self.cipher_policy = Some(policy.into());
        self
    }

    /// Set the target hostname.
    ///
    /// Used as CommonName and subjectAltName of a generated identity.
    /// Defaults to none, in which case the identity is for "localhost".
    pub fn target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }

    /// Set the peer verification policy.
    ///
    /// Defaults to [`VerifyMode::None`].
    pub fn verify(mut self, verify: VerifyMode) -> Self {
        self.verify = verify;
        self
    }

    /// Set the signature algorithm used to self-sign a generated identity.
    ///
    /// Defaults to [`IdentitySignature::Sha1WithRsa`] for interoperability
    /// with legacy peers.
    pub fn identity_signature(mut self, signature: IdentitySignature) -> Self {
        self.identity_signature = signature;
        self
    }

    /// Set the validity period of a generated identity.
    ///
    /// Defaults to 365 days.
    pub fn identity_validity(mut self, validity: Duration) -> Self {
        self.identity_validity = validity;
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::Config` if a certificate is supplied without its
    /// key or vice versa.
    pub fn build(self) -> Result<Config, Error> {
        if self.certificate.is_some() != self.private_key.is_some() {
            return Err(Error::Config(
                "the certificate and private key options must be used together".to_string(),
            ));
        }

        Ok(Config {
            tls: self.tls,
            certificate: self.certificate,
            private_key: self.private_key,
            cipher_policy: self.cipher_policy,
            target_name: self.target_name,
            verify: self.verify,
            identity_signature: self.identity_signature,
            identity_validity: self.identity_validity,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.tls());
        assert!(config.certificate().is_none());
        assert!(config.cipher_policy().is_none());
        assert_eq!(config.verify(), VerifyMode::None);
        assert_eq!(config.identity_signature(), IdentitySignature::Sha1WithRsa);
        assert_eq!(
            config.identity_validity(),
            Duration::from_secs(365 * 24 * 3600)
        );
    }

    #[test]
    fn certificate_without_key_is_rejected() {
        let err = Config::builder()
            .certificate(vec![0x30, 0x00])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = Config::builder()
            .private_key(vec![0x30, 0x00])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
