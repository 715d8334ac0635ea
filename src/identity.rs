//! Ephemeral server identity generation.
//!
//! When the operator supplies no credential the listener still has to
//! offer TLS service, so a fresh RSA keypair and a self-signed certificate
//! are generated at setup time. The certificate names the configured
//! target (or "localhost"), is valid for one year and carries a vendor
//! comment identifying it as generated.

use std::time::Duration;

use der::asn1::Ia5String;
use der::{Decode, Encode, EncodeValue, FixedTag, Length, Tag, Writer};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use sha1::Sha1;
use sha2::Sha256;
use signature::{Keypair, Signer};
use spki::{DynSignatureAlgorithmIdentifier, EncodePublicKey, ObjectIdentifier};
use x509_cert::attr::{AttributeTypeAndValue, AttributeValue};
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::{AsExtension, Extension};
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::Error;

/// Modulus size of generated RSA keys.
pub const KEY_BITS: usize = 2048;

/// Name used when no target hostname is configured.
const DEFAULT_NAME: &str = "localhost";

/// Free-text marker identifying generated certificates, stored in a
/// Netscape comment extension.
const CERTIFICATE_COMMENT: &str = "Automatically generated by siphon-tls";

/// Key generation is expected to succeed deterministically on valid
/// input; a repeated consistency-check failure is treated as fatal.
const KEYGEN_ATTEMPTS: usize = 4;

/// Signature algorithm used to self-sign a generated identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentitySignature {
    /// sha1WithRSAEncryption. Kept as the default for interoperability
    /// with legacy peers.
    #[default]
    Sha1WithRsa,
    /// sha256WithRSAEncryption.
    Sha256WithRsa,
}

/// A server credential: certificate plus matching private key.
///
/// Either wraps operator-supplied material or is generated fresh per
/// listener. Owned by the listen context for the lifetime of the
/// listener; the key DER is zeroized on drop.
#[derive(Clone)]
pub struct ServerIdentity {
    certificate: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
}

impl ServerIdentity {
    /// Wrap an operator-supplied certificate (DER) and private key
    /// (PKCS#8 DER), validating that the certificate parses.
    pub fn from_parts(certificate: Vec<u8>, private_key: Vec<u8>) -> Result<Self, Error> {
        Certificate::from_der(&certificate)
            .map_err(|e| Error::Config(format!("unparseable certificate: {}", e)))?;

        Ok(ServerIdentity {
            certificate,
            private_key: Zeroizing::new(private_key),
        })
    }

    /// Generate a fresh keypair and matching self-signed certificate.
    ///
    /// The certificate's Subject CommonName and its single subjectAltName
    /// dNSName both equal `target_name` (or "localhost"). Any failure is
    /// fatal to the caller: without an identity the listener cannot start.
    pub fn generate(
        target_name: Option<&str>,
        signature: IdentitySignature,
        validity: Duration,
    ) -> Result<Self, Error> {
        let name = target_name.unwrap_or(DEFAULT_NAME);

        let key = retry_bounded(KEYGEN_ATTEMPTS, generate_checked_key)?;

        let certificate = match signature {
            IdentitySignature::Sha1WithRsa => {
                build_self_signed(&SigningKey::<Sha1>::new(key.clone()), &key, name, validity)?
            }
            IdentitySignature::Sha256WithRsa => build_self_signed(
                &SigningKey::<Sha256>::new(key.clone()),
                &key,
                name,
                validity,
            )?,
        };

        let cert_der = certificate
            .to_der()
            .map_err(|e| Error::Crypto(format!("certificate encoding failed: {}", e)))?;
        let key_der = key
            .to_pkcs8_der()
            .map_err(|e| Error::Crypto(format!("private key encoding failed: {}", e)))?;

        Ok(ServerIdentity {
            certificate: cert_der,
            private_key: Zeroizing::new(key_der.as_bytes().to_vec()),
        })
    }

    /// The certificate, DER encoded.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate
    }

    /// The private key, PKCS#8 DER encoded.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key
    }
}

impl std::fmt::Debug for ServerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerIdentity")
            .field("certificate", &self.certificate.len())
            .field("private_key", &self.private_key.len())
            .finish()
    }
}

/// Generate an RSA key and run the post-generation consistency check.
fn generate_checked_key() -> Result<RsaPrivateKey, Error> {
    let key = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
        .map_err(|e| Error::Crypto(format!("RSA key generation failed: {}", e)))?;
    key.validate()
        .map_err(|e| Error::Crypto(format!("generated RSA key failed validation: {}", e)))?;
    Ok(key)
}

/// Run `op` at most `attempts` times, returning the first success or an
/// exhaustion error wrapping the last failure.
fn retry_bounded<T>(
    attempts: usize,
    mut op: impl FnMut() -> Result<T, Error>,
) -> Result<T, Error> {
    let mut last = None;
    for _ in 0..attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => last = Some(e),
        }
    }

    Err(match last {
        Some(e) => Error::Crypto(format!("giving up after {} attempts: {}", attempts, e)),
        None => Error::Crypto("bounded retry invoked with zero attempts".to_string()),
    })
}

/// Build the self-signed certificate shell and sign it.
fn build_self_signed<S>(
    signer: &S,
    key: &RsaPrivateKey,
    name: &str,
    validity: Duration,
) -> Result<Certificate, Error>
where
    S: Keypair + DynSignatureAlgorithmIdentifier + Signer<rsa::pkcs1v15::Signature>,
    S::VerifyingKey: EncodePublicKey,
{
    let serial = OsRng.next_u32() & 0x7FFF_FFFF;

    let validity = Validity::from_now(validity)
        .map_err(|e| Error::Crypto(format!("invalid validity window: {}", e)))?;

    let subject = common_name(name)?;

    let public_key_der = key
        .to_public_key()
        .to_public_key_der()
        .map_err(|e| Error::Crypto(format!("public key encoding failed: {}", e)))?;
    let spki = spki::SubjectPublicKeyInfoOwned::from_der(public_key_der.as_bytes())
        .map_err(|e| Error::Crypto(format!("public key encoding failed: {}", e)))?;

    // Issuer == subject: self-issued, and no profile-imposed extensions.
    let mut builder = CertificateBuilder::new(
        Profile::Manual { issuer: None },
        SerialNumber::from(serial),
        validity,
        subject,
        spki,
        signer,
    )
    .map_err(|e| Error::Crypto(format!("certificate build failed: {}", e)))?;

    let dns_name = Ia5String::new(name)
        .map_err(|e| Error::Config(format!("target name is not a valid dNSName: {}", e)))?;
    builder
        .add_extension(&SubjectAltName(vec![GeneralName::DnsName(dns_name)]))
        .map_err(|e| Error::Crypto(format!("certificate build failed: {}", e)))?;
    builder
        .add_extension(&NsComment::new(CERTIFICATE_COMMENT)?)
        .map_err(|e| Error::Crypto(format!("certificate build failed: {}", e)))?;

    builder
        .build::<rsa::pkcs1v15::Signature>()
        .map_err(|e| Error::Crypto(format!("certificate signing failed: {}", e)))
}

/// A Subject consisting of a single CommonName attribute.
fn common_name(name: &str) -> Result<Name, Error> {
    let value = AttributeValue::new(Tag::Utf8String, name.as_bytes())
        .map_err(|e| Error::Config(format!("target name is not encodable: {}", e)))?;
    let atv = AttributeTypeAndValue {
        oid: const_oid::db::rfc4519::CN,
        value,
    };

    let mut rdn = RelativeDistinguishedName::default();
    rdn.0
        .insert(atv)
        .map_err(|e| Error::Crypto(format!("subject encoding failed: {}", e)))?;

    let mut subject = RdnSequence::default();
    subject.0.push(rdn);
    Ok(subject)
}

/// Netscape comment extension (2.16.840.1.113730.1.13), a free-text
/// marker naming this tool as the issuer of a generated certificate.
struct NsComment(Ia5String);

impl NsComment {
    fn new(comment: &str) -> Result<Self, Error> {
        Ok(NsComment(Ia5String::new(comment).map_err(|e| {
            Error::Crypto(format!("invalid comment: {}", e))
        })?))
    }
}

impl const_oid::AssociatedOid for NsComment {
    const OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.113730.1.13");
}

impl FixedTag for NsComment {
    const TAG: Tag = Tag::Ia5String;
}

impl EncodeValue for NsComment {
    fn value_len(&self) -> der::Result<Length> {
        self.0.value_len()
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        self.0.encode_value(writer)
    }
}

impl AsExtension for NsComment {
    fn critical(&self, _subject: &Name, _extensions: &[Extension]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_returns_first_success() {
        let mut calls = 0;
        let result = retry_bounded(3, || {
            calls += 1;
            if calls < 2 {
                Err(Error::Crypto("flaky".to_string()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 2);
    }

    #[test]
    fn retry_exhaustion_is_an_explicit_error() {
        let mut calls = 0;
        let result: Result<(), _> = retry_bounded(3, || {
            calls += 1;
            Err(Error::Crypto("broken".to_string()))
        });
        assert_eq!(calls, 3);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("giving up after 3 attempts"));
    }

    #[test]
    fn single_common_name_subject() {
        let subject = common_name("foo.example").unwrap();
        assert_eq!(subject.0.len(), 1);
        let atv = subject.0[0].0.iter().next().unwrap();
        assert_eq!(atv.oid, const_oid::db::rfc4519::CN);
        assert_eq!(atv.value.value(), b"foo.example");
    }
}
