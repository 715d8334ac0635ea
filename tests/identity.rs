//! Generated-identity invariants.

use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use const_oid::db::rfc4519::CN;
use der::asn1::Ia5String;
use der::{Decode, Encode};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use signature::Verifier;
use sha1::Sha1;
use sha2::Sha256;
use spki::ObjectIdentifier;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::SubjectAltName;

use siphon_tls::{
    sha1_fingerprint, Certificate, Error, IdentitySignature, ServerIdentity,
    SHA1_FINGERPRINT_LEN,
};

const SAN_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");
const NS_COMMENT_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.113730.1.13");
const SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

const VALIDITY: Duration = Duration::from_secs(365 * 24 * 3600);

static IDENTITY: OnceLock<ServerIdentity> = OnceLock::new();

/// One generated identity shared by the tests that only read it.
fn identity() -> &'static ServerIdentity {
    IDENTITY.get_or_init(|| {
        ServerIdentity::generate(
            Some("foo.example"),
            IdentitySignature::default(),
            VALIDITY,
        )
        .expect("identity generation")
    })
}

fn parse(identity: &ServerIdentity) -> Certificate {
    Certificate::from_der(identity.certificate_der()).expect("generated certificate parses")
}

fn common_names(cert: &Certificate) -> Vec<Vec<u8>> {
    cert.tbs_certificate
        .subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter(|atv| atv.oid == CN)
        .map(|atv| atv.value.value().to_vec())
        .collect()
}

fn san_dns_names(cert: &Certificate) -> Vec<String> {
    let extensions = cert.tbs_certificate.extensions.as_deref().unwrap_or(&[]);
    let sans: Vec<_> = extensions
        .iter()
        .filter(|ext| ext.extn_id == SAN_OID)
        .collect();
    assert_eq!(sans.len(), 1, "exactly one subjectAltName extension");

    let san = SubjectAltName::from_der(sans[0].extn_value.as_bytes()).unwrap();
    san.0
        .iter()
        .map(|name| match name {
            GeneralName::DnsName(dns) => dns.as_str().to_string(),
            other => panic!("unexpected general name: {:?}", other),
        })
        .collect()
}

#[test]
fn names_follow_the_target() {
    let cert = parse(identity());

    assert_eq!(common_names(&cert), vec![b"foo.example".to_vec()]);
    assert_eq!(san_dns_names(&cert), vec!["foo.example".to_string()]);
}

#[test]
fn certificate_is_self_issued() {
    let cert = parse(identity());
    assert_eq!(cert.tbs_certificate.issuer, cert.tbs_certificate.subject);
}

#[test]
fn validity_window_spans_one_year_from_now() {
    let cert = parse(identity());
    let not_before = cert.tbs_certificate.validity.not_before.to_system_time();
    let not_after = cert.tbs_certificate.validity.not_after.to_system_time();

    let span = not_after.duration_since(not_before).unwrap();
    let slack = if span > VALIDITY {
        span - VALIDITY
    } else {
        VALIDITY - span
    };
    assert!(slack <= Duration::from_secs(2), "span off by {:?}", slack);

    // Generation happened within this test binary's lifetime.
    let age = SystemTime::now().duration_since(not_before).unwrap();
    assert!(age <= Duration::from_secs(300), "not_before too old: {:?}", age);
}

#[test]
fn serial_number_fits_in_31_bits() {
    let cert = parse(identity());
    let bytes = cert.tbs_certificate.serial_number.as_bytes();

    assert!(!bytes.is_empty() && bytes.len() <= 4);
    // A 31-bit value never needs a leading 0x00 sign byte.
    assert_eq!(bytes[0] & 0x80, 0);
}

#[test]
fn self_signature_verifies_with_sha1_by_default() {
    let cert = parse(identity());
    assert_eq!(cert.signature_algorithm.oid, SHA1_WITH_RSA);

    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .unwrap();
    let public_key = RsaPublicKey::from_public_key_der(&spki_der).unwrap();

    let tbs = cert.tbs_certificate.to_der().unwrap();
    let signature = Signature::try_from(cert.signature.raw_bytes()).unwrap();
    VerifyingKey::<Sha1>::new(public_key)
        .verify(&tbs, &signature)
        .expect("self-signature verifies against the embedded key");
}

#[test]
fn sha256_signature_is_available_as_an_option() {
    let identity = ServerIdentity::generate(
        Some("foo.example"),
        IdentitySignature::Sha256WithRsa,
        VALIDITY,
    )
    .unwrap();
    let cert = parse(&identity);
    assert_eq!(cert.signature_algorithm.oid, SHA256_WITH_RSA);

    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .unwrap();
    let public_key = RsaPublicKey::from_public_key_der(&spki_der).unwrap();

    let tbs = cert.tbs_certificate.to_der().unwrap();
    let signature = Signature::try_from(cert.signature.raw_bytes()).unwrap();
    VerifyingKey::<Sha256>::new(public_key)
        .verify(&tbs, &signature)
        .unwrap();
}

#[test]
fn name_defaults_to_localhost() {
    let identity =
        ServerIdentity::generate(None, IdentitySignature::default(), VALIDITY).unwrap();
    let cert = parse(&identity);

    assert_eq!(common_names(&cert), vec![b"localhost".to_vec()]);
    assert_eq!(san_dns_names(&cert), vec!["localhost".to_string()]);
}

#[test]
fn generated_certificate_carries_a_vendor_comment() {
    let cert = parse(identity());
    let extensions = cert.tbs_certificate.extensions.as_deref().unwrap_or(&[]);

    let comment = extensions
        .iter()
        .find(|ext| ext.extn_id == NS_COMMENT_OID)
        .expect("nsComment extension present");
    assert!(!comment.critical);

    let text = Ia5String::from_der(comment.extn_value.as_bytes()).unwrap();
    assert!(text.as_str().starts_with("Automatically generated by"));
}

#[test]
fn private_key_matches_the_certificate() {
    let identity = identity();

    let key = RsaPrivateKey::from_pkcs8_der(identity.private_key_der()).unwrap();
    let cert = parse(identity);
    let spki_der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .unwrap();
    let cert_key = RsaPublicKey::from_public_key_der(&spki_der).unwrap();

    assert_eq!(RsaPublicKey::from(&key), cert_key);
}

#[test]
fn fingerprint_of_generated_certificate() {
    let fp = sha1_fingerprint(identity().certificate_der());
    assert_eq!(fp.len(), SHA1_FINGERPRINT_LEN);
    // Deterministic for fixed input.
    assert_eq!(fp, sha1_fingerprint(identity().certificate_der()));
}

#[test]
fn from_parts_rejects_garbage_certificates() {
    let err = ServerIdentity::from_parts(vec![0x01, 0x02, 0x03], vec![]).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
