//! RFC 2818 hostname verification.
//!
//! After a completed outbound handshake, the relay checks that the peer's
//! certificate actually identifies the hostname the user asked to reach.
//! If a subjectAltName extension with dNSName entries is present it MUST
//! be used as the identity; only otherwise does the (most specific)
//! CommonName in the Subject count. CommonName matching is existing
//! practice but deprecated, which is why SAN always wins here.

use const_oid::db::rfc4519::CN;
use const_oid::AssociatedOid;
use der::Decode;
use log::{debug, trace};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::session::TlsSession;

/// Peer verification policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerifyMode {
    /// Accept any peer. The post-connect check always passes.
    #[default]
    None,
    /// Require the peer certificate to identify the target hostname and
    /// the record layer's chain verification to succeed.
    Peer,
}

/// Verify a peer's identity after its handshake completed.
///
/// Always true under [`VerifyMode::None`]. Otherwise the session must
/// expose a peer certificate whose names match `hostname` *and* report a
/// positive chain/trust verdict; a name match alone is not sufficient.
/// Without a hostname there is nothing to verify against, so the check
/// fails.
pub fn post_connect_check<S: TlsSession>(
    session: &S,
    verify: VerifyMode,
    hostname: Option<&str>,
) -> bool {
    if verify == VerifyMode::None {
        return true;
    }

    let Some(hostname) = hostname else {
        return false;
    };
    let Some(cert) = session.peer_certificate() else {
        return false;
    };

    certificate_matches_hostname(cert, hostname) && session.chain_verified()
}

/// Pure name match between a certificate and a hostname, per RFC 2818.
///
/// A subjectAltName extension that carries at least one dNSName entry is
/// authoritative: if none of its entries match, the CommonName is never
/// consulted. The CommonName fallback only applies when no dNSName was
/// examined at all.
pub fn certificate_matches_hostname(cert: &Certificate, hostname: &str) -> bool {
    let (matched, checked) = subject_alt_name_match(cert, hostname);
    if matched {
        return true;
    }
    if checked > 0 {
        return false;
    }

    common_name_match(cert, hostname)
}

/// Match `hostname` against the dNSName entries of the certificate's
/// subjectAltName extension. Returns the match result and how many
/// dNSName entries were examined, so the caller can distinguish "names
/// present but none matched" from "no names to match".
fn subject_alt_name_match(cert: &Certificate, hostname: &str) -> (bool, usize) {
    let extensions = cert.tbs_certificate.extensions.as_deref().unwrap_or(&[]);

    let mut sans = extensions
        .iter()
        .filter(|ext| ext.extn_id == SubjectAltName::OID);
    let Some(ext) = sans.next() else {
        return (false, 0);
    };
    if sans.next().is_some() {
        // More than one subjectAltName extension is ambiguous. Treat the
        // SAN as absent rather than picking one.
        debug!("Certificate has multiple subjectAltName extensions; ignoring all of them");
        return (false, 0);
    }

    let Ok(san) = SubjectAltName::from_der(ext.extn_value.as_bytes()) else {
        return (false, 0);
    };

    let mut checked = 0;
    for general_name in &san.0 {
        let GeneralName::DnsName(dns_name) = general_name else {
            continue;
        };
        trace!(
            "Checking certificate DNS name {:?} against {:?}",
            dns_name.as_str(),
            hostname
        );
        checked += 1;
        if wildcard_match(dns_name.as_str().as_bytes(), hostname) {
            return (true, checked);
        }
    }

    (false, checked)
}

/// Match `hostname` against the most specific CommonName of the Subject.
fn common_name_match(cert: &Certificate, hostname: &str) -> bool {
    let Some(common_name) = most_specific_common_name(&cert.tbs_certificate.subject) else {
        return false;
    };

    if wildcard_match(common_name, hostname) {
        return true;
    }

    debug!(
        "Connected to {:?}, but certificate is for {:?}",
        hostname,
        String::from_utf8_lossy(common_name)
    );
    false
}

/// Select the most specific of possibly several CommonName entries.
///
/// "Most specific" is the RFC 2818 term without an RFC 2818 definition.
/// Here: wildcard patterns are always less specific than non-wildcard
/// patterns; with equal wildcard status the pattern with more name
/// components wins; at equal specificity the entry appearing later in the
/// Subject supersedes earlier ones.
fn most_specific_common_name(subject: &Name) -> Option<&[u8]> {
    let mut best: Option<&[u8]> = None;

    for rdn in &subject.0 {
        for atv in rdn.0.iter() {
            if atv.oid != CN {
                continue;
            }
            let value = atv.value.value();
            // "Not less specific" instead of "more specific", so later
            // entries supersede earlier ones.
            match best {
                Some(current) if less_specific(value, current) => {}
                _ => best = Some(value),
            }
        }
    }

    best
}

/// True if pattern `a` is strictly less specific than pattern `b`.
fn less_specific(a: &[u8], b: &[u8]) -> bool {
    let a_wildcard = a.contains(&b'*');
    let b_wildcard = b.contains(&b'*');
    if a_wildcard != b_wildcard {
        return a_wildcard;
    }

    num_components(a) < num_components(b)
}

/// Number of contiguous runs of non-`.` bytes in a pattern.
fn num_components(pattern: &[u8]) -> usize {
    pattern
        .split(|&byte| byte == b'.')
        .filter(|label| !label.is_empty())
        .count()
}

/// Match a hostname against a certificate-supplied name, which may be a
/// wildcard pattern.
///
/// A wildcard pattern may contain only one `*`, it must be the entire
/// leftmost label, and at least two labels must follow it. The pattern
/// comes straight out of a certificate field: it has a known length, may
/// contain embedded NUL bytes and is never NUL-terminated, so the final
/// comparison is length-checked over raw bytes. DNS names compare
/// case-insensitively (RFC 4343).
pub(crate) fn wildcard_match(pattern: &[u8], hostname: &str) -> bool {
    let (pattern, hostname) = if pattern.len() > 1 && pattern[0] == b'*' && pattern[1] == b'.' {
        // A wildcard pattern. Skip the wildcard label.
        let rest = &pattern[2..];

        if rest.contains(&b'*') {
            return false;
        }

        // There must be at least one more dot, not counting a terminal
        // one.
        let dot = rest.iter().position(|&byte| byte == b'.');
        if !matches!(dot, Some(i) if i + 1 < rest.len()) {
            debug!(
                "Wildcard name {:?} doesn't have at least two components after the wildcard; rejecting",
                String::from_utf8_lossy(pattern)
            );
            return false;
        }

        // Skip the leftmost hostname label.
        let Some(host_dot) = hostname.find('.') else {
            return false;
        };
        (rest, &hostname[host_dot + 1..])
    } else {
        (pattern, hostname)
    };

    pattern.eq_ignore_ascii_case(hostname.as_bytes())
}
