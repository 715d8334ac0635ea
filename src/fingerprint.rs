//! SHA-1 certificate fingerprints for diagnostics.

use sha1::{Digest, Sha1};

/// Length of a formatted SHA-1 fingerprint: 20 uppercase hex pairs with a
/// single space between pairs.
pub const SHA1_FINGERPRINT_LEN: usize = 59;

/// Compute the SHA-1 digest over a certificate's DER encoding.
pub fn sha1_digest(cert_der: &[u8]) -> [u8; 20] {
    Sha1::digest(cert_der).into()
}

/// Format a digest as uppercase hex pairs separated by single spaces, no
/// trailing separator.
pub fn format_fingerprint(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(" ")
}

/// Human-readable SHA-1 fingerprint of a DER-encoded certificate.
pub fn sha1_fingerprint(cert_der: &[u8]) -> String {
    format_fingerprint(&sha1_digest(cert_der))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_empty_input() {
        // SHA-1("")
        assert_eq!(
            sha1_fingerprint(&[]),
            "DA 39 A3 EE 5E 6B 4B 0D 32 55 BF EF 95 60 18 90 AF D8 07 09"
        );
    }

    #[test]
    fn formatting() {
        let formatted = format_fingerprint(&[0xAF, 0x12, 0xF6, 0x38, 0x2A]);
        assert_eq!(formatted, "AF 12 F6 38 2A");
    }

    #[test]
    fn fingerprint_length_is_fixed() {
        let formatted = sha1_fingerprint(b"arbitrary certificate bytes");
        assert_eq!(formatted.len(), SHA1_FINGERPRINT_LEN);
        for pair in formatted.split(' ') {
            assert_eq!(pair.len(), 2);
            assert!(u8::from_str_radix(pair, 16).is_ok());
            assert_eq!(pair, pair.to_uppercase());
        }
    }
}
