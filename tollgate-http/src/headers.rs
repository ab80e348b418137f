//! Payment header extraction.
//!
//! The proof of payment travels in a single request header as
//! base64-encoded JSON. Absence of the header is a normal outcome meaning
//! "not yet paid", never an error.

use http::HeaderMap;
use tollgate::proto::PaymentProof;

/// Request header carrying the payment proof.
pub const PAYMENT_HEADER: &str = "X-Payment";

/// Response header carrying the encoded payment requirements of a 402.
pub const REQUIRE_PAYMENT_HEADER: &str = "X-Require-Payment";

/// Response header advertising the accepted scheme and network.
pub const ACCEPT_PAYMENT_HEADER: &str = "X-Accept-Payment";

/// Pulls the payment proof out of the request headers, if present.
///
/// The value is taken as-is; decoding (and therefore every decoding
/// failure) happens later in verification so a malformed header still
/// produces a typed 402, not a missing-payment challenge.
#[must_use]
pub fn extract_proof(headers: &HeaderMap) -> Option<PaymentProof> {
    headers
        .get(PAYMENT_HEADER)
        .map(|value| PaymentProof::new(value.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn absent_header_is_none() {
        assert_eq!(extract_proof(&HeaderMap::new()), None);
    }

    #[test]
    fn present_header_is_carried_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(PAYMENT_HEADER, HeaderValue::from_static("bm90LWpzb24="));
        let proof = extract_proof(&headers).unwrap();
        assert_eq!(proof.raw(), b"bm90LWpzb24=");
    }

    #[test]
    fn malformed_header_still_extracts() {
        let mut headers = HeaderMap::new();
        headers.insert(PAYMENT_HEADER, HeaderValue::from_static("!!!"));
        assert!(extract_proof(&headers).is_some());
    }
}
