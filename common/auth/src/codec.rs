//! Reads the payload of a bearer token without checking its signature.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use tracing::debug;

use crate::claims::DecodedPayload;

/// Standard alphabet, padding optional, lenient on trailing bits.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes the claim set of `token`.
///
/// Total over all inputs: an absent token, anything that is not three
/// dot-separated base64url segments, or a payload that is not a JSON object
/// all yield `None`.
pub fn decode(token: Option<&str>) -> Option<DecodedPayload> {
    let token = token?.trim();
    let mut segments = token.split('.');
    let (header, payload, signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    if header.is_empty() || payload.is_empty() {
        return None;
    }
    if !is_base64url(header) || !is_base64url(signature) {
        return None;
    }

    let bytes = decode_segment(payload)?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => DecodedPayload::from_value(value),
        Err(err) => {
            debug!(error = %err, "token payload is not JSON");
            None
        }
    }
}

/// Convenience wrapper for a borrowed token string.
pub fn decode_str(token: &str) -> Option<DecodedPayload> {
    decode(Some(token))
}

/// Undoes the URL-safe substitutions before generic base64 decoding.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    if !is_base64url(segment) {
        return None;
    }
    let standard: String = segment
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    FORGIVING.decode(standard).ok()
}

fn is_base64url(segment: &str) -> bool {
    let body = segment.trim_end_matches('=');
    segment.len() - body.len() <= 2
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    fn token_with_payload(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn decodes_well_formed_token() {
        let token = token_with_payload(&json!({ "role": "staff", "exp": 4_102_444_800_i64 }));
        let payload = decode_str(&token).expect("payload");
        assert_eq!(payload.role.as_deref(), Some("staff"));
        assert!(!payload.is_expired());
    }

    #[test]
    fn absent_token_has_no_payload() {
        assert!(decode(None).is_none());
        assert!(decode(Some("")).is_none());
    }

    #[test]
    fn wrong_segment_count_has_no_payload() {
        let token = token_with_payload(&json!({ "role": "staff" }));
        let two: Vec<&str> = token.split('.').take(2).collect();
        assert!(decode_str(&two.join(".")).is_none());
        assert!(decode_str(&format!("{token}.extra")).is_none());
        assert!(decode_str("no-dots-here").is_none());
    }

    #[test]
    fn non_json_payload_has_no_payload() {
        let body = URL_SAFE_NO_PAD.encode("not json");
        assert!(decode_str(&format!("aGVhZGVy.{body}.c2ln")).is_none());
    }

    #[test]
    fn invalid_base64_has_no_payload() {
        assert!(decode_str("aGVhZGVy.***.c2ln").is_none());
        assert!(decode_str("aGVhZGVy.e30+.c2ln").is_none());
        assert!(decode_str("he ader.e30.c2ln").is_none());
    }

    #[test]
    fn url_safe_characters_are_translated() {
        // "?>?" encodes to "Pz4/" in the standard alphabet and "Pz4_" in the URL-safe one.
        let payload = json!({ "note": "?>?>?>", "role": "user" });
        let token = token_with_payload(&payload);
        let encoded = token.split('.').nth(1).expect("payload segment");
        assert!(encoded.contains('_') || encoded.contains('-'));
        let decoded = decode_str(&token).expect("payload");
        assert_eq!(decoded.raw["note"], json!("?>?>?>"));
    }

    #[test]
    fn padded_payload_is_accepted() {
        let body = base64::engine::general_purpose::URL_SAFE.encode(r#"{"role":"ab"}"#);
        assert!(body.ends_with('='));
        let decoded = decode_str(&format!("aGVhZGVy.{body}.c2ln")).expect("payload");
        assert!(decoded.has_role("ab"));
    }

    #[test]
    fn unsigned_token_with_empty_signature_decodes() {
        let token = token_with_payload(&json!({ "role": "user" }));
        let unsigned = format!("{}.", token.rsplit_once('.').expect("dot").0);
        assert!(decode_str(&unsigned).is_some());
    }
}
