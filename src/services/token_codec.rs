//! Signed, timestamped magic-link tokens.
//!
//! A token is `base64(email ":" signature ":" issued_at_ms)` where
//! `signature = hex(HMAC-SHA256(secret, email ":" issued_at_ms))`.
//!
//! Everything here is pure: no store lookups, no logging. Single-use
//! enforcement lives in `AuthService`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// How far in the future an `issued_at` may be before the token is rejected.
pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid token input: {0}")]
    InvalidInput(&'static str),
    #[error("Malformed token")]
    Malformed,
    #[error("Token expired")]
    Expired,
    #[error("Invalid token signature")]
    InvalidSignature,
}

fn signing_mac(secret: &[u8], email: &str, issued_at: i64) -> Result<HmacSha256, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| TokenError::InvalidInput("secret must not be empty"))?;
    mac.update(email.as_bytes());
    mac.update(b":");
    mac.update(issued_at.to_string().as_bytes());
    Ok(mac)
}

/// Encode a token for `email`, stamped with `now`.
pub fn encode_token(email: &str, secret: &[u8], now: DateTime<Utc>) -> Result<String, TokenError> {
    if email.is_empty() {
        return Err(TokenError::InvalidInput("email must not be empty"));
    }
    if email.contains(':') {
        return Err(TokenError::InvalidInput("email must not contain ':'"));
    }
    if secret.is_empty() {
        return Err(TokenError::InvalidInput("secret must not be empty"));
    }

    let issued_at = now.timestamp_millis();
    let signature = hex::encode(signing_mac(secret, email, issued_at)?.finalize().into_bytes());
    let payload = format!("{}:{}:{}", email, signature, issued_at);

    Ok(STANDARD.encode(payload.as_bytes()))
}

/// Decode and verify a token, returning the embedded email.
///
/// Uses [`DEFAULT_CLOCK_SKEW_SECONDS`] as the future-dated allowance.
pub fn decode_token(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
    max_age: Duration,
) -> Result<String, TokenError> {
    decode_with_skew(
        token,
        secret,
        now,
        max_age,
        Duration::seconds(DEFAULT_CLOCK_SKEW_SECONDS),
    )
}

fn decode_with_skew(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
    max_age: Duration,
    clock_skew: Duration,
) -> Result<String, TokenError> {
    let raw = STANDARD
        .decode(token.as_bytes())
        .map_err(|_| TokenError::Malformed)?;
    let payload = String::from_utf8(raw).map_err(|_| TokenError::Malformed)?;

    let parts: Vec<&str> = payload.split(':').collect();
    let [email, signature, issued_at] = parts.as_slice() else {
        return Err(TokenError::Malformed);
    };
    if email.is_empty() {
        return Err(TokenError::Malformed);
    }

    let issued_at: i64 = issued_at.parse().map_err(|_| TokenError::Malformed)?;
    let now_ms = now.timestamp_millis();

    if now_ms.saturating_sub(issued_at) > max_age.num_milliseconds() {
        return Err(TokenError::Expired);
    }
    if issued_at.saturating_sub(now_ms) > clock_skew.num_milliseconds() {
        return Err(TokenError::Expired);
    }

    let provided = hex::decode(signature).map_err(|_| TokenError::InvalidSignature)?;
    signing_mac(secret, email, issued_at)?
        .verify_slice(&provided)
        .map_err(|_| TokenError::InvalidSignature)?;

    Ok((*email).to_string())
}

/// Token codec bound to a secret and expiry policy.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    max_age: Duration,
    clock_skew: Duration,
}

impl TokenCodec {
    pub fn new(secret: impl Into<Vec<u8>>, max_age: Duration, clock_skew: Duration) -> Self {
        Self {
            secret: secret.into(),
            max_age,
            clock_skew,
        }
    }

    pub fn encode(&self, email: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        encode_token(email, &self.secret, now)
    }

    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        decode_with_skew(token, &self.secret, now, self.max_age, self.clock_skew)
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .field("max_age", &self.max_age)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &[u8] = b"s3cret";
    const ONE_HOUR_MS: i64 = 3_600_000;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_718_000_000_123).unwrap()
    }

    fn reencode(payload: &str) -> String {
        STANDARD.encode(payload.as_bytes())
    }

    #[test]
    fn decode_immediately_returns_email() {
        let token = encode_token("a@example.com", SECRET, t0()).unwrap();
        let email =
            decode_token(&token, SECRET, t0(), Duration::milliseconds(ONE_HOUR_MS)).unwrap();
        assert_eq!(email, "a@example.com");
    }

    #[test]
    fn payload_layout_is_email_signature_timestamp() {
        let token = encode_token("a@example.com", SECRET, t0()).unwrap();
        let payload = String::from_utf8(STANDARD.decode(token).unwrap()).unwrap();
        let parts: Vec<&str> = payload.split(':').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "a@example.com");
        assert_eq!(parts[1].len(), 64);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2], t0().timestamp_millis().to_string());
    }

    #[test]
    fn token_valid_at_exact_max_age() {
        let token = encode_token("a@example.com", SECRET, t0()).unwrap();
        let later = t0() + Duration::milliseconds(ONE_HOUR_MS);
        assert!(decode_token(&token, SECRET, later, Duration::milliseconds(ONE_HOUR_MS)).is_ok());
    }

    #[test]
    fn token_expires_one_millisecond_after_max_age() {
        let token = encode_token("a@example.com", SECRET, t0()).unwrap();
        let later = t0() + Duration::milliseconds(ONE_HOUR_MS + 1);
        assert_eq!(
            decode_token(&token, SECRET, later, Duration::milliseconds(ONE_HOUR_MS)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn future_dated_token_beyond_skew_is_rejected() {
        let issued = t0() + Duration::seconds(DEFAULT_CLOCK_SKEW_SECONDS + 1);
        let token = encode_token("a@example.com", SECRET, issued).unwrap();
        assert_eq!(
            decode_token(&token, SECRET, t0(), Duration::hours(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn small_clock_skew_is_tolerated() {
        let issued = t0() + Duration::seconds(5);
        let token = encode_token("a@example.com", SECRET, issued).unwrap();
        assert!(decode_token(&token, SECRET, t0(), Duration::hours(1)).is_ok());
    }

    #[test]
    fn wrong_secret_fails_signature_check() {
        for email in ["a@example.com", "Mixed.Case+tag@sub.example.org", "x@y.io"] {
            let token = encode_token(email, SECRET, t0()).unwrap();
            assert_eq!(
                decode_token(&token, b"other-secret", t0(), Duration::hours(1)),
                Err(TokenError::InvalidSignature)
            );
        }
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(
            encode_token("", SECRET, t0()),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            encode_token("a@example.com", b"", t0()),
            Err(TokenError::InvalidInput(_))
        ));
        assert!(matches!(
            encode_token("a:b@example.com", SECRET, t0()),
            Err(TokenError::InvalidInput(_))
        ));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        let max_age = Duration::hours(1);
        let ts = t0().timestamp_millis();

        assert_eq!(
            decode_token("not base64!!", SECRET, t0(), max_age),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            decode_token(&reencode("a@example.com:deadbeef"), SECRET, t0(), max_age),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            decode_token(
                &reencode(&format!("a@example.com:aa:bb:{}", ts)),
                SECRET,
                t0(),
                max_age
            ),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            decode_token(&reencode("a@example.com:aa:yesterday"), SECRET, t0(), max_age),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            decode_token(&STANDARD.encode([0xff, 0xfe, 0x3a]), SECRET, t0(), max_age),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn forged_signature_with_valid_shape_is_rejected() {
        let forged = reencode(&format!(
            "victim@example.com:{}:{}",
            "0".repeat(64),
            t0().timestamp_millis()
        ));
        assert_eq!(
            decode_token(&forged, SECRET, t0(), Duration::hours(1)),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn plain_sha256_of_email_timestamp_secret_is_not_accepted() {
        use sha2::Digest;

        let ts = t0().timestamp_millis();
        let digest = sha2::Sha256::digest(format!("a@example.com:{}:s3cret", ts).as_bytes());
        let legacy = reencode(&format!("a@example.com:{}:{}", hex::encode(digest), ts));

        assert_eq!(
            decode_token(&legacy, SECRET, t0(), Duration::hours(1)),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn tampering_with_any_character_never_succeeds() {
        let token = encode_token("a@example.com", SECRET, t0()).unwrap();

        for (idx, original) in token.char_indices() {
            let replacement = if original == 'A' { 'B' } else { 'A' };
            let mut tampered = token.clone();
            tampered.replace_range(idx..idx + 1, &replacement.to_string());

            if let Ok(email) = decode_token(&tampered, SECRET, t0(), Duration::hours(1)) {
                panic!("tampered token at {} decoded to {}", idx, email);
            }
        }
    }

    #[test]
    fn tampering_with_signature_region_is_malformed_or_bad_signature() {
        let token = encode_token("a@example.com", SECRET, t0()).unwrap();
        let mut tampered = token.clone();
        let replacement = if &token[40..41] == "A" { "B" } else { "A" };
        tampered.replace_range(40..41, replacement);

        let result = decode_token(&tampered, SECRET, t0(), Duration::hours(1));
        assert!(
            matches!(
                result,
                Err(TokenError::Malformed) | Err(TokenError::InvalidSignature)
            ),
            "unexpected result: {:?}",
            result
        );
    }

    #[test]
    fn codec_uses_configured_policy() {
        let codec = TokenCodec::new(
            b"codec-secret".to_vec(),
            Duration::minutes(15),
            Duration::seconds(0),
        );
        let token = codec.encode("b@example.com", t0()).unwrap();

        assert_eq!(codec.decode(&token, t0()).unwrap(), "b@example.com");
        assert_eq!(
            codec.decode(&token, t0() + Duration::minutes(16)),
            Err(TokenError::Expired)
        );
        assert_eq!(
            codec.decode(&token, t0() - Duration::seconds(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn debug_output_redacts_secret() {
        let codec = TokenCodec::new(
            b"super-secret-value".to_vec(),
            Duration::hours(1),
            Duration::seconds(60),
        );
        let debug = format!("{:?}", codec);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("<redacted>"));
    }
}
