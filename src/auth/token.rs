//! Bearer token issuance and verification
//!
//! A token is an HS256-signed JWT whose single custom claim carries the user
//! identity, AES-GCM encrypted under a key configured independently of the
//! signing secret. Verification order: algorithm check, signature, temporal
//! claims, then authenticated decryption of the identity payload. Tokens are
//! stateless; validity is a pure function of content and wall-clock time.

use crate::config::AppConfig;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::cipher::consts::U12;
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// AES-192-GCM, not aliased by the aes-gcm crate itself
type Aes192Gcm = AesGcm<Aes192, U12>;

/// Issuer tag embedded in every token
pub const ISSUER: &str = "speech-history-service";

/// GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Token errors, one variant per terminal outcome
///
/// Callers pattern-match; none of these are retryable. The service layer
/// collapses all of them into a generic 401 before anything reaches a client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("claims encoding failed")]
    Encoding,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("malformed token")]
    Malformed,

    #[error("cryptographic failure")]
    Crypto,
}

/// Identity claims protected by a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub email: String,
}

/// JWT claim set
///
/// `data` is the base64 encoding of `nonce || ciphertext` for the encrypted
/// [`UserIdentity`]. The remaining fields are standard temporal claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub data: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
}

/// Normalized AES key, one variant per legal key length
///
/// Raw keys of other lengths are zero-padded up to the nearest legal length
/// and keys longer than 32 bytes are truncated to 32. Zero-padding silently
/// weakens short keys; the behavior is kept for compatibility with tokens
/// already in circulation.
enum CipherKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl CipherKey {
    fn normalize(raw: &[u8]) -> Self {
        match raw.len() {
            0..=16 => CipherKey::Aes128(fit(raw)),
            17..=24 => CipherKey::Aes192(fit(raw)),
            _ => CipherKey::Aes256(fit(raw)),
        }
    }

    fn len(&self) -> usize {
        match self {
            CipherKey::Aes128(_) => 16,
            CipherKey::Aes192(_) => 24,
            CipherKey::Aes256(_) => 32,
        }
    }

    fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, TokenError> {
        match self {
            CipherKey::Aes128(k) => Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(k))
                .encrypt(Nonce::from_slice(nonce), plaintext)
                .map_err(|_| TokenError::Crypto),
            CipherKey::Aes192(k) => Aes192Gcm::new(Key::<Aes192Gcm>::from_slice(k))
                .encrypt(Nonce::from_slice(nonce), plaintext)
                .map_err(|_| TokenError::Crypto),
            CipherKey::Aes256(k) => Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(k))
                .encrypt(Nonce::from_slice(nonce), plaintext)
                .map_err(|_| TokenError::Crypto),
        }
    }

    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, TokenError> {
        match self {
            CipherKey::Aes128(k) => Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(k))
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| TokenError::Crypto),
            CipherKey::Aes192(k) => Aes192Gcm::new(Key::<Aes192Gcm>::from_slice(k))
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| TokenError::Crypto),
            CipherKey::Aes256(k) => Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(k))
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| TokenError::Crypto),
        }
    }
}

/// Copy `raw` into an N-byte array, zero-padding or truncating as needed.
fn fit<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let take = raw.len().min(N);
    out[..take].copy_from_slice(&raw[..take]);
    out
}

/// Token service
///
/// Immutable once constructed; safe to share across request handlers.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    cipher_key: CipherKey,
    token_exp_secs: u64,
    validation: Validation,
}

impl TokenService {
    /// Create the token service from config
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.security.jwt_secret.expose_secret(),
            config.security.aes_key.expose_secret(),
            config.security.token_exp_secs,
        )
    }

    /// Create the token service from raw secrets.
    ///
    /// Construction never fails: the AES key is normalized to a legal length
    /// and the signing secret is accepted as-is.
    pub fn new(jwt_secret: &str, aes_key: &str, token_exp_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        // Zero clock-skew tolerance
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);

        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            cipher_key: CipherKey::normalize(aes_key.as_bytes()),
            token_exp_secs,
            validation,
        }
    }

    /// Normalized AES key length in bytes, always one of {16, 24, 32}
    pub fn key_len(&self) -> usize {
        self.cipher_key.len()
    }

    /// Issue a bearer token for the given identity
    pub fn issue(&self, user_id: &Uuid, email: &str) -> Result<String, TokenError> {
        self.issue_with_lifetime(user_id, email, Duration::seconds(self.token_exp_secs as i64))
    }

    /// Issue a bearer token with an explicit lifetime
    pub fn issue_with_lifetime(
        &self,
        user_id: &Uuid,
        email: &str,
        lifetime: Duration,
    ) -> Result<String, TokenError> {
        let identity = UserIdentity {
            user_id: *user_id,
            email: email.to_string(),
        };

        let plaintext = serde_json::to_vec(&identity).map_err(|_| TokenError::Encoding)?;
        let data = self.seal(&plaintext)?;

        let now = Utc::now();
        let claims = Claims {
            data,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            iss: ISSUER.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to sign token: {:?}", e);
            TokenError::Encoding
        })
    }

    /// Verify a bearer token and recover the identity claims
    pub fn verify(&self, token: &str) -> Result<UserIdentity, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| map_jwt_error(&e))?
            .claims;

        let plaintext = self.open(&claims.data)?;

        serde_json::from_slice(&plaintext).map_err(|_| TokenError::Malformed)
    }

    /// Verify a token and project the user identifier
    pub fn user_id_from_token(&self, token: &str) -> Result<Uuid, TokenError> {
        Ok(self.verify(token)?.user_id)
    }

    /// Encrypt identity bytes into a base64 `nonce || ciphertext` string
    fn seal(&self, plaintext: &[u8]) -> Result<String, TokenError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|_| TokenError::Crypto)?;

        let ciphertext = self.cipher_key.seal(&nonce, plaintext)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(sealed))
    }

    /// Decode and authenticated-decrypt the opaque claim field
    fn open(&self, data: &str) -> Result<Vec<u8>, TokenError> {
        let sealed = BASE64.decode(data).map_err(|_| TokenError::Crypto)?;

        if sealed.len() < NONCE_LEN {
            return Err(TokenError::Crypto);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher_key.open(nonce, ciphertext)
    }
}

/// Map jsonwebtoken's error kinds onto the closed [`TokenError`] enum.
///
/// Unknown or unexpected signing algorithms count as malformed: a token
/// claiming anything but the HS256 family is rejected before its claims are
/// looked at.
fn map_jwt_error(err: &jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test_secret_key_32_characters_long!";
    const TEST_AES_KEY: &str = "0123456789abcdef0123456789abcdef";

    fn test_service() -> TokenService {
        TokenService::new(TEST_SECRET, TEST_AES_KEY, 86400)
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let service = test_service();
        let user_id = Uuid::new_v4();

        let token = service.issue(&user_id, "user@example.com").unwrap();
        let identity = service.verify(&token).unwrap();

        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.email, "user@example.com");

        assert_eq!(service.user_id_from_token(&token).unwrap(), user_id);
    }

    #[test]
    fn test_key_normalization() {
        // Raw key length -> normalized length
        let cases = [
            (5usize, 16usize),
            (16, 16),
            (20, 24),
            (24, 24),
            (30, 32),
            (32, 32),
            (40, 32),
        ];

        let user_id = Uuid::new_v4();
        for (raw_len, expected) in cases {
            let raw_key = "k".repeat(raw_len);
            let service = TokenService::new(TEST_SECRET, &raw_key, 86400);
            assert_eq!(service.key_len(), expected, "raw key length {}", raw_len);

            // Normalized keys must be usable end to end
            let token = service.issue(&user_id, "a@b.com").unwrap();
            assert_eq!(service.verify(&token).unwrap().user_id, user_id);
        }
    }

    #[test]
    fn test_truncated_key_equals_its_prefix() {
        // A 40-byte key truncates to its first 32 bytes
        let long = "0123456789abcdef0123456789abcdefXXXXXXXX";
        let service_long = TokenService::new(TEST_SECRET, long, 86400);
        let service_short = TokenService::new(TEST_SECRET, &long[..32], 86400);

        let user_id = Uuid::new_v4();
        let token = service_long.issue(&user_id, "a@b.com").unwrap();
        assert_eq!(service_short.verify(&token).unwrap().user_id, user_id);
    }

    #[test]
    fn test_expired_token() {
        let service = test_service();
        let token = service
            .issue_with_lifetime(&Uuid::new_v4(), "a@b.com", Duration::seconds(-1))
            .unwrap();

        assert_eq!(service.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn test_not_yet_valid_token() {
        let service = test_service();
        let now = Utc::now().timestamp();

        // Craft a token whose not-before lies in the future; the temporal
        // check fires before the identity payload is ever decrypted.
        let claims = Claims {
            data: "bm90IHJlYWwgZGF0YQ==".to_string(),
            iat: now,
            nbf: now + 3600,
            exp: now + 7200,
            iss: ISSUER.to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(service.verify(&token).unwrap_err(), TokenError::NotYetValid);
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let service = test_service();
        let token = service.issue(&Uuid::new_v4(), "a@b.com").unwrap();

        // Flip the first character of the signature segment; the trailing
        // characters only carry base64 padding bits, so tamper at the front.
        let parts: Vec<&str> = token.split('.').collect();
        let mut sig: Vec<u8> = parts[2].bytes().collect();
        sig[0] = if sig[0] == b'A' { b'B' } else { b'A' };
        let tampered = format!("{}.{}.{}", parts[0], parts[1], String::from_utf8(sig).unwrap());

        assert_eq!(
            service.verify(&tampered).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let service = test_service();
        let token = service.issue(&Uuid::new_v4(), "a@b.com").unwrap();

        // Any change to the payload segment breaks the signature
        let parts: Vec<&str> = token.split('.').collect();
        let mut payload: Vec<u8> = parts[1].bytes().collect();
        payload[0] = if payload[0] == b'A' { b'B' } else { b'A' };
        let tampered = format!(
            "{}.{}.{}",
            parts[0],
            String::from_utf8(payload).unwrap(),
            parts[2]
        );

        assert_eq!(
            service.verify(&tampered).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let service = test_service();
        let token = service.issue(&Uuid::new_v4(), "a@b.com").unwrap();

        // Re-sign with the right secret but corrupt the encrypted claim;
        // the GCM auth tag is the terminal integrity check.
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(TEST_SECRET.as_bytes()),
            &service.validation,
        )
        .unwrap();

        let mut sealed = BASE64.decode(&decoded.claims.data).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        let claims = Claims {
            data: BASE64.encode(sealed),
            ..decoded.claims
        };
        let resigned = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(service.verify(&resigned).unwrap_err(), TokenError::Crypto);
    }

    #[test]
    fn test_wrong_encryption_key_fails() {
        // Same signing secret, different AES key: the signature verifies but
        // authenticated decryption must not.
        let issuer = TokenService::new(TEST_SECRET, "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", 86400);
        let verifier = TokenService::new(TEST_SECRET, "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", 86400);

        let token = issuer.issue(&Uuid::new_v4(), "a@b.com").unwrap();
        assert_eq!(verifier.verify(&token).unwrap_err(), TokenError::Crypto);
    }

    #[test]
    fn test_algorithm_confusion_rejected() {
        let service = test_service();
        let now = Utc::now().timestamp();

        let claims = Claims {
            data: "bm90IHJlYWwgZGF0YQ==".to_string(),
            iat: now,
            nbf: now,
            exp: now + 3600,
            iss: ISSUER.to_string(),
        };

        // HS384 is signed with the very same secret, but the declared
        // algorithm does not match what the verifier expects.
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(service.verify(&token).unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_unsigned_token_rejected() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let service = test_service();
        let now = Utc::now().timestamp();

        let claims = Claims {
            data: "bm90IHJlYWwgZGF0YQ==".to_string(),
            iat: now,
            nbf: now,
            exp: now + 3600,
            iss: ISSUER.to_string(),
        };

        // A token declaring "none" with an empty signature segment must be
        // rejected outright, whatever its payload says.
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let token = format!("{}.{}.", header, payload);

        assert_eq!(service.verify(&token).unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let service = test_service();
        assert_eq!(
            service.verify("not-a-token").unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(service.verify("").unwrap_err(), TokenError::Malformed);
        assert_eq!(service.verify("a.b.c").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_identity_is_not_readable_from_payload() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let service = test_service();
        let token = service
            .issue(&Uuid::new_v4(), "hidden@example.com")
            .unwrap();

        // The JWT payload segment is only base64url; the identity must not
        // be readable without the encryption key.
        let parts: Vec<&str> = token.split('.').collect();
        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let payload_text = String::from_utf8_lossy(&payload);

        assert!(!payload_text.contains("hidden@example.com"));
    }

    #[test]
    fn test_issuer_claim_is_set() {
        let service = test_service();
        let token = service.issue(&Uuid::new_v4(), "a@b.com").unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(TEST_SECRET.as_bytes()),
            &service.validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.iss, ISSUER);
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 86400);
        assert_eq!(decoded.claims.nbf, decoded.claims.iat);
    }
}
