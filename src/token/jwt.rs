//! Bearer-token primitives: claims, signing, and verification.
//!
//! Tokens are standard three-segment JWTs (base64url JSON header and
//! claims plus a signature). HS256 uses a symmetric key held behind
//! [`secrecy`]; RS256 accepts PKCS#8 or PKCS#1 keys in PEM or DER. The
//! unsigned mode exists for tests and is refused by
//! [`crate::token::TokenService`] unless configuration opts in.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::RsaPrivateKey;
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct Header {
    pub alg: String,
    pub typ: String,
}

/// Claims of a bearer token. `exp` is always `iat` plus the configured
/// lifetime at signing time; `jti` is unique per issuance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// Value of a claim by name: `sub` and `jti` first, then extra claims
    /// (string values only).
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&str> {
        match name {
            "sub" => Some(self.sub.as_str()),
            "jti" => self.jti.as_deref(),
            _ => self.extra.get(name).and_then(serde_json::Value::as_str),
        }
    }
}

/// Signing algorithm and key material.
pub enum Signer {
    Hs256 { key: SecretBox<Vec<u8>> },
    Rs256 { key: Box<RsaPrivateKey> },
    /// No signature. Test configurations only.
    Unsigned,
}

impl Signer {
    #[must_use]
    pub fn hs256(key: impl Into<Vec<u8>>) -> Self {
        Self::Hs256 {
            key: SecretBox::new(Box::new(key.into())),
        }
    }

    /// Parse an RSA private key, trying PKCS#8 and PKCS#1, PEM and DER.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the key cannot be parsed.
    pub fn rs256_from_pem_or_der(pem_or_der: &[u8]) -> Result<Self, Error> {
        let key = decode_private_key(pem_or_der)?;
        Ok(Self::Rs256 { key: Box::new(key) })
    }

    #[must_use]
    pub fn rs256(key: RsaPrivateKey) -> Self {
        Self::Rs256 { key: Box::new(key) }
    }

    #[must_use]
    pub fn unsigned() -> Self {
        Self::Unsigned
    }

    pub(crate) fn alg(&self) -> &'static str {
        match self {
            Self::Hs256 { .. } => "HS256",
            Self::Rs256 { .. } => "RS256",
            Self::Unsigned => "none",
        }
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value).map_err(|_| Error::Malformed)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| Error::Malformed)
}

fn decode_private_key(pem_or_der: &[u8]) -> Result<RsaPrivateKey, Error> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let s = std::str::from_utf8(pem_or_der).map_err(|_| Error::Malformed)?;
        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(s) {
            return Ok(key);
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(s) {
            return Ok(key);
        }
        return Err(Error::Malformed);
    }

    if let Ok(key) = RsaPrivateKey::from_pkcs8_der(pem_or_der) {
        return Ok(key);
    }
    if let Ok(key) = RsaPrivateKey::from_pkcs1_der(pem_or_der) {
        return Ok(key);
    }
    Err(Error::Malformed)
}

/// Encode and sign claims with the configured algorithm.
///
/// # Errors
/// Returns an error if claims cannot be encoded or signing fails.
pub(crate) fn sign(signer: &Signer, claims: &Claims) -> Result<String, Error> {
    let header = Header {
        alg: signer.alg().to_string(),
        typ: "JWT".to_string(),
    };
    let header_b64 = b64e_json(&header)?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature_b64 = match signer {
        Signer::Hs256 { key } => {
            let mut mac = HmacSha256::new_from_slice(key.expose_secret())
                .map_err(|_| Error::BadSignature)?;
            mac.update(signing_input.as_bytes());
            Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes())
        }
        Signer::Rs256 { key } => {
            let signing_key = SigningKey::<Sha256>::new((**key).clone());
            let signature: Signature = signing_key.sign(signing_input.as_bytes());
            Base64UrlUnpadded::encode_string(&signature.to_vec())
        }
        Signer::Unsigned => String::new(),
    };

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Decode a token, verify its signature, and (optionally) its expiry.
///
/// Expiry-tolerant decoding (`check_expiry = false`) exists so stale
/// sessions can still be explicitly revoked; the signature is always
/// checked for signed algorithms.
///
/// # Errors
/// `Malformed` for undecodable tokens, `BadSignature` for algorithm
/// mismatch or signature failure, `Expired` when past `exp`.
pub(crate) fn decode(
    signer: &Signer,
    token: &str,
    now_unix_seconds: i64,
    check_expiry: bool,
) -> Result<Claims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::Malformed)?;
    let claims_b64 = parts.next().ok_or(Error::Malformed)?;
    let sig_b64 = parts.next().ok_or(Error::Malformed)?;
    if parts.next().is_some() {
        return Err(Error::Malformed);
    }

    let header: Header = b64d_json(header_b64)?;
    if header.alg != signer.alg() {
        return Err(Error::BadSignature);
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    match signer {
        Signer::Hs256 { key } => {
            let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Malformed)?;
            let mut mac = HmacSha256::new_from_slice(key.expose_secret())
                .map_err(|_| Error::BadSignature)?;
            mac.update(signing_input.as_bytes());
            mac.verify_slice(&signature).map_err(|_| Error::BadSignature)?;
        }
        Signer::Rs256 { key } => {
            let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Malformed)?;
            let verifying_key = VerifyingKey::<Sha256>::new(key.to_public_key());
            let signature =
                Signature::try_from(signature.as_slice()).map_err(|_| Error::BadSignature)?;
            verifying_key
                .verify(signing_input.as_bytes(), &signature)
                .map_err(|_| Error::BadSignature)?;
        }
        Signer::Unsigned => {
            if !sig_b64.is_empty() {
                return Err(Error::BadSignature);
            }
        }
    }

    let claims: Claims = b64d_json(claims_b64)?;
    if check_expiry && claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}
