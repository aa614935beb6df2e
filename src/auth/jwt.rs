//! HS256 session tokens carrying the wallet address.

use alloy::hex;
use alloy::primitives::Address;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Lowercase `0x` wallet address.
    pub address: String,
    pub iat: u64,
    pub exp: u64,
}

/// Signing and verification keys derived from the shared secret.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    /// Issue a token for `address` valid from now.
    pub fn issue(&self, address: &Address) -> Result<String, AuthError> {
        self.issue_at(address, Utc::now().timestamp().max(0) as u64)
    }

    /// Issue a token as if it had been issued at `iat` (seconds since epoch).
    pub fn issue_at(&self, address: &Address, iat: u64) -> Result<String, AuthError> {
        let claims = Claims {
            address: hex::encode_prefixed(address),
            iat,
            exp: iat + self.ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }

    /// Verify signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Verify a token and return the wallet address it names.
    pub fn verify_address(&self, token: &str) -> Result<Address, AuthError> {
        let claims = self.verify(token)?;
        claims
            .address
            .parse::<Address>()
            .map_err(|_| AuthError::InvalidAddress(claims.address.clone()))
    }
}
