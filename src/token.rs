//! Manage json web tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

pub const DEFAULT_EXPIRATION: u64 = 60 * 15; // 15 minutes.

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// User ID.
    pub sub: String,
}

impl Claims {
    /// Numeric user ID carried by `sub`.
    pub fn user_id(&self) -> Result<i64> {
        self.sub.parse().map_err(|_| ServerError::Unauthorized)
    }
}

/// Manage JWT tokens.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiration: u64,
}

impl TokenManager {
    /// Create a new [`TokenManager`] signing with an HMAC secret.
    pub fn new(secret: &str, issuer: &str) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_owned(),
            expiration: DEFAULT_EXPIRATION,
        }
    }

    /// Set token lifetime, in seconds.
    pub fn expiration(mut self, seconds: u64) -> Self {
        self.expiration = seconds;
        self
    }

    fn now() -> Result<u64> {
        Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| ServerError::internal("system clock before Unix epoch", err))?
            .as_secs())
    }

    /// Create a new [`jsonwebtoken`] bound to `user_id`.
    pub fn create(&self, user_id: i64) -> Result<String> {
        let time = Self::now()?;
        let claims = Claims {
            exp: time + self.expiration,
            iat: time,
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|err| ServerError::internal("cannot sign token", err))
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "rejected bearer token");
                ServerError::Unauthorized
            })
    }

    /// Return the user ID bound to a valid token.
    pub fn verify(&self, token: &str) -> Result<i64> {
        self.decode(token)?.user_id()
    }
}
