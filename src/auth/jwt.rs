use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, error};
use uuid::Uuid;

use super::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{IdentityError, Result};

/// Fixed lifetime of every issued token.
pub const TOKEN_TTL: Duration = Duration::hours(24);

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Signing and verification keys, built once at startup and shared read-only.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&cfg.audience));
        validation.set_issuer(std::slice::from_ref(&cfg.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            validation,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(&self, user_id: Uuid, now: OffsetDateTime) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: (now + TOKEN_TTL).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "jwt encode failed");
            IdentityError::SigningFailed(e.to_string())
        })?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    /// Returns the subject of a well-formed, correctly signed, unexpired token.
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            match e.kind() {
                ErrorKind::ExpiredSignature => IdentityError::TokenExpired,
                _ => IdentityError::TokenInvalid,
            }
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}
