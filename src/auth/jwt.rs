use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{AuthClaim, Claims, Role};
use crate::config::JwtConfig;

/// Session tokens live exactly one day.
pub const TOKEN_TTL: Duration = Duration::hours(24);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Malformed, expired, or wrongly signed. Deliberately a single variant.
    #[error("invalid token")]
    Invalid,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Issues and verifies stateless session tokens.
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: Uuid, role: Role) -> Result<String, TokenError>;
    fn verify(&self, token: &str) -> Result<AuthClaim, TokenError>;
}

/// HS256 signing keys with issuer/audience pinning.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    pub fn issue_at(
        &self,
        user_id: Uuid,
        role: Role,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let exp = issued_at + TOKEN_TTL;
        let claims = Claims {
            sub: user_id,
            role,
            iat: issued_at.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user_id, role = %role, "jwt signed");
        Ok(token)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss", "aud"]);
        validation
    }
}

impl TokenService for JwtKeys {
    fn issue(&self, user_id: Uuid, role: Role) -> Result<String, TokenError> {
        self.issue_at(user_id, role, OffsetDateTime::now_utc())
    }

    fn verify(&self, token: &str) -> Result<AuthClaim, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation()).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            TokenError::Invalid
        })?;
        debug!(user_id = %data.claims.sub, role = %data.claims.role, "jwt verified");
        Ok(AuthClaim::from(&data.claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
        })
    }

    #[test]
    fn issue_and_verify_carries_identity_and_role() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id, Role::Doctor).expect("issue");
        let claim = keys.verify(&token).expect("verify");
        assert_eq!(claim.user_id, user_id);
        assert_eq!(claim.role, Role::Doctor);
    }

    #[test]
    fn token_is_valid_until_one_day_after_issuance() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let now = OffsetDateTime::now_utc();

        let almost_a_day_old = keys
            .issue_at(Uuid::new_v4(), Role::Patient, now - Duration::minutes(23 * 60 + 59))
            .unwrap();
        assert!(keys.verify(&almost_a_day_old).is_ok());

        let just_over_a_day_old = keys
            .issue_at(Uuid::new_v4(), Role::Patient, now - Duration::minutes(24 * 60 + 1))
            .unwrap();
        assert!(matches!(
            keys.verify(&just_over_a_day_old),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn expiry_is_exactly_24h_after_issuance() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let issued_at = OffsetDateTime::now_utc();
        let token = keys.issue_at(Uuid::new_v4(), Role::Patient, issued_at).unwrap();

        let mut validation = keys.validation();
        validation.validate_exp = false;
        let data = decode::<Claims>(&token, &keys.decoding, &validation).unwrap();
        assert_eq!(data.claims.exp - data.claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn verify_rejects_foreign_signature() {
        let good = make_keys("secret-a", "iss", "aud");
        let bad = make_keys("secret-b", "iss", "aud");
        let token = good.issue(Uuid::new_v4(), Role::Patient).unwrap();
        assert!(matches!(bad.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.issue(Uuid::new_v4(), Role::Patient).unwrap();
        assert!(matches!(bad.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn verify_rejects_tampered_and_malformed_tokens() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.issue(Uuid::new_v4(), Role::Patient).unwrap();

        // Swap the payload for one claiming the doctor role.
        let forged_claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::Doctor,
            iat: 0,
            exp: usize::MAX / 2,
            iss: "iss".into(),
            aud: "aud".into(),
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &forged_claims,
            &EncodingKey::from_secret(b"attacker"),
        )
        .unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        parts[1] = forged_parts[1];
        let tampered = parts.join(".");

        assert!(matches!(keys.verify(&tampered), Err(TokenError::Invalid)));
        assert!(matches!(keys.verify("not-a-jwt"), Err(TokenError::Invalid)));
        assert!(matches!(keys.verify(""), Err(TokenError::Invalid)));
    }
}
