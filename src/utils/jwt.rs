use crate::error::{AppError, AppResult};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subset of the claims Supabase Auth puts in an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // auth user id (uuid)
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    pub aud: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::AuthError("Token subject is not a user id".to_string()))
    }
}

/// Verifies Supabase access tokens. Tokens are issued by Supabase Auth, never by this service.
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    audience: String,
}

impl JwtService {
    pub fn new(secret: &str, audience: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            audience: audience.to_string(),
        }
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.as_str()]);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Uuid> {
        let claims = self.verify_token(token)?;

        if claims.role.as_deref() == Some("anon") {
            return Err(AppError::AuthError(
                "Anonymous tokens cannot access this resource".to_string(),
            ));
        }

        claims.user_id()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    pub(crate) const SECRET: &str = "test-secret";

    pub(crate) fn sign(sub: &str, aud: &str, role: &str, ttl_secs: i64) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            iat: now.timestamp(),
            aud: aud.to_string(),
            role: Some(role.to_string()),
            email: None,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let service = JwtService::new(SECRET, "authenticated");
        let id = Uuid::new_v4();
        let token = sign(&id.to_string(), "authenticated", "authenticated", 3600);
        assert_eq!(service.verify_access_token(&token).unwrap(), id);
    }

    #[test]
    fn test_reject_expired_token() {
        let service = JwtService::new(SECRET, "authenticated");
        let token = sign(&Uuid::new_v4().to_string(), "authenticated", "authenticated", -3600);
        assert!(matches!(
            service.verify_access_token(&token),
            Err(AppError::JwtError(_))
        ));
    }

    #[test]
    fn test_reject_wrong_audience() {
        let service = JwtService::new(SECRET, "authenticated");
        let token = sign(&Uuid::new_v4().to_string(), "other", "authenticated", 3600);
        assert!(service.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_reject_wrong_secret() {
        let service = JwtService::new("another-secret", "authenticated");
        let token = sign(&Uuid::new_v4().to_string(), "authenticated", "authenticated", 3600);
        assert!(service.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_reject_anon_role_and_bad_subject() {
        let service = JwtService::new(SECRET, "authenticated");
        let anon = sign(&Uuid::new_v4().to_string(), "authenticated", "anon", 3600);
        assert!(matches!(
            service.verify_access_token(&anon),
            Err(AppError::AuthError(_))
        ));

        let bad_sub = sign("not-a-uuid", "authenticated", "authenticated", 3600);
        assert!(matches!(
            service.verify_access_token(&bad_sub),
            Err(AppError::AuthError(_))
        ));
    }
}
