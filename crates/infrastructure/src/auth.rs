//! JWT 凭证签发与校验（HS256）

use application::{ApplicationError, CredentialAuthority, CredentialClaims};
use config::JwtConfig;
use domain::{User, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims 结构
///
/// `username` 与 `color` 只供客户端展示，服务端只信任 `sub`。
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub color: String,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

#[derive(Clone)]
pub struct JwtCredentialAuthority {
    expiration_hours: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCredentialAuthority {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            expiration_hours: config.expiration_hours,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl CredentialAuthority for JwtCredentialAuthority {
    fn issue(&self, user: &User) -> Result<String, ApplicationError> {
        let exp = chrono::Utc::now() + chrono::Duration::hours(self.expiration_hours);
        let claims = Claims {
            sub: Uuid::from(user.id),
            username: user.username.to_string(),
            color: user.color.to_string(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| ApplicationError::infrastructure(format!("token generation failed: {err}")))
    }

    fn verify(&self, token: &str) -> Result<CredentialClaims, ApplicationError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            tracing::debug!(error = %err, "invalid token");
            ApplicationError::Unauthenticated
        })?;

        Ok(CredentialClaims {
            subject: UserId::from(data.claims.sub),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{HexColor, PasswordHash, UserEmail, Username};

    fn config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            expiration_hours: 1,
        }
    }

    fn user() -> User {
        User::register(
            UserId::from(Uuid::new_v4()),
            Username::parse("alice").unwrap(),
            UserEmail::parse("alice@example.com").unwrap(),
            PasswordHash::new("hash").unwrap(),
            HexColor::parse("#336699").unwrap(),
            chrono::Utc::now(),
        )
    }

    #[test]
    fn issued_token_verifies_to_subject() {
        let authority = JwtCredentialAuthority::new(&config("a-test-secret-that-is-long-enough-123"));
        let user = user();

        let token = authority.issue(&user).unwrap();
        let claims = authority.verify(&token).unwrap();
        assert_eq!(claims.subject, user.id);
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let issuer = JwtCredentialAuthority::new(&config("a-test-secret-that-is-long-enough-123"));
        let verifier = JwtCredentialAuthority::new(&config("another-secret-that-is-long-enough-456"));

        let token = issuer.issue(&user()).unwrap();
        assert!(matches!(
            verifier.verify(&token),
            Err(ApplicationError::Unauthenticated)
        ));
        assert!(matches!(
            verifier.verify("not.a.jwt"),
            Err(ApplicationError::Unauthenticated)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let secret = "a-test-secret-that-is-long-enough-123";
        let authority = JwtCredentialAuthority::new(&config(secret));
        let claims = Claims {
            sub: Uuid::new_v4(),
            username: "alice".into(),
            color: "#000000".into(),
            exp: (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            authority.verify(&token),
            Err(ApplicationError::Unauthenticated)
        ));
    }
}
