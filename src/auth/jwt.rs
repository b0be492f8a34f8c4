use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenUser};
use crate::{config::JwtConfig, state::AppState};

/// Any reason a token was refused; carries no detail.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid token")]
pub struct InvalidToken;

/// Signs and verifies HS256 identity tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!cfg.secret.is_empty(), "jwt secret must not be empty");
        anyhow::ensure!(cfg.ttl_seconds > 0, "jwt ttl must be positive");
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::seconds(cfg.ttl_seconds),
        })
    }

    pub fn issue(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now + self.ttl;
        let claims = Claims {
            user: TokenUser { id: user_id },
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Uuid, InvalidToken> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(reason = ?e.kind(), "jwt rejected");
            InvalidToken
        })?;
        debug!(user_id = %data.claims.user.id, "jwt verified");
        Ok(data.claims.user.id)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

#[cfg(test)]
pub(crate) fn test_keys() -> JwtKeys {
    JwtKeys::new(&JwtConfig {
        secret: "dev-secret".into(),
        ttl_seconds: crate::config::DEFAULT_TOKEN_TTL_SECONDS,
    })
    .expect("test keys")
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::decode_header;

    fn keys_with(secret: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            ttl_seconds: 360_000,
        })
        .unwrap()
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = test_keys();
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).expect("sign");
        assert_eq!(keys.verify(&token), Ok(user_id));
    }

    #[test]
    fn payload_keeps_user_id_shape_and_ttl() {
        let keys = test_keys();
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let user_id = Uuid::new_v4();
        let token = keys.issue_at(user_id, now).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data = decode::<serde_json::Value>(
            &token,
            &DecodingKey::from_secret(b"dev-secret"),
            &validation,
        )
        .unwrap();
        assert_eq!(data.claims["user"]["id"], user_id.to_string());
        assert_eq!(data.claims["iat"], 1_700_000_000i64);
        assert_eq!(data.claims["exp"], 1_700_000_000i64 + 360_000);
        assert_eq!(decode_header(&token).unwrap().alg, Algorithm::HS256);
    }

    #[test]
    fn expired_token_is_invalid() {
        let keys = test_keys();
        let issued = OffsetDateTime::now_utc() - Duration::seconds(360_000 + 5);
        let token = keys.issue_at(Uuid::new_v4(), issued).unwrap();
        assert_eq!(keys.verify(&token), Err(InvalidToken));
    }

    #[test]
    fn token_just_inside_ttl_is_valid() {
        let keys = test_keys();
        let issued = OffsetDateTime::now_utc() - Duration::seconds(360_000 - 60);
        let user_id = Uuid::new_v4();
        let token = keys.issue_at(user_id, issued).unwrap();
        assert_eq!(keys.verify(&token), Ok(user_id));
    }

    #[test]
    fn any_altered_character_invalidates() {
        let keys = test_keys();
        let token = keys.issue(Uuid::new_v4()).unwrap();
        for (i, c) in token.char_indices() {
            let replacement = if c == 'A' { 'B' } else { 'A' };
            let mut tampered = token.clone();
            tampered.replace_range(i..i + c.len_utf8(), &replacement.to_string());
            assert_eq!(keys.verify(&tampered), Err(InvalidToken), "position {i}");
        }
    }

    #[test]
    fn other_secret_is_rejected() {
        let token = keys_with("secret-a").issue(Uuid::new_v4()).unwrap();
        assert_eq!(keys_with("secret-b").verify(&token), Err(InvalidToken));
    }

    #[test]
    fn garbage_is_rejected() {
        let keys = test_keys();
        assert_eq!(keys.verify(""), Err(InvalidToken));
        assert_eq!(keys.verify("not.a.jwt"), Err(InvalidToken));
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        let err = JwtKeys::new(&JwtConfig {
            secret: String::new(),
            ttl_seconds: 10,
        });
        assert!(err.is_err());
    }
}
