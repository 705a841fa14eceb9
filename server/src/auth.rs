use crate::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{thread_rng, RngCore};
use serde::{Deserialize, Serialize};
use shared::{Error, Result, Role};
use uuid::Uuid;

pub const PURPOSE_ACCESS: &str = "access";
pub const PURPOSE_VERIFY_EMAIL: &str = "verify_email";
pub const PURPOSE_RESET_PASSWORD: &str = "reset_password";

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub purpose: String,
    pub exp: usize,
}

pub fn issue_token(
    keys: &JwtKeys,
    user_id: Uuid,
    role: Role,
    purpose: &str,
    ttl: Duration,
) -> Result<String> {
    let exp = (Utc::now() + ttl).timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        role: role.as_str().to_string(),
        purpose: purpose.to_string(),
        exp,
    };
    encode(&Header::default(), &claims, &keys.encoding).map_err(Error::internal)
}

pub fn decode_token(keys: &JwtKeys, token: &str, expected_purpose: &str) -> Result<Claims> {
    let data = decode::<Claims>(token, &keys.decoding, &Validation::default())
        .map_err(|_| Error::Unauthenticated)?;
    if data.claims.purpose != expected_purpose {
        return Err(Error::Unauthenticated);
    }
    Ok(data.claims)
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = vec![0u8; 16];
    thread_rng().fill_bytes(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
        .map_err(Error::internal)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    argon2::verify_encoded(hash, password.as_bytes()).unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

impl CurrentUser {
    /// The one authorization gate: admins pass every requirement.
    pub fn require(&self, role: Role) -> Result<()> {
        if self.role == role || self.role == Role::Admin {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = crate::api::ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .ok_or(Error::Unauthenticated)?;
        let token = header.strip_prefix("Bearer ").ok_or(Error::Unauthenticated)?;
        let claims = decode_token(&state.jwt, token, PURPOSE_ACCESS)?;
        let role = Role::parse(&claims.role).ok_or(Error::Unauthenticated)?;
        Ok(CurrentUser {
            id: claims.sub,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trips() {
        let keys = JwtKeys::new("test-secret");
        let user_id = Uuid::new_v4();
        let token =
            issue_token(&keys, user_id, Role::Passenger, PURPOSE_ACCESS, Duration::hours(1))
                .unwrap();

        let claims = decode_token(&keys, &token, PURPOSE_ACCESS).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "passenger");
    }

    #[test]
    fn purpose_mismatch_is_rejected() {
        let keys = JwtKeys::new("test-secret");
        let token = issue_token(
            &keys,
            Uuid::new_v4(),
            Role::Buyer,
            PURPOSE_RESET_PASSWORD,
            Duration::minutes(15),
        )
        .unwrap();

        let err = decode_token(&keys, &token, PURPOSE_ACCESS).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password(&hash, "hunter2hunter2"));
        assert!(!verify_password(&hash, "wrong-password"));
    }

    #[test]
    fn admin_passes_every_role_gate() {
        let admin = CurrentUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        assert!(admin.require(Role::Seller).is_ok());

        let passenger = CurrentUser {
            id: Uuid::new_v4(),
            role: Role::Passenger,
        };
        assert!(passenger.require(Role::Passenger).is_ok());
        assert!(matches!(
            passenger.require(Role::Seller),
            Err(Error::Forbidden)
        ));
    }
}
