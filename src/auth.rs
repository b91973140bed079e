//! Caller identity: bearer-token sessions and the integration API key.

use actix_web::dev::Payload;
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use futures::future::{ready, Ready};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::types::ServiceError;

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User email
    pub sub: String,
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Issues and verifies session tokens, and knows the integration API key.
pub struct TokenService {
    api_key: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    expire_minutes: i64,
}

impl TokenService {
    pub fn new(api_key: &str, jwt_secret: &str, expire_minutes: i64) -> Self {
        Self {
            api_key: api_key.to_owned(),
            encoding: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt_secret.as_bytes()),
            expire_minutes,
        }
    }

    pub fn issue_token(&self, user_id: i64, email: &str) -> Result<AccessToken, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_owned(),
            user_id,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.expire_minutes)).timestamp(),
        };

        let access_token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| ServiceError::Internal(format!("Token generation failed: {err}")))?;

        Ok(AccessToken {
            access_token,
            token_type: "bearer",
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => {
                    ServiceError::Unauthorized("Token has expired".into())
                }
                _ => ServiceError::unauthorized(),
            })
    }

    fn is_api_key(&self, candidate: &str) -> bool {
        let expected = self.api_key.as_bytes();
        let given = candidate.as_bytes();
        expected.len() == given.len()
            && expected
                .iter()
                .zip(given)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User { user_id: i64, email: String },
    Privileged,
}

/// The user a reservation operation acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    /// Privileged actors bypass ownership checks.
    pub privileged: bool,
}

impl Identity {
    pub fn require_privileged(&self) -> Result<(), ServiceError> {
        match self {
            Identity::Privileged => Ok(()),
            Identity::User { .. } => Err(ServiceError::api_key_required()),
        }
    }

    pub fn require_user(&self) -> Result<i64, ServiceError> {
        match self {
            Identity::User { user_id, .. } => Ok(*user_id),
            Identity::Privileged => Err(ServiceError::Forbidden(
                "This operation requires a user session".into(),
            )),
        }
    }

    /// Session callers act as themselves; API-key callers must name a user.
    pub fn actor(&self, explicit_user_id: Option<i64>) -> Result<Actor, ServiceError> {
        match self {
            Identity::User { user_id, .. } => Ok(Actor {
                user_id: *user_id,
                privileged: false,
            }),
            Identity::Privileged => explicit_user_id
                .map(|user_id| Actor {
                    user_id,
                    privileged: true,
                })
                .ok_or_else(|| ServiceError::Validation("User ID is required".into())),
        }
    }
}

pub fn resolve_identity(
    api_key: Option<&str>,
    authorization: Option<&str>,
    tokens: &TokenService,
) -> Result<Identity, ServiceError> {
    if let Some(key) = api_key {
        if tokens.is_api_key(key) {
            return Ok(Identity::Privileged);
        }
        tracing::warn!("rejected request with invalid API key");
        return Err(ServiceError::Unauthorized("Invalid API key".into()));
    }

    let token = authorization
        .and_then(bearer_token)
        .ok_or_else(ServiceError::unauthorized)?;

    let claims = tokens.verify(token)?;
    Ok(Identity::User {
        user_id: claims.user_id,
        email: claims.sub,
    })
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

impl FromRequest for Identity {
    type Error = ServiceError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(tokens) = req.app_data::<Data<TokenService>>() else {
            return ready(Err(ServiceError::Internal(
                "TokenService is not registered".into(),
            )));
        };

        let headers = req.headers();
        ready(resolve_identity(
            header_str(headers, API_KEY_HEADER),
            header_str(headers, AUTHORIZATION.as_str()),
            tokens,
        ))
    }
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(password: &str, hashed: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hashed)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    fn service() -> TokenService {
        TokenService::new("integration-key", "test-secret-test-secret-test-secret", 30)
    }

    fn bearer_for(tokens: &TokenService, user_id: i64) -> String {
        let token = tokens.issue_token(user_id, "ada@example.com").unwrap();
        format!("Bearer {}", token.access_token)
    }

    #[test]
    fn valid_api_key_wins_over_session() {
        let tokens = service();
        let bearer = bearer_for(&tokens, 7);

        let identity =
            resolve_identity(Some("integration-key"), Some(&bearer), &tokens).unwrap();

        assert_eq!(identity, Identity::Privileged);
    }

    #[test]
    fn wrong_api_key_is_unauthorized() {
        let tokens = service();
        let bearer = bearer_for(&tokens, 7);

        let err = resolve_identity(Some("guess"), Some(&bearer), &tokens).unwrap_err();

        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn bearer_token_resolves_user() {
        let tokens = service();
        let bearer = bearer_for(&tokens, 42);

        let identity = resolve_identity(None, Some(&bearer), &tokens).unwrap();

        assert_eq!(
            identity,
            Identity::User {
                user_id: 42,
                email: "ada@example.com".into()
            }
        );
    }

    #[test]
    fn missing_credentials_are_unauthorized() {
        let err = resolve_identity(None, None, &service()).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let err = resolve_identity(None, Some("Basic abc"), &service()).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new("integration-key", "test-secret-test-secret-test-secret", -10);
        let bearer = bearer_for(&tokens, 7);

        let err = resolve_identity(None, Some(&bearer), &tokens).unwrap_err();

        assert!(matches!(err, ServiceError::Unauthorized(msg) if msg.contains("expired")));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let foreign = TokenService::new("integration-key", "another-secret-another-secret", 30);
        let bearer = bearer_for(&foreign, 7);

        assert!(resolve_identity(None, Some(&bearer), &service()).is_err());
    }

    #[test]
    fn session_user_is_forbidden_from_privileged_routes() {
        let identity = Identity::User {
            user_id: 1,
            email: "ada@example.com".into(),
        };
        assert!(matches!(
            identity.require_privileged(),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(Identity::Privileged.require_privileged().is_ok());
    }

    #[test]
    fn session_actor_ignores_explicit_user() {
        let identity = Identity::User {
            user_id: 1,
            email: "ada@example.com".into(),
        };
        let actor = identity.actor(Some(99)).unwrap();
        assert_eq!(
            actor,
            Actor {
                user_id: 1,
                privileged: false
            }
        );
    }

    #[test]
    fn privileged_actor_needs_user_id() {
        assert!(matches!(
            Identity::Privileged.actor(None),
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(
            Identity::Privileged.actor(Some(5)).unwrap(),
            Actor {
                user_id: 5,
                privileged: true
            }
        );
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hashed).unwrap());
        assert!(!verify_password("battery staple", &hashed).unwrap());
    }

    #[actix_web::test]
    async fn extractor_reads_api_key_header() {
        let req = TestRequest::default()
            .app_data(Data::new(service()))
            .insert_header((API_KEY_HEADER, "integration-key"))
            .to_http_request();

        let identity = Identity::extract(&req).await.unwrap();

        assert_eq!(identity, Identity::Privileged);
    }

    #[actix_web::test]
    async fn extractor_without_headers_fails() {
        let req = TestRequest::default()
            .app_data(Data::new(service()))
            .to_http_request();

        assert!(Identity::extract(&req).await.is_err());
    }
}
