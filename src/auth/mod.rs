use actix_web::error::ErrorInternalServerError;
use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use futures_util::future::{err, ok, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{DirectoryError, DirectoryResult};
use crate::models::{User, Viewer};
use crate::store::Store;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // user id
    pub exp: i64,         // expiration timestamp
    pub iat: i64,         // issued at
}

pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Hash a password using bcrypt
    pub fn hash_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(password, 10)
    }

    /// Verify a password against a bcrypt hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(password, hash)
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user_id: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::days(7);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
    }

    /// Validate a JWT token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Create an account with a hashed password. Registration and the admin
    /// bootstrap both go through here.
    pub fn create_account(
        &self,
        store: &Store,
        username: &str,
        email: &str,
        password: &str,
        is_moderator: bool,
        is_admin: bool,
    ) -> DirectoryResult<User> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(DirectoryError::Validation(
                "Username, email and password are required".to_string(),
            ));
        }

        let mut user = User {
            id: 0,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: self.hash_password(password)?,
            is_moderator,
            is_admin,
            created_at: Utc::now(),
        };
        store.create_user(&mut user)?;
        Ok(user)
    }

    /// Check a username/password pair. Unknown users and wrong passwords give
    /// the same error.
    pub fn authenticate(&self, store: &Store, username: &str, password: &str) -> DirectoryResult<User> {
        let invalid = || DirectoryError::Unauthorized("Invalid credentials".to_string());
        let user = match store.get_user_by_username(username.trim()) {
            Ok(user) => user,
            Err(DirectoryError::NotFound(_)) => return Err(invalid()),
            Err(e) => return Err(e),
        };

        if !self.verify_password(password, &user.password_hash).unwrap_or(false) {
            return Err(invalid());
        }
        Ok(user)
    }

    /// Resolve the `Authorization` header to a viewer. No header means an
    /// anonymous viewer; anything present but unusable is rejected.
    pub fn viewer_from_header(&self, store: &Store, header: Option<&str>) -> DirectoryResult<Viewer> {
        let header = match header {
            Some(h) => h,
            None => return Ok(Viewer::Anonymous),
        };

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| DirectoryError::Unauthorized("Invalid Authorization header format".to_string()))?;

        let claims = self
            .validate_token(token.trim())
            .map_err(|_| DirectoryError::Unauthorized("Invalid token".to_string()))?;
        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| DirectoryError::Unauthorized("Invalid token".to_string()))?;

        // Roles are read fresh so revocations apply without reissuing tokens.
        match store.get_user(user_id) {
            Ok(user) => Ok(Viewer::from(&user)),
            Err(DirectoryError::NotFound(_)) => {
                Err(DirectoryError::Unauthorized("Account no longer exists".to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Extract the viewer from a request. Requires `web::Data<Arc<Store>>` and
/// `web::Data<Arc<AuthService>>` to be registered on the app.
impl FromRequest for Viewer {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let (store, auth_service) = match (
            req.app_data::<web::Data<Arc<Store>>>(),
            req.app_data::<web::Data<Arc<AuthService>>>(),
        ) {
            (Some(store), Some(auth)) => (store, auth),
            _ => {
                log::error!("Store or AuthService not registered as app data");
                return err(ErrorInternalServerError("Authentication is not configured"));
            }
        };

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok());

        match auth_service.viewer_from_header(store, header) {
            Ok(viewer) => ok(viewer),
            Err(e) => err(e.into()),
        }
    }
}
