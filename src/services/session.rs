//! JWT session credentials for resolved accounts.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Account, AccountKind, Profile};
use crate::services::accounts;

/// What a session token asserts about its bearer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub kind: AccountKind,
    pub email: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl JwtService {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl_secs,
        }
    }

    pub fn issue(&self, account: &Account) -> Result<String, AppError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: account.account_id.clone(),
            kind: account.kind,
            email: account.email.clone(),
            username: account.username.clone(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("jwt encode failed: {e}")))
    }

    /// Rejects tokens that are malformed, expired, or signed with another secret.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("invalid token: {e}")))
    }
}

/// A freshly minted session and the profile it belongs to.
#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: Profile,
}

/// Mints a session for an existing account. The caller must know both the
/// account id and its email.
pub fn create_session(
    conn: &Connection,
    jwt: &JwtService,
    kind: AccountKind,
    account_id: &str,
    email: &str,
) -> Result<Session, AppError> {
    if account_id.trim().is_empty() {
        return Err(AppError::MissingField("accountId"));
    }
    if email.trim().is_empty() {
        return Err(AppError::MissingField("email"));
    }

    let profile = accounts::profile(conn, kind, account_id)?;
    if profile.account.email != email.trim() {
        return Err(AppError::AccountNotFound);
    }

    let token = jwt.issue(&profile.account)?;
    tracing::info!(account_id = %account_id, %kind, "session created");
    Ok(Session {
        token,
        user: profile,
    })
}

/// Verifies `token` and reloads the account it names.
pub fn verify_token(conn: &Connection, jwt: &JwtService, token: &str) -> Result<Profile, AppError> {
    if token.trim().is_empty() {
        return Err(AppError::MissingField("token"));
    }
    let claims = jwt.verify(token.trim())?;
    accounts::profile(conn, claims.kind, &claims.sub)
}
