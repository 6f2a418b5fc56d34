//! Accounts and sessions.
//!
//! Passwords are stored as `salt$digest` where the digest is SHA-256 over
//! salt and password, compared in constant time. Sessions are opaque random
//! tokens held in an in-process table and carried by a cookie; restarting
//! the server logs everyone out, which is acceptable for this deployment
//! shape.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

pub const SESSION_COOKIE: &str = "yatube_session";

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username is already taken")]
    UsernameTaken,
    #[error("invalid username: {0}")]
    InvalidUsername(&'static str),
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl AuthError {
    /// Message for re-rendering the login/signup form.
    pub fn form_message(&self) -> String {
        match self {
            AuthError::UsernameTaken => "Пользователь с таким именем уже существует.".to_string(),
            AuthError::InvalidUsername(reason) => format!("Некорректное имя пользователя: {reason}"),
            AuthError::WeakPassword => {
                "Пароль слишком короткий. Минимальная длина: 8 символов.".to_string()
            }
            AuthError::InvalidCredentials => "Неверное имя пользователя или пароль.".to_string(),
            AuthError::Repo(_) => "Сервис временно недоступен.".to_string(),
        }
    }
}

/// The authenticated principal attached to a session token.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
}

impl From<&UserRecord> for SessionUser {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: DashMap<String, SessionUser>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>) -> Self {
        Self {
            users,
            sessions: DashMap::new(),
        }
    }

    /// Register a new account and open a session for it.
    pub async fn signup(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(UserRecord, String), AuthError> {
        validate_username(username)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let user = self
            .users
            .create_user(CreateUserParams {
                username: username.to_string(),
                password_hash: hash_password(password),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AuthError::UsernameTaken,
                other => AuthError::Repo(other),
            })?;

        info!(target = "yatube::auth", username = %user.username, "account created");
        let token = self.open_session(&user);
        Ok((user, token))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let user = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&user.password_hash, password) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(self.open_session(&user))
    }

    pub fn logout(&self, token: &str) {
        self.sessions.remove(token);
    }

    pub fn session_user(&self, token: &str) -> Option<SessionUser> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    /// Resolve the full user record behind a session token.
    pub async fn current_user(&self, token: &str) -> Result<Option<UserRecord>, AuthError> {
        let Some(session) = self.session_user(token) else {
            return Ok(None);
        };
        Ok(self.users.find_user_by_id(session.id).await?)
    }

    fn open_session(&self, user: &UserRecord) -> String {
        let token = generate_token();
        self.sessions.insert(token.clone(), SessionUser::from(user));
        token
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::InvalidUsername("must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AuthError::InvalidUsername("too long"));
    }
    let allowed = username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'));
    if !allowed {
        return Err(AuthError::InvalidUsername(
            "only letters, digits and @/./+/-/_ are allowed",
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> String {
    let salt = hex::encode(Uuid::new_v4().as_bytes());
    let digest = digest_password(&salt, password);
    format!("{salt}${digest}")
}

fn verify_password(stored: &str, candidate: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    let computed = digest_password(salt, candidate);
    computed.as_bytes().ct_eq(digest.as_bytes()).into()
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_token() -> String {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}
