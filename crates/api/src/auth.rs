//! Account management: signup, login, sessions, and password resets.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use booking::{Notice, NotificationGateway};
use chrono::{Duration, Utc};
use domain::{NewEmailLog, NewUser, PasswordResetToken, Session, User};
use rand::RngCore;
use store::{Store, StoreError};
use thiserror::Error;

/// Sessions live for a fixed window; expired tokens are rejected, not
/// refreshed.
const SESSION_TTL_DAYS: i64 = 7;
const RESET_TOKEN_TTL_MINUTES: i64 = 60;
const MIN_PASSWORD_LEN: usize = 8;

/// Errors raised by account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("a user already exists with this email")]
    EmailTaken,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be at least 8 characters")]
    PasswordTooShort,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid or expired session token")]
    InvalidSession,

    #[error("invalid or expired reset token")]
    InvalidResetToken,

    #[error("credential hashing failed")]
    Hashing,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::EmailTaken,
            other => AuthError::Store(other),
        }
    }
}

/// Input for creating an account.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Account operations backed by the store, dispatching account email
/// through the notification gateway.
#[derive(Clone)]
pub struct AuthService<S, N>
where
    S: Store,
    N: NotificationGateway,
{
    store: S,
    notifier: N,
}

impl<S, N> AuthService<S, N>
where
    S: Store,
    N: NotificationGateway,
{
    /// Creates a new auth service.
    pub fn new(store: S, notifier: N) -> Self {
        Self { store, notifier }
    }

    /// Creates an account and issues a session. Sends a welcome email
    /// best-effort.
    pub async fn signup(&self, request: SignupRequest) -> Result<(User, Session), AuthError> {
        if !request.email.contains('@') {
            return Err(AuthError::InvalidEmail);
        }
        if request.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }

        let password_hash = hash_password(&request.password)?;
        let user = self
            .store
            .create_user(NewUser {
                email: request.email,
                first_name: request.first_name,
                last_name: request.last_name,
                password_hash,
                is_admin: false,
            })
            .await?;
        tracing::info!(user_id = %user.id, "user registered");

        self.send_account_email(
            &user.email,
            Notice::Welcome {
                first_name: user.first_name.clone(),
            },
        )
        .await;

        let session = self.issue_session(&user).await?;
        Ok((user, session))
    }

    /// Verifies credentials and issues a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, Session), AuthError> {
        let user = self
            .store
            .get_user_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.issue_session(&user).await?;
        Ok((user, session))
    }

    /// Resolves a bearer token to its user. Rejects unknown and expired
    /// sessions.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let session = self
            .store
            .get_session(token)
            .await?
            .ok_or(AuthError::InvalidSession)?;
        if session.is_expired(Utc::now()) {
            return Err(AuthError::InvalidSession);
        }
        self.store
            .get_user(session.user_id)
            .await?
            .ok_or(AuthError::InvalidSession)
    }

    /// Issues a reset token for the account, if one exists.
    ///
    /// Always succeeds with the same outward result whether or not the
    /// email matches an account, so callers cannot enumerate users. A new
    /// token supersedes any outstanding one.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let Some(user) = self.store.get_user_by_email(email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(());
        };

        let now = Utc::now();
        let token = generate_token();
        self.store
            .save_reset_token(PasswordResetToken {
                token: token.clone(),
                user_id: user.id,
                expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
                created_at: now,
            })
            .await?;
        tracing::info!(user_id = %user.id, "password reset token issued");

        self.send_account_email(&user.email, Notice::PasswordReset { reset_token: token })
            .await;
        Ok(())
    }

    /// Consumes a reset token and replaces the account password. The
    /// token is deleted whether or not it had expired, so it can never
    /// be presented twice.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }

        let reset = self
            .store
            .get_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;
        self.store.delete_reset_token(token).await?;
        if reset.is_expired(Utc::now()) {
            return Err(AuthError::InvalidResetToken);
        }

        let password_hash = hash_password(new_password)?;
        self.store
            .update_user_password(reset.user_id, &password_hash)
            .await?;
        tracing::info!(user_id = %reset.user_id, "password reset");

        if let Some(user) = self.store.get_user(reset.user_id).await? {
            self.send_account_email(&user.email, Notice::PasswordChanged)
                .await;
        }
        Ok(())
    }

    async fn issue_session(&self, user: &User) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = Session {
            token: generate_token(),
            user_id: user.id,
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
            created_at: now,
        };
        self.store.create_session(session.clone()).await?;
        Ok(session)
    }

    /// Account-level mail is best-effort: failures are logged and
    /// recorded in the audit trail, never surfaced to the caller.
    async fn send_account_email(&self, recipient: &str, notice: Notice) {
        let email_type = notice.email_type();
        let entry = match self.notifier.send(recipient, notice).await {
            Ok(()) => NewEmailLog::sent(None, email_type, recipient),
            Err(err) => {
                tracing::warn!(%email_type, error = %err, "account email failed");
                NewEmailLog::failed(None, email_type, recipient)
            }
        };
        if let Err(err) = self.store.log_email(entry).await {
            tracing::warn!(error = %err, "failed to append email audit entry");
        }
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hashing)
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// 32 random bytes, hex-encoded. Used for both sessions and reset tokens.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Mints an admin account directly against the store. Admins are never
/// created through the public signup path.
pub async fn create_admin<S: Store>(
    store: &S,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    let user = store
        .create_user(NewUser {
            email: email.to_string(),
            first_name: "Admin".to_string(),
            last_name: "User".to_string(),
            password_hash: hash_password(password)?,
            is_admin: true,
        })
        .await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking::InMemoryMailer;
    use common::UserId;
    use store::InMemoryStore;

    fn service() -> (AuthService<InMemoryStore, InMemoryMailer>, InMemoryStore, InMemoryMailer) {
        let store = InMemoryStore::new();
        let mailer = InMemoryMailer::new();
        let auth = AuthService::new(store.clone(), mailer.clone());
        (auth, store, mailer)
    }

    fn signup_request() -> SignupRequest {
        SignupRequest {
            email: "jane@x.com".to_string(),
            password: "correct horse".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_login_round_trip() {
        let (auth, _, mailer) = service();

        let (user, session) = auth.signup(signup_request()).await.unwrap();
        assert_eq!(user.email, "jane@x.com");
        assert!(!user.is_admin);
        assert_eq!(session.token.len(), 64);
        assert!(matches!(
            mailer.sent_to("jane@x.com")[0],
            Notice::Welcome { .. }
        ));

        let (logged_in, _) = auth.login("jane@x.com", "correct horse").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let authed = auth.authenticate(&session.token).await.unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[tokio::test]
    async fn test_signup_rejects_duplicate_and_weak_input() {
        let (auth, _, _) = service();
        auth.signup(signup_request()).await.unwrap();

        let err = auth.signup(signup_request()).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        let mut short = signup_request();
        short.email = "other@x.com".to_string();
        short.password = "short".to_string();
        assert!(matches!(
            auth.signup(short).await.unwrap_err(),
            AuthError::PasswordTooShort
        ));

        let mut bad_email = signup_request();
        bad_email.email = "not-an-email".to_string();
        assert!(matches!(
            auth.signup(bad_email).await.unwrap_err(),
            AuthError::InvalidEmail
        ));
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let (auth, _, _) = service();
        auth.signup(signup_request()).await.unwrap();

        let err = auth.login("jane@x.com", "wrong password").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = auth.login("nobody@x.com", "whatever!").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let (auth, store, _) = service();
        let (user, _) = auth.signup(signup_request()).await.unwrap();

        let now = Utc::now();
        store
            .create_session(Session {
                token: "stale".to_string(),
                user_id: user.id,
                expires_at: now - Duration::hours(1),
                created_at: now - Duration::days(8),
            })
            .await
            .unwrap();

        assert!(matches!(
            auth.authenticate("stale").await.unwrap_err(),
            AuthError::InvalidSession
        ));
        assert!(matches!(
            auth.authenticate("unknown").await.unwrap_err(),
            AuthError::InvalidSession
        ));
    }

    #[tokio::test]
    async fn test_forgot_password_does_not_reveal_accounts() {
        let (auth, _, mailer) = service();
        auth.signup(signup_request()).await.unwrap();

        // Same Ok(()) either way; only the real account gets mail.
        auth.forgot_password("jane@x.com").await.unwrap();
        auth.forgot_password("nobody@x.com").await.unwrap();

        let reset_mail: Vec<_> = mailer
            .outbox()
            .into_iter()
            .filter(|m| matches!(m.notice, Notice::PasswordReset { .. }))
            .collect();
        assert_eq!(reset_mail.len(), 1);
        assert_eq!(reset_mail[0].recipient, "jane@x.com");
    }

    #[tokio::test]
    async fn test_reset_token_is_single_use() {
        let (auth, _, mailer) = service();
        auth.signup(signup_request()).await.unwrap();
        auth.forgot_password("jane@x.com").await.unwrap();

        let token = mailer
            .sent_to("jane@x.com")
            .into_iter()
            .find_map(|n| match n {
                Notice::PasswordReset { reset_token } => Some(reset_token),
                _ => None,
            })
            .unwrap();

        auth.reset_password(&token, "new password!").await.unwrap();
        auth.login("jane@x.com", "new password!").await.unwrap();
        assert!(matches!(
            auth.login("jane@x.com", "correct horse").await.unwrap_err(),
            AuthError::InvalidCredentials
        ));

        // Second use of the same token fails.
        let err = auth.reset_password(&token, "another pass!").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResetToken));
    }

    #[tokio::test]
    async fn test_new_reset_token_supersedes_old() {
        let (auth, _, mailer) = service();
        auth.signup(signup_request()).await.unwrap();

        auth.forgot_password("jane@x.com").await.unwrap();
        auth.forgot_password("jane@x.com").await.unwrap();

        let tokens: Vec<String> = mailer
            .sent_to("jane@x.com")
            .into_iter()
            .filter_map(|n| match n {
                Notice::PasswordReset { reset_token } => Some(reset_token),
                _ => None,
            })
            .collect();
        assert_eq!(tokens.len(), 2);

        assert!(matches!(
            auth.reset_password(&tokens[0], "new password!").await.unwrap_err(),
            AuthError::InvalidResetToken
        ));
        auth.reset_password(&tokens[1], "new password!").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_admin_helper() {
        let (_, store, _) = service();
        let admin = create_admin(&store, "admin@x.com", "admin password")
            .await
            .unwrap();
        assert!(admin.is_admin);
        assert_ne!(admin.id, UserId::new());
    }
}
