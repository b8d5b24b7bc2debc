use std::sync::Arc;

use lazy_static::lazy_static;
use rand::{rngs::OsRng, Rng};
use regex::Regex;
use time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    error::{AuthError, TokenPurpose},
    jwt::SessionIssuer,
    mailer::EmailSender,
    password::PasswordHasher,
    repo::UserStore,
    repo_types::{PendingToken, ProfileUpdate, User},
};
use crate::clock::Clock;

pub const TOKEN_LENGTH: usize = 5;
/// Lifetime of verification and reset tokens.
pub const TOKEN_TTL_MINUTES: i64 = 1;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Random numeric one-time code. Stored only as a hash.
pub fn generate_token() -> String {
    let mut rng = OsRng;
    (0..TOKEN_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Result of `register` and `login`.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub token: String,
    pub message: &'static str,
}

/// Credential and one-time token lifecycle.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    sessions: Arc<dyn SessionIssuer>,
    mailer: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: Arc<dyn PasswordHasher>,
        sessions: Arc<dyn SessionIssuer>,
        mailer: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            hasher,
            sessions,
            mailer,
            clock,
        }
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError> {
        let password_hash = self.hasher.hash(password)?;
        let mut user = self.users.create(email, &password_hash).await?;

        let token = self.issue_pending_token()?;
        user.email_verification = Some(token.pending);
        self.users.update(&user).await?;

        self.deliver(
            email,
            "Email Verification",
            &format!(
                "Only one step to take full advantage of LinkUp.\n\n\
                 Enter this code to verify your email: {}. The code will expire in {} minutes.",
                token.raw, TOKEN_TTL_MINUTES
            ),
        )
        .await;

        let session = self.sessions.issue(email)?;
        info!(user_id = %user.id, "user registered");
        Ok(SessionGrant {
            token: session,
            message: "User registered successfully.",
        })
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionGrant, AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !self.hasher.matches(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.sessions.issue(&user.email)?;
        info!(user_id = %user.id, "user logged in");
        Ok(SessionGrant {
            token: session,
            message: "Authentication succeeded.",
        })
    }

    #[instrument(skip(self))]
    pub async fn send_email_verification_token(&self, email: &str) -> Result<(), AuthError> {
        let mut user = match self.users.find_by_email(email).await? {
            Some(u) if !u.email_verified => u,
            _ => return Err(AuthError::AlreadyVerifiedOrNotFound),
        };

        let token = self.issue_pending_token()?;
        user.email_verification = Some(token.pending);
        self.users.update(&user).await?;

        self.deliver(
            email,
            "Email Verification",
            &format!(
                "Only one step to take full advantage of LinkUp.\n\n\
                 Enter this code to verify your email: {}\n\n\
                 The code will expire in {} minutes.",
                token.raw, TOKEN_TTL_MINUTES
            ),
        )
        .await;
        Ok(())
    }

    #[instrument(skip(self, token))]
    pub async fn validate_email_verification_token(
        &self,
        token: &str,
        email: &str,
    ) -> Result<(), AuthError> {
        let purpose = TokenPurpose::EmailVerification;
        let Some(mut user) = self.users.find_by_email(email).await? else {
            return Err(AuthError::TokenInvalid(purpose));
        };
        self.check_token(user.email_verification.as_ref(), token, purpose)?;

        user.email_verified = true;
        user.email_verification = None;
        self.users.update(&user).await?;
        info!(user_id = %user.id, "email verified");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn send_password_reset_token(&self, email: &str) -> Result<(), AuthError> {
        let mut user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = self.issue_pending_token()?;
        user.password_reset = Some(token.pending);
        self.users.update(&user).await?;

        self.deliver(
            email,
            "Password Reset",
            &format!(
                "You requested a password reset.\n\n\
                 Enter this code to reset your password: {}. The code will expire in {} minutes.",
                token.raw, TOKEN_TTL_MINUTES
            ),
        )
        .await;
        Ok(())
    }

    #[instrument(skip(self, new_password, token))]
    pub async fn reset_password(
        &self,
        email: &str,
        new_password: &str,
        token: &str,
    ) -> Result<(), AuthError> {
        let purpose = TokenPurpose::PasswordReset;
        let Some(mut user) = self.users.find_by_email(email).await? else {
            return Err(AuthError::TokenInvalid(purpose));
        };
        self.check_token(user.password_reset.as_ref(), token, purpose)?;

        user.password_reset = None;
        user.password_hash = self.hasher.hash(new_password)?;
        self.users.update(&user).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    pub async fn get_user(&self, email: &str) -> Result<User, AuthError> {
        self.users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), AuthError> {
        if !self.users.delete(id).await? {
            return Err(AuthError::UserNotFound);
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<User, AuthError> {
        let mut user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        user.profile.apply(update);
        self.users.update(&user).await?;
        Ok(user)
    }

    fn issue_pending_token(&self) -> Result<RawToken, AuthError> {
        let raw = generate_token();
        let pending = PendingToken {
            hash: self.hasher.hash(&raw)?,
            expires_at: self.clock.now() + Duration::minutes(TOKEN_TTL_MINUTES),
        };
        Ok(RawToken { raw, pending })
    }

    /// Hash match is decided before expiry, so an expired token is only
    /// reported for a caller who already knows the code.
    fn check_token(
        &self,
        stored: Option<&PendingToken>,
        supplied: &str,
        purpose: TokenPurpose,
    ) -> Result<(), AuthError> {
        let Some(stored) = stored else {
            return Err(AuthError::TokenInvalid(purpose));
        };
        if !self.hasher.matches(supplied, &stored.hash)? {
            return Err(AuthError::TokenInvalid(purpose));
        }
        if stored.is_expired(self.clock.now()) {
            return Err(AuthError::TokenExpired(purpose));
        }
        Ok(())
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) {
        if let Err(e) = self.mailer.send_email(to, subject, body).await {
            warn!(error = %e, subject, "error while sending email");
        }
    }
}

struct RawToken {
    raw: String,
    pending: PendingToken,
}
