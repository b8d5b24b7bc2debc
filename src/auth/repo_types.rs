use serde::Deserialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Row of the `users` table as stored.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub email_verification_token_hash: Option<String>,
    pub email_verification_token_expires_at: Option<OffsetDateTime>,
    pub password_reset_token_hash: Option<String>,
    pub password_reset_token_expires_at: Option<OffsetDateTime>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub location: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Hashed one-time token together with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToken {
    pub hash: String,
    pub expires_at: OffsetDateTime,
}

impl PendingToken {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at < now
    }

    fn from_columns(hash: Option<String>, expires_at: Option<OffsetDateTime>) -> Option<Self> {
        match (hash, expires_at) {
            (Some(hash), Some(expires_at)) => Some(Self { hash, expires_at }),
            _ => None,
        }
    }
}

/// User account. `password_hash` never leaves the service layer.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub email_verification: Option<PendingToken>,
    pub password_reset: Option<PendingToken>,
    pub profile: Profile,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub location: Option<String>,
}

impl Profile {
    pub fn is_complete(&self) -> bool {
        self.first_name.is_some()
            && self.last_name.is_some()
            && self.company.is_some()
            && self.position.is_some()
            && self.location.is_some()
    }

    /// Overwrite only the fields present in `update`.
    pub fn apply(&mut self, update: ProfileUpdate) {
        let ProfileUpdate {
            first_name,
            last_name,
            company,
            position,
            location,
        } = update;
        if first_name.is_some() {
            self.first_name = first_name;
        }
        if last_name.is_some() {
            self.last_name = last_name;
        }
        if company.is_some() {
            self.company = company;
        }
        if position.is_some() {
            self.position = position;
        }
        if location.is_some() {
            self.location = location;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    pub location: Option<String>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            email_verified: r.email_verified,
            email_verification: PendingToken::from_columns(
                r.email_verification_token_hash,
                r.email_verification_token_expires_at,
            ),
            password_reset: PendingToken::from_columns(
                r.password_reset_token_hash,
                r.password_reset_token_expires_at,
            ),
            profile: Profile {
                first_name: r.first_name,
                last_name: r.last_name,
                company: r.company,
                position: r.position,
                location: r.location,
            },
            created_at: r.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn profile_complete_requires_all_fields() {
        let mut profile = Profile::default();
        profile.apply(ProfileUpdate {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            company: Some("Analytical Engines".into()),
            position: Some("Engineer".into()),
            ..Default::default()
        });
        assert!(!profile.is_complete());

        profile.apply(ProfileUpdate {
            location: Some("London".into()),
            ..Default::default()
        });
        assert!(profile.is_complete());
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn token_columns_are_paired() {
        let at = datetime!(2025-01-01 12:00 UTC);
        assert!(PendingToken::from_columns(Some("h".into()), None).is_none());
        assert!(PendingToken::from_columns(None, Some(at)).is_none());
        let token = PendingToken::from_columns(Some("h".into()), Some(at)).unwrap();
        assert!(!token.is_expired(at));
        assert!(token.is_expired(at + time::Duration::seconds(1)));
    }
}
