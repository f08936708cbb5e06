use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use crate::domain::session::models::EmailAddress;
use crate::domain::session::models::ExternalIdentity;
use crate::domain::session::models::LoginType;
use crate::domain::session::models::Provider;
use crate::domain::session::models::User;
use crate::domain::session::models::Username;
use crate::session::errors::SessionError;
use crate::session::errors::StoreError;
use crate::session::ports::UserRepository;

const USERNAME_ATTEMPTS: usize = 5;
const SUFFIX_LENGTH: usize = 6;

/// Account resolved for a federated login
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub user: User,
    pub created: bool,
}

/// Maps an external-provider identity onto a local account.
///
/// Lookup is by email. An account registered with a different login type is never
/// linked silently.
pub struct IdentityResolver<UR>
where
    UR: UserRepository,
{
    users: Arc<UR>,
}

impl<UR> IdentityResolver<UR>
where
    UR: UserRepository,
{
    pub fn new(users: Arc<UR>) -> Self {
        Self { users }
    }

    /// Resolve or create the local account for a provider profile.
    ///
    /// # Errors
    /// * `MissingProviderEmail` - The profile has no email address
    /// * `InvalidEmail` - The profile's email is malformed
    /// * `IdentityProviderConflict` - The email belongs to an account with another login type
    /// * `TransientStoreFailure` - Store operation failed
    pub async fn resolve(
        &self,
        provider: Provider,
        profile: &ExternalIdentity,
        now: DateTime<Utc>,
    ) -> Result<ResolvedIdentity, SessionError> {
        let email = profile
            .email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .ok_or(SessionError::MissingProviderEmail)?;
        let email = EmailAddress::new(email.to_string())?;

        if let Some(user) = self.users.find_by_email(&email).await? {
            return Self::existing(provider, user);
        }

        for attempt in 0..USERNAME_ATTEMPTS {
            let username = self.available_username(&email, attempt).await?;
            let candidate = User::with_provider(provider, profile, email.clone(), username, now);

            match self.users.create(candidate).await {
                Ok(user) => {
                    tracing::info!(
                        user_id = %user.id,
                        login_type = user.login_type.as_str(),
                        "Federated account created"
                    );
                    return Ok(ResolvedIdentity {
                        user,
                        created: true,
                    });
                }
                Err(StoreError::Conflict(constraint)) => {
                    // A concurrent login may have created the account in the meantime.
                    if let Some(user) = self.users.find_by_email(&email).await? {
                        return Self::existing(provider, user);
                    }
                    tracing::debug!(constraint = %constraint, attempt, "Username taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SessionError::DuplicateEmailOrUsername)
    }

    fn existing(provider: Provider, user: User) -> Result<ResolvedIdentity, SessionError> {
        if user.login_type == LoginType::from(provider) {
            Ok(ResolvedIdentity {
                user,
                created: false,
            })
        } else {
            tracing::warn!(
                user_id = %user.id,
                registered_with = user.login_type.as_str(),
                attempted_with = provider.as_str(),
                "Federated login rejected for account with another login type"
            );
            Err(SessionError::IdentityProviderConflict(
                user.login_type.as_str().to_string(),
            ))
        }
    }

    async fn available_username(
        &self,
        email: &EmailAddress,
        attempt: usize,
    ) -> Result<Username, SessionError> {
        if attempt == 0 {
            let base = Username::from_email_local_part(email, None);
            if self.users.find_by_username(&base).await?.is_none() {
                return Ok(base);
            }
        }

        let suffix = auth::secret::generate_secret();
        Ok(Username::from_email_local_part(
            email,
            Some(&suffix[..SUFFIX_LENGTH]),
        ))
    }
}
