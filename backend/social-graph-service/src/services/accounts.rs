use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Account, AccountProfile, PrivacyTier};
use crate::error::{AppError, Result};
use crate::repository::SocialStore;

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("Invalid username regex"));

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAccount {
    #[validate(length(min = 1, max = 30))]
    pub username: String,
    #[validate(length(max = 2048))]
    pub profile_pic: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[serde(default)]
    pub privacy_tier: PrivacyTier,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn SocialStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn SocialStore>) -> Self {
        Self { store }
    }

    /// Create an account with empty follow sets; usernames are unique.
    pub async fn register(&self, request: RegisterAccount) -> Result<Account> {
        request.validate()?;
        if !USERNAME_REGEX.is_match(&request.username) {
            return Err(AppError::Validation(
                "username may only contain letters, digits and underscores".to_string(),
            ));
        }

        let mut account = Account::new(request.username, request.privacy_tier);
        account.profile_pic = request.profile_pic;
        account.bio = request.bio;

        self.store.insert_account(&account).await?;
        info!(account = %account.id, username = %account.username, "account registered");
        Ok(account)
    }

    pub async fn profile(&self, username: &str) -> Result<AccountProfile> {
        let account = self
            .store
            .get_account_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", username)))?;
        Ok(AccountProfile::from(&account))
    }

    /// Changes the account-level tier only; follow sets are untouched.
    pub async fn set_privacy(&self, account_id: Uuid, tier: PrivacyTier) -> Result<()> {
        if !self.store.update_privacy_tier(account_id, tier).await? {
            return Err(AppError::NotFound(format!("account {}", account_id)));
        }
        info!(account = %account_id, tier = %tier, "privacy tier changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemorySocialStore;

    fn request(username: &str) -> RegisterAccount {
        RegisterAccount {
            username: username.to_string(),
            profile_pic: None,
            bio: Some("hi".to_string()),
            privacy_tier: PrivacyTier::Public,
        }
    }

    #[tokio::test]
    async fn test_register_and_profile() {
        let service = AccountService::new(Arc::new(InMemorySocialStore::new()));
        let account = service.register(request("carol_1")).await.unwrap();

        let profile = service.profile("carol_1").await.unwrap();
        assert_eq!(profile.id, account.id);
        assert_eq!(profile.bio.as_deref(), Some("hi"));
        assert_eq!(profile.followers_count, 0);
        assert_eq!(profile.following_count, 0);
    }

    #[tokio::test]
    async fn test_username_rules() {
        let service = AccountService::new(Arc::new(InMemorySocialStore::new()));

        assert!(matches!(
            service.register(request("")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.register(request(&"x".repeat(31))).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.register(request("has space")).await,
            Err(AppError::Validation(_))
        ));

        service.register(request("dave")).await.unwrap();
        assert!(matches!(
            service.register(request("dave")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_set_privacy() {
        let service = AccountService::new(Arc::new(InMemorySocialStore::new()));
        let account = service.register(request("erin")).await.unwrap();

        service
            .set_privacy(account.id, PrivacyTier::Private)
            .await
            .unwrap();
        assert_eq!(
            service.profile("erin").await.unwrap().privacy_tier,
            PrivacyTier::Private
        );
        assert!(matches!(
            service.set_privacy(Uuid::new_v4(), PrivacyTier::Public).await,
            Err(AppError::NotFound(_))
        ));
    }
}
