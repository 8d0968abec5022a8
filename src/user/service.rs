use std::sync::Arc;

use crate::crypto::{self, Credentials};
use crate::error::{Result, ServerError};
use crate::profile::{Profile, ProfileStore};
use crate::user::{Account, AccountRepository, NewAccount};

/// Rows created by a successful signup.
#[derive(Clone, Debug, PartialEq)]
pub struct SignupOutcome {
    /// Row id in the relational store.
    pub user_id: i64,
    /// Id of the mirrored profile document.
    pub identity: String,
}

/// Account manager.
///
/// Every write goes to the relational store first and is then mirrored into
/// the document store. The two writes are not atomic: a failed mirror is
/// reported as [`ServerError::PartialWrite`].
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    profiles: Arc<dyn ProfileStore>,
}

impl AccountService {
    /// Create a new [`AccountService`].
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self { accounts, profiles }
    }

    /// Create account on both stores.
    ///
    /// If the profile cannot be written, the account row is removed again.
    pub async fn signup(&self, new: NewAccount) -> Result<SignupOutcome> {
        let credentials = Credentials::generate(&new.username, &new.password);

        let account = Account {
            id: 0,
            identity: credentials.identity,
            name: new.name,
            username: new.username,
            email: new.email,
            password: credentials.password_hash,
            salt: credentials.salt,
            account_type: new.account_type,
        };

        let user_id = self.accounts.insert(&account).await?;

        match self.profiles.insert(&Profile::new(&account.identity)).await {
            Ok(identity) => {
                tracing::info!(user_id, %identity, "account created");
                Ok(SignupOutcome { user_id, identity })
            },
            Err(err) => {
                diverged(&account.identity, "signup", &err);

                if let Err(err) = self.accounts.delete(user_id).await {
                    tracing::error!(
                        user_id,
                        identity = %account.identity,
                        error = %err,
                        "compensation failed, account row left without profile"
                    );
                }

                Err(ServerError::PartialWrite {
                    identity: account.identity,
                    stage: "signup",
                })
            },
        }
    }

    /// Check credentials and return the stored account.
    pub async fn login(&self, username: &str, password: &str) -> Result<Account> {
        let account = self
            .accounts
            .find_by_username(username)
            .await?
            .ok_or(ServerError::NotFound("account"))?;

        if !crypto::verify_login(&account.password, &account.salt, password) {
            tracing::info!(%username, "authentication failed");
            return Err(ServerError::Unauthorized);
        }

        Ok(account)
    }

    /// Delete account from relational store, then its profile.
    pub async fn delete(&self, username: &str) -> Result<()> {
        let account = self
            .accounts
            .find_by_username(username)
            .await?
            .ok_or(ServerError::NotFound("account"))?;

        self.accounts.delete(account.id).await?;

        match self.profiles.delete(&account.identity).await {
            Ok(true) => {
                tracing::info!(user_id = account.id, identity = %account.identity, "account deleted");
                Ok(())
            },
            Ok(false) => {
                diverged(&account.identity, "delete", &ServerError::NotFound("profile"));
                Err(ServerError::PartialWrite {
                    identity: account.identity,
                    stage: "delete",
                })
            },
            Err(err) => {
                diverged(&account.identity, "delete", &err);
                Err(ServerError::PartialWrite {
                    identity: account.identity,
                    stage: "delete",
                })
            },
        }
    }

    /// Get the profile of an account.
    pub async fn profile(&self, identity: &str) -> Result<Profile> {
        self.profiles
            .find_by_id(identity)
            .await?
            .ok_or(ServerError::NotFound("profile"))
    }

    /// Append a contribution to the profile of an account.
    pub async fn add_contribution(
        &self,
        identity: &str,
        contribution: serde_json::Value,
    ) -> Result<()> {
        if self.profiles.append_contribution(identity, contribution).await? {
            Ok(())
        } else {
            Err(ServerError::NotFound("profile"))
        }
    }
}

/// Report stores that no longer agree on an account.
fn diverged(identity: &str, stage: &'static str, err: &ServerError) {
    tracing::error!(
        %identity,
        stage,
        error = %err,
        "partial write: relational and document stores diverged"
    );
    metrics::counter!("store_divergence_total", "stage" => stage).increment(1);
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::profile::MemoryProfileStore;
    use crate::user::{DEFAULT_ACCOUNT_TYPE, SqliteAccountRepository};

    /// Document store that is always down.
    struct UnavailableProfileStore;

    #[async_trait]
    impl ProfileStore for UnavailableProfileStore {
        async fn insert(&self, _: &Profile) -> Result<String> {
            Err(ServerError::StoreUnavailable("connection refused".into()))
        }

        async fn find_by_id(&self, _: &str) -> Result<Option<Profile>> {
            Err(ServerError::StoreUnavailable("connection refused".into()))
        }

        async fn append_contribution(
            &self,
            _: &str,
            _: serde_json::Value,
        ) -> Result<bool> {
            Err(ServerError::StoreUnavailable("connection refused".into()))
        }

        async fn delete(&self, _: &str) -> Result<bool> {
            Err(ServerError::StoreUnavailable("connection refused".into()))
        }
    }

    async fn service(
        profiles: Arc<dyn ProfileStore>,
    ) -> (AccountService, Arc<SqliteAccountRepository>) {
        let accounts = Arc::new(SqliteAccountRepository::new(
            crate::tests::memory_pool().await,
        ));
        accounts.create_schema().await.unwrap();

        (AccountService::new(accounts.clone(), profiles), accounts)
    }

    fn alice() -> NewAccount {
        NewAccount {
            name: "Alice".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "hunter2".into(),
            account_type: DEFAULT_ACCOUNT_TYPE.into(),
        }
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let (service, accounts) = service(Arc::new(MemoryProfileStore::new())).await;

        let outcome = service.signup(alice()).await.unwrap();
        let stored = accounts.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(stored.id, outcome.user_id);
        assert_eq!(stored.identity, outcome.identity);
        assert_ne!(stored.password, "hunter2");

        let account = service.login("alice", "hunter2").await.unwrap();
        assert_eq!(account.identity, outcome.identity);

        assert!(matches!(
            service.login("alice", "wrong").await,
            Err(ServerError::Unauthorized)
        ));
        assert!(matches!(
            service.login("bob", "hunter2").await,
            Err(ServerError::NotFound(_))
        ));

        let profile = service.profile(&outcome.identity).await.unwrap();
        assert!(profile.contributions.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_signup() {
        let (service, _) = service(Arc::new(MemoryProfileStore::new())).await;

        service.signup(alice()).await.unwrap();
        assert!(matches!(
            service.signup(alice()).await,
            Err(ServerError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_signup_compensates_on_profile_failure() {
        let (service, accounts) = service(Arc::new(UnavailableProfileStore)).await;

        assert!(matches!(
            service.signup(alice()).await,
            Err(ServerError::PartialWrite { stage: "signup", .. })
        ));
        assert!(accounts.find_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_from_both_stores() {
        let profiles = Arc::new(MemoryProfileStore::new());
        let (service, _) = service(profiles.clone()).await;
        let outcome = service.signup(alice()).await.unwrap();

        service.delete("alice").await.unwrap();

        assert!(matches!(
            service.login("alice", "hunter2").await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            service.profile(&outcome.identity).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            service.delete("alice").await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_reports_missing_profile() {
        let profiles = Arc::new(MemoryProfileStore::new());
        let (service, accounts) = service(profiles.clone()).await;
        let outcome = service.signup(alice()).await.unwrap();
        profiles.delete(&outcome.identity).await.unwrap();

        assert!(matches!(
            service.delete("alice").await,
            Err(ServerError::PartialWrite { stage: "delete", .. })
        ));
        // Relational row is gone regardless.
        assert!(accounts.find_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_contributions() {
        let (service, _) = service(Arc::new(MemoryProfileStore::new())).await;
        let outcome = service.signup(alice()).await.unwrap();

        service
            .add_contribution(&outcome.identity, json!({"business": "Joe's Cafe"}))
            .await
            .unwrap();
        service
            .add_contribution(&outcome.identity, json!({"business": "Tea House"}))
            .await
            .unwrap();

        let profile = service.profile(&outcome.identity).await.unwrap();
        assert_eq!(profile.contributions.len(), 2);
        assert_eq!(profile.contributions[1]["business"], "Tea House");

        assert!(matches!(
            service.add_contribution("unknown", json!(1)).await,
            Err(ServerError::NotFound(_))
        ));
    }
}
