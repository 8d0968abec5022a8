//! In-process [`ProfileStore`], used when no MongoDB is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Profile, ProfileStore};
use crate::error::{Result, ServerError};

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn insert(&self, profile: &Profile) -> Result<String> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.identity) {
            return Err(ServerError::Conflict(format!(
                "duplicate key {}",
                profile.identity
            )));
        }

        profiles.insert(profile.identity.clone(), profile.clone());
        Ok(profile.identity.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self.profiles.read().await.get(id).cloned())
    }

    async fn append_contribution(
        &self,
        id: &str,
        contribution: serde_json::Value,
    ) -> Result<bool> {
        match self.profiles.write().await.get_mut(id) {
            Some(profile) => {
                profile.contributions.push(contribution);
                Ok(true)
            },
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.profiles.write().await.remove(id).is_some())
    }
}
