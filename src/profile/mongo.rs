//! MongoDB implementation of [`ProfileStore`].

use async_trait::async_trait;
use mongodb::Collection;
use mongodb::bson::{Bson, doc};

use super::{Profile, ProfileStore};
use crate::error::{Result, ServerError};

pub struct MongoProfileStore {
    profiles: Collection<Profile>,
}

impl MongoProfileStore {
    /// Create a new [`MongoProfileStore`].
    pub fn new(profiles: Collection<Profile>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ProfileStore for MongoProfileStore {
    async fn insert(&self, profile: &Profile) -> Result<String> {
        let result = self
            .profiles
            .insert_one(profile)
            .await
            .inspect_err(|err| {
                tracing::error!(error = %err, identity = %profile.identity, "failed to insert profile")
            })?;

        Ok(match result.inserted_id {
            Bson::String(id) => id,
            id => id.to_string(),
        })
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self
            .profiles
            .find_one(doc! { "_id": id })
            .await
            .inspect_err(|err| {
                tracing::error!(error = %err, identity = id, "failed to retrieve profile")
            })?)
    }

    async fn append_contribution(
        &self,
        id: &str,
        contribution: serde_json::Value,
    ) -> Result<bool> {
        let contribution = mongodb::bson::to_bson(&contribution).map_err(|err| {
            ServerError::internal("contribution is not BSON serializable", err)
        })?;

        let result = self
            .profiles
            .update_one(
                doc! { "_id": id },
                doc! { "$push": { "contributions": contribution } },
            )
            .await
            .inspect_err(|err| {
                tracing::error!(error = %err, identity = id, "failed to append contribution")
            })?;

        Ok(result.modified_count > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self
            .profiles
            .delete_one(doc! { "_id": id })
            .await
            .inspect_err(|err| {
                tracing::error!(error = %err, identity = id, "failed to delete profile")
            })?;

        Ok(result.deleted_count > 0)
    }
}
