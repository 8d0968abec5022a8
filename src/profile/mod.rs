//! Account profiles kept in the document store.
mod memory;
mod mongo;

pub use memory::*;
pub use mongo::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Document mirrored for every account, keyed by its identity token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub identity: String,
    #[serde(default)]
    pub contributions: Vec<serde_json::Value>,
}

impl Profile {
    /// Empty profile for a newly created account.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            contributions: Vec::new(),
        }
    }
}

/// Port for profile persistence.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a profile, returning its id.
    async fn insert(&self, profile: &Profile) -> Result<String>;

    /// Find a profile using its identity token.
    async fn find_by_id(&self, id: &str) -> Result<Option<Profile>>;

    /// Push a record at the end of `contributions`.
    ///
    /// Returns whether a document was modified.
    async fn append_contribution(
        &self,
        id: &str,
        contribution: serde_json::Value,
    ) -> Result<bool>;

    /// Delete a profile. Returns whether a document was deleted.
    async fn delete(&self, id: &str) -> Result<bool>;
}
