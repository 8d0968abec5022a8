//! database (db) union structure.
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config;
use crate::profile::Profile;

pub const DEFAULT_POOL_SIZE: u32 = 5;

/// Store handles opened once at startup.
#[derive(Clone)]
pub struct Database {
    pub sqlite: SqlitePool,
    pub mongo: Option<mongodb::Collection<Profile>>,
}

impl Database {
    /// Init database connections.
    pub async fn new(
        sqlite: &config::Sqlite,
        mongo: Option<&config::MongoDb>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let options = SqliteConnectOptions::from_str(&sqlite.path)?
            .create_if_missing(true);
        let sqlite_pool = SqlitePoolOptions::new()
            .max_connections(sqlite.pool_size.unwrap_or(DEFAULT_POOL_SIZE))
            .connect_with(options)
            .await?;

        tracing::info!(path = %sqlite.path, "sqlite connected");

        let mongo = match mongo {
            Some(cfg) => {
                let client = mongodb::Client::with_uri_str(&cfg.uri).await?;
                let collection = client
                    .database(&cfg.database)
                    .collection::<Profile>(&cfg.collection);

                tracing::info!(
                    database = %cfg.database,
                    collection = %cfg.collection,
                    "mongodb client created"
                );

                Some(collection)
            },
            None => None,
        };

        Ok(Self {
            sqlite: sqlite_pool,
            mongo,
        })
    }
}
