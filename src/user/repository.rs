//! Handle account database requests.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::user::{Account, AccountUpdate};

/// Port for account persistence.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create the `User` table if it doesn't exist.
    async fn create_schema(&self) -> Result<()>;

    /// Insert [`Account`] and return its row id.
    async fn insert(&self, account: &Account) -> Result<i64>;

    /// Find an account using `Username` column.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Find an account using `Email` column.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Update every mutable column of an account.
    async fn update(&self, id: i64, update: &AccountUpdate) -> Result<()>;

    /// Delete an account by row id.
    async fn delete(&self, id: i64) -> Result<()>;
}

#[derive(Clone)]
pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    /// Create a new [`SqliteAccountRepository`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_by(
        &self,
        field: Field,
        value: &str,
    ) -> Result<Option<Account>> {
        let query = get_by_field_query(field);

        Ok(sqlx::query_as::<_, Account>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|err| {
                tracing::error!(error = %err, %field, "failed to retrieve account")
            })?)
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS User (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                _id TEXT NOT NULL,
                Name TEXT NOT NULL,
                Username TEXT NOT NULL UNIQUE,
                Email TEXT NOT NULL UNIQUE,
                Password TEXT NOT NULL,
                Salt TEXT NOT NULL,
                AccType TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await
        .inspect_err(|err| tracing::error!(error = %err, "failed to create User table"))?;

        Ok(())
    }

    async fn insert(&self, account: &Account) -> Result<i64> {
        let result = sqlx::query(
            r#"INSERT INTO User (_id, Name, Username, Email, Password, Salt, AccType)
                VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&account.identity)
        .bind(&account.name)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password)
        .bind(&account.salt)
        .bind(&account.account_type)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            tracing::error!(error = %err, username = %account.username, "failed to insert account")
        })?;

        Ok(result.last_insert_rowid())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.find_by(Field::Username, username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.find_by(Field::Email, email).await
    }

    async fn update(&self, id: i64, update: &AccountUpdate) -> Result<()> {
        sqlx::query(
            r#"UPDATE User
                SET Name = ?, Username = ?, Email = ?, Password = ?, Salt = ?, AccType = ?
                WHERE id = ?"#,
        )
        .bind(&update.name)
        .bind(&update.username)
        .bind(&update.email)
        .bind(&update.password)
        .bind(&update.salt)
        .bind(&update.account_type)
        .bind(id)
        .execute(&self.pool)
        .await
        .inspect_err(|err| tracing::error!(error = %err, id, "failed to update account"))?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query(r#"DELETE FROM User WHERE id = ?"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .inspect_err(|err| tracing::error!(error = %err, id, "failed to delete account"))?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Username,
    Email,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Username => write!(f, "Username"),
            Field::Email => write!(f, "Email"),
        }
    }
}

fn get_by_field_query(field: Field) -> String {
    format!(
        r#"SELECT
                id,
                _id AS identity,
                Name AS name,
                Username AS username,
                Email AS email,
                Password AS password,
                Salt AS salt,
                AccType AS account_type
            FROM User
            WHERE {field} = ?"#
    )
}
