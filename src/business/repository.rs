//! Handle business database requests.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::business::{Business, BusinessUpdate, ListingName, StoredImage};
use crate::error::Result;

/// Port for business listing persistence.
#[async_trait]
pub trait BusinessRepository: Send + Sync {
    /// Create the `Business` table if it doesn't exist.
    async fn create_schema(&self) -> Result<()>;

    /// Insert a new [`Business`].
    async fn insert(&self, business: &Business) -> Result<()>;

    /// Find the first listing named `name`.
    async fn find_by_name(&self, name: &str) -> Result<Option<Business>>;

    /// Every listing, in insertion order.
    async fn list(&self) -> Result<Vec<Business>>;

    /// Names of every listing, in insertion order, without their images.
    async fn names(&self) -> Result<Vec<ListingName>>;

    /// Image columns of the listing at row `id`.
    async fn image(&self, id: i64) -> Result<Option<StoredImage>>;

    /// Update listings named `name`, renaming them when
    /// [`BusinessUpdate::rename_to`] is set. Returns whether any row matched.
    async fn update(&self, name: &str, update: &BusinessUpdate) -> Result<bool>;

    /// Rename listings named `name`. Returns whether any row matched.
    async fn rename(&self, name: &str, new_name: &str) -> Result<bool>;

    /// Delete listings named `name`. Returns whether any row matched.
    async fn delete(&self, name: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct SqliteBusinessRepository {
    pool: SqlitePool,
}

impl SqliteBusinessRepository {
    /// Create a new [`SqliteBusinessRepository`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_BUSINESS: &str = r#"SELECT
        name, description, owner, owner_mail, owner_phone, img_blob, img_type, upi_id
    FROM Business"#;

#[async_trait]
impl BusinessRepository for SqliteBusinessRepository {
    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS Business (
                name TEXT NOT NULL,
                description TEXT,
                owner TEXT NOT NULL,
                owner_mail TEXT NOT NULL,
                owner_phone TEXT NOT NULL,
                img_blob BLOB,
                img_type TEXT,
                upi_id TEXT
            )"#,
        )
        .execute(&self.pool)
        .await
        .inspect_err(|err| tracing::error!(error = %err, "failed to create Business table"))?;

        Ok(())
    }

    async fn insert(&self, business: &Business) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO Business (name, description, owner, owner_mail, owner_phone, img_blob, img_type, upi_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&business.name)
        .bind(&business.description)
        .bind(&business.owner)
        .bind(&business.owner_mail)
        .bind(&business.owner_phone)
        .bind(&business.img_blob)
        .bind(&business.img_type)
        .bind(&business.upi_id)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            tracing::error!(error = %err, name = %business.name, "failed to insert business")
        })?;

        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Business>> {
        let query = format!("{SELECT_BUSINESS} WHERE name = ? ORDER BY rowid LIMIT 1");

        Ok(sqlx::query_as::<_, Business>(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|err| tracing::error!(error = %err, %name, "failed to retrieve business"))?)
    }

    async fn list(&self) -> Result<Vec<Business>> {
        let query = format!("{SELECT_BUSINESS} ORDER BY rowid");

        Ok(sqlx::query_as::<_, Business>(&query)
            .fetch_all(&self.pool)
            .await
            .inspect_err(|err| tracing::error!(error = %err, "failed to list businesses"))?)
    }

    async fn names(&self) -> Result<Vec<ListingName>> {
        Ok(sqlx::query_as::<_, ListingName>(
            r#"SELECT rowid AS id, name FROM Business ORDER BY rowid"#,
        )
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| tracing::error!(error = %err, "failed to list business names"))?)
    }

    async fn image(&self, id: i64) -> Result<Option<StoredImage>> {
        Ok(sqlx::query_as::<_, StoredImage>(
            r#"SELECT img_blob, img_type FROM Business WHERE rowid = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|err| tracing::error!(error = %err, id, "failed to retrieve business image"))?)
    }

    async fn update(&self, name: &str, update: &BusinessUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE Business
                SET name = COALESCE(?, name), description = ?, owner = ?, owner_mail = ?,
                    owner_phone = ?, img_blob = ?, img_type = ?
                WHERE name = ?"#,
        )
        .bind(&update.rename_to)
        .bind(&update.description)
        .bind(&update.owner)
        .bind(&update.owner_mail)
        .bind(&update.owner_phone)
        .bind(&update.img_blob)
        .bind(&update.img_type)
        .bind(name)
        .execute(&self.pool)
        .await
        .inspect_err(|err| tracing::error!(error = %err, %name, "failed to update business"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn rename(&self, name: &str, new_name: &str) -> Result<bool> {
        let result = sqlx::query(r#"UPDATE Business SET name = ? WHERE name = ?"#)
            .bind(new_name)
            .bind(name)
            .execute(&self.pool)
            .await
            .inspect_err(|err| tracing::error!(error = %err, %name, "failed to rename business"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM Business WHERE name = ?"#)
            .bind(name)
            .execute(&self.pool)
            .await
            .inspect_err(|err| tracing::error!(error = %err, %name, "failed to delete business"))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::resolve_image_token;
    use crate::crypto::image_token;
    use crate::error::ServerError;

    async fn repository() -> SqliteBusinessRepository {
        let repo = SqliteBusinessRepository::new(crate::tests::memory_pool().await);
        repo.create_schema().await.unwrap();
        repo
    }

    fn joes_cafe() -> Business {
        Business {
            name: "Joe's Cafe".into(),
            description: Some("Coffee and pastries.".into()),
            owner: "Joe".into(),
            owner_mail: "joe@example.com".into(),
            owner_phone: "555-0100".into(),
            img_blob: Some(b"\x89PNG\r\n\x1a\n".to_vec()),
            img_type: Some("image/png".into()),
            upi_id: Some("joe@upi".into()),
        }
    }

    #[tokio::test]
    async fn test_insert_list_and_find() {
        let repo = repository().await;
        repo.insert(&joes_cafe()).await.unwrap();
        repo.insert(&Business {
            name: "Tea House".into(),
            owner: "Mei".into(),
            owner_mail: "mei@example.com".into(),
            owner_phone: "555-0101".into(),
            ..Default::default()
        })
        .await
        .unwrap();

        let listings = repo.list().await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0], joes_cafe());
        assert_eq!(listings[1].img_blob, None);

        let found = repo.find_by_name("Tea House").await.unwrap().unwrap();
        assert_eq!(found.owner, "Mei");
        assert!(repo.find_by_name("Bakery").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listed_token_resolves_to_stored_image() {
        let repo = repository().await;
        repo.insert(&joes_cafe()).await.unwrap();

        let listed = repo.list().await.unwrap().remove(0).listed();
        let url = listed.img_blob.unwrap();
        let token = url.rsplit('/').next().unwrap();
        assert_eq!(token, image_token("Joe's Cafe"));

        let image = resolve_image_token(&repo, token).await.unwrap();
        assert_eq!(image.blob, b"\x89PNG\r\n\x1a\n");
        assert_eq!(image.media_type, "image/png");
    }

    #[tokio::test]
    async fn test_update_keeps_upi_id() {
        let repo = repository().await;
        repo.insert(&joes_cafe()).await.unwrap();

        let update = BusinessUpdate {
            rename_to: None,
            description: None,
            owner: "Joanna".into(),
            owner_mail: "joanna@example.com".into(),
            owner_phone: "555-0199".into(),
            img_blob: None,
            img_type: None,
        };
        assert!(repo.update("Joe's Cafe", &update).await.unwrap());
        assert!(!repo.update("Bakery", &update).await.unwrap());

        let found = repo.find_by_name("Joe's Cafe").await.unwrap().unwrap();
        assert_eq!(found.owner, "Joanna");
        assert_eq!(found.img_blob, None);
        assert_eq!(found.upi_id.as_deref(), Some("joe@upi"));
    }

    #[tokio::test]
    async fn test_rename_moves_image_token() {
        let repo = repository().await;
        repo.insert(&joes_cafe()).await.unwrap();

        assert!(repo.rename("Joe's Cafe", "Joe's Bistro").await.unwrap());

        assert!(resolve_image_token(&repo, &image_token("Joe's Bistro")).await.is_ok());
        assert!(matches!(
            resolve_image_token(&repo, &image_token("Joe's Cafe")).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_renames_in_one_statement() {
        let repo = repository().await;
        repo.insert(&joes_cafe()).await.unwrap();

        let update = BusinessUpdate {
            rename_to: Some("Joe's Bistro".into()),
            owner: "Joanna".into(),
            owner_mail: "joanna@example.com".into(),
            owner_phone: "555-0199".into(),
            ..Default::default()
        };
        assert!(repo.update("Joe's Cafe", &update).await.unwrap());

        assert!(repo.find_by_name("Joe's Cafe").await.unwrap().is_none());
        let found = repo.find_by_name("Joe's Bistro").await.unwrap().unwrap();
        assert_eq!(found.owner, "Joanna");
        assert_eq!(found.upi_id.as_deref(), Some("joe@upi"));
    }

    #[tokio::test]
    async fn test_names_skip_images() {
        let repo = repository().await;
        repo.insert(&joes_cafe()).await.unwrap();

        let names = repo.names().await.unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].name, "Joe's Cafe");

        let image = repo.image(names[0].id).await.unwrap().unwrap();
        assert_eq!(image.img_blob.as_deref(), Some(&b"\x89PNG\r\n\x1a\n"[..]));
        assert!(repo.image(names[0].id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repository().await;
        repo.insert(&joes_cafe()).await.unwrap();

        assert!(repo.delete("Joe's Cafe").await.unwrap());
        assert!(!repo.delete("Joe's Cafe").await.unwrap());
        assert!(repo.list().await.unwrap().is_empty());
    }
}
