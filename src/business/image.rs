//! Content-addressed image lookup.
//!
//! An image is published under `sha256(name)` of its listing. Resolving a
//! token recomputes the hash of every listing name, so it costs one scan of
//! the catalog names per request; only the matching blob is loaded. Renaming
//! a listing invalidates its old links.

use crate::business::{BusinessRepository, ListingName, StoredImage};
use crate::crypto::image_token;
use crate::error::{Result, ServerError};

pub const IMAGE_ROUTE: &str = "/api/image";
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Stored image ready to be served.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub blob: Vec<u8>,
    pub media_type: String,
}

/// Public URL of the image of a listing.
pub fn image_url(name: &str) -> String {
    format!("{IMAGE_ROUTE}/{}", image_token(name))
}

/// Row of the first listing, in store order, whose name hashes to `token`.
fn find_token(
    names: impl IntoIterator<Item = ListingName>,
    token: &str,
) -> Option<i64> {
    names
        .into_iter()
        .find(|listing| image_token(&listing.name) == token)
        .map(|listing| listing.id)
}

impl StoredImage {
    /// A listing without stored bytes is reported like an unknown token.
    fn into_image(self) -> Result<Image> {
        match self.img_blob {
            Some(blob) if !blob.is_empty() => Ok(Image {
                blob,
                media_type: self
                    .img_type
                    .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_owned()),
            }),
            _ => Err(ServerError::NotFound("image")),
        }
    }
}

/// Find the image published under `token`.
///
/// The first listing, in store order, whose name hashes to `token` wins.
pub async fn resolve_image_token(
    listings: &dyn BusinessRepository,
    token: &str,
) -> Result<Image> {
    let id = find_token(listings.names().await?, token)
        .ok_or(ServerError::NotFound("business"))?;

    // the row may have been deleted since the scan.
    listings
        .image(id)
        .await?
        .ok_or(ServerError::NotFound("business"))?
        .into_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::{Business, SqliteBusinessRepository};

    fn name(id: i64, name: &str) -> ListingName {
        ListingName {
            id,
            name: name.into(),
        }
    }

    fn listing(name: &str, blob: Option<&[u8]>) -> Business {
        Business {
            name: name.into(),
            owner: "Joe".into(),
            owner_mail: "joe@example.com".into(),
            owner_phone: "555-0100".into(),
            img_blob: blob.map(<[u8]>::to_vec),
            img_type: blob.map(|_| "image/png".to_owned()),
            ..Default::default()
        }
    }

    async fn repository(listings: &[Business]) -> SqliteBusinessRepository {
        let repo = SqliteBusinessRepository::new(crate::tests::memory_pool().await);
        repo.create_schema().await.unwrap();
        for listing in listings {
            repo.insert(listing).await.unwrap();
        }
        repo
    }

    #[test]
    fn test_find_token() {
        let names = vec![name(1, "Tea House"), name(2, "Twin"), name(3, "Twin")];

        assert_eq!(find_token(names.clone(), &image_token("Tea House")), Some(1));
        assert_eq!(find_token(names.clone(), &image_token("Twin")), Some(2));
        assert_eq!(find_token(names, "deadbeef"), None);
    }

    #[test]
    fn test_missing_media_type() {
        let image = StoredImage {
            img_blob: Some(b"raw".to_vec()),
            img_type: None,
        }
        .into_image()
        .unwrap();

        assert_eq!(image.media_type, DEFAULT_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_resolve() {
        let repo = repository(&[
            listing("Tea House", None),
            listing("Joe's Cafe", Some(b"\x89PNG\r\n")),
        ])
        .await;

        let image = resolve_image_token(&repo, &image_token("Joe's Cafe"))
            .await
            .unwrap();
        assert_eq!(image.blob, b"\x89PNG\r\n");
        assert_eq!(image.media_type, "image/png");
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let repo =
            repository(&[listing("Tea House", None), listing("Bakery", Some(b""))])
                .await;

        for token in [image_token("Tea House"), image_token("Bakery"), "deadbeef".into()] {
            assert!(matches!(
                resolve_image_token(&repo, &token).await,
                Err(ServerError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let repo = repository(&[
            listing("Twin", Some(b"first")),
            listing("Twin", Some(b"second")),
        ])
        .await;

        let image = resolve_image_token(&repo, &image_token("Twin")).await.unwrap();
        assert_eq!(image.blob, b"first");
    }

    #[test]
    fn test_image_url() {
        assert_eq!(
            image_url("abc"),
            "/api/image/ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
