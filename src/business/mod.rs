//! Business listings.
mod image;
mod repository;

pub use image::*;
pub use repository::*;

use serde::{Deserialize, Serialize};

/// Business listing as saved on database.
///
/// `name` is the lookup key but carries no uniqueness constraint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub name: String,
    pub description: Option<String>,
    pub owner: String,
    pub owner_mail: String,
    pub owner_phone: String,
    #[serde(skip)]
    pub img_blob: Option<Vec<u8>>,
    pub img_type: Option<String>,
    pub upi_id: Option<String>,
}

/// Columns written on listing update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BusinessUpdate {
    /// New listing name, written in the same statement.
    pub rename_to: Option<String>,
    pub description: Option<String>,
    pub owner: String,
    pub owner_mail: String,
    pub owner_phone: String,
    pub img_blob: Option<Vec<u8>>,
    pub img_type: Option<String>,
}

/// Name of a listing with its row position, scanned to resolve image tokens.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct ListingName {
    pub id: i64,
    pub name: String,
}

/// Image columns of a single listing.
#[derive(Clone, Debug, Default, PartialEq, sqlx::FromRow)]
pub struct StoredImage {
    pub img_blob: Option<Vec<u8>>,
    pub img_type: Option<String>,
}

/// Public representation of a listing.
///
/// `img_blob` holds the URL serving the image, never the bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusinessView {
    pub name: String,
    pub description: Option<String>,
    pub owner: String,
    pub owner_mail: String,
    pub owner_phone: String,
    pub img_blob: Option<String>,
    pub img_type: Option<String>,
    pub upi_id: Option<String>,
}

impl Business {
    /// Whether an image is stored.
    pub fn has_image(&self) -> bool {
        self.img_blob.as_ref().is_some_and(|blob| !blob.is_empty())
    }

    /// View used when listing every business: the image URL is always set.
    pub fn listed(self) -> BusinessView {
        let url = image_url(&self.name);
        self.into_view(Some(url))
    }

    /// View used on single lookups: the image URL is set only with an image.
    pub fn detailed(self) -> BusinessView {
        let url = self.has_image().then(|| image_url(&self.name));
        self.into_view(url)
    }

    fn into_view(self, img_blob: Option<String>) -> BusinessView {
        BusinessView {
            name: self.name,
            description: self.description,
            owner: self.owner,
            owner_mail: self.owner_mail,
            owner_phone: self.owner_phone,
            img_blob,
            img_type: self.img_type,
            upi_id: self.upi_id,
        }
    }
}
