//! Business listing routes.
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::AppState;
use crate::business::{Business, BusinessUpdate, BusinessView};
use crate::error::{Result, ServerError};
use crate::router::{Message, Valid};

#[derive(Debug, Serialize, Deserialize)]
pub struct Listings {
    pub businesses: Vec<BusinessView>,
}

/// Media type is sent back as `Content-Type`, so it must be a header value.
fn validate_media_type(media_type: &str) -> std::result::Result<(), ValidationError> {
    if media_type.is_empty() || HeaderValue::from_str(media_type).is_err() {
        return Err(ValidationError::new("img_type"));
    }

    Ok(())
}

/// Listing fields accepted on creation and update.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "Name must not be empty."))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Owner must not be empty."))]
    pub owner: String,
    #[validate(email(message = "Email must be formatted."))]
    pub owner_mail: String,
    #[validate(length(min = 1, message = "Phone must not be empty."))]
    pub owner_phone: String,
    /// Base64-encoded image.
    pub img_blob: Option<String>,
    #[validate(custom(
        function = "validate_media_type",
        message = "Image type must be a valid media type."
    ))]
    pub img_type: Option<String>,
    pub upi_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateBody {
    /// Rename the listing in the same statement.
    #[validate(length(min = 1, message = "Name must not be empty."))]
    pub new_name: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Owner must not be empty."))]
    pub owner: String,
    #[validate(email(message = "Email must be formatted."))]
    pub owner_mail: String,
    #[validate(length(min = 1, message = "Phone must not be empty."))]
    pub owner_phone: String,
    pub img_blob: Option<String>,
    #[validate(custom(
        function = "validate_media_type",
        message = "Image type must be a valid media type."
    ))]
    pub img_type: Option<String>,
}

/// Decode an optional base64 image, reported as a field error.
fn decode_image(blob: Option<&str>) -> Result<Option<Vec<u8>>> {
    let Some(blob) = blob else {
        return Ok(None);
    };

    STANDARD.decode(blob).map(Some).map_err(|err| {
        tracing::debug!(error = %err, "invalid image encoding");

        let mut errors = ValidationErrors::new();
        errors.add(
            "img_blob",
            ValidationError::new("base64")
                .with_message("Image must be base64 encoded.".into()),
        );
        ServerError::Validation(errors)
    })
}

/// List every business, with image URLs.
pub async fn list(State(state): State<AppState>) -> Result<Json<Listings>> {
    let businesses = state
        .businesses
        .list()
        .await?
        .into_iter()
        .map(Business::listed)
        .collect();

    Ok(Json(Listings { businesses }))
}

/// Get a single business by name.
pub async fn get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BusinessView>> {
    let business = state
        .businesses
        .find_by_name(&name)
        .await?
        .ok_or(ServerError::NotFound("business"))?;

    Ok(Json(business.detailed()))
}

pub async fn create(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<BusinessView>)> {
    let business = Business {
        img_blob: decode_image(body.img_blob.as_deref())?,
        name: body.name,
        description: body.description,
        owner: body.owner,
        owner_mail: body.owner_mail,
        owner_phone: body.owner_phone,
        img_type: body.img_type,
        upi_id: body.upi_id,
    };

    state.businesses.insert(&business).await?;
    tracing::info!(name = %business.name, "business created");

    Ok((StatusCode::CREATED, Json(business.detailed())))
}

pub async fn update(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Valid(body): Valid<UpdateBody>,
) -> Result<Json<Message>> {
    let update = BusinessUpdate {
        rename_to: body.new_name,
        description: body.description,
        owner: body.owner,
        owner_mail: body.owner_mail,
        owner_phone: body.owner_phone,
        img_blob: decode_image(body.img_blob.as_deref())?,
        img_type: body.img_type,
    };

    if !state.businesses.update(&name, &update).await? {
        return Err(ServerError::NotFound("business"));
    }

    if let Some(new_name) = &update.rename_to {
        tracing::info!(%name, %new_name, "business renamed");
    }

    Ok(Message::new("Business updated successfully"))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Message>> {
    if state.businesses.delete(&name).await? {
        Ok(Message::new("Business deleted successfully"))
    } else {
        Err(ServerError::NotFound("business"))
    }
}
