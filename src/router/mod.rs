//! HTTP API under `/api`.
pub mod business;
pub mod delete;
pub mod image;
pub mod login;
pub mod profile;
pub mod signup;

use axum::Json;
use axum::Router;
use axum::extract::{FromRequest, Request};
use axum::routing::{delete, get, post};
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::{AppState, ServerError};

/// JSON body checked with [`Validate`] before reaching the handler.
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Plain confirmation body.
#[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_owned(),
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        // `POST /api/signup` goes to `signup`.
        .route("/signup", post(signup::handler))
        // `POST /api/login` goes to `login`.
        .route("/login", post(login::handler))
        // `DELETE /api/delete?account=` goes to `delete`.
        .route("/delete", delete(delete::handler))
        .route("/businesses", get(business::list))
        .route("/business", post(business::create))
        .route(
            "/business/{name}",
            get(business::get)
                .put(business::update)
                .delete(business::remove),
        )
        .route("/image/{token}", get(image::handler))
        .route("/profile/{identity}", get(profile::get))
        .route("/profile/{identity}/contributions", post(profile::contribute))
}
