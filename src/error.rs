//! Error handler for bazaar.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("resource already exists: {0}")]
    Conflict(String),

    #[error("store is unavailable: {0}")]
    StoreUnavailable(String),

    #[error("account {identity} diverged between stores during {stage}")]
    PartialWrite {
        identity: String,
        stage: &'static str,
    },

    #[error("SQL request failed: {0}")]
    Sql(SQLxError),

    #[error("document store request failed: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<BoxError>,
    },
}

impl ServerError {
    /// Build an [`ServerError::Internal`] from any error.
    pub fn internal<E>(details: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.to_owned(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<SQLxError> for ServerError {
    fn from(err: SQLxError) -> Self {
        match err {
            SQLxError::Database(ref db) if db.is_unique_violation() => {
                ServerError::Conflict(db.message().to_owned())
            },
            SQLxError::PoolTimedOut |
            SQLxError::PoolClosed |
            SQLxError::Io(_) |
            SQLxError::Tls(_) => ServerError::StoreUnavailable(err.to_string()),
            err => ServerError::Sql(err),
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => {
                response.errors(validation_errors)
            },

            ServerError::NotFound(_) => response
                .title("Requested resource does not exist.")
                .status(StatusCode::NOT_FOUND),

            ServerError::Unauthorized => response
                .title("Invalid username or password.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Conflict(_) => {
                response.title("Resource conflicts with an existing one.")
            },

            // already reported, with its cause, where the stores diverged.
            ServerError::PartialWrite { identity, stage } => {
                tracing::debug!(%identity, stage, "responding to a partial write");

                ResponseError::default()
                    .details("Account stores could not be kept consistent.")
            },

            ServerError::StoreUnavailable(details) => {
                tracing::error!(%details, "store unavailable");

                ResponseError::default()
            },

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "server returned 500 status");

                ResponseError::default()
            },

            ServerError::Mongo(err) => {
                tracing::error!(error = %err, "server returned 500 status");

                ResponseError::default()
            },

            ServerError::Internal { details, source } => {
                tracing::error!(error = ?source, %details, "server returned 500 status");

                ResponseError::default()
            },

            ServerError::Axum(_) => response,
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_per_kind() {
        let cases = [
            (ServerError::NotFound("account"), StatusCode::NOT_FOUND),
            (ServerError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                ServerError::Conflict("UNIQUE constraint failed".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::StoreUnavailable("pool closed".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServerError::PartialWrite {
                    identity: "abc".into(),
                    stage: "signup",
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    /// Writer collecting formatted log lines.
    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_partial_write_is_not_logged_as_error_again() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let response = tracing::subscriber::with_default(subscriber, || {
            ServerError::PartialWrite {
                identity: "abc".into(),
                stage: "delete",
            }
            .into_response()
        });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("responding to a partial write"));
        assert!(!logs.contains("ERROR"));
    }

    #[test]
    fn test_pool_errors_are_unavailable() {
        assert!(matches!(
            ServerError::from(SQLxError::PoolTimedOut),
            ServerError::StoreUnavailable(_)
        ));
        assert!(matches!(
            ServerError::from(SQLxError::RowNotFound),
            ServerError::Sql(_)
        ));
    }
}
