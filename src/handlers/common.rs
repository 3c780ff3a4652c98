use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::errors::ServiceError;

/// Common pagination query parameters
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
pub struct PaginationParams {
    /// Page number (1-based)
    #[serde(default = "default_page")]
    pub page: u64,
    /// Number of items per page
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    /// Clamps the raw query values to something the database layer can act
    /// on: page starts at 1, per_page falls back to the configured default
    /// when zero and never exceeds the configured maximum.
    pub fn normalize(&self, default_per_page: u64, max_per_page: u64) -> Self {
        let per_page = if self.per_page == 0 {
            default_per_page
        } else {
            self.per_page.min(max_per_page)
        };
        Self {
            page: self.page.max(1),
            per_page,
        }
    }
}

/// Validate input data and map failures onto the shared error type.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))
}

/// Json extractor whose rejections surface through the standard error
/// envelope instead of axum's plain-text default. Malformed payloads and
/// unknown fields both land here as 400s.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                ServiceError::ValidationError(rejection.body_text())
            })?;
        Ok(JsonBody(value))
    }
}
