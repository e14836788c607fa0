use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::tz::TzError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error(transparent)]
    InvalidDateTime(#[from] TzError),

    #[error("a favorite named {0:?} with the same details already exists")]
    DuplicateFavorite(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "InvalidInput",
            ApiError::UnknownCategory(_) => "UnknownCategory",
            ApiError::InvalidDateTime(TzError::InvalidDateTimeFormat(_)) => {
                "InvalidDateTimeFormat"
            }
            ApiError::InvalidDateTime(TzError::UnknownTimezone(_)) => "UnknownTimezone",
            ApiError::DuplicateFavorite(_) => "DuplicateFavorite",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Unauthenticated(_) => "Unauthenticated",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_)
            | ApiError::UnknownCategory(_)
            | ApiError::InvalidDateTime(_)
            | ApiError::DuplicateFavorite(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            error!(error = %format!("{e:#}"), "request failed");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests() {
        let cases = [
            ApiError::InvalidInput("name is required".into()),
            ApiError::UnknownCategory("nope".into()),
            ApiError::InvalidDateTime(TzError::InvalidDateTimeFormat("x".into())),
            ApiError::DuplicateFavorite("coffee".into()),
        ];
        for e in cases {
            assert_eq!(e.status(), StatusCode::BAD_REQUEST, "{e:?}");
        }
    }

    #[test]
    fn internal_error_hides_cause() {
        let e = ApiError::from(anyhow::anyhow!("password=hunter2 connection refused"));
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.to_string(), "internal error");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(ApiError::NotFound("activity").kind(), "NotFound");
        assert_eq!(ApiError::NotFound("activity").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(TzError::UnknownTimezone("x".into())).kind(),
            "UnknownTimezone"
        );
        assert_eq!(
            ApiError::Unauthenticated("missing token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn response_body_carries_kind_and_message() {
        let res = ApiError::DuplicateFavorite("Coffee".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["error"], "DuplicateFavorite");
        assert!(v["message"].as_str().unwrap().contains("Coffee"));
    }
}
