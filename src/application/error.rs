use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    application::{pagination::PaginationError, repos::RepoError},
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Diagnostic chain attached to error responses for request logging.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Domain(DomainError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            AppError::Domain(DomainError::Validation { .. }) | AppError::Pagination(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Domain(DomainError::Invariant { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Repo(RepoError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Repo(RepoError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            AppError::Repo(RepoError::Duplicate { .. }) => StatusCode::CONFLICT,
            AppError::Repo(RepoError::Persistence(_) | RepoError::Timeout) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Repo(RepoError::Integrity { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Infra(InfraError::Database { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to API clients.
    ///
    /// Domain failures carry their own stable wording; everything else is
    /// reduced to a generic description.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Domain(DomainError::Invariant { .. }) => {
                "Unexpected error occurred".to_string()
            }
            AppError::Domain(error) => capitalize(&error.to_string()),
            AppError::Pagination(error) => capitalize(&error.to_string()),
            AppError::Repo(RepoError::NotFound) => "Resource not found".to_string(),
            AppError::Repo(RepoError::InvalidInput { .. }) => {
                "Request could not be processed".to_string()
            }
            AppError::Repo(RepoError::Duplicate { .. }) => "Resource already exists".to_string(),
            AppError::Repo(RepoError::Persistence(_) | RepoError::Timeout)
            | AppError::Infra(InfraError::Database { .. }) => {
                "Service temporarily unavailable".to_string()
            }
            AppError::Repo(RepoError::Integrity { .. })
            | AppError::Infra(_)
            | AppError::Unexpected(_) => "Unexpected error occurred".to_string(),
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.public_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(json!({ "message": message }))).into_response();
        report.attach(&mut response);
        response
    }
}
