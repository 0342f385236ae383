use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use gate_engine::AuthorizationError;
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::pipeline::RoutePolicyError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Invalid route policy. {0}")]
    InvalidRoutePolicy(#[from] RoutePolicyError),
    #[error("Could not serialize access token. {0}")]
    CouldNotSerializeAccessToken(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    Denied(#[from] AuthorizationError),
}

/// The HTTP status every pipeline failure maps to.
pub fn denial_status(e: &AuthorizationError) -> StatusCode {
    match e {
        AuthorizationError::MissingCredential(_) => StatusCode::UNAUTHORIZED,
        AuthorizationError::MalformedCredential(_) => StatusCode::UNAUTHORIZED,
        AuthorizationError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
        AuthorizationError::InsufficientPermission(_) => StatusCode::FORBIDDEN,
        AuthorizationError::InsufficientVerification { .. } => StatusCode::FORBIDDEN,
        AuthorizationError::TwoFactorRequired(_) => StatusCode::FORBIDDEN,
        AuthorizationError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        AuthorizationError::BadRequest(_) => StatusCode::BAD_REQUEST,
        AuthorizationError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Denied(e) => denial_status(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRoutePolicy(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CouldNotSerializeAccessToken(_) => StatusCode::BAD_REQUEST,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            Self::Denied(AuthorizationError::StoreUnavailable(e)) => {
                error!("🗃️ Store failure while authorizing a request. {e}");
                json!({ "code": status.as_u16(), "error": "StoreUnavailable", "message": "Internal error" })
            },
            Self::Denied(AuthorizationError::InsufficientVerification { missing, message }) => json!({
                "code": status.as_u16(),
                "error": "InsufficientVerification",
                "message": message,
                "missing_verifications": missing,
            }),
            Self::Denied(e) => json!({ "code": status.as_u16(), "error": e.kind(), "message": e.to_string() }),
            _ => json!({ "code": status.as_u16(), "error": "ServerError", "message": self.to_string() }),
        };
        HttpResponse::build(status).insert_header(ContentType::json()).body(body.to_string())
    }
}
