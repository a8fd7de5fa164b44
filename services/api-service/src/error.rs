use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Handler-level failures. Client-provided badness maps to 4xx, everything
/// downstream to 5xx; internals are never leaked in the body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("invoice not found")]
    NotFound,

    #[error("storage call failed: {0}")]
    Storage(#[from] tonic::Status),

    #[error("amount out of range")]
    AmountOverflow,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::AmountOverflow => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage(status) => match status.code() {
                tonic::Code::NotFound => StatusCode::NOT_FOUND,
                tonic::Code::InvalidArgument => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => {
                HttpResponse::InternalServerError().finish()
            }
            code => HttpResponse::build(code).body(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downstream_failures_are_500() {
        use actix_web::body::MessageBody;

        let err = ApiError::Storage(tonic::Status::internal("db down"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        // No stack traces or internals in the body.
        assert_eq!(
            err.error_response().body().size(),
            actix_web::body::BodySize::Sized(0)
        );
    }

    #[test]
    fn client_badness_is_400() {
        let err = ApiError::BadRequest("bad uuid".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
