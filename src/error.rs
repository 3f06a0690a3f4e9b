use actix_web::{
    error::BlockingError, http::header::ContentType, http::StatusCode, HttpResponse,
    ResponseError,
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("username already exists")]
    DuplicateUsername,

    #[error("user not found")]
    UnknownUser,

    #[error("wrong password")]
    WrongPassword,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl AppError {
    fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Hash(_) | AppError::Template(_) | AppError::Blocking(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DuplicateUsername => StatusCode::BAD_REQUEST,
            // Login failures answer with a plain 200 page.
            AppError::UnknownUser | AppError::WrongPassword => StatusCode::OK,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = if self.is_internal() {
            error!("Request failed: {self}");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(self.status_code())
            .content_type(ContentType::plaintext())
            .body(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_errors_keep_their_message() {
        assert_eq!(AppError::DuplicateUsername.to_string(), "username already exists");
        assert_eq!(AppError::UnknownUser.to_string(), "user not found");
        assert_eq!(AppError::WrongPassword.to_string(), "wrong password");
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::DuplicateUsername.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::WrongPassword.status_code(), StatusCode::OK);
        assert_eq!(
            AppError::Database(rusqlite::Error::QueryReturnedNoRows).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
