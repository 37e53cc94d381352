use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Amount must be a positive whole number")]
    InvalidAmount,
    #[error("No account matches that token")]
    AccountNotFound,
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Cannot transfer to your own account")]
    SelfTransfer,
    #[error("User is not connected")]
    UserNotConnected,
    #[error("Username already exists")]
    UsernameAlreadyExists,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("User not found")]
    UserNotFound,
    #[error("Username must be 3 to 32 characters and password at least 8 characters")]
    InvalidUsernameOrPassword,
    #[error("Room name must not be blank")]
    InvalidRoom,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidAmount => StatusCode::BAD_REQUEST,
            Error::AccountNotFound => StatusCode::NOT_FOUND,
            Error::InsufficientFunds => StatusCode::BAD_REQUEST,
            Error::SelfTransfer => StatusCode::BAD_REQUEST,
            Error::UserNotConnected => StatusCode::NOT_FOUND,
            Error::UsernameAlreadyExists => StatusCode::CONFLICT,
            Error::InvalidPassword => StatusCode::UNAUTHORIZED,
            Error::UserNotFound => StatusCode::NOT_FOUND,
            Error::InvalidUsernameOrPassword => StatusCode::BAD_REQUEST,
            Error::InvalidRoom => StatusCode::BAD_REQUEST,
        }
    }

    pub fn into_response_tuple(self) -> (StatusCode, String) {
        (self.status_code(), self.to_string())
    }
}
