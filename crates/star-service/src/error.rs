use axum::response::{IntoResponse, Response};
use http::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Not found")]
    NotFound,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
    #[error("Session error: {0}")]
    Session(#[from] axum_login::tower_sessions::session::Error),
    #[error("Store error: {0}")]
    Store(#[from] star_db::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::Error),
    #[error("Cipher error: {0}")]
    Cipher(#[from] crate::cipher::Error),
    #[error("Login error: {0}")]
    Login(#[from] crate::login::Error),
    #[error("Authentication error: {0}")]
    Auth(#[from] axum_login::Error<crate::login::BackEnd>),
    #[error("QR code error: {0}")]
    QrCode(#[from] qrcode::types::QrError),
    #[error("Time arithmetic error: {0}")]
    Time(#[from] jiff::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            AppError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            err => {
                tracing::error!("request failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
