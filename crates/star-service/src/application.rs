use crate::{error::AppError, login::BackEnd};
use askama::Template;
use axum::response::{Html, IntoResponse, Response};
use axum_login::AuthSession;
use axum_messages::{Level, Messages};

/// A flashed message ready for rendering.
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

pub fn notices(messages: Messages) -> Vec<Notice> {
    messages
        .into_iter()
        .map(|message| Notice {
            is_error: matches!(message.level, Level::Error | Level::Warning),
            text: message.message,
        })
        .collect()
}

pub mod main {
    use super::*;

    #[derive(Template)]
    #[template(path = "app-main.html")]
    pub struct MainTemplate {
        stars: Vec<crate::backdrop::Star>,
        logged_in: bool,
    }

    pub async fn get(auth_session: AuthSession<BackEnd>) -> Result<Response, AppError> {
        Ok(Html(
            MainTemplate {
                stars: crate::backdrop::generate(),
                logged_in: auth_session.user.is_some(),
            }
            .render()?,
        )
        .into_response())
    }
}

pub async fn fallback(_uri: axum::http::Uri) -> impl IntoResponse {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}
