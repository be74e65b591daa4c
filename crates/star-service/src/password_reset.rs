use crate::error::AppError;
use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_messages::Messages;
use uuid::Uuid;

pub mod forgot_password {
    use super::*;

    pub const CONFIRMATION: &str =
        "If an account exists for that email, a link to reset the password is on its way.";

    #[derive(Template)]
    #[template(path = "forgot-password.html")]
    pub struct ForgotPasswordTemplate {
        stars: Vec<crate::backdrop::Star>,
        error: Option<String>,
        confirmation: Option<&'static str>,
    }

    #[derive(Debug, serde::Deserialize)]
    pub struct ForgotPasswordForm {
        email: String,
    }

    fn render(
        error: Option<String>,
        confirmation: Option<&'static str>,
    ) -> Result<Response, AppError> {
        Ok(Html(
            ForgotPasswordTemplate {
                stars: crate::backdrop::generate(),
                error,
                confirmation,
            }
            .render()?,
        )
        .into_response())
    }

    pub async fn get() -> Result<Response, AppError> {
        render(None, None)
    }

    /// Records a reset request for the account, if any. The mail itself is
    /// sent by the password reset job. The answer is the same whether or not
    /// the account exists.
    pub async fn post(
        State(app_state): State<crate::AppState>,
        Form(ForgotPasswordForm { email }): Form<ForgotPasswordForm>,
    ) -> Result<Response, AppError> {
        let email = email.trim();
        if !email_address::EmailAddress::is_valid(email) {
            return render(Some("Please enter a valid email address.".to_owned()), None);
        }
        let settings = &app_state.settings;
        let expires = jiff::Timestamp::now()
            .checked_add(jiff::SignedDuration::try_from(settings.reset_token_lifetime)?)?;
        let redirect_url = format!("{}/reset-password", settings.public_base_url);
        let requested = match app_state.accounts.load_account_by_email(email).await {
            Ok(Some(account)) => {
                app_state
                    .accounts
                    .create_password_reset(account.id, redirect_url, expires)
                    .await
            }
            Ok(None) => {
                tracing::info!("password reset requested for unknown email");
                return render(None, Some(CONFIRMATION));
            }
            Err(err) => Err(err),
        };
        match requested {
            Ok(_) => render(None, Some(CONFIRMATION)),
            Err(err) => {
                tracing::error!("recording password reset: {err}");
                render(Some("An error occurred. Please try again.".to_owned()), None)
            }
        }
    }
}

pub mod reset_password {
    use super::*;
    use crate::login::{hash_password, MINIMUM_PASSWORD_LENGTH};

    pub const INVALID_LINK: &str = "This reset link is invalid or has expired.";

    #[derive(Template)]
    #[template(path = "reset-password.html")]
    pub struct ResetPasswordTemplate {
        token: Uuid,
        valid: bool,
        error: Option<String>,
    }

    #[derive(serde::Deserialize)]
    pub struct ResetPasswordForm {
        password: String,
        repeat_password: String,
    }

    fn render(token: Uuid, valid: bool, error: Option<String>) -> Result<Response, AppError> {
        Ok(Html(
            ResetPasswordTemplate {
                token,
                valid,
                error,
            }
            .render()?,
        )
        .into_response())
    }

    pub async fn get(
        State(app_state): State<crate::AppState>,
        Path(token): Path<Uuid>,
    ) -> Result<Response, AppError> {
        match app_state.accounts.load_password_reset(token).await? {
            Some(_) => render(token, true, None),
            None => render(token, false, Some(INVALID_LINK.to_owned())),
        }
    }

    pub async fn post(
        messages: Messages,
        State(app_state): State<crate::AppState>,
        Path(token): Path<Uuid>,
        Form(ResetPasswordForm {
            password,
            repeat_password,
        }): Form<ResetPasswordForm>,
    ) -> Result<Response, AppError> {
        if password.chars().count() < MINIMUM_PASSWORD_LENGTH {
            return render(
                token,
                true,
                Some("Password should be at least 6 characters.".to_owned()),
            );
        }
        if password != repeat_password {
            return render(token, true, Some("Passwords don't match.".to_owned()));
        }
        let password_hash = hash_password(&password)?;
        match app_state
            .accounts
            .complete_password_reset(token, password_hash)
            .await
        {
            Ok(()) => {
                messages.success("Your password has been reset. Please log in.");
                Ok(Redirect::to("/login").into_response())
            }
            Err(star_db::Error::NotFound) => render(token, false, Some(INVALID_LINK.to_owned())),
            Err(err) => {
                tracing::error!("completing password reset: {err}");
                render(
                    token,
                    true,
                    Some("An error occurred. Please try again.".to_owned()),
                )
            }
        }
    }
}
