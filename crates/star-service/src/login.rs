use crate::{
    application::{notices, Notice},
    error::AppError,
    store::AccountStore,
};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use askama::Template;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_login::{AuthSession, AuthUser, AuthnBackend, UserId};
use axum_messages::Messages;
use rs_sha512::HasherContext;
use std::{hash::Hasher, sync::Arc};
use uuid::Uuid;

pub const MINIMUM_PASSWORD_LENGTH: usize = 6;

#[derive(Clone)]
pub struct BackEnd {
    accounts: Arc<dyn AccountStore>,
}

impl std::fmt::Debug for BackEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackEnd").finish_non_exhaustive()
    }
}

pub(crate) fn create_backend(accounts: Arc<dyn AccountStore>) -> BackEnd {
    BackEnd { accounts }
}

#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    session_auth_hash: [u8; 64],
}

impl AuthUser for User {
    type Id = Uuid;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn session_auth_hash(&self) -> &[u8] {
        &self.session_auth_hash
    }
}

impl From<star_db::models::Account> for User {
    fn from(
        star_db::models::Account {
            id,
            email,
            password_hash,
            ..
        }: star_db::models::Account,
    ) -> Self {
        let mut hasher = rs_sha512::Sha512Hasher::default();
        hasher.write(password_hash.as_bytes());
        let _ = hasher.finish();
        let final_result = HasherContext::finish(&mut hasher);
        Self {
            id,
            email,
            session_auth_hash: final_result.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Account database error: {0}")]
    AccountDb(#[from] star_db::Error),
    #[error("Stored password could not be parsed: {0}")]
    StoredPasswordUnableToParse(argon2::password_hash::Error),
    #[error("Password could not be verified: {0}")]
    PasswordUnableToVerify(argon2::password_hash::Error),
    #[error("Password hash failed: {0}")]
    PasswordHash(argon2::password_hash::Error),
}

#[derive(Clone, serde::Deserialize)]
pub struct Credentials {
    email: String,
    password: String,
    next: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl AuthnBackend for BackEnd {
    type User = User;
    type Credentials = Credentials;
    type Error = Error;

    async fn authenticate(
        &self,
        credentials: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        let Some(account) = self
            .accounts
            .load_account_by_email(credentials.email.trim())
            .await?
        else {
            return Ok(None);
        };
        let parsed_password = PasswordHash::new(&account.password_hash)
            .map_err(Error::StoredPasswordUnableToParse)?;
        match Argon2::default().verify_password(credentials.password.as_bytes(), &parsed_password)
        {
            Ok(()) => Ok(Some(account.into())),
            Err(argon2::password_hash::Error::Password) => Ok(None),
            Err(err) => Err(Error::PasswordUnableToVerify(err)),
        }
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        self.accounts
            .load_account_by_id(*user_id)
            .await
            .map_err(Into::into)
            .map(|v| v.map(Into::into))
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(Error::PasswordHash)
}

/// Only same-site absolute paths are followed after signing in.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.contains('\\'))
}

pub mod register_new_user {
    use super::*;

    #[derive(Template)]
    #[template(path = "register.html")]
    pub struct RegisterTemplate {
        stars: Vec<crate::backdrop::Star>,
        error: Option<String>,
        email: String,
    }

    #[derive(serde::Deserialize, Debug)]
    pub struct RegistrationForm {
        email: String,
        password: String,
    }

    fn render(error: Option<String>, email: String) -> Result<Response, AppError> {
        Ok(Html(
            RegisterTemplate {
                stars: crate::backdrop::generate(),
                error,
                email,
            }
            .render()?,
        )
        .into_response())
    }

    pub async fn get() -> Result<Response, AppError> {
        render(None, String::new())
    }

    pub async fn post(
        messages: Messages,
        State(app_state): State<crate::AppState>,
        Form(RegistrationForm { email, password }): Form<RegistrationForm>,
    ) -> Result<Response, AppError> {
        let email = email.trim().to_owned();
        if let Err(problem) = validate(&email, &password) {
            return render(Some(format!("Registration error: {problem}")), email);
        }
        let hashed_password = hash_password(&password)?;
        let account = match app_state
            .accounts
            .create_account(&email, hashed_password)
            .await
        {
            Ok(account) => account,
            Err(err) => {
                tracing::error!("registration failed: {err}");
                return render(Some(format!("Registration error: {err}")), email);
            }
        };
        if let Err(err) = app_state.data.insert_user(account.id, &email).await {
            tracing::error!("mirroring user {}: {err}", account.id);
            return render(Some(format!("Error saving user: {err}")), email);
        }
        messages.success("You have successfully registered! Please log in.");
        Ok(Redirect::to("/login").into_response())
    }

    pub(crate) fn validate(email: &str, password: &str) -> Result<(), &'static str> {
        if !email_address::EmailAddress::is_valid(email) {
            return Err("email address is invalid");
        }
        if password.chars().count() < MINIMUM_PASSWORD_LENGTH {
            return Err("password should be at least 6 characters");
        }
        Ok(())
    }
}

pub mod login {
    use super::*;

    #[derive(Template)]
    #[template(path = "login.html")]
    pub struct LoginTemplate {
        stars: Vec<crate::backdrop::Star>,
        messages: Vec<Notice>,
        error: Option<String>,
        next: Option<String>,
    }

    #[derive(Debug, serde::Deserialize)]
    pub struct NextUrl {
        next: Option<String>,
    }

    pub async fn get(
        auth_session: AuthSession<BackEnd>,
        messages: Messages,
        Query(NextUrl { next }): Query<NextUrl>,
    ) -> Result<Response, AppError> {
        if auth_session.user.is_some() {
            return Ok(Redirect::to("/dashboard").into_response());
        }
        Ok(Html(
            LoginTemplate {
                stars: crate::backdrop::generate(),
                messages: notices(messages),
                error: None,
                next,
            }
            .render()?,
        )
        .into_response())
    }

    pub async fn post(
        mut auth_session: AuthSession<BackEnd>,
        Form(creds): Form<Credentials>,
    ) -> Result<Response, AppError> {
        let failure = |error: &str, next: Option<String>| -> Result<Response, AppError> {
            Ok(Html(
                LoginTemplate {
                    stars: crate::backdrop::generate(),
                    messages: Vec::new(),
                    error: Some(error.to_owned()),
                    next,
                }
                .render()?,
            )
            .into_response())
        };
        let user = match auth_session.authenticate(creds.clone()).await {
            Ok(Some(user)) => user,
            Ok(None) => return failure("Incorrect email or password", creds.next),
            Err(err) => {
                tracing::error!("authenticating {}: {err}", creds.email);
                return failure("An error occurred. Please try again.", creds.next);
            }
        };
        auth_session.login(&user).await?;
        Ok(Redirect::to(safe_next(creds.next.as_deref()).unwrap_or("/dashboard")).into_response())
    }
}

pub mod logout {
    use super::*;

    pub async fn post(mut auth_session: AuthSession<BackEnd>) -> Result<Response, AppError> {
        auth_session.logout().await?;
        Ok(Redirect::to("/login").into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_follows_only_same_site_next_urls() {
        assert_eq!(safe_next(Some("/dashboard")), Some("/dashboard"));
        assert_eq!(safe_next(Some("//evil.example.com")), None);
        assert_eq!(safe_next(Some("https://evil.example.com")), None);
        assert_eq!(safe_next(Some("/\\evil.example.com")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn it_validates_registration_input() {
        use register_new_user::validate;
        assert!(validate("owner@example.com", "secret").is_ok());
        assert_eq!(
            validate("owner.example.com", "secret"),
            Err("email address is invalid")
        );
        assert_eq!(
            validate("owner@example.com", "12345"),
            Err("password should be at least 6 characters")
        );
    }

    #[test]
    fn it_ties_the_session_hash_to_the_stored_password() {
        let now = jiff::Timestamp::now().into();
        let account = |password_hash: &str| star_db::models::Account {
            id: Uuid::nil(),
            email: "owner@example.com".to_owned(),
            password_hash: password_hash.to_owned(),
            created: now,
            updated: now,
        };
        let before: User = account("hash-one").into();
        let again: User = account("hash-one").into();
        let after: User = account("hash-two").into();
        assert_eq!(before.session_auth_hash(), again.session_auth_hash());
        assert_ne!(before.session_auth_hash(), after.session_auth_hash());
    }
}
