use askama::Template;
use scoped_futures::ScopedFutureExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Clone, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub run: bool,
    #[serde(with = "humantime_serde")]
    pub sleep: Duration,
    #[serde(with = "humantime_serde")]
    pub error_sleep: Duration,
    #[serde(with = "humantime_serde")]
    pub token_lifetime: Duration,
    pub smtp_host: String,
    pub smtp_port: u16,
    #[serde(with = "humantime_serde")]
    pub smtp_connect_timeout: Duration,
    pub smtp_implicit_tls: bool,
    pub smtp_user_name: String,
    pub smtp_password: String,
    pub from_address: String,
}

pub struct Sender {
    store: star_db::Store,
    config: Config,
}

impl Sender {
    pub fn new(store: star_db::Store, config: Config) -> Self {
        Self { store, config }
    }

    #[tracing::instrument(skip(self, cancellation_token))]
    pub async fn send_password_reset_emails(
        &self,
        cancellation_token: CancellationToken,
    ) -> Result<SendOutcome, Error> {
        let resets_to_send = self.store.list_unsent_password_resets().await?;
        let mut send_stats = SendStatistics::new(resets_to_send.len());
        for (account, reset) in resets_to_send {
            if cancellation_token.is_cancelled() {
                return Ok(SendOutcome::Canceled(send_stats));
            }
            let reset_link = reset_link(&reset.redirect_url, reset.uuid);
            match self
                .record_and_send_password_reset_email(&account.email, reset.uuid, &reset_link)
                .await
            {
                Ok(_) => send_stats.increment_sent(),
                Err(SendEmailError::Skipped) => send_stats.increment_skipped(),
                Err(err) => send_stats.append_error(err),
            }
        }
        Ok(SendOutcome::Completed(send_stats))
    }

    #[tracing::instrument(skip(self, reset_link))]
    async fn record_and_send_password_reset_email(
        &self,
        email_address: &str,
        token: Uuid,
        reset_link: &str,
    ) -> Result<(), SendEmailError> {
        match self
            .store
            .record_password_reset_email(token, || {
                self.send_email(email_address, reset_link).scope_boxed()
            })
            .await
        {
            Ok(_) => Ok(()),
            Err(star_db::Error::Skipped) => Err(SendEmailError::Skipped),
            Err(err) => Err(SendEmailError::RecordingAndSending(err)),
        }
    }

    #[tracing::instrument(skip(self, reset_link))]
    async fn send_email(&self, email_address: &str, reset_link: &str) -> Result<(), String> {
        let valid_for = humantime::format_duration(self.config.token_lifetime).to_string();
        let email = mail_builder::MessageBuilder::new()
            .subject("Star Service password reset")
            .from(self.config.from_address.as_str())
            .sender(self.config.from_address.as_str())
            .to(email_address)
            .html_body(
                EmailHtmlTemplate {
                    reset_link,
                    valid_for: &valid_for,
                }
                .render()
                .map_err(|err| format!("Template Error: {err:?}"))?,
            )
            .text_body(
                EmailTextTemplate {
                    reset_link,
                    valid_for: &valid_for,
                }
                .render()
                .map_err(|err| format!("Template Error: {err:?}"))?,
            );
        mail_send::SmtpClientBuilder::new(self.config.smtp_host.as_str(), self.config.smtp_port)
            .implicit_tls(self.config.smtp_implicit_tls)
            .credentials((
                self.config.smtp_user_name.as_str(),
                self.config.smtp_password.as_str(),
            ))
            .timeout(self.config.smtp_connect_timeout)
            .connect()
            .await
            .map_err(|err| format!("Connecting to SMTP Server: {err:?}"))?
            .send(email)
            .await
            .map_err(|err| format!("Sending Email: {err:?}"))
    }
}

pub fn reset_link(redirect_url: &str, token: Uuid) -> String {
    format!("{}/{token}", redirect_url.trim_end_matches('/'))
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Account database error: {0}")]
    AccountDb(#[from] star_db::Error),
}

pub enum SendOutcome {
    Completed(SendStatistics),
    Canceled(SendStatistics),
}

#[derive(Debug)]
pub struct SendStatistics {
    pub(super) sent: usize,
    pub(super) skipped: usize,
    pub(super) remaining: usize,
    pub(super) errors: Vec<SendEmailError>,
}

impl SendStatistics {
    fn new(count: usize) -> Self {
        Self {
            sent: 0,
            skipped: 0,
            remaining: count,
            errors: Vec::new(),
        }
    }

    fn increment_sent(&mut self) {
        self.sent += 1;
        self.remaining -= 1;
    }

    fn increment_skipped(&mut self) {
        self.skipped += 1;
        self.remaining -= 1;
    }

    fn append_error(&mut self, error: SendEmailError) {
        self.remaining -= 1;
        self.errors.push(error);
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SendEmailError {
    #[error("Skipped")]
    Skipped,
    #[error("Recording and Sending: {0}")]
    RecordingAndSending(star_db::Error),
}

#[derive(Template)]
#[template(path = "email/password-reset.txt")]
pub struct EmailTextTemplate<'a> {
    reset_link: &'a str,
    valid_for: &'a str,
}

#[derive(Template)]
#[template(path = "email/password-reset.html")]
pub struct EmailHtmlTemplate<'a> {
    reset_link: &'a str,
    valid_for: &'a str,
}
