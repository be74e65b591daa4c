use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod password_reset;

pub fn create(config: Config, store: star_db::Store) -> Jobs {
    Jobs {
        config: Arc::new(config),
        store,
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Password reset mailer: {0}")]
    PasswordResetMailer(#[from] password_reset::Error),
}

pub struct Jobs {
    config: Arc<Config>,
    store: star_db::Store,
}

impl Jobs {
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<(), Error> {
        self.run_password_reset_mailer(cancellation_token).await
    }

    #[tracing::instrument(skip(self, cancellation_token))]
    async fn run_password_reset_mailer(
        &self,
        cancellation_token: CancellationToken,
    ) -> Result<(), Error> {
        use password_reset::*;
        use tokio::time::sleep;
        let config = &self.config.password_reset;
        let mailer = password_reset::Sender::new(self.store.clone(), config.clone());
        loop {
            let pause = if config.run {
                match mailer
                    .send_password_reset_emails(cancellation_token.clone())
                    .await
                {
                    Ok(SendOutcome::Completed(stats)) => {
                        tracing::info!("Send Email Statistics: {stats:?}");
                        if !stats.errors.is_empty() && stats.sent == 0 {
                            Some(config.error_sleep)
                        } else if stats.sent == 0 {
                            Some(config.sleep)
                        } else {
                            None
                        }
                    }
                    Ok(SendOutcome::Canceled(stats)) => {
                        tracing::info!("Send Email Statistics: {stats:?}");
                        break;
                    }
                    Err(err) => {
                        tracing::error!("Send Email Error: {err:?}");
                        Some(config.error_sleep)
                    }
                }
            } else {
                Some(config.error_sleep)
            };
            if let Some(pause) = pause {
                tokio::select! {
                    _ = cancellation_token.cancelled() => (),
                    _ = sleep(pause) => ()
                }
            }
            if cancellation_token.is_cancelled() {
                break;
            }
        }
        Ok(())
    }
}

#[derive(Clone, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub password_reset: password_reset::Config,
}
