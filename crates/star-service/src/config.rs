use crate::{jobs, storage};
use anyhow::Context;
use std::io::Read;

#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bind_address: String,
    pub bind_port: u16,
    /// Scheme, host and port the application is reachable on from outside,
    /// without a trailing slash. Used for public storage URLs, rating links
    /// and password reset links.
    pub public_base_url: String,
    pub master_secret: String,
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    pub rating_finish_url: String,
    pub database: star_db::Config,
    pub storage: storage::Config,
    pub jobs: jobs::Config,
    pub tracing: TracingConfig,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TracingConfig {
    pub console: bool,
}

fn default_secure_cookies() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

pub fn load() -> anyhow::Result<Config> {
    let mut configuration = String::with_capacity(4096);
    std::fs::File::open("./app-config.toml")
        .context("unable to open configuration file ./app-config.toml")?
        .read_to_string(&mut configuration)
        .context("unable to read configuration file ./app-config.toml")?;
    let mut config = parse(&configuration)?;
    if let Ok(master_secret) = std::env::var("STAR_SERVICE_MASTER_SECRET") {
        config.master_secret = master_secret;
    }
    if let Ok(smtp_user_name) = std::env::var("STAR_SERVICE_SMTP_USER_NAME") {
        config.jobs.password_reset.smtp_user_name = smtp_user_name;
    }
    if let Ok(smtp_password) = std::env::var("STAR_SERVICE_SMTP_PASSWORD") {
        config.jobs.password_reset.smtp_password = smtp_password;
    }
    Ok(config)
}

fn parse(configuration: &str) -> anyhow::Result<Config> {
    let mut config = toml::from_str::<Config>(configuration)
        .context("unable to parse configuration file ./app-config.toml")?;
    config.public_base_url = config.public_base_url.trim_end_matches('/').to_owned();
    Ok(config)
}
