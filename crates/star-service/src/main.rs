use anyhow::Context;
use axum_login::{
    tower_sessions::{MemoryStore, SessionManagerLayer},
    AuthManagerLayerBuilder,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod application;
mod backdrop;
mod cipher;
mod config;
mod dashboard;
mod employees;
mod error;
mod jobs;
mod login;
mod password_reset;
mod rate;
mod rollup;
mod routes;
mod storage;
mod store;
#[cfg(test)]
mod tests;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let config = config::load().context("loading configuration")?;
    init_tracing(&config.tracing);
    let cipher = Arc::new(
        cipher::Cipher::from_base64_encoded(&config.master_secret)
            .context("configuring cipher")?,
    );
    let store = star_db::create(&config.database);
    let object_storage = Arc::new(storage::FileStorage::new(
        &config.storage,
        &config.public_base_url,
    ));
    let app_state = AppState {
        accounts: Arc::new(store.clone()),
        data: Arc::new(store.clone()),
        storage: object_storage,
        cipher,
        settings: Arc::new(Settings {
            public_base_url: config.public_base_url.clone(),
            rating_finish_url: config.rating_finish_url.clone(),
            reset_token_lifetime: config.jobs.password_reset.token_lifetime,
            max_upload_bytes: config.max_upload_bytes,
            secure_cookies: config.secure_cookies,
        }),
    };
    let app = app(app_state);
    let cancellation_token = CancellationToken::new();
    let jobs = jobs::create(config.jobs, store);
    let jobs_handle = tokio::spawn({
        let cancellation_token = cancellation_token.clone();
        async move {
            if let Err(err) = jobs.run(cancellation_token).await {
                tracing::error!("background jobs stopped: {err}");
            }
        }
    });
    let address = format!("{}:{}", config.bind_address, config.bind_port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding listener to {address}"))?;
    tracing::info!("Star Service listening on {address}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancellation_token.clone()))
        .await
        .context("serving application")?;
    cancellation_token.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(30), jobs_handle).await;
    Ok(())
}

fn init_tracing(config: &config::TracingConfig) {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    let console_layer = config.console.then(console_subscriber::spawn);
    tracing_subscriber::registry()
        .with(console_layer)
        .with(fmt_layer)
        .init();
}

async fn shutdown_signal(cancellation_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("installing Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                tracing::error!("installing terminate handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
        _ = cancellation_token.cancelled() => (),
    }
}

fn app(app_state: AppState) -> axum::Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(app_state.settings.secure_cookies);
    let login_backend = login::create_backend(app_state.accounts.clone());
    let auth_layer = AuthManagerLayerBuilder::new(login_backend, session_layer).build();
    routes::setup(app_state, auth_layer)
}

#[derive(Clone)]
struct AppState {
    accounts: Arc<dyn store::AccountStore>,
    data: Arc<dyn store::DataStore>,
    storage: Arc<dyn storage::ObjectStorage>,
    cipher: Arc<cipher::Cipher>,
    settings: Arc<Settings>,
}

struct Settings {
    public_base_url: String,
    rating_finish_url: String,
    reset_token_lifetime: Duration,
    max_upload_bytes: usize,
    secure_cookies: bool,
}
