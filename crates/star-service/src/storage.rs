use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use std::path::{Component, PathBuf};

pub const EMPLOYEES_BUCKET: &str = "employees";

#[derive(Clone, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub root: PathBuf,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("The resource already exists")]
    AlreadyExists,
    #[error("Object not found")]
    NotFound,
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Storage I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Binary object storage addressed by bucket and slash separated path.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes`; never overwrites an existing object.
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), Error>;
    fn public_url(&self, bucket: &str, path: &str) -> Result<String, Error>;
    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>, Error>;
}

/// Stores objects under `<root>/<bucket>/<path>` and serves them through
/// `/storage/{bucket}/{*path}`.
pub struct FileStorage {
    root: PathBuf,
    public_base_url: String,
}

impl FileStorage {
    pub fn new(config: &Config, public_base_url: &str) -> Self {
        Self {
            root: config.root.clone(),
            public_base_url: public_base_url.to_owned(),
        }
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf, Error> {
        let mut full = self.root.join(checked_segment(bucket)?);
        for segment in path.split('/') {
            full.push(checked_segment(segment)?);
        }
        Ok(full)
    }
}

fn checked_segment(segment: &str) -> Result<&str, Error> {
    let mut components = std::path::Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !segment.contains('\\') => Ok(segment),
        _ => Err(Error::InvalidKey(segment.to_owned())),
    }
}

#[async_trait::async_trait]
impl ObjectStorage for FileStorage {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), Error> {
        use tokio::io::AsyncWriteExt;
        let full = self.object_path(bucket, path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::AlreadyExists)
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> Result<String, Error> {
        self.object_path(bucket, path)?;
        Ok(format!("{}/storage/{bucket}/{path}", self.public_base_url))
    }

    #[tracing::instrument(skip(self))]
    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>, Error> {
        match tokio::fs::read(self.object_path(bucket, path)?).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(err) => Err(err.into()),
        }
    }
}

fn content_type_of(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map_or("", |(_, extension)| extension)
        .to_lowercase();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

pub async fn serve(
    State(app_state): State<crate::AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<impl IntoResponse, crate::error::AppError> {
    let bytes = match app_state.storage.read(&bucket, &path).await {
        Ok(bytes) => bytes,
        Err(Error::NotFound | Error::InvalidKey(_)) => return Err(crate::error::AppError::NotFound),
        Err(err) => return Err(err.into()),
    };
    Ok((
        [
            (header::CONTENT_TYPE, content_type_of(&path)),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        bytes,
    ))
}
