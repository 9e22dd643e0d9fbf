//! Signing in to the photo collection
//
// A configured auth token identifies the user directly. Without one the
// session is anonymous, but the anonymous id is written to disk so the same
// photos are found again next time.

use std::fmt::Display;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Unable to access identity file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("The auth token does not name a user")]
    EmptyToken,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self) -> Result<UserId, IdentityError>;
}

#[derive(Debug, Clone)]
pub struct SessionBootstrap {
    token: Option<String>,
    identity_file: Utf8PathBuf,
}

impl SessionBootstrap {
    pub fn new(token: Option<String>, identity_file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            identity_file: identity_file.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.auth_token.clone(), config.identity_file())
    }

    async fn anonymous(&self) -> Result<UserId, IdentityError> {
        let path = &self.identity_file;
        match tokio::fs::read_to_string(path).await {
            Ok(contents) if !contents.trim().is_empty() => {
                return Ok(UserId(contents.trim().to_string()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(io_error(path, source)),
        }

        let id = Uuid::new_v4().to_string();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::write(path, &id)
            .await
            .map_err(|e| io_error(path, e))?;
        tracing::info!(%path, "Created anonymous identity");
        Ok(UserId(id))
    }
}

fn io_error(path: &Utf8Path, source: std::io::Error) -> IdentityError {
    IdentityError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The user named by a token, the text before its first `.`.
pub fn token_identity(token: &str) -> Result<UserId, IdentityError> {
    let subject = token.split('.').next().unwrap_or_default().trim();
    if subject.is_empty() {
        return Err(IdentityError::EmptyToken);
    }
    Ok(UserId(subject.to_string()))
}

#[async_trait]
impl IdentityProvider for SessionBootstrap {
    #[tracing::instrument(name = "Signing in", skip(self))]
    async fn sign_in(&self) -> Result<UserId, IdentityError> {
        match &self.token {
            Some(token) => token_identity(token),
            None => self.anonymous().await,
        }
    }
}
