//! Persistence of photo records
//
// Records are addressed by a [`Scope`], the pair of application id and owner
// id, mirroring the `artifacts/{app}/users/{owner}/posing_refs` collection the
// records are kept under. Every read and write is confined to one scope.

use std::fmt::Display;

use async_trait::async_trait;
use futures::stream::BoxStream;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::photo::{PhotoRecord, TagSet};

mod database;
mod row;

pub use database::DatabaseStore;

/// The largest serialized record accepted by the store, in bytes.
pub const RECORD_SIZE_LIMIT: usize = 1_048_576;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record of {size} bytes exceeds the {limit} byte limit")]
    RecordTooLarge { size: usize, limit: usize },
    #[error("No photo {0} in this collection")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Unable to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub app_id: String,
    pub owner_id: String,
}

impl Scope {
    pub fn new(app_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            owner_id: owner_id.into(),
        }
    }

    pub fn path(&self) -> String {
        format!(
            "artifacts/{}/users/{}/posing_refs",
            self.app_id, self.owner_id
        )
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// A photo about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub image_url: String,
    pub tags: TagSet,
}

/// A change to an existing photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoPatch {
    /// Replace every tag, the image and favorite flag are kept.
    Tags(TagSet),
    Favorite(bool),
}

/// Full snapshots of a scope, newest photo first.
pub type SnapshotStream = BoxStream<'static, Result<Vec<PhotoRecord>, StoreError>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn snapshot(&self, scope: &Scope) -> Result<Vec<PhotoRecord>, StoreError>;

    /// Stream the current snapshot of `scope`, followed by a new snapshot
    /// after every change to it.
    fn subscribe(&self, scope: Scope) -> SnapshotStream;

    async fn create(&self, scope: &Scope, photo: NewPhoto) -> Result<Uuid, StoreError>;

    async fn update(&self, scope: &Scope, id: Uuid, patch: PhotoPatch) -> Result<(), StoreError>;

    async fn delete(&self, scope: &Scope, id: Uuid) -> Result<(), StoreError>;
}
