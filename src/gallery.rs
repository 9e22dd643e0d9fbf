//! The state of one signed in gallery session
//
// The gallery is the only part of the crate that talks to the store. Store
// failures never escape as panics, they are logged and kept as notices for
// the user alongside the returned error.

use std::sync::Arc;

use camino::Utf8Path;
use futures::future::join_all;
use thiserror::Error;
use uuid::Uuid;

use crate::filter::FilterConfig;
use crate::identity::{IdentityError, IdentityProvider};
use crate::normalize::{normalize_batch, NormalizeError, NormalizedImage, NormalizerSettings};
use crate::photo::{PhotoRecord, TagSet};
use crate::store::{DocumentStore, NewPhoto, PhotoPatch, Scope, SnapshotStream, StoreError};
use crate::viewer::Viewer;
use crate::Message;

/// The most images a single upload may hold.
pub const MAX_BATCH_SIZE: usize = 10;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("At most {limit} images can be uploaded at once ({pending} pending, {selected} selected)")]
    BatchSizeExceeded {
        pending: usize,
        selected: usize,
        limit: usize,
    },
    #[error("Unable to process image: {0}")]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("No photo {0} in the gallery")]
    UnknownPhoto(Uuid),
}

/// A message for the user about something that went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice(pub String);

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Images waiting to be uploaded together with the tags they will share.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    images: Vec<NormalizedImage>,
    pub tags: TagSet,
}

impl UploadBatch {
    pub fn images(&self) -> &[NormalizedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn remaining(&self) -> usize {
        MAX_BATCH_SIZE.saturating_sub(self.images.len())
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug)]
pub struct UploadFailure {
    /// Position of the image in the batch that was confirmed.
    pub index: usize,
    pub error: StoreError,
}

#[derive(Debug, Default)]
pub struct UploadReport {
    pub created: Vec<Uuid>,
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Gallery {
    store: Arc<dyn DocumentStore>,
    scope: Scope,
    settings: NormalizerSettings,
    photos: Vec<PhotoRecord>,
    filter: FilterConfig,
    viewer: Viewer,
    upload: UploadBatch,
    notices: Vec<Notice>,
}

impl std::fmt::Debug for Gallery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gallery")
            .field("scope", &self.scope)
            .field("photos", &self.photos.len())
            .field("filter", &self.filter)
            .field("viewer", &self.viewer)
            .field("pending", &self.upload.len())
            .finish()
    }
}

impl Gallery {
    pub fn new(store: Arc<dyn DocumentStore>, scope: Scope, settings: NormalizerSettings) -> Self {
        Self {
            store,
            scope,
            settings,
            photos: Vec::new(),
            filter: FilterConfig::default(),
            viewer: Viewer::default(),
            upload: UploadBatch::default(),
            notices: Vec::new(),
        }
    }

    /// Sign in and open the gallery of the signed in user.
    #[tracing::instrument(name = "Opening gallery", skip(store, identity, settings))]
    pub async fn sign_in(
        store: Arc<dyn DocumentStore>,
        identity: &dyn IdentityProvider,
        app_id: &str,
        settings: NormalizerSettings,
    ) -> Result<Self, IdentityError> {
        let user = identity.sign_in().await?;
        tracing::info!(%user, "Signed in");
        Ok(Self::new(store, Scope::new(app_id, user), settings))
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Live snapshots of this gallery's photos, feed them to
    /// [`Gallery::apply_snapshot`].
    pub fn subscribe(&self) -> SnapshotStream {
        self.store.subscribe(self.scope.clone())
    }

    pub async fn refresh(&mut self) {
        let snapshot = self.store.snapshot(&self.scope).await;
        self.apply_snapshot(snapshot);
    }

    pub fn apply_snapshot(&mut self, snapshot: Result<Vec<PhotoRecord>, StoreError>) {
        match snapshot {
            Ok(photos) => {
                self.viewer.retain(photos.iter().map(|p| p.id));
                self.photos = photos;
            }
            Err(e) => tracing::warn!("Error fetching photos, keeping last snapshot: {e}"),
        }
    }

    pub fn photos(&self) -> &[PhotoRecord] {
        &self.photos
    }

    pub fn photo(&self, id: Uuid) -> Option<&PhotoRecord> {
        self.photos.iter().find(|p| p.id == id)
    }

    /// The photos passing the current filter, newest first.
    pub fn visible(&self) -> Vec<&PhotoRecord> {
        crate::filter::filter_records(&self.photos, &self.filter)
    }

    pub fn visible_ids(&self) -> Vec<Uuid> {
        self.visible().into_iter().map(|p| p.id).collect()
    }

    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    pub fn active_filter_count(&self) -> usize {
        self.filter.active_count()
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    /// The photo open in the viewer.
    pub fn viewing(&self) -> Option<&PhotoRecord> {
        self.viewer.current().and_then(|id| self.photo(id))
    }

    pub fn upload(&self) -> &UploadBatch {
        &self.upload
    }

    /// The tags that will be applied to the pending images.
    pub fn upload_tags_mut(&mut self) -> &mut TagSet {
        &mut self.upload.tags
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, message: impl Into<String>) {
        let notice = Notice(message.into());
        tracing::warn!("{notice}");
        self.notices.push(notice);
    }

    pub fn update(&mut self, message: Message) {
        match message {
            Message::Filter(m) => self.filter.update(m),
            Message::Viewer(m) => {
                let visible = self.visible_ids();
                self.viewer.update(m, &visible);
            }
            Message::Snapshot(snapshot) => self.apply_snapshot(snapshot),
        }
    }

    /// Normalize the selected files and add them to the pending upload.
    ///
    /// Nothing is added unless every file could be processed.
    #[tracing::instrument(name = "Selecting files", skip_all, fields(count = paths.len()))]
    pub async fn select_files<P: AsRef<Utf8Path>>(
        &mut self,
        paths: &[P],
    ) -> Result<usize, GalleryError> {
        if paths.is_empty() {
            return Ok(0);
        }
        let pending = self.upload.len();
        if pending + paths.len() > MAX_BATCH_SIZE {
            self.notify(format!(
                "At most {MAX_BATCH_SIZE} images can be uploaded at once."
            ));
            return Err(GalleryError::BatchSizeExceeded {
                pending,
                selected: paths.len(),
                limit: MAX_BATCH_SIZE,
            });
        }

        match normalize_batch(paths, self.settings).await {
            Ok(images) => {
                let added = images.len();
                self.upload.images.extend(images);
                Ok(added)
            }
            Err(e) => {
                self.notify(format!("Unable to process the selected images: {e}"));
                Err(e.into())
            }
        }
    }

    pub fn remove_selected(&mut self, index: usize) -> Option<NormalizedImage> {
        (index < self.upload.images.len()).then(|| self.upload.images.remove(index))
    }

    /// Drop the pending images and go back to the default tags.
    pub fn cancel_upload(&mut self) {
        self.upload.reset();
    }

    /// Create one photo per pending image.
    ///
    /// Every image is attempted. Saved images leave the pending upload, failed
    /// ones stay so the upload can be retried. The upload is reset once
    /// everything has been saved.
    #[tracing::instrument(name = "Confirming upload", skip(self), fields(scope = %self.scope))]
    pub async fn confirm_upload(&mut self) -> UploadReport {
        if self.upload.is_empty() {
            return UploadReport::default();
        }

        let outcomes = {
            let store = &self.store;
            let scope = &self.scope;
            let tags = &self.upload.tags;
            join_all(self.upload.images.iter().map(|image| {
                store.create(
                    scope,
                    NewPhoto {
                        image_url: image.data_url.clone(),
                        tags: tags.clone(),
                    },
                )
            }))
            .await
        };

        let mut report = UploadReport::default();
        let mut keep = Vec::with_capacity(outcomes.len());
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(id) => {
                    report.created.push(id);
                    keep.push(false);
                }
                Err(error) => {
                    report.failed.push(UploadFailure { index, error });
                    keep.push(true);
                }
            }
        }

        if report.is_complete() {
            self.upload.reset();
        } else {
            let mut keep = keep.into_iter();
            self.upload.images.retain(|_| keep.next().unwrap_or(true));
            let failed = report.failed.len();
            let total = failed + report.created.len();
            self.notify(format!(
                "{failed} of {total} images could not be saved, they are still pending."
            ));
        }
        tracing::info!(
            created = report.created.len(),
            failed = report.failed.len(),
            "Upload finished"
        );
        report
    }

    /// The tags of a photo, ready to be edited.
    pub fn tags_for(&self, id: Uuid) -> Option<TagSet> {
        self.photo(id).map(PhotoRecord::tags)
    }

    /// Replace all tags of a photo.
    pub async fn edit(&mut self, id: Uuid, tags: TagSet) -> Result<(), GalleryError> {
        let result = self
            .store
            .update(&self.scope, id, PhotoPatch::Tags(tags))
            .await;
        self.check(result, "Unable to save the changes")
    }

    pub async fn toggle_favorite(&mut self, id: Uuid) -> Result<bool, GalleryError> {
        let favorite = !self.photo(id).ok_or(GalleryError::UnknownPhoto(id))?.is_favorite;
        let result = self
            .store
            .update(&self.scope, id, PhotoPatch::Favorite(favorite))
            .await;
        self.check(result, "Unable to update the favorite")?;
        Ok(favorite)
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<(), GalleryError> {
        let result = self.store.delete(&self.scope, id).await;
        self.check(result, "Unable to delete the photo")?;
        self.viewer.forget(id);
        Ok(())
    }

    fn check<T>(&mut self, result: Result<T, StoreError>, context: &str) -> Result<T, GalleryError> {
        result.map_err(|e| {
            self.notify(format!("{context}: {e}"));
            GalleryError::Store(e)
        })
    }
}
