//! A document store kept in a SQL database
//
// Writes broadcast the scope they touched, each subscription listens for its
// own scope and re-queries the whole snapshot.

use async_trait::async_trait;
use entity::photo;
use entity::prelude::Photo;
use entity::{AgeGroups, ChildTags, Grandparents, Parents};
use futures::{stream, StreamExt};
use migration::{Migrator, MigratorTrait};
use sea_orm::entity::*;
use sea_orm::prelude::*;
use sea_orm::query::*;
use sea_orm::sea_query::Condition;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::row::StoredRow;
use super::{DocumentStore, NewPhoto, PhotoPatch, Scope, SnapshotStream, StoreError, RECORD_SIZE_LIMIT};
use crate::photo::{PhotoRecord, TagSet};

const CHANGE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct DatabaseStore {
    db: DatabaseConnection,
    changes: broadcast::Sender<Scope>,
    record_limit: usize,
}

impl DatabaseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            db,
            changes,
            record_limit: RECORD_SIZE_LIMIT,
        }
    }

    /// Connect to the database at `url`, bringing the schema up to date.
    #[tracing::instrument(name = "Connecting to database")]
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        Self::open(options).await
    }

    /// A private database that only lives as long as the store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let mut options = ConnectOptions::new("sqlite::memory:");
        // Every connection to `sqlite::memory:` is a separate database
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        Self::open(options).await
    }

    async fn open(options: ConnectOptions) -> Result<Self, StoreError> {
        let db = Database::connect(options).await?;
        Migrator::up(&db, None).await?;
        Ok(Self::new(db))
    }

    pub fn with_record_limit(mut self, record_limit: usize) -> Self {
        self.record_limit = record_limit;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // Rows that cannot be decoded are hidden from snapshots, so they are not
    // found here either.
    async fn find(&self, scope: &Scope, id: Uuid) -> Result<photo::Model, StoreError> {
        Photo::find_by_id(id)
            .filter(in_scope(scope))
            .into_model::<StoredRow>()
            .one(&self.db)
            .await?
            .and_then(StoredRow::decode)
            .ok_or(StoreError::NotFound(id))
    }

    fn check_size(&self, model: &photo::Model) -> Result<(), StoreError> {
        let size = serde_json::to_vec(&StoredDocument::from(model))?.len();
        if size > self.record_limit {
            return Err(StoreError::RecordTooLarge {
                size,
                limit: self.record_limit,
            });
        }
        Ok(())
    }

    fn notify(&self, scope: &Scope) {
        // Sending only fails when nobody is listening
        let receivers = self.changes.send(scope.clone()).unwrap_or(0);
        tracing::debug!(receivers, %scope, "Scope changed");
    }
}

/// The record as the hosted document store would hold it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument<'a> {
    image_url: &'a str,
    head_count: i32,
    grandparents: Grandparents,
    parents: Parents,
    children: &'a ChildTags,
    children_tags: &'a AgeGroups,
    pet_count: i32,
    memo: &'a str,
    is_favorite: bool,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl<'a> From<&'a photo::Model> for StoredDocument<'a> {
    fn from(model: &'a photo::Model) -> Self {
        Self {
            image_url: &model.image_url,
            head_count: model.head_count,
            grandparents: model.grandparents,
            parents: model.parents,
            children: &model.children,
            children_tags: &model.children_tags,
            pet_count: model.pet_count,
            memo: &model.memo,
            is_favorite: model.is_favorite,
            created_at: model.created_at,
        }
    }
}

fn into_active(model: photo::Model) -> photo::ActiveModel {
    photo::ActiveModel {
        id: ActiveValue::Set(model.id),
        app_id: ActiveValue::Set(model.app_id),
        owner_id: ActiveValue::Set(model.owner_id),
        image_url: ActiveValue::Set(model.image_url),
        head_count: ActiveValue::Set(model.head_count),
        grandparents: ActiveValue::Set(model.grandparents),
        parents: ActiveValue::Set(model.parents),
        children: ActiveValue::Set(model.children),
        children_tags: ActiveValue::Set(model.children_tags),
        pet_count: ActiveValue::Set(model.pet_count),
        memo: ActiveValue::Set(model.memo),
        is_favorite: ActiveValue::Set(model.is_favorite),
        created_at: ActiveValue::Set(model.created_at),
    }
}

fn in_scope(scope: &Scope) -> Condition {
    Condition::all()
        .add(photo::Column::AppId.eq(scope.app_id.as_str()))
        .add(photo::Column::OwnerId.eq(scope.owner_id.as_str()))
}

fn to_column(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// Overwrites every tag column, re-deriving the age group list. A photo always
// shows at least one person.
fn apply_tags(model: &mut photo::Model, tags: &TagSet) {
    model.head_count = to_column(tags.head_count.max(1));
    model.grandparents = tags.grandparents;
    model.parents = tags.parents;
    model.children = ChildTags(tags.child_tags());
    model.children_tags = AgeGroups::from(&model.children);
    model.pet_count = to_column(tags.pet_count);
    model.memo = tags.memo.clone();
}

#[tracing::instrument(name = "Querying snapshot", skip_all, fields(scope = %scope))]
async fn query_snapshot(
    db: &DatabaseConnection,
    scope: &Scope,
) -> Result<Vec<PhotoRecord>, StoreError> {
    Ok(Photo::find()
        .filter(in_scope(scope))
        .order_by_desc(photo::Column::CreatedAt)
        .order_by_desc(photo::Column::Id)
        .into_model::<StoredRow>()
        .all(db)
        .await?
        .into_iter()
        .filter_map(StoredRow::decode)
        .map(PhotoRecord::from)
        .collect())
}

struct Subscription {
    db: DatabaseConnection,
    scope: Scope,
    changes: broadcast::Receiver<Scope>,
    initial: bool,
}

impl Subscription {
    /// Wait for the next change to the scope, `None` once the store is gone.
    async fn changed(&mut self) -> Option<()> {
        loop {
            match self.changes.recv().await {
                Ok(scope) if scope == self.scope => return Some(()),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Subscription fell behind, re-querying");
                    return Some(());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl DocumentStore for DatabaseStore {
    async fn snapshot(&self, scope: &Scope) -> Result<Vec<PhotoRecord>, StoreError> {
        query_snapshot(&self.db, scope).await
    }

    fn subscribe(&self, scope: Scope) -> SnapshotStream {
        // Listen before the first query so no change is missed in between
        let subscription = Subscription {
            db: self.db.clone(),
            scope,
            changes: self.changes.subscribe(),
            initial: true,
        };
        stream::unfold(subscription, |mut subscription| async move {
            if !std::mem::replace(&mut subscription.initial, false) {
                subscription.changed().await?;
            }
            let snapshot = query_snapshot(&subscription.db, &subscription.scope).await;
            Some((snapshot, subscription))
        })
        .boxed()
    }

    #[tracing::instrument(name = "Creating photo", skip_all, fields(scope = %scope))]
    async fn create(&self, scope: &Scope, photo: NewPhoto) -> Result<Uuid, StoreError> {
        let mut model = photo::Model {
            id: Uuid::now_v7(),
            app_id: scope.app_id.clone(),
            owner_id: scope.owner_id.clone(),
            image_url: photo.image_url,
            head_count: 0,
            grandparents: Grandparents::None,
            parents: Parents::None,
            children: ChildTags::default(),
            children_tags: AgeGroups::default(),
            pet_count: 0,
            memo: String::new(),
            is_favorite: false,
            created_at: OffsetDateTime::now_utc(),
        };
        apply_tags(&mut model, &photo.tags);
        self.check_size(&model)?;

        let id = model.id;
        Photo::insert(into_active(model))
            .exec(&self.db)
            .await
            .inspect_err(|e| tracing::error!("{e:?}"))?;
        tracing::info!(%id, "Created photo");
        self.notify(scope);
        Ok(id)
    }

    #[tracing::instrument(name = "Updating photo", skip(self, scope, patch), fields(scope = %scope))]
    async fn update(&self, scope: &Scope, id: Uuid, patch: PhotoPatch) -> Result<(), StoreError> {
        let mut model = self.find(scope, id).await?;
        let update = match patch {
            PhotoPatch::Tags(tags) => {
                apply_tags(&mut model, &tags);
                self.check_size(&model)?;
                photo::ActiveModel {
                    id: ActiveValue::Unchanged(id),
                    head_count: ActiveValue::Set(model.head_count),
                    grandparents: ActiveValue::Set(model.grandparents),
                    parents: ActiveValue::Set(model.parents),
                    children: ActiveValue::Set(model.children),
                    children_tags: ActiveValue::Set(model.children_tags),
                    pet_count: ActiveValue::Set(model.pet_count),
                    memo: ActiveValue::Set(model.memo),
                    ..Default::default()
                }
            }
            PhotoPatch::Favorite(is_favorite) => photo::ActiveModel {
                id: ActiveValue::Unchanged(id),
                is_favorite: ActiveValue::Set(is_favorite),
                ..Default::default()
            },
        };
        Photo::update(update)
            .exec(&self.db)
            .await
            .inspect_err(|e| tracing::error!("{e:?}"))?;
        self.notify(scope);
        Ok(())
    }

    #[tracing::instrument(name = "Deleting photo", skip(self, scope), fields(scope = %scope))]
    async fn delete(&self, scope: &Scope, id: Uuid) -> Result<(), StoreError> {
        let result = Photo::delete_many()
            .filter(photo::Column::Id.eq(id))
            .filter(in_scope(scope))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        self.notify(scope);
        Ok(())
    }
}
