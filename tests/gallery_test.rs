use std::io::Cursor;
use std::sync::Arc;

use camino::Utf8PathBuf;
use futures::StreamExt;
use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use posing_library::filter::FilterMessage;
use posing_library::gallery::Gallery;
use posing_library::identity::SessionBootstrap;
use posing_library::normalize::NormalizerSettings;
use posing_library::photo::{AgeGroup, ChildCount};
use posing_library::store::{DatabaseStore, DocumentStore, Scope};
use posing_library::viewer::ViewerMessage;
use posing_library::Message;

const APP_ID: &str = "studio";

fn png_file(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
    let image: RgbImage = ImageBuffer::from_fn(64, 48, |x, y| Rgb([x as u8 * 4, y as u8 * 5, 90]));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
    std::fs::write(&path, buffer.into_inner()).unwrap();
    path
}

async fn open(store: Arc<DatabaseStore>, token: Option<&str>, dir: &tempfile::TempDir) -> Gallery {
    let identity = SessionBootstrap::new(
        token.map(String::from),
        Utf8PathBuf::from_path_buf(dir.path().join("identity")).unwrap(),
    );
    Gallery::sign_in(store, &identity, APP_ID, NormalizerSettings::default())
        .await
        .unwrap()
}

async fn upload(gallery: &mut Gallery, dir: &tempfile::TempDir, kids: u32) {
    let path = png_file(dir, &format!("kids-{kids}.png"));
    gallery.select_files(&[path]).await.unwrap();
    let tags = gallery.upload_tags_mut();
    tags.head_count = 2 + kids;
    tags.children = vec![ChildCount::new(AgeGroup::Kid, kids)].into();
    assert!(gallery.confirm_upload().await.is_complete());
}

#[tokio::test]
async fn uploads_filter_by_child_count() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DatabaseStore::in_memory().await.unwrap());
    let mut gallery = open(store, None, &dir).await;

    upload(&mut gallery, &dir, 2).await;
    upload(&mut gallery, &dir, 1).await;
    gallery.refresh().await;
    assert_eq!(gallery.photos().len(), 2);

    gallery.update(FilterMessage::ToggleChild(AgeGroup::Kid).into());
    gallery.update(FilterMessage::ChangeChildCount(AgeGroup::Kid, 1).into());
    let visible = gallery.visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].head_count, 4);
    assert_eq!(gallery.active_filter_count(), 1);
}

#[tokio::test]
async fn subscription_pushes_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DatabaseStore::in_memory().await.unwrap());
    let mut gallery = open(store, Some("photographer.token"), &dir).await;
    assert_eq!(gallery.scope(), &Scope::new(APP_ID, "photographer"));

    let mut snapshots = gallery.subscribe();
    let initial = snapshots.next().await.unwrap();
    gallery.update(Message::from(initial));
    assert!(gallery.photos().is_empty());

    upload(&mut gallery, &dir, 1).await;
    let pushed = snapshots.next().await.unwrap();
    gallery.update(pushed.into());
    assert_eq!(gallery.photos().len(), 1);

    let id = gallery.photos()[0].id;
    gallery.update(ViewerMessage::Open(id).into());
    gallery.delete(id).await.unwrap();
    assert!(gallery.viewing().is_none());

    let pushed = snapshots.next().await.unwrap();
    gallery.update(pushed.into());
    assert!(gallery.photos().is_empty());
}

#[tokio::test]
async fn users_only_see_their_own_photos() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DatabaseStore::in_memory().await.unwrap());
    let mut first = open(store.clone(), Some("first"), &dir).await;
    let mut second = open(store.clone(), Some("second"), &dir).await;

    upload(&mut first, &dir, 1).await;
    first.refresh().await;
    second.refresh().await;
    assert_eq!(first.photos().len(), 1);
    assert!(second.photos().is_empty());

    let id = first.photos()[0].id;
    assert!(second.delete(id).await.is_err());
    assert_eq!(
        store
            .snapshot(&Scope::new(APP_ID, "first"))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn anonymous_sessions_reopen_the_same_gallery() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DatabaseStore::in_memory().await.unwrap());

    let mut gallery = open(store.clone(), None, &dir).await;
    upload(&mut gallery, &dir, 3).await;

    let mut reopened = open(store, None, &dir).await;
    assert_eq!(reopened.scope(), gallery.scope());
    reopened.refresh().await;
    assert_eq!(reopened.photos().len(), 1);
}
