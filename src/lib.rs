pub mod config;
pub mod filter;
pub mod gallery;
pub mod identity;
pub mod normalize;
pub mod photo;
pub mod store;
pub mod telemetry;
pub mod viewer;

use filter::FilterMessage;
use photo::PhotoRecord;
use store::StoreError;
use viewer::ViewerMessage;

pub use config::Config;
pub use gallery::Gallery;

/// Messages for updating the gallery
#[derive(Debug)]
pub enum Message {
    Filter(FilterMessage),
    Viewer(ViewerMessage),
    // A new snapshot pushed by the store subscription
    Snapshot(Result<Vec<PhotoRecord>, StoreError>),
}

impl From<FilterMessage> for Message {
    fn from(val: FilterMessage) -> Self {
        Message::Filter(val)
    }
}

impl From<ViewerMessage> for Message {
    fn from(val: ViewerMessage) -> Self {
        Message::Viewer(val)
    }
}

impl From<Result<Vec<PhotoRecord>, StoreError>> for Message {
    fn from(val: Result<Vec<PhotoRecord>, StoreError>) -> Self {
        Message::Snapshot(val)
    }
}
