pub use crate::photo;
pub use crate::photo::Entity as Photo;
