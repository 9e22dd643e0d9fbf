pub mod prelude;

pub mod child_tag;
pub mod enum_age_group;
pub mod enum_grandparents;
pub mod enum_parents;

pub mod photo;

pub use child_tag::{AgeGroups, ChildTag, ChildTags};
pub use enum_age_group::AgeGroup;
pub use enum_grandparents::Grandparents;
pub use enum_parents::Parents;
