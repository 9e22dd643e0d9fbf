//! Child tags stored alongside each photo
//
// Photos written before per-tag counts existed store their children as bare
// age group ids (`["toddler"]`). Newer photos store `{id, count}` objects.
// Both shapes deserialize into [`ChildTag`] so readers never need to guess.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

use crate::AgeGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildTag {
    /// An age group together with how many children of that age are present.
    Counted { id: AgeGroup, count: u32 },
    /// A bare age group id without any count.
    Legacy(AgeGroup),
}

impl ChildTag {
    pub fn id(&self) -> AgeGroup {
        match *self {
            ChildTag::Counted { id, .. } => id,
            ChildTag::Legacy(id) => id,
        }
    }

    /// The number of children, `None` for legacy tags.
    pub fn count(&self) -> Option<u32> {
        match *self {
            ChildTag::Counted { count, .. } => Some(count),
            ChildTag::Legacy(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct ChildTags(pub Vec<ChildTag>);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct AgeGroups(pub Vec<AgeGroup>);

impl From<&ChildTags> for AgeGroups {
    fn from(tags: &ChildTags) -> Self {
        AgeGroups(tags.0.iter().map(ChildTag::id).collect())
    }
}
