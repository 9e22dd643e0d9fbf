//! The tagged photo records shown in the gallery

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Error, Result};
use either::Either;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

pub use entity::{AgeGroup, ChildTag, Grandparents, Parents};

/// A required number of children of one age group.
///
/// Used both for the tags applied to new uploads and for the child
/// constraints of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildCount {
    pub id: AgeGroup,
    pub count: u32,
}

impl ChildCount {
    pub fn new(id: AgeGroup, count: u32) -> Self {
        Self {
            id,
            count: count.max(1),
        }
    }
}

impl From<ChildCount> for ChildTag {
    fn from(value: ChildCount) -> Self {
        ChildTag::Counted {
            id: value.id,
            count: value.count,
        }
    }
}

// Accepts `kid` or `kid=2`
impl FromStr for ChildCount {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.split_once('=') {
            Some((id, count)) => {
                let count: u32 = count
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("Invalid child count: {count}"))?;
                if count == 0 {
                    return Err(anyhow!("Child count must be at least 1."));
                }
                Ok(Self::new(id.trim().parse()?, count))
            }
            None => Ok(Self::new(input.trim().parse()?, 1)),
        }
    }
}

impl Display for ChildCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.id, self.count)
    }
}

/// An ordered list of child counts with at most one entry per age group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildCounts(Vec<ChildCount>);

impl ChildCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the entry for `id`, or append it with a count of one.
    pub fn toggle(&mut self, id: AgeGroup) {
        if self.contains(id) {
            self.0.retain(|c| c.id != id);
        } else {
            self.0.push(ChildCount::new(id, 1));
        }
    }

    /// Adjust the count for `id`, never going below one.
    pub fn change_count(&mut self, id: AgeGroup, delta: i32) {
        if let Some(child) = self.0.iter_mut().find(|c| c.id == id) {
            let count = i64::from(child.count) + i64::from(delta);
            child.count = u32::try_from(count.max(1)).unwrap_or(u32::MAX);
        }
    }

    pub fn get(&self, id: AgeGroup) -> Option<&ChildCount> {
        self.0.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: AgeGroup) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildCount> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }
}

impl FromIterator<ChildCount> for ChildCounts {
    fn from_iter<T: IntoIterator<Item = ChildCount>>(iter: T) -> Self {
        let mut counts = ChildCounts::new();
        for child in iter {
            match counts.0.iter_mut().find(|c| c.id == child.id) {
                Some(existing) => existing.count = child.count,
                None => counts.0.push(child),
            }
        }
        counts
    }
}

impl From<Vec<ChildCount>> for ChildCounts {
    fn from(value: Vec<ChildCount>) -> Self {
        value.into_iter().collect()
    }
}

/// The taggable fields of a photo.
///
/// One `TagSet` is shared by every image of an upload, and an edit replaces
/// all of these fields at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    pub head_count: u32,
    pub grandparents: Grandparents,
    pub parents: Parents,
    pub children: ChildCounts,
    pub pet_count: u32,
    pub memo: String,
}

impl Default for TagSet {
    fn default() -> Self {
        Self {
            head_count: 3,
            grandparents: Grandparents::None,
            parents: Parents::Both,
            children: ChildCounts::new(),
            pet_count: 0,
            memo: String::new(),
        }
    }
}

impl TagSet {
    pub fn toggle_pets(&mut self) {
        self.pet_count = if self.pet_count > 0 { 0 } else { 1 };
    }

    pub fn change_pet_count(&mut self, delta: i32) {
        let count = i64::from(self.pet_count) + i64::from(delta);
        self.pet_count = u32::try_from(count.max(1)).unwrap_or(u32::MAX);
    }

    /// The child tags as written to the store.
    pub fn child_tags(&self) -> Vec<ChildTag> {
        self.children.iter().copied().map(ChildTag::from).collect()
    }

    /// The age groups present, kept alongside the tags for simpler querying.
    pub fn age_groups(&self) -> Vec<AgeGroup> {
        self.children.iter().map(|c| c.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: Uuid,
    pub image_url: String,
    pub head_count: u32,
    pub grandparents: Grandparents,
    pub parents: Parents,
    pub children: Vec<ChildTag>,
    pub children_tags: Vec<AgeGroup>,
    pub pet_count: u32,
    pub memo: String,
    pub is_favorite: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PhotoRecord {
    /// The child tags to match against.
    ///
    /// Records that only kept the derived age group list are read as legacy
    /// tags without counts.
    pub fn child_tags(&self) -> impl Iterator<Item = ChildTag> + '_ {
        if self.children.is_empty() {
            Either::Left(self.children_tags.iter().copied().map(ChildTag::Legacy))
        } else {
            Either::Right(self.children.iter().copied())
        }
    }

    pub fn memo(&self) -> Option<&str> {
        Some(self.memo.trim()).filter(|m| !m.is_empty())
    }

    pub fn has_pets(&self) -> bool {
        self.pet_count >= 1
    }

    /// The current tags, ready to be edited.
    ///
    /// Legacy child tags become a count of one.
    pub fn tags(&self) -> TagSet {
        TagSet {
            head_count: self.head_count.max(1),
            grandparents: self.grandparents,
            parents: self.parents,
            children: self
                .child_tags()
                .map(|tag| ChildCount::new(tag.id(), tag.count().unwrap_or(1)))
                .collect(),
            pet_count: self.pet_count,
            memo: self.memo.clone(),
        }
    }
}

impl From<entity::photo::Model> for PhotoRecord {
    fn from(model: entity::photo::Model) -> Self {
        Self {
            id: model.id,
            image_url: model.image_url,
            head_count: u32::try_from(model.head_count).unwrap_or(0),
            grandparents: model.grandparents,
            parents: model.parents,
            children: model.children.0,
            children_tags: model.children_tags.0,
            pet_count: u32::try_from(model.pet_count).unwrap_or(0),
            memo: model.memo,
            is_favorite: model.is_favorite,
            created_at: model.created_at,
        }
    }
}
