//! Narrow the gallery down to the photos matching a composition

use serde::{Deserialize, Serialize};

use crate::photo::{AgeGroup, ChildCount, ChildCounts, ChildTag, Grandparents, Parents, PhotoRecord};

/// A filter value that is either a wildcard or one specific value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice<T> {
    All,
    Only(T),
}

impl<T> Default for Choice<T> {
    fn default() -> Self {
        Choice::All
    }
}

impl<T: PartialEq> Choice<T> {
    pub fn is_all(&self) -> bool {
        matches!(self, Choice::All)
    }

    pub fn admits(&self, value: &T) -> bool {
        match self {
            Choice::All => true,
            Choice::Only(expected) => expected == value,
        }
    }
}

impl<T> From<Option<T>> for Choice<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Choice::All, Choice::Only)
    }
}

#[derive(Debug, Clone)]
pub enum FilterMessage {
    SetHeadCount(Choice<u32>),
    SetGrandparents(Choice<Grandparents>),
    SetParents(Choice<Parents>),
    ToggleChild(AgeGroup),
    ChangeChildCount(AgeGroup, i32),
    SetIncludePets(bool),
    SetOnlyFavorites(bool),
    Reset,
}

/// The filters selected by the user.
///
/// Every child constraint must be satisfied by the photo, the remaining
/// fields only apply when they are not [`Choice::All`] or `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub head_count: Choice<u32>,
    pub grandparents: Choice<Grandparents>,
    pub parents: Choice<Parents>,
    pub children: ChildCounts,
    pub include_pets: bool,
    pub only_favorites: bool,
}

impl FilterConfig {
    pub fn matches(&self, photo: &PhotoRecord) -> bool {
        if self.only_favorites && !photo.is_favorite {
            return false;
        }
        if !self.head_count.admits(&photo.head_count) {
            return false;
        }
        if !self.grandparents.admits(&photo.grandparents) {
            return false;
        }
        if !self.parents.admits(&photo.parents) {
            return false;
        }
        if self.include_pets && !photo.has_pets() {
            return false;
        }
        self.children
            .iter()
            .all(|constraint| photo.child_tags().any(|tag| satisfies(&tag, constraint)))
    }

    /// The number of active filters, shown as a badge.
    pub fn active_count(&self) -> usize {
        [
            self.only_favorites,
            !self.head_count.is_all(),
            !self.grandparents.is_all(),
            !self.parents.is_all(),
            self.include_pets,
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
            + self.children.len()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, message: FilterMessage) {
        match message {
            FilterMessage::SetHeadCount(value) => self.head_count = value,
            FilterMessage::SetGrandparents(value) => self.grandparents = value,
            FilterMessage::SetParents(value) => self.parents = value,
            FilterMessage::ToggleChild(id) => self.children.toggle(id),
            FilterMessage::ChangeChildCount(id, delta) => self.children.change_count(id, delta),
            FilterMessage::SetIncludePets(value) => self.include_pets = value,
            FilterMessage::SetOnlyFavorites(value) => self.only_favorites = value,
            FilterMessage::Reset => self.reset(),
        }
    }
}

// Counted tags have to agree on the number of children, legacy tags never
// recorded one so only the age group is compared.
fn satisfies(tag: &ChildTag, constraint: &ChildCount) -> bool {
    match *tag {
        ChildTag::Counted { id, count } => id == constraint.id && count == constraint.count,
        ChildTag::Legacy(id) => id == constraint.id,
    }
}

pub fn matches(photo: &PhotoRecord, filter: &FilterConfig) -> bool {
    filter.matches(photo)
}

pub fn active_filter_count(filter: &FilterConfig) -> usize {
    filter.active_count()
}

/// The photos passing the filter, in the order given.
pub fn filter_records<'a>(photos: &'a [PhotoRecord], filter: &FilterConfig) -> Vec<&'a PhotoRecord> {
    photos.iter().filter(|p| filter.matches(p)).collect()
}
