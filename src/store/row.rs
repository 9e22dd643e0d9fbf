//! Rows as read back from the database
//
// Enum and tag columns are read as text and decoded here, one row and one tag
// at a time, so an unreadable value only costs that tag or that row.

use std::fmt::Display;
use std::str::FromStr;

use entity::photo;
use entity::{AgeGroups, ChildTags};
use sea_orm::FromQueryResult;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, FromQueryResult)]
pub(super) struct StoredRow {
    id: Uuid,
    app_id: String,
    owner_id: String,
    image_url: String,
    head_count: i32,
    grandparents: String,
    parents: String,
    children: String,
    children_tags: String,
    pet_count: i32,
    memo: String,
    is_favorite: bool,
    created_at: OffsetDateTime,
}

impl StoredRow {
    /// The row as a model, `None` when the row cannot be shown at all.
    ///
    /// Unreadable child tags are dropped and the rest of the row kept.
    pub(super) fn decode(self) -> Option<photo::Model> {
        let id = self.id;
        Some(photo::Model {
            grandparents: parse_column(id, "grandparents", &self.grandparents)?,
            parents: parse_column(id, "parents", &self.parents)?,
            children: ChildTags(decode_list(id, "children", &self.children)),
            children_tags: AgeGroups(decode_list(id, "children_tags", &self.children_tags)),
            id,
            app_id: self.app_id,
            owner_id: self.owner_id,
            image_url: self.image_url,
            head_count: self.head_count,
            pet_count: self.pet_count,
            memo: self.memo,
            is_favorite: self.is_favorite,
            created_at: self.created_at,
        })
    }
}

fn parse_column<T>(id: Uuid, column: &str, value: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .inspect_err(|e| tracing::warn!(%id, column, "Skipping unreadable photo: {e}"))
        .ok()
}

fn decode_list<T: DeserializeOwned>(id: Uuid, column: &str, raw: &str) -> Vec<T> {
    let entries: Vec<Value> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(%id, column, "Ignoring unreadable tag list: {e}");
            return Vec::new();
        }
    };
    entries
        .iter()
        .filter_map(|entry| {
            T::deserialize(entry)
                .inspect_err(|e| tracing::warn!(%id, column, %entry, "Skipping unreadable tag: {e}"))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use entity::{AgeGroup, ChildTag};

    use super::*;

    #[test]
    fn keeps_readable_tags() {
        let tags: Vec<ChildTag> = decode_list(
            Uuid::nil(),
            "children",
            r#"[{"id":"kid"},{"id":"teen","count":1},"toddler",{"id":"kid","count":2.0},"cousin"]"#,
        );
        assert_eq!(
            tags,
            vec![
                ChildTag::Counted {
                    id: AgeGroup::Teen,
                    count: 1
                },
                ChildTag::Legacy(AgeGroup::Toddler),
            ]
        );
    }

    #[test]
    fn unreadable_list_is_empty() {
        assert!(decode_list::<AgeGroup>(Uuid::nil(), "children_tags", "oops").is_empty());
        assert!(decode_list::<AgeGroup>(Uuid::nil(), "children_tags", r#"{"kid":1}"#).is_empty());
    }
}
