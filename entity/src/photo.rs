use sea_orm::entity::prelude::*;

use super::{AgeGroups, ChildTags, Grandparents, Parents};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "photos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub app_id: String,
    #[sea_orm(indexed)]
    pub owner_id: String,
    #[sea_orm(column_type = "Text")]
    pub image_url: String,
    pub head_count: i32,
    pub grandparents: Grandparents,
    pub parents: Parents,
    pub children: ChildTags,
    pub children_tags: AgeGroups,
    pub pet_count: i32,
    #[sea_orm(column_type = "Text")]
    pub memo: String,
    pub is_favorite: bool,
    pub created_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
