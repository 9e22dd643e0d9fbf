use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Error, Result};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Which grandparents appear in a photo.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum Grandparents {
    #[default]
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "grandfather")]
    Grandfather,
    #[sea_orm(string_value = "grandmother")]
    Grandmother,
    #[sea_orm(string_value = "both")]
    Both,
}

impl Grandparents {
    pub fn label(&self) -> &'static str {
        match self {
            Grandparents::None => "None",
            Grandparents::Grandfather => "Grandfather",
            Grandparents::Grandmother => "Grandmother",
            Grandparents::Both => "Both grandparents",
        }
    }
}

impl FromStr for Grandparents {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "none" | "None" => Ok(Grandparents::None),
            "grandfather" | "Grandfather" => Ok(Grandparents::Grandfather),
            "grandmother" | "Grandmother" => Ok(Grandparents::Grandmother),
            "both" | "Both" => Ok(Grandparents::Both),
            _ => Err(anyhow!("Invalid value for Grandparents: {input}")),
        }
    }
}

impl TryFrom<&str> for Grandparents {
    type Error = Error;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl Display for Grandparents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Grandparents::None => "none",
            Grandparents::Grandfather => "grandfather",
            Grandparents::Grandmother => "grandmother",
            Grandparents::Both => "both",
        };
        write!(f, "{text}")
    }
}
