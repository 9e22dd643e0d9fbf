use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Error, Result};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

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
pub enum Parents {
    #[default]
    #[sea_orm(string_value = "none")]
    None,
    #[sea_orm(string_value = "mom")]
    Mom,
    #[sea_orm(string_value = "dad")]
    Dad,
    #[sea_orm(string_value = "both")]
    Both,
}

impl Parents {
    pub fn label(&self) -> &'static str {
        match self {
            Parents::None => "None",
            Parents::Mom => "Mom",
            Parents::Dad => "Dad",
            Parents::Both => "Both parents",
        }
    }
}

impl FromStr for Parents {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "none" | "None" => Ok(Parents::None),
            "mom" | "Mom" => Ok(Parents::Mom),
            "dad" | "Dad" => Ok(Parents::Dad),
            "both" | "Both" => Ok(Parents::Both),
            _ => Err(anyhow!("Invalid value for Parents: {input}")),
        }
    }
}

impl TryFrom<&str> for Parents {
    type Error = Error;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl Display for Parents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Parents::None => "none",
            Parents::Mom => "mom",
            Parents::Dad => "dad",
            Parents::Both => "both",
        };
        write!(f, "{text}")
    }
}
