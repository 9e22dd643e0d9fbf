//! Age brackets used to tag the children in a photo

use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Error, Result};
use serde::{Deserialize, Serialize};

// Child age groups are only ever stored inside the JSON child tag columns,
// so unlike the other tag enums this one is not a database enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Newborn,
    Toddler,
    Kid,
    Teen,
    AdultChild,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 5] = [
        AgeGroup::Newborn,
        AgeGroup::Toddler,
        AgeGroup::Kid,
        AgeGroup::Teen,
        AgeGroup::AdultChild,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Newborn => "Newborn (0-100 days)",
            AgeGroup::Toddler => "Toddler (1-4 years)",
            AgeGroup::Kid => "Kid (5-13 years)",
            AgeGroup::Teen => "Teen",
            AgeGroup::AdultChild => "Adult child (20+)",
        }
    }
}

impl FromStr for AgeGroup {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "newborn" => Ok(AgeGroup::Newborn),
            "toddler" => Ok(AgeGroup::Toddler),
            "kid" => Ok(AgeGroup::Kid),
            "teen" => Ok(AgeGroup::Teen),
            "adult_child" => Ok(AgeGroup::AdultChild),
            _ => Err(anyhow!("Invalid value for AgeGroup: {input}")),
        }
    }
}

impl Display for AgeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            AgeGroup::Newborn => "newborn",
            AgeGroup::Toddler => "toddler",
            AgeGroup::Kid => "kid",
            AgeGroup::Teen => "teen",
            AgeGroup::AdultChild => "adult_child",
        };
        write!(f, "{text}")
    }
}
