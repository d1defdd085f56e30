// Plant care extraction: structured care instructions from label text

pub mod client;
pub mod schedule;

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub use client::CareExtractor;
pub use schedule::{next_wednesday, recurrence_rule, ReminderSchedule};

/// How often the plant should be watered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CareFrequency {
    Weekly,
    Fortnightly,
    Monthly,
}

impl FromStr for CareFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(CareFrequency::Weekly),
            "fortnightly" => Ok(CareFrequency::Fortnightly),
            "monthly" => Ok(CareFrequency::Monthly),
            other => Err(format!("unknown watering frequency '{}'", other)),
        }
    }
}

impl fmt::Display for CareFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CareFrequency::Weekly => "Weekly",
            CareFrequency::Fortnightly => "Fortnightly",
            CareFrequency::Monthly => "Monthly",
        };
        f.write_str(name)
    }
}

/// When fertiliser should be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FertiliserPeriod {
    Weekly,
    Monthly,
    #[serde(rename = "Bi-Annually")]
    BiAnnually,
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl FromStr for FertiliserPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match normalized.as_str() {
            "weekly" => Ok(FertiliserPeriod::Weekly),
            "monthly" => Ok(FertiliserPeriod::Monthly),
            "biannually" | "biannual" => Ok(FertiliserPeriod::BiAnnually),
            "spring" => Ok(FertiliserPeriod::Spring),
            "summer" => Ok(FertiliserPeriod::Summer),
            "autumn" | "fall" => Ok(FertiliserPeriod::Autumn),
            "winter" => Ok(FertiliserPeriod::Winter),
            _ => Err(format!("unknown fertiliser period '{}'", s.trim())),
        }
    }
}

impl fmt::Display for FertiliserPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FertiliserPeriod::Weekly => "Weekly",
            FertiliserPeriod::Monthly => "Monthly",
            FertiliserPeriod::BiAnnually => "Bi-Annually",
            FertiliserPeriod::Spring => "Spring",
            FertiliserPeriod::Summer => "Summer",
            FertiliserPeriod::Autumn => "Autumn",
            FertiliserPeriod::Winter => "Winter",
        };
        f.write_str(name)
    }
}

impl<'de> Deserialize<'de> for FertiliserPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for CareFrequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Care instructions read from one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantCare {
    /// `None` when the label gives no usable watering instruction
    #[serde(default, deserialize_with = "watering_or_none")]
    pub watering_frequency: Option<CareFrequency>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fertiliser: Vec<FertiliserPeriod>,
}

/// Models answer "none" or "" when they find nothing
fn watering_or_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<CareFrequency>, D::Error> {
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("null") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
