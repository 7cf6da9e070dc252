#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime group and location group taxonomy.
//!
//! This crate defines the small categorical vocabularies that every stage of
//! the pipeline agrees on: the three-way [`CrimeGroup`] label the category
//! classifier predicts, the [`LocationGroup`] derived from free-text location
//! descriptions, and the [`RiskLevel`] attached to zones in reports.
//!
//! The keyword policies that map free text onto these vocabularies live in
//! [`rules`] as ordered data rather than conditional chains.

pub mod rules;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use rules::{KeywordRule, RankedRules};

/// Three-way crime severity grouping used as the category classifier label.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CrimeGroup {
    /// Crimes against persons (assault, battery, homicide, weapons).
    ViolentCrime,
    /// Crimes against property (theft, burglary, damage, robbery).
    PropertyCrime,
    /// Everything the keyword rules do not claim.
    OtherCrime,
}

impl CrimeGroup {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::ViolentCrime, Self::PropertyCrime, Self::OtherCrime]
    }
}

/// Coarse grouping of a free-text location description.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationGroup {
    /// Streets, sidewalks, parking lots, driveways
    Street,
    /// Residences, apartments, houses
    Residence,
    /// Stores, restaurants, commercial premises
    Business,
    /// Schools, hospitals, government buildings, other public places
    Public,
    /// A description was present but matched no rule
    Other,
    /// No usable description
    Unknown,
}

impl LocationGroup {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Street,
            Self::Residence,
            Self::Business,
            Self::Public,
            Self::Other,
            Self::Unknown,
        ]
    }
}

/// Risk level attached to a zone in the region lookup table.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Lower-risk area
    #[default]
    Low,
    /// Medium-risk area
    Medium,
    /// High-risk area
    High,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn crime_group_names_match_label_strings() {
        assert_eq!(CrimeGroup::ViolentCrime.as_ref(), "VIOLENT_CRIME");
        assert_eq!(CrimeGroup::PropertyCrime.to_string(), "PROPERTY_CRIME");
        assert_eq!(
            CrimeGroup::from_str("OTHER_CRIME").unwrap(),
            CrimeGroup::OtherCrime
        );
    }

    #[test]
    fn crime_group_sort_order_is_alphabetical() {
        let mut groups = CrimeGroup::all().to_vec();
        groups.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        assert_eq!(
            groups,
            vec![
                CrimeGroup::OtherCrime,
                CrimeGroup::PropertyCrime,
                CrimeGroup::ViolentCrime
            ]
        );
    }

    #[test]
    fn location_group_parses_from_string() {
        for group in LocationGroup::all() {
            assert_eq!(LocationGroup::from_str(group.as_ref()).unwrap(), *group);
        }
    }

    #[test]
    fn risk_level_parses_screaming_case() {
        assert_eq!(RiskLevel::from_str("HIGH").unwrap(), RiskLevel::High);
        assert!(RiskLevel::from_str("SEVERE").is_err());
    }
}
