//! Ranked keyword rules.
//!
//! A [`RankedRules`] set is an ordered list of `(category, keywords)` pairs.
//! Text is upper-cased and tested against each rule in order; the first rule
//! with any keyword contained in the text wins. Text that matches no rule
//! resolves to the set's fallback category.
//!
//! Keyword sets may overlap. Order is the only tie-break, so reordering the
//! rules changes labels.

use serde::{Deserialize, Serialize};

use crate::{CrimeGroup, LocationGroup};

/// One entry in a [`RankedRules`] set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule<C> {
    /// Category assigned when any keyword matches.
    pub category: C,
    /// Keywords tested as case-insensitive substrings.
    pub keywords: Vec<String>,
}

impl<C> KeywordRule<C> {
    /// Creates a rule from static keyword slices.
    #[must_use]
    pub fn new(category: C, keywords: &[&str]) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

/// Ordered keyword rules with a fallback category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedRules<C> {
    rules: Vec<KeywordRule<C>>,
    fallback: C,
}

impl<C: Copy> RankedRules<C> {
    /// Builds a rule set. Keywords are normalized to upper case and blank
    /// keywords are discarded.
    #[must_use]
    pub fn new(rules: Vec<KeywordRule<C>>, fallback: C) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| KeywordRule {
                category: rule.category,
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_uppercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();

        Self { rules, fallback }
    }

    /// Classifies `text` by first-match-wins over the ranked rules.
    #[must_use]
    pub fn classify(&self, text: &str) -> C {
        self.matching_rule(text)
            .map_or(self.fallback, |rule| rule.category)
    }

    /// Returns the first rule that matches `text`, if any.
    #[must_use]
    pub fn matching_rule(&self, text: &str) -> Option<&KeywordRule<C>> {
        let upper = text.to_uppercase();
        self.rules
            .iter()
            .find(|rule| contains_any(&upper, &rule.keywords))
    }

    /// The rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[KeywordRule<C>] {
        &self.rules
    }

    /// Category returned when no rule matches.
    #[must_use]
    pub const fn fallback(&self) -> C {
        self.fallback
    }
}

impl RankedRules<LocationGroup> {
    /// Built-in location rules, evaluated STREET, RESIDENCE, BUSINESS,
    /// PUBLIC. Unmatched text is [`LocationGroup::Other`].
    #[must_use]
    pub fn location_defaults() -> Self {
        Self::new(
            vec![
                KeywordRule::new(
                    LocationGroup::Street,
                    &["STREET", "SIDEWALK", "PARKING", "DRIVE"],
                ),
                KeywordRule::new(
                    LocationGroup::Residence,
                    &["RESIDENCE", "APARTMENT", "HOME", "HOUSE"],
                ),
                KeywordRule::new(
                    LocationGroup::Business,
                    &["BUSINESS", "STORE", "SHOP", "RESTAURANT", "COMMERCIAL"],
                ),
                KeywordRule::new(
                    LocationGroup::Public,
                    &["PUBLIC", "SCHOOL", "GOVERNMENT", "HOSPITAL"],
                ),
            ],
            LocationGroup::Other,
        )
    }
}

impl RankedRules<CrimeGroup> {
    /// Built-in crime-type rules. Violent keywords are checked before
    /// property keywords; unmatched labels are [`CrimeGroup::OtherCrime`].
    ///
    /// "DOMESTIC" and "PUBLIC PEACE" sit in the violent list, and "ROBBERY"
    /// in the property list. Labels downstream depend on this exact order.
    #[must_use]
    pub fn crime_defaults() -> Self {
        Self::new(
            vec![
                KeywordRule::new(
                    CrimeGroup::ViolentCrime,
                    &[
                        "ASSAULT",
                        "BATTERY",
                        "HOMICIDE",
                        "KIDNAPPING",
                        "CRIMINAL SEXUAL ASSAULT",
                        "SEX OFFENSE",
                        "OFFENSE INVOLVING CHILDREN",
                        "WEAPONS VIOLATION",
                        "DOMESTIC",
                        "PUBLIC PEACE",
                    ],
                ),
                KeywordRule::new(
                    CrimeGroup::PropertyCrime,
                    &[
                        "THEFT",
                        "BURGLARY",
                        "MOTOR VEHICLE THEFT",
                        "CRIMINAL DAMAGE",
                        "CRIMINAL TRESPASS",
                        "ARSON",
                        "DECEPTIVE PRACTICE",
                        "ROBBERY",
                        "SHOPLIFTING",
                        "VANDALISM",
                    ],
                ),
            ],
            CrimeGroup::OtherCrime,
        )
    }
}

/// Checks if `haystack` contains any of the given `needles`.
fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}
