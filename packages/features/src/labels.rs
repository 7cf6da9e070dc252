//! Free-text grouping: location descriptions and crime type labels.

use crime_insight_crime_models::{CrimeGroup, LocationGroup, RankedRules};

/// Groups a location description.
///
/// Absent or blank text is [`LocationGroup::Unknown`]; otherwise the ranked
/// rules decide, with [`LocationGroup::Other`] for unmatched text.
#[must_use]
pub fn classify_location(
    rules: &RankedRules<LocationGroup>,
    description: Option<&str>,
) -> LocationGroup {
    match description.map(str::trim) {
        None | Some("") => LocationGroup::Unknown,
        Some(text) => rules.classify(text),
    }
}

/// Groups a primary crime type label. An absent label matches nothing and
/// falls through to the rule set's fallback.
#[must_use]
pub fn classify_crime(rules: &RankedRules<CrimeGroup>, primary_type: Option<&str>) -> CrimeGroup {
    rules.classify(primary_type.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_blank_descriptions_are_unknown() {
        let rules = RankedRules::location_defaults();
        assert_eq!(classify_location(&rules, None), LocationGroup::Unknown);
        assert_eq!(classify_location(&rules, Some("  ")), LocationGroup::Unknown);
    }

    #[test]
    fn street_beats_residence() {
        let rules = RankedRules::location_defaults();
        assert_eq!(
            classify_location(&rules, Some("RESIDENCE - DRIVEWAY / STREET")),
            LocationGroup::Street
        );
        assert_eq!(
            classify_location(&rules, Some("123 MAIN STREET")),
            LocationGroup::Street
        );
    }

    #[test]
    fn unmatched_description_is_other() {
        let rules = RankedRules::location_defaults();
        assert_eq!(
            classify_location(&rules, Some("CTA TRAIN")),
            LocationGroup::Other
        );
    }

    #[test]
    fn crime_labels_group_by_rank() {
        let rules = RankedRules::crime_defaults();
        assert_eq!(
            classify_crime(&rules, Some("AGGRAVATED BATTERY")),
            CrimeGroup::ViolentCrime
        );
        assert_eq!(
            classify_crime(&rules, Some("MOTOR VEHICLE THEFT")),
            CrimeGroup::PropertyCrime
        );
        assert_eq!(classify_crime(&rules, Some("OBSCENITY")), CrimeGroup::OtherCrime);
        assert_eq!(classify_crime(&rules, None), CrimeGroup::OtherCrime);
    }
}
